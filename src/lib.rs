//! # streamblocks: reactive processing units
//!
//! Small, long-lived processing units that each run on their own thread,
//! accept a new rule at any time, answer queries about the rule they are
//! running, transform a stream of JSON messages, and broadcast each result
//! to every current subscriber.
//!
//! ## Architecture
//!
//! - **Units**: one actor per unit, selecting over `rule`, `query`, `in`
//!   and `quit` mailboxes (crossbeam channels)
//! - **Transforms**: a stochastic logistic classifier and a toggle, plus a
//!   plugin trait for host-defined strategies
//! - **Expressions**: feature paths compiled once with Rhai and evaluated
//!   against each input message
//! - **Runtime**: a set of named units spawned from a TOML config
//!
//! ## Example
//!
//! ```ignore
//! use streamblocks::{config::AppConfig, runtime::{Envelope, Route, Runtime}};
//! use serde_json::json;
//!
//! let runtime = Runtime::from_config(&AppConfig::load("config.toml")?)?;
//! let out = runtime.subscribe("clf")?;
//! runtime.dispatch(Envelope::new("clf", Route::In, json!({"x": 1.0})))?;
//! println!("{:?}", out.recv());
//! runtime.shutdown()?;
//! ```

pub mod config;
pub mod error;
pub mod expr;
pub mod runtime;
pub mod unit;

// Re-export commonly used types
pub use config::{AppConfig, UnitConfig};
pub use error::{ErrorKind, Result, UnitError};
pub use expr::{EvaluationTree, PathEngine};
pub use runtime::{Envelope, Route, Runtime};
pub use unit::{
    Broadcaster, OverflowPolicy, Publish, Subscription, UnitBuilder, UnitHandle, UnitKind,
    UnitReport, UnitStats,
};
