//! Processing units
//!
//! A unit is a long-lived actor that owns a transform and talks to its host
//! only through channels:
//!
//! ```text
//!            rule ──┐
//!           query ──┤                     ┌──► subscriber
//!              in ──┼──► [ Unit thread ] ─┼──► subscriber   (Broadcaster)
//!            quit ──┘         │           └──► ...
//!                             └──► reports (UnitReport)
//! ```
//!
//! # Modules
//!
//! - `bridge` - `UnitBuilder` / `UnitHandle`, the host side of a unit
//! - `broadcast` - Fan-out registry with per-subscriber overflow policy
//! - `executor` - The actor loop
//! - `kind` - Built-in unit kinds and their routes
//! - `node` - Transform dispatch (built-in or plugin)
//! - `rule` - Rule payload parsing
//! - `sampler` - Uniform sample sources for stochastic transforms
//! - `transforms` - Built-in transform strategies
//!
//! # Example
//!
//! ```ignore
//! use streamblocks::unit::{UnitBuilder, UnitKind};
//! use serde_json::json;
//!
//! let unit = UnitBuilder::new(UnitKind::LogisticModel).name("clf").spawn()?;
//! let out = unit.subscribe().unwrap();
//! unit.update_rule(json!({"Weights": [2.0], "FeaturePaths": ["x"]}))?;
//! unit.send(json!({"x": 1.0}))?;
//! println!("{:?}", out.recv());
//! unit.stop()?;
//! ```

pub mod bridge;
pub mod broadcast;
pub mod executor;
pub mod id;
pub mod kind;
pub mod node;
pub mod port;
pub mod rule;
pub mod sampler;
pub mod transforms;

pub use bridge::{UnitBuilder, UnitHandle, UnitReport, MAILBOX_CAPACITY, REPORT_CAPACITY};
pub use broadcast::{Broadcaster, OverflowPolicy, Publish, Subscription};
pub use executor::{Lifecycle, Mailboxes, Unit, UnitEvent, UnitStats};
pub use id::{RuleVersion, SubscriberId};
pub use kind::UnitKind;
pub use node::{AnyTransform, BuiltinTransform, TransformPlugin};
pub use port::{PortDescriptor, PortDirection, PortKind};
pub use sampler::{seeded_source, SampleSequence, UniformSource};
pub use transforms::{classify, sigmoid, LogisticModel, Toggle};
