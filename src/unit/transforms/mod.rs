//! Built-in transform strategies.

pub mod logistic;
pub mod toggle;

pub use logistic::{classify, sigmoid, LogisticModel};
pub use toggle::Toggle;
