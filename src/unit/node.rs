//! Transform abstraction for processing units.
//!
//! Two-layer design:
//! - **`TransformPlugin` trait** - for strategies defined outside this crate.
//! - **`BuiltinTransform` enum** - for the built-in strategies, dispatched
//!   by match on the hot path.
//!
//! `AnyTransform` wraps either variant so the unit core handles both uniformly.

use crate::error::{Result, UnitError};
use crate::unit::kind::UnitKind;
use crate::unit::port::{has_input, PortDescriptor, PortKind};
use crate::unit::sampler::UniformSource;
use crate::unit::transforms::{LogisticModel, Toggle};
use serde_json::Value;

/// Trait for pluggable/user-defined transform strategies.
pub trait TransformPlugin: Send {
    /// Kind name of this strategy.
    fn name(&self) -> &str;

    /// Route descriptors for this strategy.
    fn ports(&self) -> &[PortDescriptor];

    /// Replace the rule wholesale. Must leave the previous rule untouched
    /// on error.
    fn apply_rule(&mut self, _rule: &Value) -> Result<()> {
        Err(UnitError::UnsupportedRoute {
            kind: self.name().to_string(),
            route: "rule".to_string(),
        })
    }

    /// Snapshot of the applied rule, if this strategy has one.
    fn rule(&self) -> Option<Value> {
        None
    }

    /// Transform one input. `Ok(None)` means no output for this input.
    fn on_data(&mut self, msg: &Value) -> Result<Option<Value>>;
}

/// Enum dispatch for built-in strategies.
pub enum BuiltinTransform {
    LogisticModel(LogisticModel),
    Toggle(Toggle),
}

impl BuiltinTransform {
    pub fn name(&self) -> &str {
        match self {
            BuiltinTransform::LogisticModel(t) => t.name(),
            BuiltinTransform::Toggle(t) => t.name(),
        }
    }

    pub fn ports(&self) -> &[PortDescriptor] {
        match self {
            BuiltinTransform::LogisticModel(t) => t.ports(),
            BuiltinTransform::Toggle(t) => t.ports(),
        }
    }

    pub fn apply_rule(&mut self, rule: &Value) -> Result<()> {
        match self {
            BuiltinTransform::LogisticModel(t) => t.apply_rule(rule),
            BuiltinTransform::Toggle(t) => Err(UnitError::UnsupportedRoute {
                kind: t.name().to_string(),
                route: "rule".to_string(),
            }),
        }
    }

    pub fn rule(&self) -> Option<Value> {
        match self {
            BuiltinTransform::LogisticModel(t) => Some(t.rule()),
            BuiltinTransform::Toggle(_) => None,
        }
    }

    pub fn on_data(&mut self, msg: &Value) -> Result<Option<Value>> {
        match self {
            BuiltinTransform::LogisticModel(t) => t.on_data(msg),
            BuiltinTransform::Toggle(t) => t.on_data(msg),
        }
    }
}

/// Wrapper that holds either a built-in strategy (enum dispatch) or a plugin (trait object).
pub enum AnyTransform {
    Builtin(BuiltinTransform),
    Plugin(Box<dyn TransformPlugin>),
}

impl AnyTransform {
    /// Built-in strategy for `kind`. Only stochastic kinds use `sampler`.
    pub fn for_kind(kind: UnitKind, sampler: Box<dyn UniformSource>) -> Self {
        match kind {
            UnitKind::LogisticModel => {
                AnyTransform::Builtin(BuiltinTransform::LogisticModel(LogisticModel::new(sampler)))
            }
            UnitKind::Toggle => AnyTransform::Builtin(BuiltinTransform::Toggle(Toggle::new())),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            AnyTransform::Builtin(t) => t.name(),
            AnyTransform::Plugin(t) => t.name(),
        }
    }

    pub fn ports(&self) -> &[PortDescriptor] {
        match self {
            AnyTransform::Builtin(t) => t.ports(),
            AnyTransform::Plugin(t) => t.ports(),
        }
    }

    /// Whether this strategy consumes rules. Strategies that do stay
    /// quiescent until their first rule is applied.
    pub fn accepts_rule(&self) -> bool {
        has_input(self.ports(), PortKind::Rule)
    }

    pub fn apply_rule(&mut self, rule: &Value) -> Result<()> {
        match self {
            AnyTransform::Builtin(t) => t.apply_rule(rule),
            AnyTransform::Plugin(t) => t.apply_rule(rule),
        }
    }

    pub fn rule(&self) -> Option<Value> {
        match self {
            AnyTransform::Builtin(t) => t.rule(),
            AnyTransform::Plugin(t) => t.rule(),
        }
    }

    pub fn on_data(&mut self, msg: &Value) -> Result<Option<Value>> {
        match self {
            AnyTransform::Builtin(t) => t.on_data(msg),
            AnyTransform::Plugin(t) => t.on_data(msg),
        }
    }
}
