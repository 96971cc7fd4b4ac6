//! Unit kinds.
//!
//! The kind string identifies a unit's transform strategy and never
//! changes after the unit is created.

use crate::error::UnitError;
use crate::unit::port::{PortDescriptor, PortKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

static LOGISTIC_PORTS: &[PortDescriptor] = &[
    PortDescriptor::input("rule", PortKind::Rule),
    PortDescriptor::input("rule", PortKind::Query),
    PortDescriptor::input("in", PortKind::Data),
    PortDescriptor::input("quit", PortKind::Quit),
    PortDescriptor::output("out", PortKind::Broadcast),
];

static TOGGLE_PORTS: &[PortDescriptor] = &[
    PortDescriptor::input("in", PortKind::Data),
    PortDescriptor::input("quit", PortKind::Quit),
    PortDescriptor::output("out", PortKind::Broadcast),
];

/// Built-in unit kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitKind {
    LogisticModel,
    Toggle,
}

impl UnitKind {
    pub fn all() -> &'static [UnitKind] {
        &[UnitKind::LogisticModel, UnitKind::Toggle]
    }

    pub fn name(&self) -> &'static str {
        match self {
            UnitKind::LogisticModel => "LogisticModel",
            UnitKind::Toggle => "Toggle",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            UnitKind::LogisticModel => {
                "returns 1 or 0 depending on the model parameters and feature values"
            }
            UnitKind::Toggle => "emits a 'state' boolean value, toggling true/false on each hit",
        }
    }

    pub fn ports(&self) -> &'static [PortDescriptor] {
        match self {
            UnitKind::LogisticModel => LOGISTIC_PORTS,
            UnitKind::Toggle => TOGGLE_PORTS,
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for UnitKind {
    type Err = UnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UnitKind::all()
            .iter()
            .copied()
            .find(|k| k.name() == s)
            .ok_or_else(|| UnitError::UnknownKind(s.to_string()))
    }
}
