//! Toggle: flips a private boolean on every input.
//!
//! Consumes no rule and cannot fail: every input, whatever its content,
//! produces `{ "state": <bool> }`. The state starts `false`, so the first
//! output is `true`.

use crate::error::Result;
use crate::unit::kind::UnitKind;
use crate::unit::port::PortDescriptor;
use serde_json::{json, Value};

/// Toggle unit state.
#[derive(Debug, Default)]
pub struct Toggle {
    state: bool,
}

impl Toggle {
    pub fn new() -> Self {
        Self { state: false }
    }

    pub fn name(&self) -> &str {
        UnitKind::Toggle.name()
    }

    pub fn ports(&self) -> &[PortDescriptor] {
        UnitKind::Toggle.ports()
    }

    pub fn on_data(&mut self, _msg: &Value) -> Result<Option<Value>> {
        self.state = !self.state;
        Ok(Some(json!({ "state": self.state })))
    }
}
