//! Test data builders for rule payloads and units

use serde_json::{json, Value};
use streamblocks::unit::{SampleSequence, UnitBuilder, UnitHandle, UnitKind};

/// Builder for logistic rule payloads
#[derive(Default)]
pub struct RuleBuilder {
    weights: Vec<f64>,
    paths: Vec<String>,
}

impl RuleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feature(mut self, path: &str, weight: f64) -> Self {
        self.paths.push(path.to_string());
        self.weights.push(weight);
        self
    }

    pub fn build(self) -> Value {
        json!({ "Weights": self.weights, "FeaturePaths": self.paths })
    }
}

/// Spawn a logistic unit whose samples cycle through `samples`
pub fn logistic_unit(name: &str, samples: Vec<f64>) -> UnitHandle {
    UnitBuilder::new(UnitKind::LogisticModel)
        .name(name)
        .sampler(Box::new(SampleSequence::new(samples)))
        .spawn()
        .expect("spawn logistic unit")
}

/// Spawn a toggle unit
pub fn toggle_unit(name: &str) -> UnitHandle {
    UnitBuilder::new(UnitKind::Toggle)
        .name(name)
        .spawn()
        .expect("spawn toggle unit")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_builder() {
        let rule = RuleBuilder::new().feature("x", 2.0).feature("a.b", -1.0).build();
        assert_eq!(
            rule,
            json!({"Weights": [2.0, -1.0], "FeaturePaths": ["x", "a.b"]})
        );
    }
}
