//! LogisticModel: a stochastic logistic classifier.
//!
//! For rule `Weights = [b1..bn]`, `FeaturePaths = [p1..pn]` each input is
//! scored as `mu = sum(bi * xi)` where `xi` is path `pi` evaluated against
//! the input. With `p = sigmoid(mu)` and one uniform draw `u`, the unit
//! emits `{ "Response": 1 }` if `u <= p`, otherwise `{ "Response": 0 }`.
//!
//! ## Failure modes
//!
//! - A path that does not resolve aborts the message with an
//!   `Evaluation` error.
//! - A resolved value that is not a number aborts the message with a
//!   `Type` error.
//!
//! Neither produces output nor changes the rule.

use crate::error::{Result, UnitError};
use crate::expr::{EvaluationTree, PathEngine};
use crate::unit::kind::UnitKind;
use crate::unit::port::PortDescriptor;
use crate::unit::rule::{type_name, LogisticRule};
use crate::unit::sampler::{seeded_source, UniformSource};
use serde_json::{json, Value};

/// The logistic function `1 / (1 + e^-x)`.
#[inline]
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Bernoulli draw against `sigmoid(mu)`. Inclusive on purpose: `u <= p`.
#[inline]
pub fn classify(mu: f64, u: f64) -> u8 {
    if u <= sigmoid(mu) {
        1
    } else {
        0
    }
}

/// Logistic classifier state: the applied rule, its compiled paths and the
/// unit's own sample source.
pub struct LogisticModel {
    rule: LogisticRule,
    /// Invariant: `trees.len() == rule.len()`.
    trees: Vec<EvaluationTree>,
    engine: PathEngine,
    sampler: Box<dyn UniformSource>,
}

impl LogisticModel {
    pub fn new(sampler: Box<dyn UniformSource>) -> Self {
        Self {
            rule: LogisticRule::default(),
            trees: Vec::new(),
            engine: PathEngine::new(),
            sampler,
        }
    }

    /// Model drawing from a seeded generator (entropy-seeded if `None`).
    pub fn with_seed(seed: Option<u64>) -> Self {
        Self::new(seeded_source(seed))
    }

    pub fn name(&self) -> &str {
        UnitKind::LogisticModel.name()
    }

    pub fn ports(&self) -> &[PortDescriptor] {
        UnitKind::LogisticModel.ports()
    }

    /// Parse and compile `payload`, replacing the current rule only if
    /// every step succeeds. Only the current rule's paths stay cached.
    pub fn apply_rule(&mut self, payload: &Value) -> Result<()> {
        let rule = LogisticRule::from_payload(payload)?;
        let compiled = rule
            .feature_paths
            .iter()
            .map(|path| self.engine.compile(path))
            .collect::<Result<Vec<_>>>();

        let trees = match compiled {
            Ok(trees) => trees,
            Err(e) => {
                self.engine.retain_paths(&self.rule.feature_paths);
                return Err(e);
            }
        };

        self.rule = rule;
        self.trees = trees;
        self.engine.retain_paths(&self.rule.feature_paths);
        Ok(())
    }

    /// The current rule in query reply shape.
    pub fn rule(&self) -> Value {
        self.rule.to_value()
    }

    pub fn feature_count(&self) -> usize {
        self.trees.len()
    }

    /// Evaluate every feature path against `msg`.
    pub fn extract_features(&self, msg: &Value) -> Result<Vec<f64>> {
        let mut bindings = self.engine.bind(msg);
        self.trees
            .iter()
            .map(|tree| {
                let value = self.engine.evaluate_bound(tree, &mut bindings)?;
                value.as_f64().ok_or_else(|| UnitError::Type {
                    path: tree.source().to_string(),
                    found: type_name(&value).to_string(),
                })
            })
            .collect()
    }

    /// Linear score `sum(bi * xi)`.
    pub fn score(&self, features: &[f64]) -> f64 {
        self.rule
            .weights
            .iter()
            .zip(features)
            .map(|(b, x)| b * x)
            .sum()
    }

    pub fn on_data(&mut self, msg: &Value) -> Result<Option<Value>> {
        let features = self.extract_features(msg)?;
        let mu = self.score(&features);
        let u = self.sampler.next_uniform();
        let response = classify(mu, u);

        tracing::trace!("LogisticModel: mu={:.4} u={:.4} -> {}", mu, u, response);
        Ok(Some(json!({ "Response": response })))
    }
}
