//! Rule payload coercion.
//!
//! Rules arrive as untyped JSON objects. These helpers coerce individual
//! fields into the typed parameters a unit needs and fail with a
//! `ConfigParse` error naming the offending field.

use crate::error::{Result, UnitError};
use serde::Serialize;
use serde_json::Value;

fn field<'a>(rule: &'a Value, key: &str) -> Result<&'a [Value]> {
    let object = rule
        .as_object()
        .ok_or_else(|| UnitError::ConfigParse(format!("rule must be an object, found {}", type_name(rule))))?;
    let value = object
        .get(key)
        .ok_or_else(|| UnitError::ConfigParse(format!("missing field '{}'", key)))?;
    value.as_array().map(Vec::as_slice).ok_or_else(|| {
        UnitError::ConfigParse(format!("'{}' must be an array, found {}", key, type_name(value)))
    })
}

/// Read `key` as an ordered sequence of numbers.
pub fn parse_array_float(rule: &Value, key: &str) -> Result<Vec<f64>> {
    field(rule, key)?
        .iter()
        .enumerate()
        .map(|(i, v)| {
            v.as_f64().ok_or_else(|| {
                UnitError::ConfigParse(format!(
                    "'{}'[{}] must be a number, found {}",
                    key,
                    i,
                    type_name(v)
                ))
            })
        })
        .collect()
}

/// Read `key` as an ordered sequence of strings.
pub fn parse_array_string(rule: &Value, key: &str) -> Result<Vec<String>> {
    field(rule, key)?
        .iter()
        .enumerate()
        .map(|(i, v)| {
            v.as_str().map(str::to_string).ok_or_else(|| {
                UnitError::ConfigParse(format!(
                    "'{}'[{}] must be a string, found {}",
                    key,
                    i,
                    type_name(v)
                ))
            })
        })
        .collect()
}

/// JSON type name used in error messages.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Typed rule for the logistic model.
///
/// Serializes to the query reply shape `{ Weights, FeaturePaths }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LogisticRule {
    pub weights: Vec<f64>,
    pub feature_paths: Vec<String>,
}

impl LogisticRule {
    /// Coerce a rule payload. Both fields are required and must have
    /// equal lengths.
    pub fn from_payload(rule: &Value) -> Result<Self> {
        let weights = parse_array_float(rule, "Weights")?;
        let feature_paths = parse_array_string(rule, "FeaturePaths")?;

        if weights.len() != feature_paths.len() {
            return Err(UnitError::ConfigParse(format!(
                "'Weights' has {} entries but 'FeaturePaths' has {}",
                weights.len(),
                feature_paths.len()
            )));
        }

        Ok(Self {
            weights,
            feature_paths,
        })
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// The query reply for this rule.
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "Weights": self.weights,
            "FeaturePaths": self.feature_paths,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_parse_array_float() {
        let rule = json!({"Weights": [1, 2.5, -3]});
        assert_eq!(parse_array_float(&rule, "Weights").unwrap(), vec![1.0, 2.5, -3.0]);

        let empty = json!({"Weights": []});
        assert!(parse_array_float(&empty, "Weights").unwrap().is_empty());
    }

    #[test]
    fn test_parse_array_float_errors() {
        let err = parse_array_float(&json!({}), "Weights").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigParse);
        assert!(err.to_string().contains("missing field 'Weights'"));

        let err = parse_array_float(&json!({"Weights": 1.0}), "Weights").unwrap_err();
        assert!(err.to_string().contains("must be an array"));

        let err = parse_array_float(&json!({"Weights": [1.0, "2"]}), "Weights").unwrap_err();
        assert!(err.to_string().contains("'Weights'[1] must be a number, found string"));

        let err = parse_array_float(&json!([1.0]), "Weights").unwrap_err();
        assert!(err.to_string().contains("rule must be an object"));
    }

    #[test]
    fn test_parse_array_string() {
        let rule = json!({"FeaturePaths": ["x", "a.b"]});
        assert_eq!(
            parse_array_string(&rule, "FeaturePaths").unwrap(),
            vec!["x".to_string(), "a.b".to_string()]
        );

        let err = parse_array_string(&json!({"FeaturePaths": [1]}), "FeaturePaths").unwrap_err();
        assert!(err.to_string().contains("must be a string, found number"));
    }

    #[test]
    fn test_logistic_rule_from_payload() {
        let rule = LogisticRule::from_payload(&json!({
            "Weights": [2.0],
            "FeaturePaths": ["x"]
        }))
        .unwrap();
        assert_eq!(rule.weights, vec![2.0]);
        assert_eq!(rule.feature_paths, vec!["x".to_string()]);
        assert_eq!(rule.len(), 1);
    }

    #[test]
    fn test_logistic_rule_missing_paths() {
        let err = LogisticRule::from_payload(&json!({"Weights": [2.0]})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigParse);
        assert!(err.to_string().contains("FeaturePaths"));
    }

    #[test]
    fn test_logistic_rule_length_mismatch() {
        let err = LogisticRule::from_payload(&json!({
            "Weights": [1.0, 2.0],
            "FeaturePaths": ["x"]
        }))
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigParse);
        assert!(err.to_string().contains("2 entries"));
    }

    #[test]
    fn test_logistic_rule_reply_shape() {
        let rule = LogisticRule {
            weights: vec![0.5],
            feature_paths: vec!["x".into()],
        };
        let value = rule.to_value();
        assert_eq!(value, json!({"Weights": [0.5], "FeaturePaths": ["x"]}));
        assert_eq!(serde_json::to_value(&rule).unwrap(), value);
    }
}
