//! Rhai-backed path engine
//!
//! Compiles feature paths into evaluation trees and evaluates them against
//! JSON messages. The engine is sandboxed: paths are expressions only (no
//! statements, no assignment) and run under operation and size limits.

use crate::error::{Result, UnitError};
use crate::expr::{is_identifier, EvaluationTree, PathCache, TreeRoot, ROOT_BINDING};
use rhai::{Dynamic, Engine, Scope};
use serde_json::Value;

/// A message with its top-level fields bound for evaluation.
///
/// Binding converts the message once so that several trees can be
/// evaluated against it without repeating the conversion.
pub struct Bindings<'a> {
    message: &'a Value,
    scope: Scope<'static>,
    root_bound: bool,
}

impl<'a> Bindings<'a> {
    /// Number of bound top-level fields.
    pub fn len(&self) -> usize {
        self.scope.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scope.is_empty()
    }
}

/// Compiles and evaluates feature paths.
pub struct PathEngine {
    engine: Engine,
    cache: PathCache,
}

impl PathEngine {
    /// Create a new path engine with default safety limits
    pub fn new() -> Self {
        let mut engine = Engine::new();
        Self::configure_engine(&mut engine);

        Self {
            engine,
            cache: PathCache::new(),
        }
    }

    fn configure_engine(engine: &mut Engine) {
        engine.set_max_expr_depths(64, 32);
        engine.set_max_call_levels(16);
        engine.set_max_operations(10_000);
        engine.set_max_string_size(10_000);
        engine.set_max_array_size(10_000);
        engine.set_max_map_size(10_000);

        // `a.missing` is an error, not ()
        engine.set_fail_on_invalid_map_property(true);

        // Keep stdout free for output records
        engine.on_print(|text| tracing::trace!("path print: {}", text));
        engine.on_debug(|text, _source, pos| tracing::trace!("path debug at {}: {}", pos, text));
    }

    /// Compile a path into an evaluation tree.
    ///
    /// Compiled trees are cached by source, so recompiling an unchanged
    /// path returns the cached tree.
    pub fn compile(&mut self, path: &str) -> Result<EvaluationTree> {
        if let Some(tree) = self.cache.get(path) {
            return Ok(tree.clone());
        }

        let trimmed = path.trim();
        if trimmed.is_empty() {
            return Err(UnitError::PathCompile {
                path: path.to_string(),
                message: "empty path".to_string(),
            });
        }

        let body = trimmed.strip_prefix('.').unwrap_or(trimmed);
        let root = if body.is_empty() {
            TreeRoot::Message
        } else {
            // `.[key]` indexes the message itself, not an array literal
            let indexes_root = trimmed.starts_with(".[");
            let script = if indexes_root {
                format!("{}{}", ROOT_BINDING, body)
            } else {
                body.to_string()
            };
            let ast = self
                .engine
                .compile_expression(&script)
                .map_err(|e| UnitError::PathCompile {
                    path: path.to_string(),
                    message: e.to_string(),
                })?;
            TreeRoot::Expr { ast, indexes_root }
        };

        let tree = EvaluationTree {
            source: path.to_string(),
            root,
        };
        self.cache.insert(tree.clone());
        tracing::trace!("Compiled feature path '{}'", path);
        Ok(tree)
    }

    /// Bind the top-level fields of `message` for evaluation.
    ///
    /// Fields whose names are not identifiers stay reachable only through
    /// the whole-message path.
    pub fn bind<'a>(&self, message: &'a Value) -> Bindings<'a> {
        let mut scope = Scope::new();
        if let Value::Object(fields) = message {
            for (name, value) in fields {
                if !is_identifier(name) || name == ROOT_BINDING {
                    continue;
                }
                match rhai::serde::to_dynamic(value) {
                    Ok(dynamic) => {
                        scope.push_constant_dynamic(name.as_str(), dynamic);
                    }
                    Err(e) => {
                        tracing::trace!("Skipping field '{}': {}", name, e);
                    }
                }
            }
        }
        Bindings {
            message,
            scope,
            root_bound: false,
        }
    }

    /// Evaluate a tree against already bound fields.
    pub fn evaluate_bound(&self, tree: &EvaluationTree, bindings: &mut Bindings) -> Result<Value> {
        match &tree.root {
            TreeRoot::Message => Ok(bindings.message.clone()),
            TreeRoot::Expr { ast, indexes_root } => {
                if *indexes_root && !bindings.root_bound {
                    let root = rhai::serde::to_dynamic(bindings.message).map_err(|e| {
                        UnitError::Evaluation {
                            path: tree.source().to_string(),
                            message: format!("message cannot be bound: {}", e),
                        }
                    })?;
                    bindings.scope.push_constant_dynamic(ROOT_BINDING, root);
                    bindings.root_bound = true;
                }

                let result = self
                    .engine
                    .eval_ast_with_scope::<Dynamic>(&mut bindings.scope, ast)
                    .map_err(|e| UnitError::Evaluation {
                        path: tree.source().to_string(),
                        message: e.to_string(),
                    })?;

                rhai::serde::from_dynamic::<Value>(&result).map_err(|e| UnitError::Evaluation {
                    path: tree.source().to_string(),
                    message: format!("unrepresentable result: {}", e),
                })
            }
        }
    }

    /// Evaluate a tree against a message.
    pub fn evaluate(&self, tree: &EvaluationTree, message: &Value) -> Result<Value> {
        let mut bindings = self.bind(message);
        self.evaluate_bound(tree, &mut bindings)
    }

    /// Number of cached trees.
    pub fn cached_trees(&self) -> usize {
        self.cache.len()
    }

    /// Evict cached trees for paths not in `paths`.
    pub fn retain_paths(&mut self, paths: &[String]) {
        self.cache.retain(paths);
    }
}

impl Default for PathEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_top_level_field() {
        let mut engine = PathEngine::new();
        let tree = engine.compile("x").unwrap();
        let value = engine.evaluate(&tree, &json!({"x": 0.5})).unwrap();
        assert_eq!(value, json!(0.5));
    }

    #[test]
    fn test_nested_and_indexed() {
        let mut engine = PathEngine::new();
        let msg = json!({
            "sensor": {"temp": 21.5, "readings": [1, 2, 3]},
            "odd-key": 4
        });

        let tree = engine.compile("sensor.temp").unwrap();
        assert_eq!(engine.evaluate(&tree, &msg).unwrap(), json!(21.5));

        let tree = engine.compile("sensor.readings[1]").unwrap();
        assert_eq!(engine.evaluate(&tree, &msg).unwrap(), json!(2));

        let tree = engine.compile(".sensor.temp").unwrap();
        assert_eq!(engine.evaluate(&tree, &msg).unwrap(), json!(21.5));
    }

    #[test]
    fn test_whole_message_path() {
        let mut engine = PathEngine::new();
        let tree = engine.compile(".").unwrap();
        let msg = json!({"odd-key": 4});
        assert_eq!(engine.evaluate(&tree, &msg).unwrap(), msg);
    }

    #[test]
    fn test_arithmetic_path() {
        let mut engine = PathEngine::new();
        let tree = engine.compile("x * 2.0 + y").unwrap();
        let value = engine.evaluate(&tree, &json!({"x": 1.5, "y": 1.0})).unwrap();
        assert_eq!(value.as_f64(), Some(4.0));
    }

    #[test]
    fn test_compile_errors() {
        let mut engine = PathEngine::new();
        let err = engine.compile("").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PathCompile);

        let err = engine.compile("a.(b").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PathCompile);
        assert!(err.to_string().contains("a.(b"));

        let err = engine.compile("let y = 1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PathCompile);
    }

    #[test]
    fn test_missing_field_is_evaluation_error() {
        let mut engine = PathEngine::new();
        let msg = json!({"a": {"b": 1}});

        let tree = engine.compile("x").unwrap();
        let err = engine.evaluate(&tree, &msg).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Evaluation);

        let tree = engine.compile("a.missing").unwrap();
        let err = engine.evaluate(&tree, &msg).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Evaluation);
    }

    #[test]
    fn test_out_of_range_index_is_evaluation_error() {
        let mut engine = PathEngine::new();
        let tree = engine.compile("list[5]").unwrap();
        let err = engine.evaluate(&tree, &json!({"list": [1, 2]})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Evaluation);
    }

    #[test]
    fn test_non_numeric_values_pass_through() {
        let mut engine = PathEngine::new();
        let tree = engine.compile("name").unwrap();
        let value = engine.evaluate(&tree, &json!({"name": "probe"})).unwrap();
        assert_eq!(value, json!("probe"));
    }

    #[test]
    fn test_compile_is_cached() {
        let mut engine = PathEngine::new();
        engine.compile("x").unwrap();
        engine.compile("x").unwrap();
        engine.compile("y").unwrap();
        assert_eq!(engine.cached_trees(), 2);
    }

    #[test]
    fn test_top_level_non_identifier_keys() {
        let mut engine = PathEngine::new();
        let msg = json!({"user-id": 3.0, "2fa": {"on": true}, "x": 1.0});

        let tree = engine.compile(r#".["user-id"]"#).unwrap();
        assert_eq!(engine.evaluate(&tree, &msg).unwrap(), json!(3.0));

        let tree = engine.compile(r#".["2fa"].on"#).unwrap();
        assert_eq!(engine.evaluate(&tree, &msg).unwrap(), json!(true));

        let tree = engine.compile(r#".["x"] * 2.0"#).unwrap();
        assert_eq!(engine.evaluate(&tree, &msg).unwrap().as_f64(), Some(2.0));
    }

    #[test]
    fn test_root_binding_is_not_a_field() {
        let mut engine = PathEngine::new();
        let msg = json!({"_root": 1.0, "a": 2.0});
        let bindings = engine.bind(&msg);
        assert_eq!(bindings.len(), 1);

        let tree = engine.compile(r#".["_root"]"#).unwrap();
        assert_eq!(engine.evaluate(&tree, &msg).unwrap(), json!(1.0));
    }

    #[test]
    fn test_print_and_debug_do_not_fail() {
        let mut engine = PathEngine::new();
        let msg = json!({"x": 1.0});
        for path in ["print(x)", "debug(x)"] {
            let tree = engine.compile(path).unwrap();
            assert_eq!(engine.evaluate(&tree, &msg).unwrap(), Value::Null);
        }
    }

    #[test]
    fn test_retain_paths_evicts_others() {
        let mut engine = PathEngine::new();
        engine.compile("a").unwrap();
        engine.compile("b").unwrap();
        engine.compile("c").unwrap();
        engine.retain_paths(&["b".to_string()]);
        assert_eq!(engine.cached_trees(), 1);
    }

    #[test]
    fn test_bindings_reused_across_trees() {
        let mut engine = PathEngine::new();
        let a = engine.compile("a").unwrap();
        let b = engine.compile("b").unwrap();
        let msg = json!({"a": 1.0, "b": 2.0, "not an ident": 3.0});

        let mut bindings = engine.bind(&msg);
        assert_eq!(bindings.len(), 2);
        assert_eq!(engine.evaluate_bound(&a, &mut bindings).unwrap(), json!(1.0));
        assert_eq!(engine.evaluate_bound(&b, &mut bindings).unwrap(), json!(2.0));
    }
}
