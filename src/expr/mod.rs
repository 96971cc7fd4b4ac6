//! Feature path expressions
//!
//! A feature path names where to read a scalar from an arbitrary structured
//! message. Paths are compiled once into an [`EvaluationTree`] and evaluated
//! against every input message.
//!
//! ## Syntax
//!
//! Paths are Rhai expressions. Every top-level field of the input mapping is
//! bound as a constant, so plain field access reads naturally:
//!
//! - `x` - top-level field `x`
//! - `a.b` - field `b` of mapping `a`
//! - `readings[2]` - third element of sequence `readings`
//! - `a["odd-key"]` - nested keys that are not identifiers
//! - `.["user-id"]` - top-level keys that are not identifiers
//! - `x * 2.0 + y` - arithmetic over fields
//!
//! A single leading `.` is accepted (`.a.b` is `a.b`), and `.` alone
//! evaluates to the whole message. A top-level field named `_root` is not
//! bound, since `.[...]` paths index the message through that name.
//!
//! Missing fields, missing properties and out-of-range indexes are
//! evaluation errors, never a silent `null`.

mod engine;

pub use engine::{Bindings, PathEngine};

use rhai::AST;
use std::collections::HashMap;

/// What a compiled path evaluates.
#[derive(Clone)]
pub(crate) enum TreeRoot {
    /// The whole message (`.`).
    Message,
    /// A compiled expression over the message's top-level fields.
    /// `indexes_root` is set when it reads the whole message through
    /// [`ROOT_BINDING`].
    Expr { ast: AST, indexes_root: bool },
}

/// Name the whole message is bound under for `.[...]` paths.
pub(crate) const ROOT_BINDING: &str = "_root";

/// The compiled, reusable form of a feature path.
#[derive(Clone)]
pub struct EvaluationTree {
    source: String,
    pub(crate) root: TreeRoot,
}

impl EvaluationTree {
    /// The path string this tree was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl std::fmt::Debug for EvaluationTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluationTree")
            .field("source", &self.source)
            .finish()
    }
}

/// Cache of compiled trees keyed by path source.
#[derive(Default)]
pub struct PathCache {
    trees: HashMap<String, EvaluationTree>,
}

impl PathCache {
    /// Create a new empty cache
    pub fn new() -> Self {
        Self {
            trees: HashMap::new(),
        }
    }

    pub fn get(&self, source: &str) -> Option<&EvaluationTree> {
        self.trees.get(source)
    }

    pub fn insert(&mut self, tree: EvaluationTree) {
        self.trees.insert(tree.source.clone(), tree);
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    /// Drop every tree whose source is not in `keep`.
    pub fn retain(&mut self, keep: &[String]) {
        self.trees.retain(|source, _| keep.iter().any(|k| k == source));
    }
}

/// Returns true if `name` can be bound as a Rhai variable.
pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
