//! Error handling for streamblocks
//!
//! This module defines the error taxonomy shared by every processing unit
//! and a Result alias for use throughout the crate.
//!
//! The first four variants are the recoverable per-message / per-update
//! failures a unit reports to its host. None of them ever stops a unit.

use thiserror::Error;

/// Main error type for streamblocks operations
#[derive(Error, Debug)]
pub enum UnitError {
    /// A rule payload field is missing or has the wrong type
    #[error("Config parse error: {0}")]
    ConfigParse(String),

    /// A feature path failed to compile into an evaluation tree
    #[error("Path compile error in '{path}': {message}")]
    PathCompile { path: String, message: String },

    /// A compiled path failed to resolve against an input message
    #[error("Evaluation error in '{path}': {message}")]
    Evaluation { path: String, message: String },

    /// A resolved feature value is not numeric
    #[error("Type error in '{path}': features must be numbers, found {found}")]
    Type { path: String, found: String },

    /// The unit kind does not have the addressed route
    #[error("Unsupported route '{route}' for unit kind {kind}")]
    UnsupportedRoute { kind: String, route: String },

    /// Unknown unit kind string
    #[error("Unknown unit kind: {0}")]
    UnknownKind(String),

    /// No unit registered under this name
    #[error("Unknown unit: {0}")]
    UnknownUnit(String),

    /// Errors related to channel communication
    #[error("Channel error: {0}")]
    Channel(String),

    /// Timeout errors
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<UnitError>,
    },
}

/// Coarse failure kind, for hosts that branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ConfigParse,
    PathCompile,
    Evaluation,
    Type,
    Host,
}

impl UnitError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        UnitError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Classify this error. Context wrappers report the kind of their source.
    pub fn kind(&self) -> ErrorKind {
        match self {
            UnitError::ConfigParse(_) => ErrorKind::ConfigParse,
            UnitError::PathCompile { .. } => ErrorKind::PathCompile,
            UnitError::Evaluation { .. } => ErrorKind::Evaluation,
            UnitError::Type { .. } => ErrorKind::Type,
            UnitError::WithContext { source, .. } => source.kind(),
            _ => ErrorKind::Host,
        }
    }
}

impl From<serde_json::Error> for UnitError {
    fn from(err: serde_json::Error) -> Self {
        UnitError::Serialization(err.to_string())
    }
}

/// Result type alias for streamblocks operations
pub type Result<T> = std::result::Result<T, UnitError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
