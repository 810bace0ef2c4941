//! Error taxonomy for the prwarden rule engine.

use prwarden_state::StorageError;

use crate::scm::ScmError;

/// Errors raised while building an expression.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExpressionError {
    #[error("parse error at column {column}: {message}")]
    Parse { column: usize, message: String },

    #[error("unknown variable: {key}")]
    UnknownVariable { key: String },
}

/// Errors raised while evaluating a parsed expression.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvaluationError {
    #[error("operator '{op}' cannot compare {left} with {right}")]
    UnsupportedComparison {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },

    #[error("unknown variable: {key}")]
    UnknownVariable { key: String },
}

/// Errors that reject a whole rule document.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("rule document is not valid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("rule document must be a mapping with a 'rules' list")]
    Shape,
}

/// Engine-level errors.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("scm error: {0}")]
    Scm(#[from] ScmError),

    #[error("rules file not found: {path}")]
    RulesFileMissing { path: String },

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
