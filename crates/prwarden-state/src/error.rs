//! Error types for prwarden-state

use thiserror::Error;

/// Errors raised while connecting to or preparing the database
#[derive(Error, Debug)]
pub enum StateError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// Database query error
    #[error("Database query failed: {0}")]
    Query(String),

    /// Schema setup error
    #[error("Schema setup failed: {0}")]
    SchemaSetup(String),

    /// Missing or malformed configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<surrealdb::Error> for StateError {
    fn from(err: surrealdb::Error) -> Self {
        StateError::Query(err.to_string())
    }
}

/// Errors returned by the storage traits
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend (database) failure
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A multi-statement write could not be committed
    #[error("transaction failed: {0}")]
    Transaction(String),

    /// A row could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A record required by the operation does not exist
    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },

    /// The caller supplied data the store refuses to persist
    #[error("invalid record: {0}")]
    Invalid(String),
}

impl From<surrealdb::Error> for StorageError {
    fn from(err: surrealdb::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl From<StateError> for StorageError {
    fn from(err: StateError) -> Self {
        StorageError::Backend(err.to_string())
    }
}
