//! prwarden-state: persistence for the prwarden rule engine
//!
//! This crate owns every persisted entity of the engine and the async
//! storage traits the engine consumes.
//!
//! ## Key Components
//!
//! - `storage_traits`: records plus `RuleStore`, `ActionResultStore`,
//!   `CheckRunStore`, `CommitGraphStore`, `BranchStore` and the `Store` bundle
//! - `fakes::MemoryStore`: in-memory implementation for tests and dry runs
//! - `SurrealStore`: SurrealDB implementation (`mem://`, `surrealkv://`, remote)
//! - `commit_graph::IngestPlan`: placeholder/edge planning shared by both backends

pub mod commit_graph;
mod error;
pub mod fakes;
mod handle;
mod migrations;
mod schema;
pub mod storage_traits;
pub mod surreal_store;

pub use commit_graph::IngestPlan;
pub use error::{StateError, StorageError};
pub use fakes::MemoryStore;
pub use handle::{Credentials, DbConfig};
pub use storage_traits::{
    validate_rules, ActionId, ActionRecord, ActionResultRecord, ActionResultStore, BranchRecord,
    BranchStore, CheckRunRecord, CheckRunStore, CommitBatch, CommitEdge, CommitGraphStore,
    CommitRecord, ConditionRecord, IncomingCommit, RepositoryId, ResultStatus, RuleId,
    RuleRecord, RuleStore, StorageResult, Store, TriggerRecord,
};
pub use surreal_store::SurrealStore;

/// Result type for prwarden-state setup operations
pub type Result<T> = std::result::Result<T, StateError>;
