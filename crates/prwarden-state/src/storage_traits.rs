//! Storage trait definitions for prwarden
//!
//! These traits define the persistence contract the rule engine relies on:
//! - `RuleStore`: compiled rules per repository (replaced atomically)
//! - `ActionResultStore`: per-(action, commit) execution outcomes
//! - `CheckRunStore`: last synced external check state per (rule, pull request)
//! - `CommitGraphStore`: commit ancestry DAG per repository
//! - `BranchStore`: branch heads per repository
//!
//! All traits are async and backend-agnostic. In-memory fakes are provided
//! via the `fakes` module; `surreal_store` provides the SurrealDB backend.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Repository identifier (`owner/name`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepositoryId(pub String);

impl RepositoryId {
    pub fn new(full_name: impl Into<String>) -> Self {
        RepositoryId(full_name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a compiled rule
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(pub String);

impl RuleId {
    /// Generate a new random RuleId
    pub fn new() -> Self {
        RuleId(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for RuleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a compiled action
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(pub String);

impl ActionId {
    /// Generate a new random ActionId
    pub fn new() -> Self {
        ActionId(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for ActionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ActionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Result status
// ---------------------------------------------------------------------------

/// Outcome of an action, and the status reported on a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Pending,
    Success,
    Failure,
    Error,
}

impl ResultStatus {
    pub fn is_success(self) -> bool {
        self == ResultStatus::Success
    }

    /// `failure` and `error` both stop an action chain.
    pub fn is_failure(self) -> bool {
        matches!(self, ResultStatus::Failure | ResultStatus::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResultStatus::Pending => "pending",
            ResultStatus::Success => "success",
            ResultStatus::Failure => "failure",
            ResultStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RuleStore
// ---------------------------------------------------------------------------

/// A condition owned by a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionRecord {
    /// Raw expression text
    pub expression: String,
    pub description: Option<String>,
    pub order: u32,
    /// True when injected from an action's preconditions
    pub implied: bool,
}

/// A trigger key owned by a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerRecord {
    pub key: String,
    pub description: String,
}

/// An action owned by a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub action_id: ActionId,
    /// Action type key
    pub key: String,
    pub parameters: BTreeMap<String, serde_json::Value>,
    pub description: Option<String>,
    pub order: u32,
}

impl ActionRecord {
    /// Fetch a string parameter by name.
    pub fn parameter_str(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).and_then(|v| v.as_str())
    }
}

/// A compiled rule together with its conditions, triggers and actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleRecord {
    pub rule_id: RuleId,
    pub repository: RepositoryId,
    pub title: String,
    /// Key of the rule's external check, unique per repository
    pub check_key: String,
    pub description: Option<String>,
    /// Ordinal within the repository's rule document
    pub order: u32,
    pub conditions: Vec<ConditionRecord>,
    pub triggers: Vec<TriggerRecord>,
    pub actions: Vec<ActionRecord>,
    pub created_at: DateTime<Utc>,
}

impl RuleRecord {
    pub fn has_trigger(&self, key: &str) -> bool {
        self.triggers.iter().any(|t| t.key == key)
    }

    pub fn action_ids(&self) -> Vec<ActionId> {
        self.actions.iter().map(|a| a.action_id.clone()).collect()
    }
}

/// Check the invariants every backend enforces before replacing rules.
///
/// - every rule belongs to `repository`
/// - rule orders and check keys are unique
/// - trigger keys are unique per rule
pub fn validate_rules(repository: &RepositoryId, rules: &[RuleRecord]) -> StorageResult<()> {
    let mut orders = HashSet::new();
    let mut check_keys = HashSet::new();
    for rule in rules {
        if &rule.repository != repository {
            return Err(StorageError::Invalid(format!(
                "rule '{}' belongs to {}, not {}",
                rule.title, rule.repository, repository
            )));
        }
        if !orders.insert(rule.order) {
            return Err(StorageError::Invalid(format!(
                "duplicate rule order {} in {}",
                rule.order, repository
            )));
        }
        if !check_keys.insert(rule.check_key.as_str()) {
            return Err(StorageError::Invalid(format!(
                "duplicate check key '{}' in {}",
                rule.check_key, repository
            )));
        }
        let mut keys = HashSet::new();
        for trigger in &rule.triggers {
            if !keys.insert(trigger.key.as_str()) {
                return Err(StorageError::Invalid(format!(
                    "duplicate trigger '{}' on rule '{}'",
                    trigger.key, rule.title
                )));
            }
        }
    }
    Ok(())
}

/// Compiled rule persistence.
///
/// Guarantees:
/// - `replace_rules` is atomic: readers see either the old or the new set.
/// - `list_rules` returns rules ordered by `order`.
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Delete every rule of the repository and store `rules` in their place.
    async fn replace_rules(
        &self,
        repository: &RepositoryId,
        rules: Vec<RuleRecord>,
    ) -> StorageResult<()>;

    /// All rules of the repository, ordered by ordinal.
    async fn list_rules(&self, repository: &RepositoryId) -> StorageResult<Vec<RuleRecord>>;

    /// Rules whose trigger set contains `trigger`, ordered by ordinal.
    async fn rules_for_trigger(
        &self,
        repository: &RepositoryId,
        trigger: &str,
    ) -> StorageResult<Vec<RuleRecord>> {
        let rules = self.list_rules(repository).await?;
        Ok(rules.into_iter().filter(|r| r.has_trigger(trigger)).collect())
    }
}

// ---------------------------------------------------------------------------
// ActionResultStore
// ---------------------------------------------------------------------------

/// Execution outcome of one action against one commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResultRecord {
    pub action_id: ActionId,
    pub sha: String,
    pub status: ResultStatus,
    pub message: String,
    pub updated_at: DateTime<Utc>,
}

impl ActionResultRecord {
    pub fn new(
        action_id: ActionId,
        sha: impl Into<String>,
        status: ResultStatus,
        message: impl Into<String>,
    ) -> Self {
        Self {
            action_id,
            sha: sha.into(),
            status,
            message: message.into(),
            updated_at: Utc::now(),
        }
    }

    /// True when status and message match (timestamps are ignored).
    pub fn same_outcome(&self, other: &ActionResultRecord) -> bool {
        self.status == other.status && self.message == other.message
    }
}

/// Per-(action, commit) result persistence.
///
/// Guarantees:
/// - At most one result per (action_id, sha).
/// - `upsert_action_result` writes only when status or message changed and
///   reports whether it wrote.
#[async_trait]
pub trait ActionResultStore: Send + Sync {
    async fn upsert_action_result(&self, result: ActionResultRecord) -> StorageResult<bool>;

    async fn get_action_result(
        &self,
        action_id: &ActionId,
        sha: &str,
    ) -> StorageResult<Option<ActionResultRecord>>;

    /// Results for the given actions at `sha`, in the order of `action_ids`.
    /// Actions with no result are omitted.
    async fn action_results_for(
        &self,
        action_ids: &[ActionId],
        sha: &str,
    ) -> StorageResult<Vec<ActionResultRecord>> {
        let mut out = Vec::with_capacity(action_ids.len());
        for id in action_ids {
            if let Some(result) = self.get_action_result(id, sha).await? {
                out.push(result);
            }
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// CheckRunStore
// ---------------------------------------------------------------------------

/// Last synced state of an external check for (rule, pull request).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRunRecord {
    pub repository: RepositoryId,
    pub pull_request: u64,
    /// Stable key derived from the rule title
    pub check_key: String,
    /// Identifier returned by the SCM when the check was created
    pub remote_id: String,
    pub status: ResultStatus,
    pub head_sha: String,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait CheckRunStore: Send + Sync {
    async fn get_check_run(
        &self,
        repository: &RepositoryId,
        pull_request: u64,
        check_key: &str,
    ) -> StorageResult<Option<CheckRunRecord>>;

    /// Insert or overwrite the record keyed by (repository, pull_request, check_key).
    async fn save_check_run(&self, record: CheckRunRecord) -> StorageResult<()>;
}

// ---------------------------------------------------------------------------
// CommitGraphStore
// ---------------------------------------------------------------------------

/// A commit node. Placeholders carry no metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub repository: RepositoryId,
    pub sha: String,
    pub message: Option<String>,
    pub author: Option<String>,
    pub committer: Option<String>,
    pub pull_request: Option<u64>,
}

impl CommitRecord {
    pub fn placeholder(repository: &RepositoryId, sha: impl Into<String>) -> Self {
        Self {
            repository: repository.clone(),
            sha: sha.into(),
            message: None,
            author: None,
            committer: None,
            pull_request: None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.message.is_none() && self.author.is_none() && self.committer.is_none()
    }
}

/// A (child, parent) edge.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CommitEdge {
    pub repository: RepositoryId,
    pub child: String,
    pub parent: String,
}

/// A commit as reported by the SCM.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IncomingCommit {
    pub sha: String,
    pub message: Option<String>,
    pub author: Option<String>,
    pub committer: Option<String>,
    #[serde(default)]
    pub parents: Vec<String>,
}

/// A batch of commits ingested together, optionally tied to a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommitBatch {
    pub commits: Vec<IncomingCommit>,
    pub pull_request: Option<u64>,
}

/// Commit ancestry persistence.
///
/// Guarantees:
/// - (repository, sha) nodes and (repository, child, parent) edges are unique.
/// - `ingest_commits` is atomic per batch and idempotent.
#[async_trait]
pub trait CommitGraphStore: Send + Sync {
    /// Ingest a batch, returning the shas that gained a node or an edge.
    async fn ingest_commits(
        &self,
        repository: &RepositoryId,
        batch: CommitBatch,
    ) -> StorageResult<BTreeSet<String>>;

    async fn get_commit(
        &self,
        repository: &RepositoryId,
        sha: &str,
    ) -> StorageResult<Option<CommitRecord>>;

    /// Edges whose child is one of `children`.
    async fn parent_edges(
        &self,
        repository: &RepositoryId,
        children: &[String],
    ) -> StorageResult<Vec<CommitEdge>>;

    /// Shas of commits linked to the pull request.
    async fn pull_request_commits(
        &self,
        repository: &RepositoryId,
        pull_request: u64,
    ) -> StorageResult<Vec<String>>;
}

// ---------------------------------------------------------------------------
// BranchStore
// ---------------------------------------------------------------------------

/// Current head of a branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRecord {
    pub repository: RepositoryId,
    pub name: String,
    pub head_sha: String,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait BranchStore: Send + Sync {
    async fn get_branch(
        &self,
        repository: &RepositoryId,
        name: &str,
    ) -> StorageResult<Option<BranchRecord>>;

    /// Compare-then-write the head sha; returns true when it changed.
    async fn update_branch_head(
        &self,
        repository: &RepositoryId,
        name: &str,
        head_sha: &str,
    ) -> StorageResult<bool>;
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Everything the engine needs from persistence.
pub trait Store:
    RuleStore + ActionResultStore + CheckRunStore + CommitGraphStore + BranchStore
{
}

impl<T> Store for T where
    T: RuleStore + ActionResultStore + CheckRunStore + CommitGraphStore + BranchStore
{
}
