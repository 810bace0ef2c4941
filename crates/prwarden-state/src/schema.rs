//! SurrealDB row types
//!
//! Rows mirror the records in `storage_traits` and convert to and from them
//! at the backend boundary. Datetimes are stored as native SurrealDB
//! datetimes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::sql::Thing;

use crate::storage_traits::{
    ActionId, ActionRecord, ActionResultRecord, BranchRecord, CheckRunRecord, CommitEdge,
    CommitRecord, ConditionRecord, RepositoryId, ResultStatus, RuleId, RuleRecord, TriggerRecord,
};

/// Module for serializing chrono DateTime to SurrealDB datetime format
mod surreal_datetime {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let sd = SurrealDatetime::from(*date);
        serde::Serialize::serialize(&sd, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = SurrealDatetime::deserialize(deserializer)?;
        Ok(DateTime::from(sd))
    }
}

/// Rule row (`rules` table). Conditions, triggers and actions are embedded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Thing>,
    pub rule_id: String,
    pub repository: String,
    pub title: String,
    pub check_key: String,
    pub description: Option<String>,
    pub ordinal: u32,
    pub conditions: Vec<ConditionRecord>,
    pub triggers: Vec<TriggerRecord>,
    /// Flattened trigger keys for `CONTAINS` lookups
    pub trigger_keys: Vec<String>,
    pub actions: Vec<ActionRecord>,
    #[serde(with = "surreal_datetime")]
    pub created_at: DateTime<Utc>,
}

impl From<RuleRecord> for DbRule {
    fn from(rule: RuleRecord) -> Self {
        Self {
            id: None,
            rule_id: rule.rule_id.0,
            repository: rule.repository.0,
            title: rule.title,
            check_key: rule.check_key,
            description: rule.description,
            ordinal: rule.order,
            trigger_keys: rule.triggers.iter().map(|t| t.key.clone()).collect(),
            conditions: rule.conditions,
            triggers: rule.triggers,
            actions: rule.actions,
            created_at: rule.created_at,
        }
    }
}

impl From<DbRule> for RuleRecord {
    fn from(row: DbRule) -> Self {
        Self {
            rule_id: RuleId(row.rule_id),
            repository: RepositoryId(row.repository),
            title: row.title,
            check_key: row.check_key,
            description: row.description,
            order: row.ordinal,
            conditions: row.conditions,
            triggers: row.triggers,
            actions: row.actions,
            created_at: row.created_at,
        }
    }
}

/// Action result row (`action_results` table), keyed by `[action_id, sha]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbActionResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Thing>,
    pub action_id: String,
    pub sha: String,
    pub status: ResultStatus,
    pub message: String,
    #[serde(with = "surreal_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl From<ActionResultRecord> for DbActionResult {
    fn from(r: ActionResultRecord) -> Self {
        Self {
            id: None,
            action_id: r.action_id.0,
            sha: r.sha,
            status: r.status,
            message: r.message,
            updated_at: r.updated_at,
        }
    }
}

impl From<DbActionResult> for ActionResultRecord {
    fn from(row: DbActionResult) -> Self {
        Self {
            action_id: ActionId(row.action_id),
            sha: row.sha,
            status: row.status,
            message: row.message,
            updated_at: row.updated_at,
        }
    }
}

/// Check run row (`check_runs` table), keyed by `[repository, pull_request, check_key]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbCheckRun {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Thing>,
    pub repository: String,
    pub pull_request: u64,
    pub check_key: String,
    pub remote_id: String,
    pub status: ResultStatus,
    pub head_sha: String,
    #[serde(with = "surreal_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl From<CheckRunRecord> for DbCheckRun {
    fn from(r: CheckRunRecord) -> Self {
        Self {
            id: None,
            repository: r.repository.0,
            pull_request: r.pull_request,
            check_key: r.check_key,
            remote_id: r.remote_id,
            status: r.status,
            head_sha: r.head_sha,
            updated_at: r.updated_at,
        }
    }
}

impl From<DbCheckRun> for CheckRunRecord {
    fn from(row: DbCheckRun) -> Self {
        Self {
            repository: RepositoryId(row.repository),
            pull_request: row.pull_request,
            check_key: row.check_key,
            remote_id: row.remote_id,
            status: row.status,
            head_sha: row.head_sha,
            updated_at: row.updated_at,
        }
    }
}

/// Commit row (`commits` table), keyed by `[repository, sha]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbCommit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Thing>,
    pub repository: String,
    pub sha: String,
    // Absent fields are left untouched by `MERGE`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub committer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<u64>,
}

impl From<CommitRecord> for DbCommit {
    fn from(c: CommitRecord) -> Self {
        Self {
            id: None,
            repository: c.repository.0,
            sha: c.sha,
            message: c.message,
            author: c.author,
            committer: c.committer,
            pull_request: c.pull_request,
        }
    }
}

impl From<DbCommit> for CommitRecord {
    fn from(row: DbCommit) -> Self {
        Self {
            repository: RepositoryId(row.repository),
            sha: row.sha,
            message: row.message,
            author: row.author,
            committer: row.committer,
            pull_request: row.pull_request,
        }
    }
}

/// Edge row (`commit_parents` table), keyed by `[repository, child, parent]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbCommitEdge {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Thing>,
    pub repository: String,
    pub child: String,
    pub parent: String,
}

impl From<CommitEdge> for DbCommitEdge {
    fn from(e: CommitEdge) -> Self {
        Self {
            id: None,
            repository: e.repository.0,
            child: e.child,
            parent: e.parent,
        }
    }
}

impl From<DbCommitEdge> for CommitEdge {
    fn from(row: DbCommitEdge) -> Self {
        Self {
            repository: RepositoryId(row.repository),
            child: row.child,
            parent: row.parent,
        }
    }
}

/// Branch row (`branches` table), keyed by `[repository, name]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbBranch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Thing>,
    pub repository: String,
    pub name: String,
    pub head_sha: String,
    #[serde(with = "surreal_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl From<DbBranch> for BranchRecord {
    fn from(row: DbBranch) -> Self {
        Self {
            repository: RepositoryId(row.repository),
            name: row.name,
            head_sha: row.head_sha,
            updated_at: row.updated_at,
        }
    }
}
