//! SurrealDB-backed implementation of every storage trait
//!
//! Uses the rows in `schema` for persistence, converting to/from
//! `storage_traits` records at the boundary. Multi-row writes run inside
//! `BEGIN TRANSACTION ... COMMIT TRANSACTION` blocks.

use std::collections::{BTreeSet, HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

use crate::commit_graph::IngestPlan;
use crate::error::StorageError;
use crate::handle::{self, DbConfig};
use crate::schema::{DbActionResult, DbBranch, DbCheckRun, DbCommit, DbCommitEdge, DbRule};
use crate::storage_traits::*;

/// SurrealDB-backed store.
#[derive(Clone)]
pub struct SurrealStore {
    db: Surreal<Any>,
}

impl SurrealStore {
    /// Create an in-memory instance (tests, dry runs).
    pub async fn in_memory() -> crate::Result<Self> {
        Self::connect(&DbConfig::in_memory()).await
    }

    /// Connect with an explicit configuration.
    pub async fn connect(config: &DbConfig) -> crate::Result<Self> {
        let db = handle::connect(config).await?;
        info!(endpoint = %config.endpoint, "SurrealStore ready");
        Ok(Self { db })
    }

    /// Create from environment variables (see [`DbConfig::from_env`]).
    pub async fn from_env() -> crate::Result<Self> {
        Self::connect(&DbConfig::from_env()?).await
    }

    // -- private helpers -----------------------------------------------------

    async fn select_one<T: DeserializeOwned>(
        &self,
        sql: &'static str,
        binds: Vec<(&'static str, serde_json::Value)>,
    ) -> StorageResult<Option<T>> {
        let rows: Vec<T> = self.select(sql, binds).await?;
        Ok(rows.into_iter().next())
    }

    async fn select<T: DeserializeOwned>(
        &self,
        sql: &'static str,
        binds: Vec<(&'static str, serde_json::Value)>,
    ) -> StorageResult<Vec<T>> {
        let mut query = self.db.query(sql);
        for (name, value) in binds {
            query = query.bind((name, value));
        }
        let mut res = query
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        res.take(0)
            .map_err(|e| StorageError::Backend(e.to_string()))
    }
}

fn bind(
    name: &'static str,
    value: impl serde::Serialize,
) -> StorageResult<(&'static str, serde_json::Value)> {
    Ok((name, serde_json::to_value(value)?))
}

#[async_trait]
impl RuleStore for SurrealStore {
    async fn replace_rules(
        &self,
        repository: &RepositoryId,
        rules: Vec<RuleRecord>,
    ) -> StorageResult<()> {
        validate_rules(repository, &rules)?;
        let count = rules.len();
        let rows: Vec<DbRule> = rules.into_iter().map(DbRule::from).collect();

        self.db
            .query(
                "BEGIN TRANSACTION;
                 DELETE rules WHERE repository = $repo;
                 FOR $row IN $rows { CREATE rules CONTENT $row; };
                 COMMIT TRANSACTION;",
            )
            .bind(("repo", repository.0.clone()))
            .bind(("rows", rows))
            .await
            .map_err(|e| StorageError::Transaction(e.to_string()))?
            .check()
            .map_err(|e| StorageError::Transaction(e.to_string()))?;

        debug!(repository = %repository, count, "rules replaced");
        Ok(())
    }

    async fn list_rules(&self, repository: &RepositoryId) -> StorageResult<Vec<RuleRecord>> {
        let rows: Vec<DbRule> = self
            .select(
                "SELECT * FROM rules WHERE repository = $repo ORDER BY ordinal ASC",
                vec![bind("repo", repository)?],
            )
            .await?;
        Ok(rows.into_iter().map(RuleRecord::from).collect())
    }

    async fn rules_for_trigger(
        &self,
        repository: &RepositoryId,
        trigger: &str,
    ) -> StorageResult<Vec<RuleRecord>> {
        let rows: Vec<DbRule> = self
            .select(
                "SELECT * FROM rules WHERE repository = $repo AND trigger_keys CONTAINS $trigger ORDER BY ordinal ASC",
                vec![bind("repo", repository)?, bind("trigger", trigger)?],
            )
            .await?;
        Ok(rows.into_iter().map(RuleRecord::from).collect())
    }
}

#[async_trait]
impl ActionResultStore for SurrealStore {
    async fn upsert_action_result(&self, result: ActionResultRecord) -> StorageResult<bool> {
        if let Some(existing) = self
            .get_action_result(&result.action_id, &result.sha)
            .await?
        {
            if existing.same_outcome(&result) {
                return Ok(false);
            }
        }

        let row = DbActionResult::from(result);
        self.db
            .query("UPSERT type::thing('action_results', [$action_id, $sha]) CONTENT $row")
            .bind(("action_id", row.action_id.clone()))
            .bind(("sha", row.sha.clone()))
            .bind(("row", row))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?
            .check()
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(true)
    }

    async fn get_action_result(
        &self,
        action_id: &ActionId,
        sha: &str,
    ) -> StorageResult<Option<ActionResultRecord>> {
        let row: Option<DbActionResult> = self
            .select_one(
                "SELECT * FROM type::thing('action_results', [$action_id, $sha])",
                vec![bind("action_id", action_id)?, bind("sha", sha)?],
            )
            .await?;
        Ok(row.map(ActionResultRecord::from))
    }

    async fn action_results_for(
        &self,
        action_ids: &[ActionId],
        sha: &str,
    ) -> StorageResult<Vec<ActionResultRecord>> {
        let rows: Vec<DbActionResult> = self
            .select(
                "SELECT * FROM action_results WHERE sha = $sha AND action_id IN $ids",
                vec![bind("sha", sha)?, bind("ids", action_ids)?],
            )
            .await?;
        let mut by_id: HashMap<String, ActionResultRecord> = rows
            .into_iter()
            .map(|r| (r.action_id.clone(), ActionResultRecord::from(r)))
            .collect();
        Ok(action_ids
            .iter()
            .filter_map(|id| by_id.remove(&id.0))
            .collect())
    }
}

#[async_trait]
impl CheckRunStore for SurrealStore {
    async fn get_check_run(
        &self,
        repository: &RepositoryId,
        pull_request: u64,
        check_key: &str,
    ) -> StorageResult<Option<CheckRunRecord>> {
        let row: Option<DbCheckRun> = self
            .select_one(
                "SELECT * FROM type::thing('check_runs', [$repo, $pr, $key])",
                vec![
                    bind("repo", repository)?,
                    bind("pr", pull_request)?,
                    bind("key", check_key)?,
                ],
            )
            .await?;
        Ok(row.map(CheckRunRecord::from))
    }

    async fn save_check_run(&self, record: CheckRunRecord) -> StorageResult<()> {
        let row = DbCheckRun::from(record);
        self.db
            .query("UPSERT type::thing('check_runs', [$repo, $pr, $key]) CONTENT $row")
            .bind(("repo", row.repository.clone()))
            .bind(("pr", row.pull_request))
            .bind(("key", row.check_key.clone()))
            .bind(("row", row))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?
            .check()
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl CommitGraphStore for SurrealStore {
    async fn ingest_commits(
        &self,
        repository: &RepositoryId,
        batch: CommitBatch,
    ) -> StorageResult<BTreeSet<String>> {
        if batch.commits.is_empty() {
            return Ok(BTreeSet::new());
        }

        let shas = IngestPlan::referenced_shas(&batch);
        let children: Vec<String> = batch.commits.iter().map(|c| c.sha.clone()).collect();

        let nodes: Vec<DbCommit> = self
            .select(
                "SELECT * FROM commits WHERE repository = $repo AND sha IN $shas",
                vec![bind("repo", repository)?, bind("shas", &shas)?],
            )
            .await?;
        let existing: HashMap<String, CommitRecord> = nodes
            .into_iter()
            .map(|row| (row.sha.clone(), CommitRecord::from(row)))
            .collect();

        let edges = self.parent_edges(repository, &children).await?;
        let existing_edges: HashSet<(String, String)> =
            edges.into_iter().map(|e| (e.child, e.parent)).collect();

        let plan = IngestPlan::build(repository, &batch, &existing, &existing_edges)?;
        if plan.is_empty() {
            return Ok(plan.touched);
        }

        let node_rows: Vec<DbCommit> = plan.nodes.into_iter().map(DbCommit::from).collect();
        let edge_rows: Vec<DbCommitEdge> =
            plan.edges.into_iter().map(DbCommitEdge::from).collect();

        self.db
            .query(
                "BEGIN TRANSACTION;
                 FOR $n IN $nodes { UPSERT type::thing('commits', [$n.repository, $n.sha]) MERGE $n; };
                 FOR $e IN $edges { UPSERT type::thing('commit_parents', [$e.repository, $e.child, $e.parent]) CONTENT $e; };
                 COMMIT TRANSACTION;",
            )
            .bind(("nodes", node_rows))
            .bind(("edges", edge_rows))
            .await
            .map_err(|e| StorageError::Transaction(e.to_string()))?
            .check()
            .map_err(|e| StorageError::Transaction(e.to_string()))?;

        debug!(repository = %repository, touched = plan.touched.len(), "commits ingested");
        Ok(plan.touched)
    }

    async fn get_commit(
        &self,
        repository: &RepositoryId,
        sha: &str,
    ) -> StorageResult<Option<CommitRecord>> {
        let row: Option<DbCommit> = self
            .select_one(
                "SELECT * FROM type::thing('commits', [$repo, $sha])",
                vec![bind("repo", repository)?, bind("sha", sha)?],
            )
            .await?;
        Ok(row.map(CommitRecord::from))
    }

    async fn parent_edges(
        &self,
        repository: &RepositoryId,
        children: &[String],
    ) -> StorageResult<Vec<CommitEdge>> {
        if children.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<DbCommitEdge> = self
            .select(
                "SELECT * FROM commit_parents WHERE repository = $repo AND child IN $children",
                vec![bind("repo", repository)?, bind("children", children)?],
            )
            .await?;
        Ok(rows.into_iter().map(CommitEdge::from).collect())
    }

    async fn pull_request_commits(
        &self,
        repository: &RepositoryId,
        pull_request: u64,
    ) -> StorageResult<Vec<String>> {
        let rows: Vec<DbCommit> = self
            .select(
                "SELECT * FROM commits WHERE repository = $repo AND pull_request = $pr ORDER BY sha ASC",
                vec![bind("repo", repository)?, bind("pr", pull_request)?],
            )
            .await?;
        Ok(rows.into_iter().map(|row| row.sha).collect())
    }
}

#[async_trait]
impl BranchStore for SurrealStore {
    async fn get_branch(
        &self,
        repository: &RepositoryId,
        name: &str,
    ) -> StorageResult<Option<BranchRecord>> {
        let row: Option<DbBranch> = self
            .select_one(
                "SELECT * FROM type::thing('branches', [$repo, $name])",
                vec![bind("repo", repository)?, bind("name", name)?],
            )
            .await?;
        Ok(row.map(BranchRecord::from))
    }

    async fn update_branch_head(
        &self,
        repository: &RepositoryId,
        name: &str,
        head_sha: &str,
    ) -> StorageResult<bool> {
        if let Some(branch) = self.get_branch(repository, name).await? {
            if branch.head_sha == head_sha {
                return Ok(false);
            }
        }

        let row = DbBranch {
            id: None,
            repository: repository.0.clone(),
            name: name.to_string(),
            head_sha: head_sha.to_string(),
            updated_at: Utc::now(),
        };
        self.db
            .query("UPSERT type::thing('branches', [$repo, $name]) CONTENT $row")
            .bind(("repo", row.repository.clone()))
            .bind(("name", row.name.clone()))
            .bind(("row", row))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?
            .check()
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(true)
    }
}
