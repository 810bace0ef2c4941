//! In-memory fakes for storage traits
//!
//! Provides `MemoryStore`, which satisfies every trait contract without any
//! external dependencies. All tables sit behind one mutex so rule
//! replacement and commit ingestion are atomic like the database backend.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::commit_graph::IngestPlan;
use crate::storage_traits::*;

#[derive(Debug, Default)]
struct Tables {
    rules: HashMap<RepositoryId, Vec<RuleRecord>>,
    action_results: HashMap<(ActionId, String), ActionResultRecord>,
    check_runs: HashMap<(RepositoryId, u64, String), CheckRunRecord>,
    commits: HashMap<(RepositoryId, String), CommitRecord>,
    edges: BTreeSet<CommitEdge>,
    branches: HashMap<(RepositoryId, String), BranchRecord>,
}

/// In-memory store backed by `HashMap`s.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored action results (all repositories).
    pub fn action_result_count(&self) -> usize {
        self.tables.lock().unwrap().action_results.len()
    }

    /// Number of stored commit edges (all repositories).
    pub fn edge_count(&self) -> usize {
        self.tables.lock().unwrap().edges.len()
    }
}

#[async_trait]
impl RuleStore for MemoryStore {
    async fn replace_rules(
        &self,
        repository: &RepositoryId,
        mut rules: Vec<RuleRecord>,
    ) -> StorageResult<()> {
        validate_rules(repository, &rules)?;
        rules.sort_by_key(|r| r.order);
        let mut tables = self.tables.lock().unwrap();
        tables.rules.insert(repository.clone(), rules);
        Ok(())
    }

    async fn list_rules(&self, repository: &RepositoryId) -> StorageResult<Vec<RuleRecord>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.rules.get(repository).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl ActionResultStore for MemoryStore {
    async fn upsert_action_result(&self, result: ActionResultRecord) -> StorageResult<bool> {
        let mut tables = self.tables.lock().unwrap();
        let key = (result.action_id.clone(), result.sha.clone());
        match tables.action_results.get(&key) {
            Some(existing) if existing.same_outcome(&result) => Ok(false),
            _ => {
                tables.action_results.insert(key, result);
                Ok(true)
            }
        }
    }

    async fn get_action_result(
        &self,
        action_id: &ActionId,
        sha: &str,
    ) -> StorageResult<Option<ActionResultRecord>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .action_results
            .get(&(action_id.clone(), sha.to_string()))
            .cloned())
    }
}

#[async_trait]
impl CheckRunStore for MemoryStore {
    async fn get_check_run(
        &self,
        repository: &RepositoryId,
        pull_request: u64,
        check_key: &str,
    ) -> StorageResult<Option<CheckRunRecord>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .check_runs
            .get(&(repository.clone(), pull_request, check_key.to_string()))
            .cloned())
    }

    async fn save_check_run(&self, record: CheckRunRecord) -> StorageResult<()> {
        let mut tables = self.tables.lock().unwrap();
        let key = (
            record.repository.clone(),
            record.pull_request,
            record.check_key.clone(),
        );
        tables.check_runs.insert(key, record);
        Ok(())
    }
}

#[async_trait]
impl CommitGraphStore for MemoryStore {
    async fn ingest_commits(
        &self,
        repository: &RepositoryId,
        batch: CommitBatch,
    ) -> StorageResult<BTreeSet<String>> {
        let mut tables = self.tables.lock().unwrap();

        let mut existing = HashMap::new();
        for sha in IngestPlan::referenced_shas(&batch) {
            if let Some(node) = tables.commits.get(&(repository.clone(), sha.clone())) {
                existing.insert(sha, node.clone());
            }
        }
        let existing_edges: HashSet<(String, String)> = tables
            .edges
            .iter()
            .filter(|e| &e.repository == repository)
            .map(|e| (e.child.clone(), e.parent.clone()))
            .collect();

        let plan = IngestPlan::build(repository, &batch, &existing, &existing_edges)?;
        for node in plan.nodes {
            tables
                .commits
                .insert((repository.clone(), node.sha.clone()), node);
        }
        tables.edges.extend(plan.edges);
        Ok(plan.touched)
    }

    async fn get_commit(
        &self,
        repository: &RepositoryId,
        sha: &str,
    ) -> StorageResult<Option<CommitRecord>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .commits
            .get(&(repository.clone(), sha.to_string()))
            .cloned())
    }

    async fn parent_edges(
        &self,
        repository: &RepositoryId,
        children: &[String],
    ) -> StorageResult<Vec<CommitEdge>> {
        let wanted: HashSet<&str> = children.iter().map(String::as_str).collect();
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .edges
            .iter()
            .filter(|e| &e.repository == repository && wanted.contains(e.child.as_str()))
            .cloned()
            .collect())
    }

    async fn pull_request_commits(
        &self,
        repository: &RepositoryId,
        pull_request: u64,
    ) -> StorageResult<Vec<String>> {
        let tables = self.tables.lock().unwrap();
        let mut shas: Vec<String> = tables
            .commits
            .values()
            .filter(|c| &c.repository == repository && c.pull_request == Some(pull_request))
            .map(|c| c.sha.clone())
            .collect();
        shas.sort();
        Ok(shas)
    }
}

#[async_trait]
impl BranchStore for MemoryStore {
    async fn get_branch(
        &self,
        repository: &RepositoryId,
        name: &str,
    ) -> StorageResult<Option<BranchRecord>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .branches
            .get(&(repository.clone(), name.to_string()))
            .cloned())
    }

    async fn update_branch_head(
        &self,
        repository: &RepositoryId,
        name: &str,
        head_sha: &str,
    ) -> StorageResult<bool> {
        let mut tables = self.tables.lock().unwrap();
        let key = (repository.clone(), name.to_string());
        if let Some(branch) = tables.branches.get(&key) {
            if branch.head_sha == head_sha {
                return Ok(false);
            }
        }
        tables.branches.insert(
            key,
            BranchRecord {
                repository: repository.clone(),
                name: name.to_string(),
                head_sha: head_sha.to_string(),
                updated_at: Utc::now(),
            },
        );
        Ok(true)
    }
}
