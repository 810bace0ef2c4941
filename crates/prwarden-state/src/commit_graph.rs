//! Ingestion planning for the commit ancestry graph
//!
//! Both backends compute an [`IngestPlan`] from the rows that already exist
//! and then apply it in a single write, so the placeholder and relinking
//! rules live in one place.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::error::StorageError;
use crate::storage_traits::{CommitBatch, CommitEdge, CommitRecord, RepositoryId, StorageResult};

/// Writes needed to bring the graph up to date with one batch.
#[derive(Debug, Default)]
pub struct IngestPlan {
    /// Nodes to create or overwrite (new nodes, filled placeholders, relinks)
    pub nodes: Vec<CommitRecord>,
    /// Edges to create
    pub edges: Vec<CommitEdge>,
    /// Shas that gained a node or an edge
    pub touched: BTreeSet<String>,
}

impl IngestPlan {
    /// Every sha (child or parent) referenced by the batch.
    pub fn referenced_shas(batch: &CommitBatch) -> Vec<String> {
        let mut seen = BTreeSet::new();
        for commit in &batch.commits {
            seen.insert(commit.sha.clone());
            for parent in &commit.parents {
                seen.insert(parent.clone());
            }
        }
        seen.into_iter().collect()
    }

    /// Build the plan.
    ///
    /// * `existing` - nodes already stored, keyed by sha (only referenced shas are needed)
    /// * `existing_edges` - (child, parent) pairs already stored for the batch's children
    pub fn build(
        repository: &RepositoryId,
        batch: &CommitBatch,
        existing: &HashMap<String, CommitRecord>,
        existing_edges: &HashSet<(String, String)>,
    ) -> StorageResult<Self> {
        let mut plan = IngestPlan::default();
        let mut staged: HashMap<String, CommitRecord> = HashMap::new();
        let mut staged_edges: HashSet<(String, String)> = HashSet::new();

        for commit in &batch.commits {
            if commit.sha.trim().is_empty() {
                return Err(StorageError::Invalid("commit sha must not be empty".into()));
            }

            let current = staged
                .get(&commit.sha)
                .or_else(|| existing.get(&commit.sha))
                .cloned();

            let node = match current {
                None => {
                    plan.touched.insert(commit.sha.clone());
                    Some(CommitRecord {
                        repository: repository.clone(),
                        sha: commit.sha.clone(),
                        message: commit.message.clone(),
                        author: commit.author.clone(),
                        committer: commit.committer.clone(),
                        pull_request: batch.pull_request,
                    })
                }
                Some(mut node) => {
                    let mut changed = false;
                    if node.is_placeholder() {
                        node.message = commit.message.clone();
                        node.author = commit.author.clone();
                        node.committer = commit.committer.clone();
                        changed = !node.is_placeholder();
                    }
                    if batch.pull_request.is_some() && node.pull_request != batch.pull_request {
                        node.pull_request = batch.pull_request;
                        changed = true;
                    }
                    changed.then_some(node)
                }
            };
            if let Some(node) = node {
                staged.insert(node.sha.clone(), node);
            }

            for parent in &commit.parents {
                if parent.trim().is_empty() {
                    return Err(StorageError::Invalid(format!(
                        "commit {} lists an empty parent sha",
                        commit.sha
                    )));
                }
                if !staged.contains_key(parent) && !existing.contains_key(parent) {
                    plan.touched.insert(parent.clone());
                    staged.insert(parent.clone(), CommitRecord::placeholder(repository, parent));
                }
                let pair = (commit.sha.clone(), parent.clone());
                if !existing_edges.contains(&pair) && staged_edges.insert(pair) {
                    plan.touched.insert(commit.sha.clone());
                    plan.touched.insert(parent.clone());
                    plan.edges.push(CommitEdge {
                        repository: repository.clone(),
                        child: commit.sha.clone(),
                        parent: parent.clone(),
                    });
                }
            }
        }

        let mut nodes: Vec<CommitRecord> = staged.into_values().collect();
        nodes.sort_by(|a, b| a.sha.cmp(&b.sha));
        plan.nodes = nodes;
        Ok(plan)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage_traits::IncomingCommit;

    fn repo() -> RepositoryId {
        RepositoryId::new("acme/widgets")
    }

    fn commit(sha: &str, parents: &[&str]) -> IncomingCommit {
        IncomingCommit {
            sha: sha.to_string(),
            message: Some(format!("commit {sha}")),
            author: Some("alice".to_string()),
            committer: Some("alice".to_string()),
            parents: parents.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn unknown_parents_become_placeholders() {
        let batch = CommitBatch {
            commits: vec![commit("c2", &["c1"])],
            pull_request: Some(7),
        };
        let plan = IngestPlan::build(&repo(), &batch, &HashMap::new(), &HashSet::new()).unwrap();

        assert_eq!(plan.nodes.len(), 2);
        let parent = plan.nodes.iter().find(|n| n.sha == "c1").unwrap();
        assert!(parent.is_placeholder());
        assert_eq!(parent.pull_request, None);
        let child = plan.nodes.iter().find(|n| n.sha == "c2").unwrap();
        assert_eq!(child.pull_request, Some(7));
        assert_eq!(plan.edges.len(), 1);
        assert_eq!(
            plan.touched,
            ["c1", "c2"].iter().map(|s| s.to_string()).collect()
        );
    }

    #[test]
    fn placeholder_gets_filled_without_touching() {
        let mut existing = HashMap::new();
        existing.insert("c1".to_string(), CommitRecord::placeholder(&repo(), "c1"));
        let batch = CommitBatch {
            commits: vec![commit("c1", &[])],
            pull_request: None,
        };
        let plan = IngestPlan::build(&repo(), &batch, &existing, &HashSet::new()).unwrap();

        assert_eq!(plan.nodes.len(), 1);
        assert_eq!(plan.nodes[0].message.as_deref(), Some("commit c1"));
        assert!(plan.touched.is_empty());
    }

    #[test]
    fn known_graph_yields_empty_plan() {
        let mut existing = HashMap::new();
        for sha in ["c1", "c2"] {
            let mut node = CommitRecord::placeholder(&repo(), sha);
            node.message = Some(format!("commit {sha}"));
            existing.insert(sha.to_string(), node);
        }
        let edges: HashSet<_> = [("c2".to_string(), "c1".to_string())].into_iter().collect();
        let batch = CommitBatch {
            commits: vec![commit("c2", &["c1"])],
            pull_request: None,
        };
        let plan = IngestPlan::build(&repo(), &batch, &existing, &edges).unwrap();

        assert!(plan.is_empty());
        assert!(plan.touched.is_empty());
    }

    #[test]
    fn empty_sha_is_rejected() {
        let batch = CommitBatch {
            commits: vec![commit("", &[])],
            pull_request: None,
        };
        let err = IngestPlan::build(&repo(), &batch, &HashMap::new(), &HashSet::new()).unwrap_err();
        assert!(matches!(err, StorageError::Invalid(_)));
    }
}
