//! Commit ancestry queries over the store's commit graph.

use std::collections::{BTreeSet, HashSet};

use prwarden_state::{CommitBatch, IncomingCommit, RepositoryId, StorageResult, Store};
use tracing::debug;

use crate::context::{AncestryFacts, PullRequest};
use crate::obs;

/// Ingest commits reported for a pull request (or for a push when
/// `pull_request` is `None`). Returns the touched shas.
pub async fn ingest_commits(
    store: &dyn Store,
    repository: &RepositoryId,
    pull_request: Option<u64>,
    commits: Vec<IncomingCommit>,
) -> StorageResult<BTreeSet<String>> {
    if commits.is_empty() {
        return Ok(BTreeSet::new());
    }
    let count = commits.len();
    let touched = store
        .ingest_commits(
            repository,
            CommitBatch {
                commits,
                pull_request,
            },
        )
        .await?;
    obs::emit_commits_ingested(repository.as_str(), pull_request, count, touched.len());
    Ok(touched)
}

/// True when `target` is not reachable from any of `starts` within `depth`
/// parent hops. A start equal to `target` is reachable at depth zero.
pub async fn is_behind(
    store: &dyn Store,
    repository: &RepositoryId,
    starts: Vec<String>,
    target: &str,
    depth: u32,
) -> StorageResult<bool> {
    let mut seen: HashSet<String> = starts.iter().cloned().collect();
    if seen.contains(target) {
        return Ok(false);
    }
    let mut frontier = starts;
    for hop in 0..depth {
        if frontier.is_empty() {
            break;
        }
        let edges = store.parent_edges(repository, &frontier).await?;
        let mut next = Vec::new();
        for edge in edges {
            if edge.parent == target {
                debug!(repository = %repository, target, hops = hop + 1, "base head reachable");
                return Ok(false);
            }
            if seen.insert(edge.parent.clone()) {
                next.push(edge.parent);
            }
        }
        frontier = next;
    }
    Ok(true)
}

/// Ancestry facts for `pull_request`: whether its commits reach the current
/// head of its base branch. A base branch with no recorded head counts as
/// behind.
pub async fn load_facts(
    store: &dyn Store,
    repository: &RepositoryId,
    pull_request: &PullRequest,
    depth: u32,
) -> StorageResult<AncestryFacts> {
    let Some(base) = store
        .get_branch(repository, &pull_request.base_branch)
        .await?
    else {
        return Ok(AncestryFacts { behind: true });
    };

    let mut starts = store
        .pull_request_commits(repository, pull_request.number)
        .await?;
    if !pull_request.head_sha.is_empty() && !starts.contains(&pull_request.head_sha) {
        starts.push(pull_request.head_sha.clone());
    }

    let behind = is_behind(store, repository, starts, &base.head_sha, depth).await?;
    Ok(AncestryFacts { behind })
}

#[cfg(test)]
mod tests {
    use super::*;
    use prwarden_state::{BranchStore, MemoryStore};

    fn commit(sha: &str, parents: &[&str]) -> IncomingCommit {
        IncomingCommit {
            sha: sha.to_string(),
            message: Some(format!("commit {sha}")),
            author: Some("dev".into()),
            committer: None,
            parents: parents.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn depth_bounds_the_search() {
        let store = MemoryStore::new();
        let repo = RepositoryId::new("acme/widgets");
        ingest_commits(
            &store,
            &repo,
            None,
            vec![commit("c", &["b"]), commit("b", &["a"])],
        )
        .await
        .unwrap();

        let starts = vec!["c".to_string()];
        assert!(!is_behind(&store, &repo, starts.clone(), "b", 1).await.unwrap());
        assert!(is_behind(&store, &repo, starts.clone(), "a", 1).await.unwrap());
        assert!(!is_behind(&store, &repo, starts.clone(), "a", 2).await.unwrap());
        assert!(!is_behind(&store, &repo, starts, "c", 0).await.unwrap());
    }

    #[tokio::test]
    async fn missing_base_branch_is_behind() {
        let store = MemoryStore::new();
        let repo = RepositoryId::new("acme/widgets");
        let pr = PullRequest {
            number: 1,
            head_sha: "c".into(),
            base_branch: "main".into(),
            ..Default::default()
        };
        let facts = load_facts(&store, &repo, &pr, 1).await.unwrap();
        assert!(facts.behind);

        store.update_branch_head(&repo, "main", "c").await.unwrap();
        let facts = load_facts(&store, &repo, &pr, 1).await.unwrap();
        assert!(!facts.behind);
    }
}
