//! Pull request snapshot and evaluation context.
//!
//! The context is built by the caller from an inbound event (or loaded from
//! the SCM) and is read-only during evaluation. Ancestry facts are loaded
//! by the engine before conditions run.

use prwarden_state::{IncomingCommit, RepositoryId};
use serde::{Deserialize, Serialize};

/// State of a commit status context reported by CI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitState {
    Success,
    Failure,
    Pending,
    Error,
}

impl CommitState {
    pub const ALL: [CommitState; 4] = [
        CommitState::Success,
        CommitState::Failure,
        CommitState::Pending,
        CommitState::Error,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CommitState::Success => "success",
            CommitState::Failure => "failure",
            CommitState::Pending => "pending",
            CommitState::Error => "error",
        }
    }
}

/// Review state of a reviewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewState {
    Approved,
    ChangesRequested,
    Commented,
    Dismissed,
    #[default]
    Pending,
}

impl ReviewState {
    pub const ALL: [ReviewState; 5] = [
        ReviewState::Approved,
        ReviewState::ChangesRequested,
        ReviewState::Commented,
        ReviewState::Dismissed,
        ReviewState::Pending,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReviewState::Approved => "approved",
            ReviewState::ChangesRequested => "changes_requested",
            ReviewState::Commented => "commented",
            ReviewState::Dismissed => "dismissed",
            ReviewState::Pending => "pending",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reviewer {
    pub username: String,
    #[serde(default)]
    pub state: ReviewState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitStatus {
    pub context: String,
    pub state: CommitState,
}

/// Snapshot of a pull request at the moment an event is handled.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PullRequest {
    /// Provider-side pull request number
    pub number: u64,
    pub title: String,
    pub description: String,
    pub author: String,
    pub head_sha: String,
    pub head_branch: String,
    pub base_branch: String,
    pub draft: bool,
    pub merged: bool,
    pub closed: bool,
    /// `None` while the provider is still computing it
    pub mergeable: Option<bool>,
    pub rebaseable: Option<bool>,
    pub conflict: bool,
    pub reviewers: Vec<Reviewer>,
    pub assignees: Vec<String>,
    pub labels: Vec<String>,
    pub commits: Vec<IncomingCommit>,
    pub statuses: Vec<CommitStatus>,
}

impl PullRequest {
    pub fn is_open(&self) -> bool {
        !self.closed && !self.merged
    }

    /// Commit authors in commit order, without duplicates.
    pub fn commit_authors(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for author in self.commits.iter().filter_map(|c| c.author.as_ref()) {
            if !out.contains(author) {
                out.push(author.clone());
            }
        }
        out
    }
}

/// Facts derived from the commit ancestry graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AncestryFacts {
    /// True when the base branch head is not reachable from the pull request
    pub behind: bool,
}

/// Everything a condition variable may read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationContext {
    pub repository: RepositoryId,
    pub pull_request: PullRequest,
    /// `None` until the engine has consulted the ancestry graph
    pub ancestry: Option<AncestryFacts>,
}

impl EvaluationContext {
    pub fn new(repository: RepositoryId, pull_request: PullRequest) -> Self {
        Self {
            repository,
            pull_request,
            ancestry: None,
        }
    }

    pub fn with_ancestry(mut self, facts: AncestryFacts) -> Self {
        self.ancestry = Some(facts);
        self
    }

    pub fn head_sha(&self) -> &str {
        &self.pull_request.head_sha
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pull_request_deserializes_with_defaults() {
        let pr: PullRequest = serde_json::from_value(serde_json::json!({
            "number": 4,
            "head_sha": "abc",
            "reviewers": [{"username": "bob", "state": "changes_requested"}],
            "mergeable": null
        }))
        .unwrap();
        assert_eq!(pr.number, 4);
        assert_eq!(pr.reviewers[0].state, ReviewState::ChangesRequested);
        assert_eq!(pr.mergeable, None);
        assert!(pr.is_open());
    }

    #[test]
    fn commit_authors_are_deduplicated() {
        let pr = PullRequest {
            commits: vec![
                IncomingCommit {
                    sha: "a".into(),
                    author: Some("ann".into()),
                    ..Default::default()
                },
                IncomingCommit {
                    sha: "b".into(),
                    author: Some("ann".into()),
                    ..Default::default()
                },
                IncomingCommit {
                    sha: "c".into(),
                    author: Some("bo".into()),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        assert_eq!(pr.commit_authors(), vec!["ann", "bo"]);
    }
}
