//! Source-control provider contract.
//!
//! The engine only talks to the provider through [`ScmClient`]. Provider
//! adapters (GitHub, GitLab, ...) live outside this crate; [`DryRunScmClient`]
//! logs every call instead of performing it.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use prwarden_state::{IncomingCommit, RepositoryId, ResultStatus};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::context::{CommitStatus, PullRequest};

/// Errors reported by an SCM client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScmError {
    /// The provider refused the operation (merge conflict, missing permission, ...)
    #[error("operation rejected: {0}")]
    Operation(String),

    /// The provider could not be reached or answered unexpectedly
    #[error("transport failure: {0}")]
    Transport(String),
}

pub type ScmResult<T> = std::result::Result<T, ScmError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMethod {
    #[default]
    Merge,
    Squash,
    Rebase,
}

impl MergeMethod {
    pub const NAMES: &'static [&'static str] = &["merge", "squash", "rebase"];

    pub fn as_str(self) -> &'static str {
        match self {
            MergeMethod::Merge => "merge",
            MergeMethod::Squash => "squash",
            MergeMethod::Rebase => "rebase",
        }
    }
}

impl FromStr for MergeMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "merge" => Ok(MergeMethod::Merge),
            "squash" => Ok(MergeMethod::Squash),
            "rebase" => Ok(MergeMethod::Rebase),
            other => Err(format!("unknown merge method '{}'", other)),
        }
    }
}

/// Arguments of a merge call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRequest {
    pub commit_title: Option<String>,
    pub commit_message: Option<String>,
    pub method: MergeMethod,
    /// Head sha the merge must apply to
    pub sha: String,
}

/// Desired content of an external check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckDetails {
    pub title: String,
    pub summary: String,
    /// Markdown body
    pub body: String,
    pub status: ResultStatus,
}

#[async_trait]
pub trait ScmClient: Send + Sync {
    /// File content on the default branch, `None` when absent.
    async fn get_content(&self, repository: &RepositoryId, path: &str)
        -> ScmResult<Option<String>>;

    async fn add_label(
        &self,
        repository: &RepositoryId,
        pull_request: u64,
        label: &str,
    ) -> ScmResult<()>;

    /// Merge and return the resulting commit sha.
    async fn merge(
        &self,
        repository: &RepositoryId,
        pull_request: u64,
        request: &MergeRequest,
    ) -> ScmResult<String>;

    /// Bring the pull request branch up to date with its base.
    async fn update_pull_request(
        &self,
        repository: &RepositoryId,
        pull_request: u64,
        sha: &str,
    ) -> ScmResult<()>;

    /// Create a check and return its remote identifier.
    async fn add_check(
        &self,
        repository: &RepositoryId,
        key: &str,
        sha: &str,
        details: &CheckDetails,
    ) -> ScmResult<String>;

    async fn update_check(
        &self,
        repository: &RepositoryId,
        remote_id: &str,
        key: &str,
        sha: &str,
        details: &CheckDetails,
    ) -> ScmResult<()>;

    async fn comment_on_pull_request(
        &self,
        repository: &RepositoryId,
        pull_request: u64,
        sha: &str,
        message: &str,
    ) -> ScmResult<()>;

    /// Open pull requests.
    async fn get_pull_requests(&self, repository: &RepositoryId) -> ScmResult<Vec<PullRequest>>;

    async fn get_pull_request_commits(
        &self,
        repository: &RepositoryId,
        pull_request: u64,
    ) -> ScmResult<Vec<IncomingCommit>>;

    async fn get_statuses(
        &self,
        repository: &RepositoryId,
        sha: &str,
    ) -> ScmResult<Vec<CommitStatus>>;
}

/// Client that logs calls and fabricates identifiers.
#[derive(Debug, Default)]
pub struct DryRunScmClient {
    files: HashMap<String, String>,
    next_id: AtomicU64,
}

impl DryRunScmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `content` for `path` from `get_content`.
    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.files.insert(path.into(), content.into());
        self
    }

    fn next(&self, prefix: &str) -> String {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{prefix}-{n}")
    }
}

#[async_trait]
impl ScmClient for DryRunScmClient {
    async fn get_content(
        &self,
        _repository: &RepositoryId,
        path: &str,
    ) -> ScmResult<Option<String>> {
        Ok(self.files.get(path).cloned())
    }

    async fn add_label(
        &self,
        repository: &RepositoryId,
        pull_request: u64,
        label: &str,
    ) -> ScmResult<()> {
        info!(dry_run = true, repository = %repository, pull_request, label, "add label");
        Ok(())
    }

    async fn merge(
        &self,
        repository: &RepositoryId,
        pull_request: u64,
        request: &MergeRequest,
    ) -> ScmResult<String> {
        info!(
            dry_run = true,
            repository = %repository,
            pull_request,
            method = request.method.as_str(),
            sha = %request.sha,
            "merge"
        );
        Ok(self.next("merge"))
    }

    async fn update_pull_request(
        &self,
        repository: &RepositoryId,
        pull_request: u64,
        sha: &str,
    ) -> ScmResult<()> {
        info!(dry_run = true, repository = %repository, pull_request, sha, "update pull request");
        Ok(())
    }

    async fn add_check(
        &self,
        repository: &RepositoryId,
        key: &str,
        sha: &str,
        details: &CheckDetails,
    ) -> ScmResult<String> {
        info!(
            dry_run = true,
            repository = %repository,
            key,
            sha,
            status = %details.status,
            summary = %details.summary,
            "add check"
        );
        Ok(self.next("check"))
    }

    async fn update_check(
        &self,
        repository: &RepositoryId,
        remote_id: &str,
        key: &str,
        sha: &str,
        details: &CheckDetails,
    ) -> ScmResult<()> {
        info!(
            dry_run = true,
            repository = %repository,
            remote_id,
            key,
            sha,
            status = %details.status,
            "update check"
        );
        Ok(())
    }

    async fn comment_on_pull_request(
        &self,
        repository: &RepositoryId,
        pull_request: u64,
        sha: &str,
        message: &str,
    ) -> ScmResult<()> {
        info!(dry_run = true, repository = %repository, pull_request, sha, message, "comment");
        Ok(())
    }

    async fn get_pull_requests(&self, _repository: &RepositoryId) -> ScmResult<Vec<PullRequest>> {
        Ok(Vec::new())
    }

    async fn get_pull_request_commits(
        &self,
        _repository: &RepositoryId,
        _pull_request: u64,
    ) -> ScmResult<Vec<IncomingCommit>> {
        Ok(Vec::new())
    }

    async fn get_statuses(
        &self,
        _repository: &RepositoryId,
        _sha: &str,
    ) -> ScmResult<Vec<CommitStatus>> {
        Ok(Vec::new())
    }
}
