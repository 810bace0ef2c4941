//! Repository events mapped onto engine entry points.

use std::sync::Arc;

use prwarden_state::{IncomingCommit, RepositoryId};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::ancestry;
use crate::context::{EvaluationContext, PullRequest};
use crate::engine::RuleEngine;
use crate::error::{EngineError, Result};
use crate::evaluation::EvaluatedRule;
use crate::registry::triggers::*;

/// An inbound repository event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RepositoryEvent {
    PullRequestOpened {
        pull_request: PullRequest,
    },
    PullRequestUpdated {
        pull_request: PullRequest,
    },
    PullRequestClosed {
        pull_request: PullRequest,
    },
    PullRequestReopened {
        pull_request: PullRequest,
    },
    Push {
        branch: String,
        head_sha: String,
        #[serde(default)]
        commits: Vec<IncomingCommit>,
        /// Paths added, modified or removed by the push
        #[serde(default)]
        files: Vec<String>,
    },
    StatusChanged {
        pull_request: PullRequest,
    },
    ReviewChanged {
        pull_request: PullRequest,
    },
    /// Re-read every open pull request from the SCM
    Resync,
}

impl RepositoryEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            RepositoryEvent::PullRequestOpened { .. } => "pull_request_opened",
            RepositoryEvent::PullRequestUpdated { .. } => "pull_request_updated",
            RepositoryEvent::PullRequestClosed { .. } => "pull_request_closed",
            RepositoryEvent::PullRequestReopened { .. } => "pull_request_reopened",
            RepositoryEvent::Push { .. } => "push",
            RepositoryEvent::StatusChanged { .. } => "status_changed",
            RepositoryEvent::ReviewChanged { .. } => "review_changed",
            RepositoryEvent::Resync => "resync",
        }
    }
}

pub struct EventHandler {
    engine: Arc<RuleEngine>,
}

impl EventHandler {
    pub fn new(engine: Arc<RuleEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &RuleEngine {
        &self.engine
    }

    /// Handle one event and return every rule evaluated along the way.
    pub async fn handle(
        &self,
        repository: &RepositoryId,
        event: RepositoryEvent,
    ) -> Result<Vec<EvaluatedRule>> {
        info!(repository = %repository, event = event.kind(), "handling event");
        match event {
            RepositoryEvent::PullRequestOpened { pull_request } => {
                self.pull_request_changed(repository, pull_request, PR_CREATED)
                    .await
            }
            RepositoryEvent::PullRequestUpdated { pull_request } => {
                self.pull_request_changed(repository, pull_request, PR_UPDATED)
                    .await
            }
            RepositoryEvent::PullRequestClosed { pull_request } => {
                self.run(repository, pull_request, PR_CLOSED).await
            }
            RepositoryEvent::PullRequestReopened { pull_request } => {
                self.run(repository, pull_request, PR_REOPENED).await
            }
            RepositoryEvent::StatusChanged { pull_request } => {
                self.run(repository, pull_request, STATUS_UPDATED).await
            }
            RepositoryEvent::ReviewChanged { pull_request } => {
                self.run(repository, pull_request, REVIEW_UPDATED).await
            }
            RepositoryEvent::Push {
                branch,
                head_sha,
                commits,
                files,
            } => self.push(repository, &branch, &head_sha, commits, &files).await,
            RepositoryEvent::Resync => self.resync(repository).await,
        }
    }

    async fn run(
        &self,
        repository: &RepositoryId,
        pull_request: PullRequest,
        trigger: &str,
    ) -> Result<Vec<EvaluatedRule>> {
        let ctx = EvaluationContext::new(repository.clone(), pull_request);
        self.engine.execute(trigger, &ctx).await
    }

    async fn pull_request_changed(
        &self,
        repository: &RepositoryId,
        pull_request: PullRequest,
        trigger: &str,
    ) -> Result<Vec<EvaluatedRule>> {
        ancestry::ingest_commits(
            self.engine.store().as_ref(),
            repository,
            Some(pull_request.number),
            pull_request.commits.clone(),
        )
        .await?;
        let ctx = EvaluationContext::new(repository.clone(), pull_request);
        self.engine.refresh_checks(&ctx).await?;
        self.engine.execute(trigger, &ctx).await
    }

    async fn push(
        &self,
        repository: &RepositoryId,
        branch: &str,
        head_sha: &str,
        commits: Vec<IncomingCommit>,
        files: &[String],
    ) -> Result<Vec<EvaluatedRule>> {
        let store = self.engine.store();
        ancestry::ingest_commits(store.as_ref(), repository, None, commits).await?;
        let changed = store
            .update_branch_head(repository, branch, head_sha)
            .await?;

        let config = self.engine.config();
        if branch == config.rules_branch && files.iter().any(|f| f == &config.rules_path) {
            self.refresh_rules(repository).await?;
        }

        if !changed {
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        for pull_request in self.open_pull_requests(repository).await? {
            if pull_request.base_branch != branch {
                continue;
            }
            let number = pull_request.number;
            let ctx = EvaluationContext::new(repository.clone(), pull_request);
            match self.engine.execute(BASE_BRANCH_UPDATED, &ctx).await {
                Ok(evaluated) => out.extend(evaluated),
                Err(e) => skip_pull_request(repository, number, &e),
            }
        }
        Ok(out)
    }

    async fn resync(&self, repository: &RepositoryId) -> Result<Vec<EvaluatedRule>> {
        self.refresh_rules(repository).await?;

        let mut out = Vec::new();
        for pull_request in self.open_pull_requests(repository).await? {
            let number = pull_request.number;
            match self
                .pull_request_changed(repository, pull_request, PR_CREATED)
                .await
            {
                Ok(evaluated) => out.extend(evaluated),
                Err(e) => skip_pull_request(repository, number, &e),
            }
        }
        Ok(out)
    }

    /// Refresh rules from the repository. A missing or unreadable rules
    /// document keeps the stored rules.
    async fn refresh_rules(&self, repository: &RepositoryId) -> Result<()> {
        match self.engine.refresh_rules(repository).await {
            Ok(_) => Ok(()),
            Err(EngineError::RulesFileMissing { path }) => {
                warn!(repository = %repository, path = %path, "rules file missing, keeping stored rules");
                Ok(())
            }
            Err(EngineError::Compile(e)) => {
                warn!(repository = %repository, error = %e, "rules document rejected, keeping stored rules");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Open pull requests with their commits and statuses loaded. A pull
    /// request whose details cannot be loaded is skipped.
    async fn open_pull_requests(&self, repository: &RepositoryId) -> Result<Vec<PullRequest>> {
        let scm = self.engine.scm();
        let mut out = Vec::new();
        for mut pull_request in scm.get_pull_requests(repository).await? {
            if !pull_request.is_open() {
                continue;
            }
            let number = pull_request.number;
            let commits = match scm.get_pull_request_commits(repository, number).await {
                Ok(commits) => commits,
                Err(e) => {
                    skip_pull_request(repository, number, &EngineError::from(e));
                    continue;
                }
            };
            let statuses = match scm.get_statuses(repository, &pull_request.head_sha).await {
                Ok(statuses) => statuses,
                Err(e) => {
                    skip_pull_request(repository, number, &EngineError::from(e));
                    continue;
                }
            };
            pull_request.commits = commits;
            pull_request.statuses = statuses;
            out.push(pull_request);
        }
        Ok(out)
    }
}

fn skip_pull_request(repository: &RepositoryId, pull_request: u64, error: &EngineError) {
    warn!(
        repository = %repository,
        pull_request,
        error = %error,
        "pull request skipped"
    );
}
