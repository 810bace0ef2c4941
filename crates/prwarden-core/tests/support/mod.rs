//! Shared fixtures: a recording SCM client and engine builders.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use prwarden_core::context::{CommitStatus, PullRequest, Reviewer};
use prwarden_core::scm::{CheckDetails, MergeRequest, ScmClient, ScmError, ScmResult};
use prwarden_core::{build_registry, EngineConfig, EvaluationContext, RuleEngine};
use prwarden_state::{IncomingCommit, MemoryStore, RepositoryId, ResultStatus};

pub const RULES_PATH: &str = ".prwarden/rules.yml";

/// One recorded SCM call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    AddLabel { pull_request: u64, label: String },
    Merge { pull_request: u64, sha: String },
    UpdatePullRequest { pull_request: u64, sha: String },
    AddCheck { key: String, sha: String, status: ResultStatus },
    UpdateCheck { remote_id: String, sha: String, status: ResultStatus },
    Comment { pull_request: u64, message: String },
}

/// How a scripted label fails.
#[derive(Debug, Clone)]
pub enum Failure {
    Reject(String),
    Transport(String),
    Panic,
}

#[derive(Default)]
pub struct MockScmClient {
    calls: Mutex<Vec<Call>>,
    files: Mutex<HashMap<String, String>>,
    pull_requests: Mutex<Vec<PullRequest>>,
    label_failures: Mutex<HashMap<String, Failure>>,
    merge_failure: Mutex<Option<Failure>>,
}

impl MockScmClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_file(&self, path: &str, content: &str) {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_string());
    }

    pub fn add_pull_request(&self, pull_request: PullRequest) {
        self.pull_requests.lock().unwrap().push(pull_request);
    }

    pub fn fail_label(&self, label: &str, failure: Failure) {
        self.label_failures
            .lock()
            .unwrap()
            .insert(label.to_string(), failure);
    }

    pub fn fail_merge(&self, failure: Failure) {
        *self.merge_failure.lock().unwrap() = Some(failure);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn labels(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::AddLabel { label, .. } => Some(label),
                _ => None,
            })
            .collect()
    }

    pub fn check_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::AddCheck { .. } | Call::UpdateCheck { .. }))
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

fn apply(failure: Option<Failure>) -> ScmResult<()> {
    match failure {
        None => Ok(()),
        Some(Failure::Reject(m)) => Err(ScmError::Operation(m)),
        Some(Failure::Transport(m)) => Err(ScmError::Transport(m)),
        Some(Failure::Panic) => panic!("scripted panic"),
    }
}

#[async_trait]
impl ScmClient for MockScmClient {
    async fn get_content(&self, _repository: &RepositoryId, path: &str) -> ScmResult<Option<String>> {
        Ok(self.files.lock().unwrap().get(path).cloned())
    }

    async fn add_label(
        &self,
        _repository: &RepositoryId,
        pull_request: u64,
        label: &str,
    ) -> ScmResult<()> {
        self.record(Call::AddLabel {
            pull_request,
            label: label.to_string(),
        });
        let failure = self.label_failures.lock().unwrap().get(label).cloned();
        apply(failure)
    }

    async fn merge(
        &self,
        _repository: &RepositoryId,
        pull_request: u64,
        request: &MergeRequest,
    ) -> ScmResult<String> {
        self.record(Call::Merge {
            pull_request,
            sha: request.sha.clone(),
        });
        let failure = self.merge_failure.lock().unwrap().clone();
        apply(failure)?;
        Ok(format!("merged-{}", request.sha))
    }

    async fn update_pull_request(
        &self,
        _repository: &RepositoryId,
        pull_request: u64,
        sha: &str,
    ) -> ScmResult<()> {
        self.record(Call::UpdatePullRequest {
            pull_request,
            sha: sha.to_string(),
        });
        Ok(())
    }

    async fn add_check(
        &self,
        _repository: &RepositoryId,
        key: &str,
        sha: &str,
        details: &CheckDetails,
    ) -> ScmResult<String> {
        let mut calls = self.calls.lock().unwrap();
        calls.push(Call::AddCheck {
            key: key.to_string(),
            sha: sha.to_string(),
            status: details.status,
        });
        Ok(format!("check-{}", calls.len()))
    }

    async fn update_check(
        &self,
        _repository: &RepositoryId,
        remote_id: &str,
        _key: &str,
        sha: &str,
        details: &CheckDetails,
    ) -> ScmResult<()> {
        self.record(Call::UpdateCheck {
            remote_id: remote_id.to_string(),
            sha: sha.to_string(),
            status: details.status,
        });
        Ok(())
    }

    async fn comment_on_pull_request(
        &self,
        _repository: &RepositoryId,
        pull_request: u64,
        _sha: &str,
        message: &str,
    ) -> ScmResult<()> {
        self.record(Call::Comment {
            pull_request,
            message: message.to_string(),
        });
        Ok(())
    }

    async fn get_pull_requests(&self, _repository: &RepositoryId) -> ScmResult<Vec<PullRequest>> {
        Ok(self.pull_requests.lock().unwrap().clone())
    }

    async fn get_pull_request_commits(
        &self,
        _repository: &RepositoryId,
        pull_request: u64,
    ) -> ScmResult<Vec<IncomingCommit>> {
        Ok(self
            .pull_requests
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.number == pull_request)
            .map(|p| p.commits.clone())
            .unwrap_or_default())
    }

    async fn get_statuses(
        &self,
        _repository: &RepositoryId,
        sha: &str,
    ) -> ScmResult<Vec<CommitStatus>> {
        Ok(self
            .pull_requests
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.head_sha == sha)
            .map(|p| p.statuses.clone())
            .unwrap_or_default())
    }
}

pub fn repo() -> RepositoryId {
    RepositoryId::new("acme/widgets")
}

pub fn commit(sha: &str, parents: &[&str]) -> IncomingCommit {
    IncomingCommit {
        sha: sha.to_string(),
        message: Some(format!("change {sha}")),
        author: Some("alice".to_string()),
        committer: Some("alice".to_string()),
        parents: parents.iter().map(|p| p.to_string()).collect(),
    }
}

pub fn pull_request(number: u64, head_sha: &str) -> PullRequest {
    PullRequest {
        number,
        title: format!("Change #{number}"),
        author: "alice".to_string(),
        head_sha: head_sha.to_string(),
        head_branch: format!("feature-{number}"),
        base_branch: "main".to_string(),
        ..Default::default()
    }
}

pub fn reviewers(names: &[&str]) -> Vec<Reviewer> {
    names
        .iter()
        .map(|n| Reviewer {
            username: n.to_string(),
            state: Default::default(),
        })
        .collect()
}

pub fn context(pull_request: PullRequest) -> EvaluationContext {
    EvaluationContext::new(repo(), pull_request)
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub scm: Arc<MockScmClient>,
    pub engine: Arc<RuleEngine>,
}

pub fn harness() -> Harness {
    harness_with(EngineConfig::default())
}

pub fn harness_with(config: EngineConfig) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let scm = Arc::new(MockScmClient::new());
    let engine = Arc::new(RuleEngine::new(
        store.clone(),
        scm.clone(),
        Arc::new(build_registry()),
        config,
    ));
    Harness { store, scm, engine }
}

impl Harness {
    /// Compile `rules` into the store, panicking on document errors.
    pub async fn load(&self, rules: &str) -> prwarden_core::CompiledRules {
        self.engine.apply_rules(&repo(), rules).await.unwrap()
    }
}
