//! Structured lifecycle events of the rule engine.
//!
//! Every event is an `info!` line with an `event` field naming it, so log
//! pipelines can filter on `event=rule.evaluated` and friends.

use tracing::{info, warn};

/// RAII guard that enters a span tagged with the repository and pull
/// request an event is being handled for.
///
/// ```ignore
/// let _span = EventSpan::enter("acme/widgets", Some(42), "pr_updated");
/// ```
pub struct EventSpan {
    _span: tracing::span::EnteredSpan,
}

impl EventSpan {
    pub fn enter(repository: &str, pull_request: Option<u64>, trigger: &str) -> Self {
        let span = tracing::info_span!(
            "prwarden.event",
            repository = %repository,
            pull_request = pull_request,
            trigger = %trigger,
        );
        Self {
            _span: span.entered(),
        }
    }
}

/// Rules of a repository were replaced.
pub fn emit_rules_refreshed(repository: &str, rules: usize, warnings: usize) {
    info!(
        event = "rules.refreshed",
        repository = %repository,
        rules = rules,
        warnings = warnings,
    );
}

/// A rule's conditions were evaluated.
pub fn emit_rule_evaluated(rule: &str, pull_request: u64, matched: bool, status: &str) {
    info!(
        event = "rule.evaluated",
        rule = %rule,
        pull_request = pull_request,
        matched = matched,
        status = %status,
    );
}

/// An action ran against a commit.
pub fn emit_action_executed(action: &str, sha: &str, status: &str, message: &str) {
    info!(
        event = "action.executed",
        action = %action,
        sha = %sha,
        status = %status,
        message = %message,
    );
}

/// A check was created, updated or left alone.
pub fn emit_check_synced(check_key: &str, pull_request: u64, status: &str, outcome: &str) {
    info!(
        event = "check.synced",
        check = %check_key,
        pull_request = pull_request,
        status = %status,
        outcome = %outcome,
    );
}

pub fn emit_commits_ingested(
    repository: &str,
    pull_request: Option<u64>,
    received: usize,
    touched: usize,
) {
    info!(
        event = "commits.ingested",
        repository = %repository,
        pull_request = pull_request,
        received = received,
        touched = touched,
    );
}

/// A rule failed outside of its actions (store or reconciler error).
pub fn emit_rule_error(rule: &str, error: &dyn std::fmt::Display) {
    warn!(event = "rule.error", rule = %rule, error = %error);
}
