//! Sync evaluated rules to external checks.
//!
//! One check exists per (rule, pull request). Its stored state is looked up
//! by (repository, pull request, check key) and the SCM is only called when
//! the status or the head commit changed.

use std::fmt::Write as _;
use std::sync::Arc;

use chrono::Utc;
use prwarden_state::{CheckRunRecord, Store};
use serde::Serialize;

use crate::config::EngineConfig;
use crate::context::EvaluationContext;
use crate::error::Result;
use crate::evaluation::{ConditionResult, EvaluatedRule};
use crate::metrics::METRICS;
use crate::obs;
use crate::scm::{CheckDetails, ScmClient};

/// What a reconcile call did remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncOutcome {
    Created,
    Updated,
    Unchanged,
}

impl SyncOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncOutcome::Created => "created",
            SyncOutcome::Updated => "updated",
            SyncOutcome::Unchanged => "unchanged",
        }
    }
}

/// Render the desired check for an evaluated rule.
pub fn render_check(evaluated: &EvaluatedRule) -> CheckDetails {
    let met = evaluated
        .conditions
        .iter()
        .filter(|c| c.result.is_true())
        .count();
    let mut summary = format!(
        "{} of {} conditions met",
        met,
        evaluated.conditions.len()
    );
    for condition in &evaluated.conditions {
        let _ = write!(
            summary,
            "\n- `{}`: {}",
            condition.expression,
            condition.result.as_str()
        );
    }

    let mut body = String::new();
    if let Some(description) = &evaluated.rule.description {
        let _ = writeln!(body, "{}\n", description);
    }

    body.push_str("### Triggers\n\n");
    for trigger in &evaluated.rule.triggers {
        let _ = writeln!(body, "- `{}`: {}", trigger.key, trigger.description);
    }

    body.push_str("\n### Conditions\n\n| Condition | Description | Result |\n|---|---|---|\n");
    for condition in &evaluated.conditions {
        let mut description = condition.description.clone().unwrap_or_default();
        if condition.implied && description.is_empty() {
            description = "implied".to_string();
        }
        let result = match &condition.result {
            ConditionResult::Error(e) => format!("error: {}", e),
            other => other.as_str().to_string(),
        };
        let _ = writeln!(
            body,
            "| `{}` | {} | {} |",
            condition.expression,
            escape_cell(&description),
            escape_cell(&result)
        );
    }

    if !evaluated.variables.is_empty() {
        body.push_str("\n### Variables\n\n| Variable | Value |\n|---|---|\n");
        for (key, value) in &evaluated.variables {
            let _ = writeln!(body, "| `{}` | {} |", key, escape_cell(value));
        }
    }

    if !evaluated.actions.is_empty() {
        body.push_str("\n### Actions\n\n| Action | Status | Message |\n|---|---|---|\n");
        for action in &evaluated.actions {
            let (status, message) = match &action.result {
                Some(result) => (result.status.as_str(), result.message.as_str()),
                None => ("not run", ""),
            };
            let _ = writeln!(
                body,
                "| `{}` | {} | {} |",
                action.key,
                status,
                escape_cell(message)
            );
        }
    }

    CheckDetails {
        title: evaluated.rule.title.clone(),
        summary,
        body,
        status: evaluated.status,
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

/// Creates or updates the external check of each evaluated rule.
pub struct CheckReconciler {
    store: Arc<dyn Store>,
    scm: Arc<dyn ScmClient>,
    config: EngineConfig,
}

impl CheckReconciler {
    pub fn new(store: Arc<dyn Store>, scm: Arc<dyn ScmClient>, config: EngineConfig) -> Self {
        Self { store, scm, config }
    }

    pub async fn reconcile(
        &self,
        ctx: &EvaluationContext,
        evaluated: &EvaluatedRule,
    ) -> Result<SyncOutcome> {
        let repository = &ctx.repository;
        let pull_request = ctx.pull_request.number;
        let sha = ctx.head_sha();
        let key = evaluated.rule.check_key.clone();
        let name = self.config.check_name(&key);
        let details = render_check(evaluated);

        let stored = self
            .store
            .get_check_run(repository, pull_request, &key)
            .await?;

        let (remote_id, outcome) = match stored {
            None => {
                let remote_id = self.scm.add_check(repository, &name, sha, &details).await?;
                METRICS.inc_checks_created();
                (remote_id, SyncOutcome::Created)
            }
            Some(record) if record.status != details.status || record.head_sha != sha => {
                self.scm
                    .update_check(repository, &record.remote_id, &name, sha, &details)
                    .await?;
                METRICS.inc_checks_updated();
                (record.remote_id, SyncOutcome::Updated)
            }
            Some(_) => {
                obs::emit_check_synced(&key, pull_request, details.status.as_str(), "unchanged");
                return Ok(SyncOutcome::Unchanged);
            }
        };

        self.store
            .save_check_run(CheckRunRecord {
                repository: repository.clone(),
                pull_request,
                check_key: key.clone(),
                remote_id,
                status: details.status,
                head_sha: sha.to_string(),
                updated_at: Utc::now(),
            })
            .await?;
        obs::emit_check_synced(&key, pull_request, details.status.as_str(), outcome.as_str());
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::ConditionOutcome;
    use prwarden_state::{RepositoryId, ResultStatus, RuleId, RuleRecord, TriggerRecord};
    use std::collections::BTreeMap;

    fn evaluated() -> EvaluatedRule {
        let rule = RuleRecord {
            rule_id: RuleId::new(),
            repository: RepositoryId::new("acme/widgets"),
            title: "Needs | review".into(),
            check_key: "needs-review".into(),
            description: Some("Two reviewers".into()),
            order: 0,
            conditions: vec![],
            triggers: vec![TriggerRecord {
                key: "pr_updated".into(),
                description: "implied from number_reviewers".into(),
            }],
            actions: vec![],
            created_at: Utc::now(),
        };
        EvaluatedRule::new(
            rule,
            vec![ConditionOutcome {
                expression: "number_reviewers>1".into(),
                description: None,
                implied: false,
                result: ConditionResult::False,
            }],
            BTreeMap::from([("number_reviewers".to_string(), "1".to_string())]),
            vec![],
        )
    }

    #[test]
    fn render_lists_conditions_and_variables() {
        let details = render_check(&evaluated());
        assert_eq!(details.status, ResultStatus::Pending);
        assert!(details.summary.starts_with("0 of 1 conditions met"));
        assert!(details.summary.contains("`number_reviewers>1`: false"));
        assert!(details.body.contains("### Triggers"));
        assert!(details.body.contains("| `number_reviewers` | 1 |"));
        assert!(!details.body.contains("### Actions"));
    }
}
