//! Fail-fast action execution.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use prwarden_state::{
    ActionRecord, ActionResultRecord, ResultStatus, RuleRecord, StorageResult, Store,
};
use tracing::warn;

use crate::context::EvaluationContext;
use crate::metrics::METRICS;
use crate::obs;
use crate::registry::{ActionFault, Registry};
use crate::scm::{ScmClient, ScmError};

/// Status an action fault is reported with: a refusal by the provider is a
/// `failure`, anything else is an `error`.
pub fn fault_status(fault: &ActionFault) -> ResultStatus {
    match fault {
        ActionFault::Scm(ScmError::Operation(_)) => ResultStatus::Failure,
        _ => ResultStatus::Error,
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    let detail = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    };
    format!("action panicked: {}", detail)
}

/// Run one action, converting faults and panics into a (status, message).
pub async fn run_action(
    registry: &Registry,
    action: &ActionRecord,
    rule: &RuleRecord,
    ctx: &EvaluationContext,
    scm: &dyn ScmClient,
) -> (ResultStatus, String) {
    let Some(action_type) = registry.action(&action.key) else {
        let fault = ActionFault::UnknownAction(action.key.clone());
        return (fault_status(&fault), fault.to_string());
    };

    let execution = action_type.kind.execute(action, rule, ctx, scm);
    match AssertUnwindSafe(execution).catch_unwind().await {
        Ok(Ok(message)) => (ResultStatus::Success, message),
        Ok(Err(fault)) => (fault_status(&fault), fault.to_string()),
        Err(payload) => {
            let message = panic_message(payload);
            warn!(action = %action.key, rule = %rule.title, %message, "action panicked");
            (ResultStatus::Error, message)
        }
    }
}

/// Run the rule's actions in order against the head commit, persisting
/// each result. Stops after the first action that does not succeed.
pub async fn execute_actions(
    store: &dyn Store,
    registry: &Registry,
    rule: &RuleRecord,
    ctx: &EvaluationContext,
    scm: &dyn ScmClient,
) -> StorageResult<()> {
    let sha = ctx.head_sha();
    for action in &rule.actions {
        let (status, message) = run_action(registry, action, rule, ctx, scm).await;
        METRICS.inc_actions_executed();
        if !status.is_success() {
            METRICS.inc_actions_failed();
        }
        obs::emit_action_executed(&action.key, sha, status.as_str(), &message);

        store
            .upsert_action_result(ActionResultRecord::new(
                action.action_id.clone(),
                sha,
                status,
                message,
            ))
            .await?;

        if !status.is_success() {
            break;
        }
    }
    Ok(())
}
