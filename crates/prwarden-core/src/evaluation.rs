//! Evaluated view of a rule against one pull request.

use std::collections::BTreeMap;

use prwarden_state::{ActionId, ActionResultRecord, ResultStatus, RuleRecord};
use serde::Serialize;

use crate::context::EvaluationContext;
use crate::registry::Registry;

/// Result of one condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "error", rename_all = "lowercase")]
pub enum ConditionResult {
    True,
    False,
    Error(String),
}

impl ConditionResult {
    pub fn is_true(&self) -> bool {
        matches!(self, ConditionResult::True)
    }

    pub fn as_str(&self) -> &str {
        match self {
            ConditionResult::True => "true",
            ConditionResult::False => "false",
            ConditionResult::Error(_) => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConditionOutcome {
    pub expression: String,
    pub description: Option<String>,
    pub implied: bool,
    pub result: ConditionResult,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionOutcome {
    pub action_id: ActionId,
    pub key: String,
    pub description: Option<String>,
    /// Persisted result for the head commit, `None` when the action has not run
    pub result: Option<ActionResultRecord>,
}

impl ActionOutcome {
    pub fn status(&self) -> Option<ResultStatus> {
        self.result.as_ref().map(|r| r.status)
    }
}

/// Combine per-action statuses. The first failing status wins; otherwise
/// any missing or pending result makes the rollup pending; an empty list
/// is pending.
pub fn rollup(statuses: impl IntoIterator<Item = Option<ResultStatus>>) -> ResultStatus {
    let mut seen = false;
    let mut pending = false;
    for status in statuses {
        seen = true;
        match status {
            Some(s) if s.is_failure() => return s,
            Some(ResultStatus::Success) => {}
            _ => pending = true,
        }
    }
    if !seen || pending {
        ResultStatus::Pending
    } else {
        ResultStatus::Success
    }
}

/// A rule evaluated against a pull request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluatedRule {
    pub rule: RuleRecord,
    pub conditions: Vec<ConditionOutcome>,
    /// Display value of every variable the conditions reference
    pub variables: BTreeMap<String, String>,
    pub actions: Vec<ActionOutcome>,
    pub status: ResultStatus,
}

impl EvaluatedRule {
    /// Assemble the evaluated rule from condition outcomes and the stored
    /// results of its actions.
    pub fn new(
        rule: RuleRecord,
        conditions: Vec<ConditionOutcome>,
        variables: BTreeMap<String, String>,
        results: Vec<ActionResultRecord>,
    ) -> Self {
        let mut by_action: BTreeMap<ActionId, ActionResultRecord> = results
            .into_iter()
            .map(|r| (r.action_id.clone(), r))
            .collect();
        let actions: Vec<ActionOutcome> = rule
            .actions
            .iter()
            .map(|a| ActionOutcome {
                action_id: a.action_id.clone(),
                key: a.key.clone(),
                description: a.description.clone(),
                result: by_action.remove(&a.action_id),
            })
            .collect();

        let status = if conditions
            .iter()
            .any(|c| matches!(c.result, ConditionResult::Error(_)))
        {
            ResultStatus::Error
        } else if !conditions.iter().all(|c| c.result.is_true()) {
            ResultStatus::Pending
        } else {
            rollup(actions.iter().map(ActionOutcome::status))
        };

        Self {
            rule,
            conditions,
            variables,
            actions,
            status,
        }
    }

    /// All conditions hold (vacuously true for a rule without conditions).
    pub fn matched(&self) -> bool {
        self.conditions.iter().all(|c| c.result.is_true())
    }
}

/// Evaluate every condition of `rule` in order. Returns the outcomes and
/// the display values of the referenced variables.
pub fn evaluate_conditions(
    registry: &Registry,
    rule: &RuleRecord,
    ctx: &EvaluationContext,
) -> (Vec<ConditionOutcome>, BTreeMap<String, String>) {
    let mut outcomes = Vec::with_capacity(rule.conditions.len());
    let mut variables = BTreeMap::new();

    for condition in &rule.conditions {
        let result = match registry.parse_expression(&condition.expression) {
            Ok(parsed) => {
                for key in parsed.variables() {
                    if !variables.contains_key(key) {
                        if let Some(value) = registry.value_of(key, ctx) {
                            variables.insert(key.clone(), value.to_string());
                        }
                    }
                }
                match registry.evaluate(&parsed, ctx) {
                    Ok(true) => ConditionResult::True,
                    Ok(false) => ConditionResult::False,
                    Err(e) => ConditionResult::Error(e.to_string()),
                }
            }
            Err(e) => ConditionResult::Error(e.to_string()),
        };
        outcomes.push(ConditionOutcome {
            expression: condition.expression.clone(),
            description: condition.description.clone(),
            implied: condition.implied,
            result,
        });
    }
    (outcomes, variables)
}
