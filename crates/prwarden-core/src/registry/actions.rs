//! Action types: what a rule does once its conditions hold.

use std::collections::BTreeMap;
use std::str::FromStr;

use prwarden_state::{ActionRecord, RuleRecord};

use crate::context::EvaluationContext;
use crate::scm::{MergeMethod, MergeRequest, ScmClient, ScmError};

pub const ADD_LABEL: &str = "add_label";
pub const MERGE_PULL_REQUEST: &str = "merge_pull_request";
pub const UPDATE_PULL_REQUEST_BASE: &str = "update_pull_request_base";

/// Fault raised while executing an action.
#[derive(Debug, thiserror::Error)]
pub enum ActionFault {
    #[error(transparent)]
    Scm(#[from] ScmError),

    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("action type '{0}' is not registered")]
    UnknownAction(String),
}

/// Declared parameter of an action type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub required: bool,
    /// Accepted values; empty means any string
    pub allowed: &'static [&'static str],
}

/// Behaviour attached to an action type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    AddLabel,
    MergePullRequest,
    UpdatePullRequestBase,
}

impl ActionKind {
    /// Run the action, returning the success message.
    pub async fn execute(
        self,
        action: &ActionRecord,
        rule: &RuleRecord,
        ctx: &EvaluationContext,
        scm: &dyn ScmClient,
    ) -> Result<String, ActionFault> {
        let pr = &ctx.pull_request;
        match self {
            ActionKind::AddLabel => {
                let label = action.parameter_str("value").ok_or_else(|| {
                    ActionFault::InvalidParameters("missing label 'value'".to_string())
                })?;
                scm.add_label(&ctx.repository, pr.number, label).await?;
                Ok(format!("Added label '{}'", label))
            }
            ActionKind::MergePullRequest => {
                let method = match action.parameter_str("merge_method") {
                    Some(name) => {
                        MergeMethod::from_str(name).map_err(ActionFault::InvalidParameters)?
                    }
                    None => MergeMethod::default(),
                };
                let request = MergeRequest {
                    commit_title: action.parameter_str("commit_title").map(str::to_string),
                    commit_message: action.parameter_str("commit_message").map(str::to_string),
                    method,
                    sha: pr.head_sha.clone(),
                };
                let merged_sha = scm.merge(&ctx.repository, pr.number, &request).await?;
                Ok(format!("Merged as {}", merged_sha))
            }
            ActionKind::UpdatePullRequestBase => {
                scm.update_pull_request(&ctx.repository, pr.number, &pr.head_sha)
                    .await?;
                let comment = format!(
                    "Updated the pull request by merging {} as requested by rule '{}'",
                    pr.base_branch, rule.title
                );
                scm.comment_on_pull_request(&ctx.repository, pr.number, &pr.head_sha, &comment)
                    .await?;
                Ok(format!("Updated branch with {}", pr.base_branch))
            }
        }
    }
}

/// A registered action type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionType {
    pub key: &'static str,
    pub label: &'static str,
    pub parameters: Vec<ParameterSpec>,
    /// Expressions injected as conditions of every rule using this action
    pub preconditions: Vec<&'static str>,
    pub kind: ActionKind,
}

impl ActionType {
    /// Check `parameters` against the declared schema.
    pub fn validate_parameters(
        &self,
        parameters: &BTreeMap<String, serde_json::Value>,
    ) -> Result<(), String> {
        for name in parameters.keys() {
            if !self.parameters.iter().any(|p| p.name == name) {
                return Err(format!(
                    "action '{}' has no parameter '{}'",
                    self.key, name
                ));
            }
        }
        for spec in &self.parameters {
            match parameters.get(spec.name) {
                None if spec.required => {
                    return Err(format!(
                        "action '{}' requires parameter '{}'",
                        self.key, spec.name
                    ))
                }
                None => {}
                Some(value) => {
                    let Some(text) = value.as_str() else {
                        return Err(format!(
                            "parameter '{}' of action '{}' must be a string",
                            spec.name, self.key
                        ));
                    };
                    if !spec.allowed.is_empty() && !spec.allowed.contains(&text) {
                        return Err(format!(
                            "parameter '{}' of action '{}' must be one of {}",
                            spec.name,
                            self.key,
                            spec.allowed.join(", ")
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

pub fn builtin() -> Vec<ActionType> {
    vec![
        ActionType {
            key: ADD_LABEL,
            label: "Add label",
            parameters: vec![ParameterSpec {
                name: "value",
                description: "Label to add",
                required: true,
                allowed: &[],
            }],
            preconditions: vec![],
            kind: ActionKind::AddLabel,
        },
        ActionType {
            key: MERGE_PULL_REQUEST,
            label: "Merge pull request",
            parameters: vec![
                ParameterSpec {
                    name: "commit_title",
                    description: "Title of the merge commit",
                    required: false,
                    allowed: &[],
                },
                ParameterSpec {
                    name: "commit_message",
                    description: "Body of the merge commit",
                    required: false,
                    allowed: &[],
                },
                ParameterSpec {
                    name: "merge_method",
                    description: "How to merge",
                    required: false,
                    allowed: MergeMethod::NAMES,
                },
            ],
            preconditions: vec!["merged=false"],
            kind: ActionKind::MergePullRequest,
        },
        ActionType {
            key: UPDATE_PULL_REQUEST_BASE,
            label: "Update pull request with its base branch",
            parameters: vec![],
            preconditions: vec!["behind"],
            kind: ActionKind::UpdatePullRequestBase,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, serde_json::Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::json!(v)))
            .collect()
    }

    fn action(key: &str) -> ActionType {
        builtin().into_iter().find(|a| a.key == key).unwrap()
    }

    #[test]
    fn add_label_requires_value() {
        let add_label = action(ADD_LABEL);
        assert!(add_label.validate_parameters(&params(&[("value", "ready")])).is_ok());
        assert!(add_label.validate_parameters(&params(&[])).is_err());
    }

    #[test]
    fn merge_method_is_restricted() {
        let merge = action(MERGE_PULL_REQUEST);
        assert!(merge
            .validate_parameters(&params(&[("merge_method", "squash")]))
            .is_ok());
        let err = merge
            .validate_parameters(&params(&[("merge_method", "octopus")]))
            .unwrap_err();
        assert!(err.contains("merge, squash, rebase"));
    }

    #[test]
    fn unknown_parameters_are_rejected() {
        let update = action(UPDATE_PULL_REQUEST_BASE);
        assert!(update.validate_parameters(&params(&[("value", "x")])).is_err());
    }
}
