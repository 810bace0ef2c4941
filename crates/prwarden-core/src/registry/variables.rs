//! Condition variables: named values read from the evaluation context.

use std::sync::Arc;

use super::triggers::*;
use crate::context::{CommitState, EvaluationContext, ReviewState};
use crate::expression::{TriState, Value, ValueType};

pub type VariableFn = Arc<dyn Fn(&EvaluationContext) -> Value + Send + Sync>;

const PR_CHANGES: &[&str] = &[PR_CREATED, PR_UPDATED];

/// A registered condition variable.
#[derive(Clone)]
pub struct ConditionVariableType {
    pub key: String,
    pub label: String,
    pub value_type: ValueType,
    pub default_triggers: Vec<&'static str>,
    evaluator: VariableFn,
}

impl ConditionVariableType {
    pub fn new(
        key: impl Into<String>,
        label: impl Into<String>,
        value_type: ValueType,
        default_triggers: &[&'static str],
        evaluator: impl Fn(&EvaluationContext) -> Value + Send + Sync + 'static,
    ) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            value_type,
            default_triggers: default_triggers.to_vec(),
            evaluator: Arc::new(evaluator),
        }
    }

    pub fn evaluate(&self, ctx: &EvaluationContext) -> Value {
        (self.evaluator)(ctx)
    }
}

impl std::fmt::Debug for ConditionVariableType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionVariableType")
            .field("key", &self.key)
            .field("value_type", &self.value_type)
            .field("default_triggers", &self.default_triggers)
            .finish_non_exhaustive()
    }
}

fn status_variable(state: CommitState) -> ConditionVariableType {
    ConditionVariableType::new(
        format!("status-{}", state.as_str()),
        format!("Status contexts reporting {}", state.as_str()),
        ValueType::List,
        &[STATUS_UPDATED],
        move |ctx| {
            Value::List(
                ctx.pull_request
                    .statuses
                    .iter()
                    .filter(|s| s.state == state)
                    .map(|s| s.context.clone())
                    .collect(),
            )
        },
    )
}

fn review_variable(state: ReviewState) -> ConditionVariableType {
    ConditionVariableType::new(
        format!("review-{}", state.as_str()),
        format!("Reviewers with review state {}", state.as_str()),
        ValueType::List,
        &[REVIEW_UPDATED],
        move |ctx| {
            Value::List(
                ctx.pull_request
                    .reviewers
                    .iter()
                    .filter(|r| r.state == state)
                    .map(|r| r.username.clone())
                    .collect(),
            )
        },
    )
}

/// Built-in variables in registration order.
pub fn builtin() -> Vec<ConditionVariableType> {
    let mut vars = vec![
        ConditionVariableType::new(
            "number_reviewers",
            "Number of reviewers",
            ValueType::Integer,
            PR_CHANGES,
            |ctx| Value::count(ctx.pull_request.reviewers.len()),
        ),
        ConditionVariableType::new("reviewer", "Reviewers", ValueType::List, PR_CHANGES, |ctx| {
            Value::List(
                ctx.pull_request
                    .reviewers
                    .iter()
                    .map(|r| r.username.clone())
                    .collect(),
            )
        }),
        ConditionVariableType::new(
            "number_assignees",
            "Number of assignees",
            ValueType::Integer,
            PR_CHANGES,
            |ctx| Value::count(ctx.pull_request.assignees.len()),
        ),
        ConditionVariableType::new("assignee", "Assignees", ValueType::List, PR_CHANGES, |ctx| {
            Value::List(ctx.pull_request.assignees.clone())
        }),
        ConditionVariableType::new(
            "author",
            "Pull request and commit authors",
            ValueType::List,
            PR_CHANGES,
            |ctx| {
                let pr = &ctx.pull_request;
                let mut authors = vec![pr.author.clone()];
                for author in pr.commit_authors() {
                    if !authors.contains(&author) {
                        authors.push(author);
                    }
                }
                Value::List(authors)
            },
        ),
        ConditionVariableType::new(
            "pull_request_author",
            "Pull request author",
            ValueType::Text,
            PR_CHANGES,
            |ctx| Value::text(ctx.pull_request.author.clone()),
        ),
        ConditionVariableType::new(
            "commit_author",
            "Commit authors",
            ValueType::List,
            PR_CHANGES,
            |ctx| Value::List(ctx.pull_request.commit_authors()),
        ),
        ConditionVariableType::new("title", "Title", ValueType::Text, PR_CHANGES, |ctx| {
            Value::text(ctx.pull_request.title.clone())
        }),
        ConditionVariableType::new(
            "description",
            "Description",
            ValueType::Text,
            PR_CHANGES,
            |ctx| Value::text(ctx.pull_request.description.clone()),
        ),
        ConditionVariableType::new("label", "Labels", ValueType::List, PR_CHANGES, |ctx| {
            Value::List(ctx.pull_request.labels.clone())
        }),
        ConditionVariableType::new("base", "Base branch", ValueType::Text, PR_CHANGES, |ctx| {
            Value::text(ctx.pull_request.base_branch.clone())
        }),
        ConditionVariableType::new(
            "commit_message",
            "Commit messages",
            ValueType::List,
            PR_CHANGES,
            |ctx| {
                Value::List(
                    ctx.pull_request
                        .commits
                        .iter()
                        .filter_map(|c| c.message.clone())
                        .collect(),
                )
            },
        ),
        ConditionVariableType::new(
            "mergeable",
            "Mergeable",
            ValueType::TriState,
            &[PR_CREATED, PR_UPDATED, PR_CLOSED],
            |ctx| Value::Tri(TriState::from(ctx.pull_request.mergeable)),
        ),
        ConditionVariableType::new(
            "rebaseable",
            "Rebaseable",
            ValueType::TriState,
            PR_CHANGES,
            |ctx| Value::Tri(TriState::from(ctx.pull_request.rebaseable)),
        ),
        ConditionVariableType::new("merged", "Merged", ValueType::Boolean, &[PR_CLOSED], |ctx| {
            Value::Bool(ctx.pull_request.merged)
        }),
        ConditionVariableType::new(
            "draft",
            "Draft",
            ValueType::Boolean,
            &[PR_CREATED, PR_UPDATED, PR_CLOSED],
            |ctx| Value::Bool(ctx.pull_request.draft),
        ),
        ConditionVariableType::new(
            "closed",
            "Closed",
            ValueType::Boolean,
            &[PR_CLOSED, PR_REOPENED],
            |ctx| Value::Bool(ctx.pull_request.closed),
        ),
        ConditionVariableType::new(
            "conflict",
            "Conflicts with base",
            ValueType::Boolean,
            &[BASE_BRANCH_UPDATED, PR_UPDATED, PR_CREATED],
            |ctx| Value::Bool(ctx.pull_request.conflict),
        ),
        ConditionVariableType::new(
            "behind",
            "Behind base branch",
            ValueType::TriState,
            &[PR_CREATED, PR_UPDATED, BASE_BRANCH_UPDATED],
            |ctx| Value::Tri(TriState::from(ctx.ancestry.map(|a| a.behind))),
        ),
    ];

    vars.extend(CommitState::ALL.into_iter().map(status_variable));
    vars.extend(ReviewState::ALL.into_iter().map(review_variable));
    vars
}
