//! Condition language evaluated against the built-in registry.

mod support;

use prwarden_core::context::{CommitState, CommitStatus, ReviewState, Reviewer};
use prwarden_core::{build_registry, AncestryFacts, EvaluationContext, ExpressionError};
use support::{context, pull_request, reviewers};

fn eval(expr: &str, ctx: &EvaluationContext) -> bool {
    let registry = build_registry();
    let parsed = registry.parse_expression(expr).unwrap();
    registry.evaluate(&parsed, ctx).unwrap()
}

#[test]
fn number_reviewers_threshold() {
    let mut pr = pull_request(1, "abc");
    pr.reviewers = reviewers(&["ann", "bob"]);
    assert!(!eval("number_reviewers>3", &context(pr.clone())));

    pr.reviewers = reviewers(&["ann", "bob", "cy", "dee"]);
    assert!(eval("number_reviewers>3", &context(pr)));
}

#[test]
fn label_membership_and_length() {
    let mut pr = pull_request(1, "abc");
    pr.labels = vec!["x".to_string(), "y".to_string()];
    let ctx = context(pr);

    assert!(eval("label='x'", &ctx));
    assert!(eval("label=2", &ctx));
    assert!(!eval("label='z'", &ctx));
    assert!(eval("label!=\"z\"", &ctx));
    assert!(eval("label~='^y'", &ctx));
}

#[test]
fn unknown_tri_state_is_false() {
    let mut pr = pull_request(1, "abc");
    pr.mergeable = None;
    let ctx = context(pr);

    assert!(!eval("mergeable", &ctx));
    assert!(eval("mergeable=false", &ctx));
    // `behind` stays unknown until ancestry is loaded
    assert!(!eval("behind", &ctx));
    assert!(eval("behind", &ctx.clone().with_ancestry(AncestryFacts { behind: true })));
}

#[test]
fn keywords_are_case_insensitive() {
    let mut pr = pull_request(1, "abc");
    pr.draft = false;
    pr.base_branch = "main".to_string();
    let ctx = context(pr);

    assert!(eval("draft=FALSE and base=main", &ctx));
    assert!(!eval("draft Or base=develop", &ctx));
    assert!(eval("draft=True OR (base=main aNd draft=false)", &ctx));
}

#[test]
fn title_match_is_anchored() {
    let mut pr = pull_request(1, "abc");
    pr.title = "WIP: refactor".to_string();
    let ctx = context(pr);

    assert!(eval("title~='WIP'", &ctx));
    assert!(!eval("title~='refactor'", &ctx));
    assert!(eval("title~='.*refactor'", &ctx));
}

#[test]
fn status_and_review_variables() {
    let mut pr = pull_request(1, "abc");
    pr.statuses = vec![
        CommitStatus {
            context: "ci/build".to_string(),
            state: CommitState::Success,
        },
        CommitStatus {
            context: "ci/lint".to_string(),
            state: CommitState::Failure,
        },
    ];
    pr.reviewers = vec![
        Reviewer {
            username: "ann".to_string(),
            state: ReviewState::Approved,
        },
        Reviewer {
            username: "bob".to_string(),
            state: ReviewState::ChangesRequested,
        },
    ];
    let ctx = context(pr);

    assert!(eval("status-success='ci/build'", &ctx));
    assert!(eval("status-failure=1", &ctx));
    assert!(eval("status-pending=0", &ctx));
    assert!(eval("review-approved=ann AND review-changes_requested=bob", &ctx));
}

#[test]
fn author_combines_pull_request_and_commit_authors() {
    let mut pr = pull_request(1, "abc");
    pr.author = "ann".to_string();
    pr.commits = vec![support::commit("abc", &[])];
    let ctx = context(pr);

    assert!(eval("author=ann AND author=alice", &ctx));
    assert!(eval("pull_request_author=ann", &ctx));
    assert!(eval("commit_author=1", &ctx));
}

#[test]
fn unknown_variable_rejected_when_built() {
    let registry = build_registry();
    let err = registry.parse_expression("approvals>1").unwrap_err();
    assert_eq!(
        err,
        ExpressionError::UnknownVariable {
            key: "approvals".to_string()
        }
    );
}

#[test]
fn type_mismatch_is_an_evaluation_error() {
    let registry = build_registry();
    let parsed = registry.parse_expression("draft>1").unwrap();
    let ctx = context(pull_request(1, "abc"));
    assert!(registry.evaluate(&parsed, &ctx).is_err());
}

#[test]
fn invalid_regex_is_a_parse_error() {
    let registry = build_registry();
    let err = registry.parse_expression("title~='('").unwrap_err();
    assert!(matches!(err, ExpressionError::Parse { .. }));
}
