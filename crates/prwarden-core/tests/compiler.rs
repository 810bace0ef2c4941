//! Rule document compilation.

mod support;

use std::collections::BTreeSet;

use prwarden_core::{build_registry, compile_rules, CompileError};
use prwarden_state::RuleRecord;
use support::repo;

fn compile(doc: &str) -> prwarden_core::CompiledRules {
    compile_rules(doc, &repo(), &build_registry()).unwrap()
}

fn trigger_keys(rule: &RuleRecord) -> BTreeSet<&str> {
    rule.triggers.iter().map(|t| t.key.as_str()).collect()
}

#[test]
fn explicit_triggers_are_used_exactly() {
    let compiled = compile(
        r#"
rules:
  - only updates:
      triggers: [pr_updated]
      conditions: ["number_reviewers>3"]
  - reordered:
      triggers: [pr_closed, pr_created, pr_closed]
      conditions: ["label='x'"]
"#,
    );
    assert!(compiled.warnings.is_empty());
    assert_eq!(trigger_keys(&compiled.rules[0]), BTreeSet::from(["pr_updated"]));
    assert_eq!(
        trigger_keys(&compiled.rules[1]),
        BTreeSet::from(["pr_closed", "pr_created"])
    );
    assert_eq!(compiled.rules[0].triggers[0].description, "Pull request updated");
}

#[test]
fn triggers_inferred_from_variables() {
    let compiled = compile(
        r#"
rules:
  - reviewed:
      conditions:
        - number_reviewers>3
"#,
    );
    let rule = &compiled.rules[0];
    assert_eq!(
        trigger_keys(rule),
        BTreeSet::from(["pr_created", "pr_updated"])
    );
    assert!(rule
        .triggers
        .iter()
        .all(|t| t.description == "implied from number_reviewers"));
}

#[test]
fn preconditions_are_injected_once() {
    let compiled = compile(
        r#"
rules:
  - merge:
      conditions:
        - "merged=false"
        - "number_reviewers>=2"
      actions:
        - merge_pull_request:
            parameters:
              merge_method: squash
  - sync:
      actions:
        - update_pull_request_base
"#,
    );
    let merge = &compiled.rules[0];
    let expressions: Vec<&str> = merge.conditions.iter().map(|c| c.expression.as_str()).collect();
    assert_eq!(expressions, vec!["merged=false", "number_reviewers>=2"]);
    assert!(merge.conditions.iter().all(|c| !c.implied));

    let sync = &compiled.rules[1];
    assert_eq!(sync.conditions.len(), 1);
    assert_eq!(sync.conditions[0].expression, "behind");
    assert!(sync.conditions[0].implied);
    // Injected conditions feed trigger inference too
    assert!(sync.has_trigger("base_branch_updated"));
}

#[test]
fn broken_rules_are_dropped_with_lines() {
    let compiled = compile(
        r#"rules:
  - bad expression:
      conditions:
        - "number_reviewers >"
  - unknown variable:
      conditions:
        - "approvals>1"
  - unknown action:
      actions:
        - close_pull_request
  - missing parameter:
      actions:
        - add_label
  - bad merge method:
      actions:
        - merge_pull_request:
            merge_method: octopus
  - unknown trigger:
      triggers: [pr_exploded]
  - wrong shape:
      conditions: 12
  - good:
      conditions: ["draft=false"]
      actions:
        - add_label: ready
"#,
    );
    assert_eq!(compiled.rules.len(), 1);
    assert_eq!(compiled.rules[0].title, "good");
    assert_eq!(compiled.rules[0].order, 0);
    assert_eq!(compiled.warnings.len(), 7);

    let first = &compiled.warnings[0];
    assert_eq!(first.rule.as_deref(), Some("bad expression"));
    assert_eq!(first.line, Some(4));
    assert!(compiled.warnings[1].message.contains("approvals"));
    assert!(compiled.warnings[2].message.contains("close_pull_request"));
    assert!(compiled.warnings[3].message.contains("value"));
    assert!(compiled.warnings[4].message.contains("merge, squash, rebase"));
    assert!(compiled.warnings[5].message.contains("pr_exploded"));
}

#[test]
fn ordinals_count_compiled_rules() {
    let compiled = compile(
        r#"
rules:
  - first:
      conditions: ["draft"]
  - skipped:
      conditions: ["nope"]
  - second:
      conditions: ["closed"]
      actions:
        - add_label: a
        - add_label:
            description: second label
            parameters: b
"#,
    );
    let orders: Vec<u32> = compiled.rules.iter().map(|r| r.order).collect();
    assert_eq!(orders, vec![0, 1]);
    let second = &compiled.rules[1];
    assert_eq!(second.actions[1].order, 1);
    assert_eq!(second.actions[1].parameter_str("value"), Some("b"));
    assert_eq!(second.actions[1].description.as_deref(), Some("second label"));
}

#[test]
fn every_valid_rule_gets_a_distinct_check_key() {
    let compiled = compile(
        r#"
rules:
  - 自動マージ:
      conditions: ["draft=false"]
  - Auto merge:
      conditions: ["draft=false"]
  - auto-merge:
      conditions: ["draft=false"]
  - "!!!":
      conditions: ["draft=false"]
"#,
    );
    assert!(compiled.warnings.is_empty());
    let keys: Vec<&str> = compiled.rules.iter().map(|r| r.check_key.as_str()).collect();
    assert_eq!(keys, vec!["自動マージ", "auto-merge", "auto-merge-2", "rule-3"]);
}

#[test]
fn invalid_documents_are_errors() {
    let registry = build_registry();
    assert!(matches!(
        compile_rules("rules: [", &repo(), &registry),
        Err(CompileError::Yaml(_))
    ));
    assert!(matches!(
        compile_rules("rules: {a: 1}", &repo(), &registry),
        Err(CompileError::Shape)
    ));
    assert!(compile_rules("", &repo(), &registry).unwrap().rules.is_empty());
}
