//! Rule compiler: rule document → [`RuleRecord`]s.
//!
//! A rule that fails to compile is dropped with a [`CompileWarning`]; the
//! remaining rules still compile. Only a document that is not YAML, or not
//! shaped like `{rules: [...]}`, is rejected as a whole.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use prwarden_state::{
    ActionId, ActionRecord, ConditionRecord, RepositoryId, RuleId, RuleRecord, TriggerRecord,
};
use serde::Serialize;
use tracing::{debug, warn};

use crate::document::{find_line, parse_document, RuleBody};
use crate::error::CompileError;
use crate::registry::Registry;

/// A rule dropped during compilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompileWarning {
    /// Title of the dropped rule, when it had one
    pub rule: Option<String>,
    /// 1-based line in the document
    pub line: Option<usize>,
    pub message: String,
}

impl std::fmt::Display for CompileWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(line) = self.line {
            write!(f, "line {}: ", line)?;
        }
        match &self.rule {
            Some(rule) => write!(f, "rule '{}' dropped: {}", rule, self.message),
            None => write!(f, "rule dropped: {}", self.message),
        }
    }
}

/// Output of [`compile_rules`].
#[derive(Debug, Clone, Default)]
pub struct CompiledRules {
    pub rules: Vec<RuleRecord>,
    pub warnings: Vec<CompileWarning>,
}

/// Slug of a rule title: lowercase alphanumerics (any script) with runs of
/// anything else collapsed to `-`. May be empty.
pub fn check_key(title: &str) -> String {
    let mut key = String::with_capacity(title.len());
    let mut pending_dash = false;
    for c in title.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !key.is_empty() {
                key.push('-');
            }
            pending_dash = false;
            key.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    key
}

/// Check key for the rule at `order`, distinct from every key in `taken`.
/// An empty slug falls back to `rule-{order}`; a taken key gets a `-{n}`
/// suffix starting at 2.
fn unique_check_key(title: &str, order: u32, taken: &BTreeSet<String>) -> String {
    let mut base = check_key(title);
    if base.is_empty() {
        base = format!("rule-{}", order);
    }
    if !taken.contains(&base) {
        return base;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}-{}", base, n);
        if !taken.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Compile a rule document for `repository`.
pub fn compile_rules(
    source: &str,
    repository: &RepositoryId,
    registry: &Registry,
) -> Result<CompiledRules, CompileError> {
    let blocks = parse_document(source)?;
    let mut out = CompiledRules::default();
    let mut keys = BTreeSet::new();

    for block in blocks {
        let title = match block.title {
            Some(title) => title,
            None => {
                let message = match block.body {
                    Err(message) => message,
                    Ok(_) => "rule has no name".to_string(),
                };
                out.warnings.push(CompileWarning {
                    rule: None,
                    line: None,
                    message: format!("rule #{}: {}", block.index + 1, message),
                });
                continue;
            }
        };
        let line = find_line(source, &format!("{}:", title));
        let drop_rule = |message: String, line: Option<usize>| CompileWarning {
            rule: Some(title.clone()),
            line,
            message,
        };

        let body = match block.body {
            Ok(body) => body,
            Err(message) => {
                out.warnings.push(drop_rule(message, line));
                continue;
            }
        };

        let order = out.rules.len() as u32;
        let key = unique_check_key(&title, order, &keys);
        match compile_rule(source, repository, registry, &title, &key, body, order) {
            Ok(rule) => {
                debug!(
                    rule = %rule.title,
                    check = %rule.check_key,
                    order,
                    conditions = rule.conditions.len(),
                    actions = rule.actions.len(),
                    "rule compiled"
                );
                keys.insert(key);
                out.rules.push(rule);
            }
            Err((message, at)) => out.warnings.push(drop_rule(message, at.or(line))),
        }
    }

    for warning in &out.warnings {
        warn!(repository = %repository, warning = %warning, "rule dropped");
    }
    Ok(out)
}

type RuleFailure = (String, Option<usize>);

fn compile_rule(
    source: &str,
    repository: &RepositoryId,
    registry: &Registry,
    title: &str,
    check_key: &str,
    body: RuleBody,
    order: u32,
) -> Result<RuleRecord, RuleFailure> {
    let mut conditions = Vec::new();
    let mut variables: BTreeSet<String> = BTreeSet::new();

    for entry in &body.conditions {
        let text = entry.expression();
        let parsed = registry
            .parse_expression(text)
            .map_err(|e| (format!("condition '{}': {}", text, e), find_line(source, text)))?;
        variables.extend(parsed.variables().iter().cloned());
        conditions.push(ConditionRecord {
            expression: text.to_string(),
            description: entry.description().map(str::to_string),
            order: conditions.len() as u32,
            implied: false,
        });
    }

    let mut actions = Vec::new();
    for entry in body.actions {
        let spec = entry.into_spec().map_err(|m| (m, None::<usize>))?;
        let action_type = registry.action(&spec.key).ok_or_else(|| {
            (
                format!("unknown action '{}'", spec.key),
                find_line(source, &spec.key),
            )
        })?;
        action_type
            .validate_parameters(&spec.parameters)
            .map_err(|m| (m, find_line(source, &spec.key)))?;

        for pre in &action_type.preconditions {
            if conditions.iter().any(|c| c.expression == *pre) {
                continue;
            }
            let parsed = registry.parse_expression(pre).map_err(|e| {
                (
                    format!("precondition '{}' of '{}': {}", pre, action_type.key, e),
                    None::<usize>,
                )
            })?;
            variables.extend(parsed.variables().iter().cloned());
            conditions.push(ConditionRecord {
                expression: pre.to_string(),
                description: Some(format!("Required by {}", action_type.label)),
                order: conditions.len() as u32,
                implied: true,
            });
        }

        actions.push(ActionRecord {
            action_id: ActionId::new(),
            key: action_type.key.to_string(),
            parameters: spec.parameters,
            description: spec.description,
            order: actions.len() as u32,
        });
    }

    let triggers = match body.triggers {
        Some(keys) => {
            let mut declared = BTreeMap::new();
            for key in keys {
                let trigger = registry.trigger(&key).ok_or_else(|| {
                    (format!("unknown trigger '{}'", key), find_line(source, &key))
                })?;
                declared.insert(trigger.key, trigger.label.to_string());
            }
            declared
                .into_iter()
                .map(|(key, description)| TriggerRecord {
                    key: key.to_string(),
                    description,
                })
                .collect()
        }
        None => infer_triggers(registry, &variables),
    };

    Ok(RuleRecord {
        rule_id: RuleId::new(),
        repository: repository.clone(),
        title: title.to_string(),
        check_key: check_key.to_string(),
        description: body.description,
        order,
        conditions,
        triggers,
        actions,
        created_at: Utc::now(),
    })
}

/// Union of the default triggers of `variables`, each described by the
/// variables that imply it.
fn infer_triggers(registry: &Registry, variables: &BTreeSet<String>) -> Vec<TriggerRecord> {
    let mut implied: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for key in variables {
        if let Some(variable) = registry.variable(key) {
            for trigger in &variable.default_triggers {
                implied.entry(*trigger).or_default().push(key.as_str());
            }
        }
    }
    implied
        .into_iter()
        .map(|(key, vars)| TriggerRecord {
            key: key.to_string(),
            description: format!("implied from {}", vars.join(", ")),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_key_slugs_titles() {
        assert_eq!(check_key("Auto merge"), "auto-merge");
        assert_eq!(check_key("  Needs  2 reviews!! "), "needs-2-reviews");
        assert_eq!(check_key("already-slugged"), "already-slugged");
        assert_eq!(check_key("???"), "");
        assert_eq!(check_key("自動マージ"), "自動マージ");
        assert_eq!(check_key("Über Regel"), "über-regel");
    }

    #[test]
    fn unique_check_key_avoids_taken_keys() {
        let mut taken = BTreeSet::new();
        assert_eq!(unique_check_key("Auto merge", 0, &taken), "auto-merge");
        taken.insert("auto-merge".to_string());
        assert_eq!(unique_check_key("auto-merge", 1, &taken), "auto-merge-2");
        taken.insert("auto-merge-2".to_string());
        assert_eq!(unique_check_key("AUTO MERGE", 2, &taken), "auto-merge-3");
        assert_eq!(unique_check_key("!!!", 3, &taken), "rule-3");
    }

    #[test]
    fn warning_display() {
        let w = CompileWarning {
            rule: Some("r".into()),
            line: Some(4),
            message: "unknown action 'x'".into(),
        };
        assert_eq!(w.to_string(), "line 4: rule 'r' dropped: unknown action 'x'");
    }
}
