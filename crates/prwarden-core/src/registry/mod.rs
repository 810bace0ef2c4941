//! Closed tables of condition variables, trigger types and action types.
//!
//! [`build_registry`] assembles the built-in tables once through explicit,
//! ordered registration. The resulting [`Registry`] is immutable and shared
//! behind an `Arc`.

pub mod actions;
pub mod triggers;
pub mod variables;

use std::collections::HashMap;

use tracing::warn;

use crate::context::EvaluationContext;
use crate::error::{EvaluationError, ExpressionError};
use crate::expression::{ParsedExpression, Value};

pub use actions::{ActionFault, ActionKind, ActionType, ParameterSpec};
pub use triggers::TriggerType;
pub use variables::ConditionVariableType;

/// Key-indexed tables, iterable in registration order.
#[derive(Debug, Default)]
pub struct Registry {
    variables: Vec<ConditionVariableType>,
    variable_index: HashMap<String, usize>,
    triggers: Vec<TriggerType>,
    trigger_index: HashMap<&'static str, usize>,
    actions: Vec<ActionType>,
    action_index: HashMap<&'static str, usize>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn variable(&self, key: &str) -> Option<&ConditionVariableType> {
        self.variable_index.get(key).map(|&i| &self.variables[i])
    }

    pub fn trigger(&self, key: &str) -> Option<&TriggerType> {
        self.trigger_index.get(key).map(|&i| &self.triggers[i])
    }

    pub fn action(&self, key: &str) -> Option<&ActionType> {
        self.action_index.get(key).map(|&i| &self.actions[i])
    }

    pub fn variables(&self) -> impl Iterator<Item = &ConditionVariableType> {
        self.variables.iter()
    }

    pub fn triggers(&self) -> impl Iterator<Item = &TriggerType> {
        self.triggers.iter()
    }

    pub fn actions(&self) -> impl Iterator<Item = &ActionType> {
        self.actions.iter()
    }

    /// Parse an expression against the registered variables.
    pub fn parse_expression(&self, source: &str) -> Result<ParsedExpression, ExpressionError> {
        ParsedExpression::parse(source, |key| self.variable_index.contains_key(key))
    }

    /// Value of a variable in `ctx`, `None` for unregistered keys.
    pub fn value_of(&self, key: &str, ctx: &EvaluationContext) -> Option<Value> {
        self.variable(key).map(|v| v.evaluate(ctx))
    }

    pub fn evaluate(
        &self,
        expression: &ParsedExpression,
        ctx: &EvaluationContext,
    ) -> Result<bool, EvaluationError> {
        expression.evaluate(&|key| self.value_of(key, ctx))
    }
}

/// Ordered registration; the first registration of a key wins.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    registry: Registry,
}

impl RegistryBuilder {
    pub fn register_variable(mut self, variable: ConditionVariableType) -> Self {
        let r = &mut self.registry;
        if r.variable_index.contains_key(&variable.key) {
            warn!(key = %variable.key, "duplicate variable registration ignored");
            return self;
        }
        r.variable_index.insert(variable.key.clone(), r.variables.len());
        r.variables.push(variable);
        self
    }

    pub fn register_trigger(mut self, trigger: TriggerType) -> Self {
        let r = &mut self.registry;
        if r.trigger_index.contains_key(trigger.key) {
            warn!(key = trigger.key, "duplicate trigger registration ignored");
            return self;
        }
        r.trigger_index.insert(trigger.key, r.triggers.len());
        r.triggers.push(trigger);
        self
    }

    pub fn register_action(mut self, action: ActionType) -> Self {
        let r = &mut self.registry;
        if r.action_index.contains_key(action.key) {
            warn!(key = action.key, "duplicate action registration ignored");
            return self;
        }
        r.action_index.insert(action.key, r.actions.len());
        r.actions.push(action);
        self
    }

    pub fn build(self) -> Registry {
        self.registry
    }
}

/// The built-in registry: every variable, trigger and action shipped with prwarden.
pub fn build_registry() -> Registry {
    let mut builder = Registry::builder();
    for trigger in triggers::builtin() {
        builder = builder.register_trigger(trigger);
    }
    for variable in variables::builtin() {
        builder = builder.register_variable(variable);
    }
    for action in actions::builtin() {
        builder = builder.register_action(action);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_keys_are_unique_and_resolvable() {
        let registry = build_registry();
        assert_eq!(registry.variables().count(), variables::builtin().len());
        assert_eq!(registry.triggers().count(), triggers::builtin().len());
        assert_eq!(registry.actions().count(), actions::builtin().len());
        assert!(registry.variable("status-success").is_some());
        assert!(registry.variable("review-changes_requested").is_some());
        assert!(registry.trigger("base_branch_updated").is_some());
        assert!(registry.action("merge_pull_request").is_some());
        assert!(registry.variable("nope").is_none());
    }

    #[test]
    fn default_triggers_reference_registered_triggers() {
        let registry = build_registry();
        for variable in registry.variables() {
            assert!(!variable.default_triggers.is_empty(), "{}", variable.key);
            for key in &variable.default_triggers {
                assert!(registry.trigger(key).is_some(), "{} -> {}", variable.key, key);
            }
        }
    }

    #[test]
    fn preconditions_parse() {
        let registry = build_registry();
        for action in registry.actions() {
            for pre in &action.preconditions {
                registry.parse_expression(pre).unwrap();
            }
        }
    }

    #[test]
    fn first_registration_wins() {
        let registry = Registry::builder()
            .register_trigger(TriggerType {
                key: "x",
                label: "first",
            })
            .register_trigger(TriggerType {
                key: "x",
                label: "second",
            })
            .build();
        assert_eq!(registry.trigger("x").unwrap().label, "first");
        assert_eq!(registry.triggers().count(), 1);
    }
}
