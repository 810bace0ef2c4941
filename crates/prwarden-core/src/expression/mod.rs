//! Boolean condition language.
//!
//! Expressions compare context variables with literals, combined with
//! `AND`/`OR` and parentheses:
//!
//! ```text
//! number_reviewers>1 AND label='ready' AND (mergeable OR base=main)
//! ```

pub mod ast;
pub mod lexer;
pub mod operators;
pub mod parser;
pub mod value;

use std::collections::BTreeSet;

use crate::error::{EvaluationError, ExpressionError};
use ast::Expr;

pub use value::{TriState, Value, ValueType};

/// A parsed expression whose variables are known to exist.
#[derive(Debug, Clone)]
pub struct ParsedExpression {
    source: String,
    tree: Expr,
    variables: BTreeSet<String>,
}

impl ParsedExpression {
    /// Parse `source`, rejecting variables for which `is_known` returns false.
    pub fn parse(
        source: &str,
        is_known: impl Fn(&str) -> bool,
    ) -> Result<Self, ExpressionError> {
        let tree = parser::parse(source)?;
        let variables = tree.variables();
        if let Some(unknown) = variables.iter().find(|key| !is_known(key)) {
            return Err(ExpressionError::UnknownVariable {
                key: unknown.clone(),
            });
        }
        Ok(Self {
            source: source.to_string(),
            tree,
            variables,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Distinct variable keys referenced by the expression.
    pub fn variables(&self) -> &BTreeSet<String> {
        &self.variables
    }

    pub fn tree(&self) -> &Expr {
        &self.tree
    }

    /// Evaluate with `resolve` supplying variable values. `AND`/`OR`
    /// short-circuit left to right.
    pub fn evaluate(
        &self,
        resolve: &dyn Fn(&str) -> Option<Value>,
    ) -> Result<bool, EvaluationError> {
        eval(&self.tree, resolve)
    }
}

fn eval(expr: &Expr, resolve: &dyn Fn(&str) -> Option<Value>) -> Result<bool, EvaluationError> {
    match expr {
        Expr::Or(items) => {
            for item in items {
                if eval(item, resolve)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Expr::And(items) => {
            for item in items {
                if !eval(item, resolve)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Expr::Compare(cmp) => {
            let left = resolve(&cmp.variable).ok_or_else(|| EvaluationError::UnknownVariable {
                key: cmp.variable.clone(),
            })?;
            operators::compare(&left, cmp.op, &cmp.value, cmp.pattern.as_ref())
        }
    }
}
