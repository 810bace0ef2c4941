//! Comparison semantics between a variable's value and a literal.

use std::cmp::Ordering;

use regex::Regex;

use super::ast::{CompareOp, Literal};
use super::value::Value;
use crate::error::EvaluationError;

fn unsupported(op: CompareOp, left: &Value, right: &Literal) -> EvaluationError {
    EvaluationError::UnsupportedComparison {
        op: op.as_str(),
        left: left.value_type().as_str(),
        right: right.type_name(),
    }
}

fn ordering_holds(op: CompareOp, ordering: Ordering) -> bool {
    match op {
        CompareOp::Eq => ordering == Ordering::Equal,
        CompareOp::Ne => ordering != Ordering::Equal,
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::Le => ordering != Ordering::Greater,
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::Ge => ordering != Ordering::Less,
        CompareOp::Match => false,
    }
}

fn compare_numbers(op: CompareOp, left: i64, right: &Literal) -> Option<bool> {
    let ordering = match right {
        Literal::Integer(r) => left.cmp(r),
        Literal::Decimal(r) => (left as f64).partial_cmp(r)?,
        _ => return None,
    };
    Some(ordering_holds(op, ordering))
}

fn compare_bools(op: CompareOp, left: bool, right: bool) -> Option<bool> {
    match op {
        CompareOp::Eq => Some(left == right),
        CompareOp::Ne => Some(left != right),
        _ => None,
    }
}

/// Apply `op` to `left` and `right`.
///
/// * list vs integer: every operator compares the list length
/// * list vs text: `=`/`!=` test membership, `~=` matches any element
/// * tri-state: `unknown` coerces to `false`, then compares as boolean
/// * otherwise: direct comparison of same-typed values
pub fn compare(
    left: &Value,
    op: CompareOp,
    right: &Literal,
    pattern: Option<&Regex>,
) -> Result<bool, EvaluationError> {
    let outcome = match (left, right) {
        (Value::List(items), Literal::Integer(_)) if op != CompareOp::Match => {
            compare_numbers(op, i64::try_from(items.len()).unwrap_or(i64::MAX), right)
        }
        (Value::List(items), Literal::Text(needle)) => match op {
            CompareOp::Eq => Some(items.iter().any(|i| i == needle)),
            CompareOp::Ne => Some(!items.iter().any(|i| i == needle)),
            CompareOp::Match => pattern.map(|p| items.iter().any(|i| p.is_match(i))),
            _ => None,
        },
        (Value::Tri(state), Literal::Bool(b)) => compare_bools(op, state.as_bool(), *b),
        (Value::Bool(v), Literal::Bool(b)) => compare_bools(op, *v, *b),
        (Value::Int(v), Literal::Integer(_) | Literal::Decimal(_)) if op != CompareOp::Match => {
            compare_numbers(op, *v, right)
        }
        (Value::Text(v), Literal::Text(r)) => match op {
            CompareOp::Match => pattern.map(|p| p.is_match(v)),
            _ => Some(ordering_holds(op, v.as_str().cmp(r.as_str()))),
        },
        _ => None,
    };
    outcome.ok_or_else(|| unsupported(op, left, right))
}
