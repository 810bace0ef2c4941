//! Expression tree.

use std::collections::BTreeSet;

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Match,
}

impl CompareOp {
    pub fn as_str(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Match => "~=",
        }
    }
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Text(String),
    Integer(i64),
    Decimal(f64),
    Bool(bool),
}

impl Literal {
    pub fn type_name(&self) -> &'static str {
        match self {
            Literal::Text(_) => "text",
            Literal::Integer(_) | Literal::Decimal(_) => "number",
            Literal::Bool(_) => "boolean",
        }
    }
}

/// `variable op value`. A bare identifier parses as `variable = true`.
#[derive(Debug, Clone)]
pub struct Comparison {
    pub variable: String,
    pub op: CompareOp,
    pub value: Literal,
    /// Compiled pattern for `~=`, anchored at the start of the value
    pub pattern: Option<Regex>,
    pub column: usize,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Or(Vec<Expr>),
    And(Vec<Expr>),
    Compare(Comparison),
}

impl Expr {
    /// Distinct variable keys referenced anywhere in the tree.
    pub fn variables(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Or(items) | Expr::And(items) => {
                for item in items {
                    item.collect_variables(out);
                }
            }
            Expr::Compare(cmp) => {
                out.insert(cmp.variable.clone());
            }
        }
    }
}
