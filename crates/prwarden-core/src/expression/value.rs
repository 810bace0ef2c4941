//! Values produced by condition variables.

use serde::{Deserialize, Serialize};

/// A boolean whose value may not be known yet (e.g. mergeability that the
/// SCM is still computing).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriState {
    True,
    False,
    #[default]
    Unknown,
}

impl TriState {
    /// Plain boolean view: `Unknown` coerces to `false`.
    pub fn as_bool(self) -> bool {
        self == TriState::True
    }
}

impl From<bool> for TriState {
    fn from(value: bool) -> Self {
        if value {
            TriState::True
        } else {
            TriState::False
        }
    }
}

impl From<Option<bool>> for TriState {
    fn from(value: Option<bool>) -> Self {
        value.map(TriState::from).unwrap_or(TriState::Unknown)
    }
}

/// Declared type of a condition variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Boolean,
    Integer,
    Text,
    List,
    TriState,
}

impl ValueType {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueType::Boolean => "boolean",
            ValueType::Integer => "integer",
            ValueType::Text => "text",
            ValueType::List => "list",
            ValueType::TriState => "tri-state",
        }
    }
}

/// A value read from the evaluation context.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Text(String),
    List(Vec<String>),
    Tri(TriState),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Bool(_) => ValueType::Boolean,
            Value::Int(_) => ValueType::Integer,
            Value::Text(_) => ValueType::Text,
            Value::List(_) => ValueType::List,
            Value::Tri(_) => ValueType::TriState,
        }
    }

    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn count(n: usize) -> Self {
        Value::Int(i64::try_from(n).unwrap_or(i64::MAX))
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Text(s) => write!(f, "'{s}'"),
            Value::List(items) => {
                let quoted: Vec<String> = items.iter().map(|i| format!("'{i}'")).collect();
                write!(f, "[{}]", quoted.join(", "))
            }
            Value::Tri(TriState::True) => f.write_str("true"),
            Value::Tri(TriState::False) => f.write_str("false"),
            Value::Tri(TriState::Unknown) => f.write_str("unknown"),
        }
    }
}
