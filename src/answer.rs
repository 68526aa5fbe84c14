//! Answer values
//!
//! The opaque scalar-or-list value that rules compare against recorded
//! answers. Integer and decimal numbers compare numerically with each other;
//! every other pairing is compared structurally.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Bool(bool),
    Integer(i64),
    Decimal(f64),
    Text(String),
    List(Vec<AnswerValue>),
}

impl AnswerValue {
    /// Wrap a scalar into a one-element list. Lists are returned unchanged.
    pub fn into_list(self) -> AnswerValue {
        match self {
            AnswerValue::List(_) => self,
            scalar => AnswerValue::List(vec![scalar]),
        }
    }

    /// Whether `value` is one of the elements of this answer. A scalar answer
    /// is treated as a one-element list.
    pub fn contains(&self, value: &AnswerValue) -> bool {
        match self {
            AnswerValue::List(items) => items.iter().any(|item| item == value),
            scalar => scalar == value,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            AnswerValue::Integer(i) => Some(*i as f64),
            AnswerValue::Decimal(d) => Some(*d),
            _ => None,
        }
    }
}

impl PartialEq for AnswerValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (AnswerValue::Bool(a), AnswerValue::Bool(b)) => a == b,
            (AnswerValue::Integer(a), AnswerValue::Integer(b)) => a == b,
            (AnswerValue::Text(a), AnswerValue::Text(b)) => a == b,
            (AnswerValue::List(a), AnswerValue::List(b)) => a == b,
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        }
    }
}

impl PartialOrd for AnswerValue {
    /// Numbers order numerically and text lexically. Anything else is
    /// unordered.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (AnswerValue::Integer(a), AnswerValue::Integer(b)) => Some(a.cmp(b)),
            (AnswerValue::Text(a), AnswerValue::Text(b)) => Some(a.cmp(b)),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.partial_cmp(&y),
                _ => None,
            },
        }
    }
}

impl From<bool> for AnswerValue {
    fn from(value: bool) -> Self {
        AnswerValue::Bool(value)
    }
}

impl From<i64> for AnswerValue {
    fn from(value: i64) -> Self {
        AnswerValue::Integer(value)
    }
}

impl From<f64> for AnswerValue {
    fn from(value: f64) -> Self {
        AnswerValue::Decimal(value)
    }
}

impl From<&str> for AnswerValue {
    fn from(value: &str) -> Self {
        AnswerValue::Text(value.to_string())
    }
}

impl From<String> for AnswerValue {
    fn from(value: String) -> Self {
        AnswerValue::Text(value)
    }
}

impl<T: Into<AnswerValue>> From<Vec<T>> for AnswerValue {
    fn from(values: Vec<T>) -> Self {
        AnswerValue::List(values.into_iter().map(Into::into).collect())
    }
}
