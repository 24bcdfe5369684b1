//! Composable repository filters.
//!
//! A [`Filter`] is a small predicate tree over a document's fields. It is
//! plain data, so a store can evaluate it in memory or translate it into its
//! native query language.

use std::cmp::Ordering;
use std::ops::Not;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::Document;

/// Predicate over document fields.
///
/// Field names may be dotted paths (`"address.city"`) to reach nested
/// records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Filter {
    /// Matches every document
    #[default]
    All,
    /// Field equals value; `null` also matches a missing field
    Eq {
        /// Field path
        field: String,
        /// Expected value
        value: Value,
    },
    /// Field differs from value
    Ne {
        /// Field path
        field: String,
        /// Rejected value
        value: Value,
    },
    /// Field is greater than value
    Gt {
        /// Field path
        field: String,
        /// Bound
        value: Value,
    },
    /// Field is greater than or equal to value
    Gte {
        /// Field path
        field: String,
        /// Bound
        value: Value,
    },
    /// Field is less than value
    Lt {
        /// Field path
        field: String,
        /// Bound
        value: Value,
    },
    /// Field is less than or equal to value
    Lte {
        /// Field path
        field: String,
        /// Bound
        value: Value,
    },
    /// Field equals one of the values
    In {
        /// Field path
        field: String,
        /// Accepted values
        values: Vec<Value>,
    },
    /// String field contains the substring
    Contains {
        /// Field path
        field: String,
        /// Substring to look for
        substring: String,
    },
    /// Field is present
    Exists {
        /// Field path
        field: String,
    },
    /// Every sub-filter matches
    And {
        /// Sub-filters
        filters: Vec<Filter>,
    },
    /// At least one sub-filter matches
    Or {
        /// Sub-filters
        filters: Vec<Filter>,
    },
    /// The sub-filter does not match
    Not {
        /// Negated filter
        filter: Box<Filter>,
    },
}

impl Filter {
    /// Filter matching every document.
    #[must_use]
    pub const fn all() -> Self {
        Self::All
    }

    /// Filter matching no document.
    #[must_use]
    pub fn none() -> Self {
        !Self::All
    }

    /// `field == value`.
    #[must_use]
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    /// `field != value`.
    #[must_use]
    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Ne {
            field: field.into(),
            value: value.into(),
        }
    }

    /// `field > value`.
    #[must_use]
    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Gt {
            field: field.into(),
            value: value.into(),
        }
    }

    /// `field >= value`.
    #[must_use]
    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Gte {
            field: field.into(),
            value: value.into(),
        }
    }

    /// `field < value`.
    #[must_use]
    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Lt {
            field: field.into(),
            value: value.into(),
        }
    }

    /// `field <= value`.
    #[must_use]
    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Lte {
            field: field.into(),
            value: value.into(),
        }
    }

    /// `field` is one of `values`.
    #[must_use]
    pub fn in_values<V: Into<Value>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// String `field` contains `substring`.
    #[must_use]
    pub fn contains(field: impl Into<String>, substring: impl Into<String>) -> Self {
        Self::Contains {
            field: field.into(),
            substring: substring.into(),
        }
    }

    /// `field` is present.
    #[must_use]
    pub fn exists(field: impl Into<String>) -> Self {
        Self::Exists { field: field.into() }
    }

    /// Both filters match.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        match self {
            Self::And { mut filters } => {
                filters.push(other);
                Self::And { filters }
            }
            first => Self::And {
                filters: vec![first, other],
            },
        }
    }

    /// Either filter matches.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        match self {
            Self::Or { mut filters } => {
                filters.push(other);
                Self::Or { filters }
            }
            first => Self::Or {
                filters: vec![first, other],
            },
        }
    }

    /// Evaluate the filter against a document.
    #[must_use]
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Self::All => true,
            Self::Eq { field, value } => equals(lookup(doc, field), value),
            Self::Ne { field, value } => !equals(lookup(doc, field), value),
            Self::Gt { field, value } => compare(lookup(doc, field), value) == Some(Ordering::Greater),
            Self::Gte { field, value } => matches!(
                compare(lookup(doc, field), value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Self::Lt { field, value } => compare(lookup(doc, field), value) == Some(Ordering::Less),
            Self::Lte { field, value } => matches!(
                compare(lookup(doc, field), value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Self::In { field, values } => {
                let actual = lookup(doc, field);
                values.iter().any(|v| equals(actual, v))
            }
            Self::Contains { field, substring } => lookup(doc, field)
                .and_then(Value::as_str)
                .is_some_and(|s| s.contains(substring.as_str())),
            Self::Exists { field } => lookup(doc, field).is_some(),
            Self::And { filters } => filters.iter().all(|f| f.matches(doc)),
            Self::Or { filters } => filters.iter().any(|f| f.matches(doc)),
            Self::Not { filter } => !filter.matches(doc),
        }
    }
}

impl Not for Filter {
    type Output = Self;

    fn not(self) -> Self {
        match self {
            Self::Not { filter } => *filter,
            other => Self::Not {
                filter: Box::new(other),
            },
        }
    }
}

fn lookup<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = doc.get(segments.next()?)?;
    segments.try_fold(first, |value, segment| value.get(segment))
}

fn equals(actual: Option<&Value>, expected: &Value) -> bool {
    match (actual, expected) {
        (None | Some(Value::Null), Value::Null) => true,
        (None, _) => false,
        (Some(a), e) => compare(Some(a), e) == Some(Ordering::Equal) || a == e,
    }
}

fn compare(actual: Option<&Value>, expected: &Value) -> Option<Ordering> {
    match (actual?, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}
