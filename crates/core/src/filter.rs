//! Filter schema: the closed operator set, scalar/list value typing rules,
//! and validation against the caller-supplied field vocabulary.
//!
//! Everything downstream (synthesis, compilation) builds on these types.
//! Validation never coerces: a wrong arity or an unlisted key is an error,
//! not a silent fix-up.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    NotEqual,
    GreaterEqual,
    GreaterThan,
    LessEqual,
    LessThan,
    Between,
    In,
    StartsWith,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::NotEqual => "not_equal",
            Self::GreaterEqual => "greater_equal",
            Self::GreaterThan => "greater_than",
            Self::LessEqual => "less_equal",
            Self::LessThan => "less_than",
            Self::Between => "between",
            Self::In => "in",
            Self::StartsWith => "starts_with",
        }
    }

    /// Operators whose value must be an ordered list rather than one scalar.
    pub fn takes_list(&self) -> bool {
        matches!(self, Self::Between | Self::In)
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single filter value atom. Integers are tried before floats so that
/// `10` stays `10` and never becomes `10.0` in the compiled criteria.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer(value) => write!(f, "{value}"),
            // A whole float keeps its decimal point: `10.0` renders as
            // `10.0`, not `10`, so the compiled text mirrors the wire value.
            Self::Float(value) if value.is_finite() && value.fract() == 0.0 => {
                write!(f, "{value:.1}")
            }
            Self::Float(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "{value}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueNode {
    One(Scalar),
    Many(Vec<Scalar>),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterValue {
    pub operator: Operator,
    pub value: ValueNode,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub key: String,
    pub value: FilterValue,
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum FilterError {
    #[error("filter key must not be empty")]
    EmptyKey,
    #[error("field `{key}` is not present in the supplied field list")]
    UnknownField { key: String },
    #[error("operator `{operator}` on `{key}` requires a single scalar value, got a list")]
    ExpectedScalar { key: String, operator: Operator },
    #[error("operator `{operator}` on `{key}` requires a list of values, got a scalar")]
    ExpectedList { key: String, operator: Operator },
    #[error("operator `between` on `{key}` requires exactly two bounds, got {got}")]
    BetweenArity { key: String, got: usize },
    #[error("operator `in` on `{key}` requires a non-empty list of values")]
    EmptyInList { key: String },
    #[error("filter entry {index} is malformed: {detail}")]
    Malformed { index: usize, detail: String },
}

impl FilterValue {
    pub fn validate(&self, key: &str) -> Result<(), FilterError> {
        match (&self.operator, &self.value) {
            (Operator::Between, ValueNode::Many(bounds)) => {
                if bounds.len() == 2 {
                    Ok(())
                } else {
                    Err(FilterError::BetweenArity { key: key.to_string(), got: bounds.len() })
                }
            }
            (Operator::Between, ValueNode::One(_)) => {
                Err(FilterError::BetweenArity { key: key.to_string(), got: 1 })
            }
            (Operator::In, ValueNode::Many(values)) => {
                if values.is_empty() {
                    Err(FilterError::EmptyInList { key: key.to_string() })
                } else {
                    Ok(())
                }
            }
            (Operator::In, ValueNode::One(_)) => {
                Err(FilterError::ExpectedList { key: key.to_string(), operator: Operator::In })
            }
            (operator, ValueNode::Many(_)) => {
                Err(FilterError::ExpectedScalar { key: key.to_string(), operator: *operator })
            }
            (_, ValueNode::One(_)) => Ok(()),
        }
    }
}

impl Filter {
    /// Full schema check: non-empty key, vocabulary membership, value arity.
    pub fn validate(&self, vocabulary: &FieldVocabulary) -> Result<(), FilterError> {
        if self.key.trim().is_empty() {
            return Err(FilterError::EmptyKey);
        }
        if !vocabulary.contains(&self.key) {
            return Err(FilterError::UnknownField { key: self.key.clone() });
        }
        self.value.validate(&self.key)
    }
}

/// The set of field names a filter may legally reference for one request.
///
/// Derived from descriptor hints: each hint names its field in the leading
/// token, terminated by `:` or whitespace. Membership is exact; the model
/// is instructed to copy API names verbatim, so looser matching here would
/// only hide drift between prompt and validation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldVocabulary {
    names: BTreeSet<String>,
}

impl FieldVocabulary {
    pub fn from_hints<I, S>(hints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = hints
            .into_iter()
            .filter_map(|hint| leading_field_name(hint.as_ref()))
            .collect::<BTreeSet<_>>();
        Self { names }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.names.contains(key)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

fn leading_field_name(hint: &str) -> Option<String> {
    let token = hint
        .trim_start()
        .split(|ch: char| ch == ':' || ch.is_whitespace())
        .next()
        .unwrap_or_default()
        .trim();
    (!token.is_empty()).then(|| token.to_string())
}
