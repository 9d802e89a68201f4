//! Labels and label selectors.
//!
//! A [`LabelSelector`] is the wire form found in manifests. Before it can
//! match anything it is compiled into a [`Selector`], which is where
//! malformed keys, values and operators are rejected.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Labels = BTreeMap<String, String>;

const MAX_NAME_LEN: usize = 63;
const MAX_PREFIX_LEN: usize = 253;

/// Selector as written in a manifest: all `match_labels` and all
/// `match_expressions` must hold.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct LabelSelector {
    #[serde(default)]
    pub match_labels: Labels,
    #[serde(default)]
    pub match_expressions: Vec<LabelSelectorRequirement>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LabelSelectorRequirement {
    pub key: String,
    /// One of `In`, `NotIn`, `Exists`, `DoesNotExist`
    pub operator: String,
    #[serde(default)]
    pub values: Vec<String>,
}

#[derive(Debug, Error, PartialEq)]
pub enum SelectorError {
    #[error("invalid label key {0:?}")]
    InvalidKey(String),
    #[error("invalid value {value:?} for label key {key:?}")]
    InvalidValue { key: String, value: String },
    #[error("unknown operator {0:?}")]
    UnknownOperator(String),
    #[error("operator {operator} on key {key:?} requires at least one value")]
    MissingValues { key: String, operator: Operator },
    #[error("operator {operator} on key {key:?} does not take values")]
    UnexpectedValues { key: String, operator: Operator },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    In,
    NotIn,
    Exists,
    DoesNotExist,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::In => write!(f, "In"),
            Operator::NotIn => write!(f, "NotIn"),
            Operator::Exists => write!(f, "Exists"),
            Operator::DoesNotExist => write!(f, "DoesNotExist"),
        }
    }
}

impl FromStr for Operator {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "In" => Ok(Operator::In),
            "NotIn" => Ok(Operator::NotIn),
            "Exists" => Ok(Operator::Exists),
            "DoesNotExist" => Ok(Operator::DoesNotExist),
            other => Err(SelectorError::UnknownOperator(other.to_string())),
        }
    }
}

/// A single compiled requirement on one label key.
#[derive(Debug, Clone, PartialEq)]
pub struct Requirement {
    key: String,
    operator: Operator,
    values: BTreeSet<String>,
}

impl Requirement {
    pub fn new(key: &str, operator: Operator, values: &[String]) -> Result<Self, SelectorError> {
        validate_key(key)?;
        match operator {
            Operator::In | Operator::NotIn if values.is_empty() => {
                return Err(SelectorError::MissingValues {
                    key: key.to_string(),
                    operator,
                });
            }
            Operator::Exists | Operator::DoesNotExist if !values.is_empty() => {
                return Err(SelectorError::UnexpectedValues {
                    key: key.to_string(),
                    operator,
                });
            }
            _ => {}
        }
        for value in values {
            validate_value(key, value)?;
        }
        Ok(Self {
            key: key.to_string(),
            operator,
            values: values.iter().cloned().collect(),
        })
    }

    pub fn matches(&self, labels: &Labels) -> bool {
        let value = labels.get(&self.key);
        match self.operator {
            Operator::In => value.is_some_and(|v| self.values.contains(v)),
            // a missing key satisfies NotIn
            Operator::NotIn => value.is_none_or(|v| !self.values.contains(v)),
            Operator::Exists => value.is_some(),
            Operator::DoesNotExist => value.is_none(),
        }
    }
}

/// Compiled selector.
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// Selects no object at all, result of an absent selector
    Nothing,
    /// Every requirement must match; no requirements selects everything
    Requirements(Vec<Requirement>),
}

impl Selector {
    /// Compiles an optional manifest selector, `None` selects nothing.
    pub fn from_label_selector(selector: Option<&LabelSelector>) -> Result<Self, SelectorError> {
        match selector {
            Some(selector) => selector.compile(),
            None => Ok(Selector::Nothing),
        }
    }

    pub fn matches(&self, labels: &Labels) -> bool {
        match self {
            Selector::Nothing => false,
            Selector::Requirements(reqs) => reqs.iter().all(|r| r.matches(labels)),
        }
    }
}

impl LabelSelector {
    pub fn compile(&self) -> Result<Selector, SelectorError> {
        let mut requirements =
            Vec::with_capacity(self.match_labels.len() + self.match_expressions.len());
        for (key, value) in &self.match_labels {
            requirements.push(Requirement::new(
                key,
                Operator::In,
                std::slice::from_ref(value),
            )?);
        }
        for expr in &self.match_expressions {
            let operator = expr.operator.parse::<Operator>()?;
            requirements.push(Requirement::new(&expr.key, operator, &expr.values)?);
        }
        Ok(Selector::Requirements(requirements))
    }
}

/// True when every `key=value` of `required` is present in `labels`.
pub fn labels_match(required: &Labels, labels: &Labels) -> bool {
    required
        .iter()
        .all(|(k, v)| labels.get(k).is_some_and(|lv| lv == v))
}

fn validate_key(key: &str) -> Result<(), SelectorError> {
    let invalid = || SelectorError::InvalidKey(key.to_string());
    let (prefix, name) = match key.split_once('/') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, key),
    };
    if let Some(prefix) = prefix {
        let prefix_ok = !prefix.is_empty()
            && prefix.len() <= MAX_PREFIX_LEN
            && prefix.split('.').all(|part| {
                !part.is_empty()
                    && part
                        .chars()
                        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
                    && !part.starts_with('-')
                    && !part.ends_with('-')
            });
        if !prefix_ok {
            return Err(invalid());
        }
    }
    if name.is_empty() || !is_label_name(name) {
        return Err(invalid());
    }
    Ok(())
}

fn validate_value(key: &str, value: &str) -> Result<(), SelectorError> {
    if value.is_empty() || is_label_name(value) {
        Ok(())
    } else {
        Err(SelectorError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}

/// `[A-Za-z0-9]([-A-Za-z0-9_.]*[A-Za-z0-9])?`, at most 63 characters.
fn is_label_name(s: &str) -> bool {
    let bytes = s.as_bytes();
    let (Some(first), Some(last)) = (bytes.first(), bytes.last()) else {
        return false;
    };
    s.len() <= MAX_NAME_LEN
        && first.is_ascii_alphanumeric()
        && last.is_ascii_alphanumeric()
        && bytes
            .iter()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}
