//! Trading symbols (the subject of a history request).

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubjectError {
    #[error("symbol is empty")]
    Empty,

    #[error("symbol '{0}' contains whitespace, commas or brackets")]
    InvalidCharacters(String),
}

/// Exchange-qualified symbol such as `NSE:SBIN-EQ`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Subject(String);

/// Exchange whose prefix is dropped from file labels.
const HOME_EXCHANGE: &str = "NSE";

impl Subject {
    pub fn new(symbol: impl Into<String>) -> Result<Self, SubjectError> {
        let symbol = symbol.into().trim().to_string();
        if symbol.is_empty() {
            return Err(SubjectError::Empty);
        }
        if symbol
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, ',' | '[' | ']'))
        {
            return Err(SubjectError::InvalidCharacters(symbol));
        }
        Ok(Self(symbol))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File-name-safe label: `NSE:SBIN-EQ` -> `SBIN`, `BSE:SBIN-EQ` -> `BSE_SBIN`.
    pub fn file_label(&self) -> String {
        let (exchange, bare) = match self.0.split_once(':') {
            Some((exchange, bare)) => (Some(exchange), bare),
            None => (None, self.0.as_str()),
        };
        let bare = bare.strip_suffix("-EQ").unwrap_or(bare);
        let label = match exchange {
            Some(exchange) if !exchange.eq_ignore_ascii_case(HOME_EXCHANGE) => {
                format!("{exchange}_{bare}")
            }
            _ => bare.to_string(),
        };
        label
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Subject {
    type Error = SubjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Subject> for String {
    fn from(value: Subject) -> Self {
        value.0
    }
}
