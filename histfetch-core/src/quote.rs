//! Market quote request and response types.

use crate::domain::Subject;
use crate::provider::FetchError;
use serde::{Deserialize, Serialize};

/// Maximum symbols the quotes endpoint accepts per call.
pub const MAX_QUOTE_SYMBOLS: usize = 50;

/// Validated batch of symbols for one quotes call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteRequest {
    symbols: Vec<Subject>,
}

impl QuoteRequest {
    pub fn new(symbols: Vec<Subject>) -> Result<Self, FetchError> {
        if symbols.is_empty() {
            return Err(FetchError::InvalidRequest(
                "at least one symbol is required".into(),
            ));
        }
        if symbols.len() > MAX_QUOTE_SYMBOLS {
            return Err(FetchError::InvalidRequest(format!(
                "{} symbols requested, at most {MAX_QUOTE_SYMBOLS} allowed",
                symbols.len()
            )));
        }
        Ok(Self { symbols })
    }

    /// Comma-joined form used in the `symbols` query parameter.
    pub fn joined(&self) -> String {
        self.symbols
            .iter()
            .map(Subject::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Quote for one symbol. `status` is `"ok"` or `"error"` per symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRecord {
    #[serde(rename = "n")]
    pub symbol: String,
    #[serde(rename = "s")]
    pub status: String,
    #[serde(rename = "v", default)]
    pub values: QuoteValues,
}

impl QuoteRecord {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuoteValues {
    /// Last traded price.
    pub lp: Option<f64>,
    /// Change from previous close.
    pub ch: Option<f64>,
    /// Change percent.
    pub chp: Option<f64>,
    pub open_price: Option<f64>,
    pub high_price: Option<f64>,
    pub low_price: Option<f64>,
    pub prev_close_price: Option<f64>,
    pub volume: Option<f64>,
    pub errmsg: Option<String>,
}
