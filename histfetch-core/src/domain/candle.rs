//! History payloads as returned by the candle endpoint.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Wire form of a candle: `[epoch, open, high, low, close, volume]`.
type CandleRow = (i64, f64, f64, f64, f64, f64);

/// One OHLCV candle. `timestamp` is epoch seconds at the candle open.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "CandleRow", into = "CandleRow")]
pub struct Candle {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl From<CandleRow> for Candle {
    fn from((timestamp, open, high, low, close, volume): CandleRow) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

impl From<Candle> for CandleRow {
    fn from(c: Candle) -> Self {
        (c.timestamp, c.open, c.high, c.low, c.close, c.volume)
    }
}

/// Successful history response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPayload {
    #[serde(rename = "s")]
    pub status: String,
    #[serde(default)]
    pub candles: Vec<Candle>,
}

impl HistoryPayload {
    pub fn ok(candles: Vec<Candle>) -> Self {
        Self {
            status: "ok".into(),
            candles,
        }
    }
}

/// How the request bounds are encoded (`date_format` query parameter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DateFormat {
    /// Epoch seconds (`0`).
    Epoch,
    /// `YYYY-MM-DD` (`1`).
    #[default]
    Calendar,
}

impl DateFormat {
    pub const fn flag(self) -> u8 {
        match self {
            Self::Epoch => 0,
            Self::Calendar => 1,
        }
    }
}

impl fmt::Display for DateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.flag())
    }
}

impl TryFrom<u8> for DateFormat {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Epoch),
            1 => Ok(Self::Calendar),
            other => Err(format!("date_format must be 0 or 1, got {other}")),
        }
    }
}

impl From<DateFormat> for u8 {
    fn from(value: DateFormat) -> Self {
        value.flag()
    }
}
