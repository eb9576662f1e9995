//! History provider trait and structured error types.
//!
//! The HistoryProvider trait abstracts over the remote data source so the fetch
//! loop can be driven by the Fyers client in production and by scripted
//! providers in tests.

use crate::domain::{DateFormat, HistoryPayload, Resolution, Subject};
use crate::range::DateRange;
use thiserror::Error;

/// Structured error types for provider calls.
///
/// Every variant renders to a single human-readable message, which is what
/// ends up in the error log.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("hard stop: provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// One history call: a symbol, a window and the fixed request parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRequest {
    pub symbol: Subject,
    pub range: DateRange,
    pub resolution: Resolution,
    pub date_format: DateFormat,
    /// Stitch continuous contracts across expiries.
    pub cont_flag: bool,
}

impl HistoryRequest {
    pub fn new(symbol: Subject, range: DateRange, resolution: Resolution) -> Self {
        Self {
            symbol,
            range,
            resolution,
            date_format: DateFormat::default(),
            cont_flag: true,
        }
    }
}

/// Trait for history data providers.
///
/// Implementations handle transport and response decoding. They never persist
/// anything; the fetch loop owns the artifact store and the error log.
pub trait HistoryProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch candles for one symbol over one date range.
    fn history(&self, request: &HistoryRequest) -> Result<HistoryPayload, FetchError>;
}
