//! Fyers API v3 data provider.
//!
//! Talks to the `data/history` and `data/quotes` REST endpoints with a
//! pre-issued access token. Login, token refresh and symbol master downloads
//! happen elsewhere; this client only consumes credentials.
//!
//! No retries are performed. A failed call surfaces as a `FetchError` and the
//! fetch loop decides what to do with it.

use crate::circuit_breaker::CircuitBreaker;
use crate::domain::{DateFormat, HistoryPayload};
use crate::provider::{FetchError, HistoryProvider, HistoryRequest};
use crate::quote::{QuoteRecord, QuoteRequest};
use chrono::{NaiveDate, NaiveTime};
use reqwest::header::{AUTHORIZATION, RETRY_AFTER};
use reqwest::StatusCode;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api-t1.fyers.in";

const HISTORY_PATH: &str = "/data/history";
const QUOTES_PATH: &str = "/data/quotes";

/// Error code the API returns for an expired or invalid token.
const AUTH_ERROR_CODE: i64 = -16;

/// Seconds from midnight to the last one-minute candle of a day (23:59).
const LAST_MINUTE_OFFSET: i64 = 24 * 60 * 60 - 60;

/// Immutable connection settings, passed in once at construction.
#[derive(Clone)]
pub struct ClientConfig {
    pub client_id: String,
    pub access_token: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(client_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            access_token: access_token.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `Authorization` header value: `{client_id}:{access_token}`.
    fn auth_header(&self) -> String {
        format!("{}:{}", self.client_id, self.access_token)
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("client_id", &self.client_id)
            .field("access_token", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Status fields present on every response body.
#[derive(Debug, Deserialize)]
struct ApiStatus {
    s: String,
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QuotesBody {
    #[serde(default)]
    d: Vec<QuoteRecord>,
}

pub struct FyersClient {
    client: reqwest::blocking::Client,
    config: ClientConfig,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl FyersClient {
    pub fn new(config: ClientConfig, circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("histfetch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::NetworkUnreachable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            circuit_breaker,
        })
    }

    /// Fetch quotes for a batch of symbols.
    pub fn quotes(&self, request: &QuoteRequest) -> Result<Vec<QuoteRecord>, FetchError> {
        let body = self.get(QUOTES_PATH, &[("symbols", request.joined())])?;
        parse_quotes(&body)
    }

    /// Issue one GET and map transport and HTTP-level failures.
    fn get(&self, path: &str, params: &[(&'static str, String)]) -> Result<String, FetchError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(FetchError::CircuitBreakerTripped);
        }

        let url = format!("{}{path}", self.config.base_url.trim_end_matches('/'));
        debug!(%url, ?params, "GET");

        let resp = self
            .client
            .get(&url)
            .header(AUTHORIZATION, self.config.auth_header())
            .query(params)
            .send()
            .map_err(|e| FetchError::NetworkUnreachable(e.to_string()))?;

        let status = resp.status();

        if status == StatusCode::FORBIDDEN {
            self.circuit_breaker.trip();
            return Err(FetchError::CircuitBreakerTripped);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            self.circuit_breaker.record_failure();
            let retry_after_secs = resp
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(FetchError::RateLimited { retry_after_secs });
        }

        let body = resp
            .text()
            .map_err(|e| FetchError::NetworkUnreachable(format!("failed to read body: {e}")))?;

        if status == StatusCode::UNAUTHORIZED {
            let message = match check_status(&body) {
                Err(
                    FetchError::AuthenticationRequired(m) | FetchError::Api { message: m, .. },
                ) if !m.is_empty() => m,
                _ => format!("HTTP {status}"),
            };
            return Err(FetchError::AuthenticationRequired(message));
        }

        // Other statuses never count against the breaker.
        if !status.is_success() {
            // The body usually carries a more precise API error than the status.
            return Err(match check_status(&body) {
                Err(e @ (FetchError::Api { .. } | FetchError::AuthenticationRequired(_))) => e,
                _ => FetchError::Api {
                    code: i64::from(status.as_u16()),
                    message: format!("HTTP {status}"),
                },
            });
        }

        self.circuit_breaker.record_success();
        Ok(body)
    }
}

impl HistoryProvider for FyersClient {
    fn name(&self) -> &str {
        "fyers"
    }

    fn history(&self, request: &HistoryRequest) -> Result<HistoryPayload, FetchError> {
        let body = self.get(HISTORY_PATH, &history_params(request))?;
        parse_history(&body)
    }
}

/// Query parameters for a history call.
///
/// Calendar bounds are sent as `YYYY-MM-DD`; epoch bounds span from 00:00 UTC
/// of the first day to 23:59 UTC of the last day.
pub(crate) fn history_params(request: &HistoryRequest) -> Vec<(&'static str, String)> {
    let (range_from, range_to) = match request.date_format {
        DateFormat::Calendar => (
            request.range.start().format("%Y-%m-%d").to_string(),
            request.range.end().format("%Y-%m-%d").to_string(),
        ),
        DateFormat::Epoch => (
            midnight_utc(request.range.start()).to_string(),
            (midnight_utc(request.range.end()) + LAST_MINUTE_OFFSET).to_string(),
        ),
    };

    vec![
        ("symbol", request.symbol.as_str().to_string()),
        ("resolution", request.resolution.code().to_string()),
        ("date_format", request.date_format.to_string()),
        ("range_from", range_from),
        ("range_to", range_to),
        ("cont_flag", if request.cont_flag { "1" } else { "0" }.to_string()),
    ]
}

fn midnight_utc(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::default()).and_utc().timestamp()
}

/// Map the `s`/`code`/`message` envelope to `Ok(())` or a typed error.
fn check_status(body: &str) -> Result<(), FetchError> {
    let status: ApiStatus = serde_json::from_str(body)
        .map_err(|e| FetchError::ResponseFormatChanged(format!("undecodable response: {e}")))?;

    if status.s == "ok" {
        return Ok(());
    }

    let message = status.message.unwrap_or_default();
    let code = status.code.unwrap_or_default();
    if code == AUTH_ERROR_CODE || message.to_ascii_lowercase().contains("authenticate") {
        return Err(FetchError::AuthenticationRequired(message));
    }
    Err(FetchError::Api { code, message })
}

pub(crate) fn parse_history(body: &str) -> Result<HistoryPayload, FetchError> {
    check_status(body)?;
    serde_json::from_str(body)
        .map_err(|e| FetchError::ResponseFormatChanged(format!("bad candle payload: {e}")))
}

pub(crate) fn parse_quotes(body: &str) -> Result<Vec<QuoteRecord>, FetchError> {
    check_status(body)?;
    let parsed: QuotesBody = serde_json::from_str(body)
        .map_err(|e| FetchError::ResponseFormatChanged(format!("bad quotes payload: {e}")))?;
    Ok(parsed.d)
}
