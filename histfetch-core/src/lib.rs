//! histfetch core: chunked historical candle downloads.
//!
//! This crate contains:
//! - Calendar date ranges and the fixed-size range partitioner
//! - The history provider trait and the Fyers API v3 client
//! - Sequential fetch-and-persist loop with an append-only error log
//! - Per-range JSON artifact store and CSV consolidation
//! - Run configuration and credential loading

pub mod circuit_breaker;
pub mod config;
pub mod consolidate;
pub mod domain;
pub mod error_log;
pub mod fetch;
pub mod fyers;
pub mod pacer;
pub mod provider;
pub mod quote;
pub mod range;
pub mod store;

pub use circuit_breaker::CircuitBreaker;
pub use config::{ConfigError, Credentials, FetchConfig};
pub use domain::{Candle, DateFormat, HistoryPayload, Resolution, Subject};
pub use error_log::{ErrorLog, ErrorLogEntry};
pub use fetch::{FetchPlan, FetchProgress, Fetcher, LogProgress, RangeOutcome, RunError, RunSummary};
pub use fyers::{ClientConfig, FyersClient};
pub use pacer::{FixedDelay, NoDelay, Pacer};
pub use provider::{FetchError, HistoryProvider, HistoryRequest};
pub use range::{partition, DateRange, RangeError};
pub use store::ArtifactStore;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: the provider seam stays usable from worker threads.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<FyersClient>();
        require_sync::<FyersClient>();
        require_send::<CircuitBreaker>();
        require_sync::<CircuitBreaker>();
        require_send::<HistoryRequest>();
        require_sync::<HistoryRequest>();
        require_send::<RunSummary>();
        require_sync::<RunSummary>();
    }
}
