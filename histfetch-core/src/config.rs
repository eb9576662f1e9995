//! Run configuration (TOML) and credentials (environment / token file).

use crate::domain::{DateFormat, Resolution, Subject, SubjectError};
use crate::error_log::DEFAULT_ERROR_LOG;
use crate::fetch::{FetchPlan, DEFAULT_CHUNK_DAYS};
use crate::fyers::{ClientConfig, DEFAULT_BASE_URL};
use crate::pacer::DEFAULT_PAUSE;
use crate::range::{trailing_span, DateRange, RangeError};
use chrono::{Months, NaiveDate};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const CLIENT_ID_VAR: &str = "FYERS_CLIENT_ID";
pub const ACCESS_TOKEN_VAR: &str = "FYERS_ACCESS_TOKEN";
pub const TOKEN_FILE_VAR: &str = "FYERS_TOKEN_FILE";
pub const SECRET_KEY_VAR: &str = "FYERS_SECRET_KEY";
pub const REDIRECT_URI_VAR: &str = "FYERS_REDIRECT_URI";

pub const DEFAULT_TOKEN_FILE: &str = "api/token/access_token";
pub const DEFAULT_OUTPUT_DIR: &str = "historical_data";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Subject(#[from] SubjectError),

    #[error(transparent)]
    Range(#[from] RangeError),

    #[error("FYERS_CLIENT_ID is not set")]
    MissingClientId,

    #[error("no access token: set FYERS_ACCESS_TOKEN or provide {} ({source})", .path.display())]
    MissingToken {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("access token file {} is empty", .0.display())]
    EmptyToken(PathBuf),
}

/// Settings for a history run. Every key is optional in the TOML file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    pub symbols: Vec<String>,
    pub resolution: Resolution,
    pub chunk_days: u32,
    /// Span length when `start` is not given.
    pub years: u32,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub output_dir: PathBuf,
    /// File name of the error log inside `output_dir`.
    pub error_log: String,
    pub pause_ms: u64,
    pub date_format: DateFormat,
    pub cont_flag: bool,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            symbols: Vec::new(),
            resolution: Resolution::default(),
            chunk_days: DEFAULT_CHUNK_DAYS,
            years: 10,
            start: None,
            end: None,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            error_log: DEFAULT_ERROR_LOG.to_string(),
            pause_ms: DEFAULT_PAUSE.as_millis() as u64,
            date_format: DateFormat::default(),
            cont_flag: true,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

impl FetchConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Resolve the overall span against `today`.
    ///
    /// Without `end` the span ends yesterday; without `start` it reaches back
    /// `years` calendar years from the end.
    pub fn span(&self, today: NaiveDate) -> Result<DateRange, ConfigError> {
        let span = match (self.start, self.end) {
            (Some(start), Some(end)) => DateRange::new(start, end)?,
            (Some(start), None) => DateRange::new(start, trailing_span(today, 0)?.end())?,
            (None, Some(end)) => {
                let start = self
                    .years
                    .checked_mul(12)
                    .and_then(|m| end.checked_sub_months(Months::new(m)))
                    .ok_or(RangeError::OutOfCalendar {
                        from: end,
                        years: self.years,
                    })?;
                DateRange::new(start, end)?
            }
            (None, None) => trailing_span(today, self.years)?,
        };
        Ok(span)
    }

    pub fn subjects(&self) -> Result<Vec<Subject>, ConfigError> {
        self.symbols
            .iter()
            .map(|s| Subject::new(s.as_str()).map_err(ConfigError::from))
            .collect()
    }

    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn error_log_path(&self) -> PathBuf {
        self.output_dir.join(&self.error_log)
    }

    /// Build the fetch plan for this configuration.
    pub fn plan(&self, today: NaiveDate, skip_existing: bool) -> Result<FetchPlan, ConfigError> {
        let mut plan = FetchPlan::new(self.subjects()?, self.span(today)?);
        plan.chunk_days = self.chunk_days;
        plan.resolution = self.resolution;
        plan.date_format = self.date_format;
        plan.cont_flag = self.cont_flag;
        plan.skip_existing = skip_existing;
        Ok(plan)
    }
}

/// API credentials. Supplied externally, never written by this crate.
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    access_token: String,
    pub secret_key: Option<String>,
    pub redirect_uri: Option<String>,
}

impl Credentials {
    /// Load `.env` (if present) and read credentials from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read credentials through `lookup`. The access token comes from
    /// `FYERS_ACCESS_TOKEN`, or else from the token file.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let client_id = non_empty(CLIENT_ID_VAR).ok_or(ConfigError::MissingClientId)?;
        let access_token = match non_empty(ACCESS_TOKEN_VAR) {
            Some(token) => token.trim().to_string(),
            None => {
                let path = PathBuf::from(
                    non_empty(TOKEN_FILE_VAR).unwrap_or_else(|| DEFAULT_TOKEN_FILE.to_string()),
                );
                read_token_file(&path)?
            }
        };

        Ok(Self {
            client_id: client_id.trim().to_string(),
            access_token,
            secret_key: non_empty(SECRET_KEY_VAR),
            redirect_uri: non_empty(REDIRECT_URI_VAR),
        })
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn client_config(&self, config: &FetchConfig) -> ClientConfig {
        ClientConfig::new(self.client_id.clone(), self.access_token.clone())
            .with_base_url(config.base_url.clone())
            .with_timeout(config.timeout())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("access_token", &"<redacted>")
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}

fn read_token_file(path: &Path) -> Result<String, ConfigError> {
    let token = fs::read_to_string(path).map_err(|source| ConfigError::MissingToken {
        path: path.to_path_buf(),
        source,
    })?;
    let token = token.trim();
    if token.is_empty() {
        return Err(ConfigError::EmptyToken(path.to_path_buf()));
    }
    Ok(token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn empty_file_gives_defaults() {
        let config = FetchConfig::from_toml_str("").unwrap();
        assert_eq!(config, FetchConfig::default());
        assert_eq!(config.pause(), Duration::from_secs(1));
        assert_eq!(config.error_log_path(), PathBuf::from("historical_data/error_log.txt"));
    }

    #[test]
    fn parses_full_file() {
        let config = FetchConfig::from_toml_str(
            r#"
            symbols = ["NSE:SBIN-EQ", "NSE:TCS-EQ"]
            resolution = "D"
            chunk_days = 366
            start = "2014-01-01"
            end = "2014-12-31"
            output_dir = "out"
            pause_ms = 250
            date_format = 0
            cont_flag = false
            "#,
        )
        .unwrap();
        assert_eq!(config.resolution, Resolution::Day);
        assert_eq!(config.date_format, DateFormat::Epoch);
        assert_eq!(config.subjects().unwrap().len(), 2);

        let plan = config.plan(date(2024, 1, 1), true).unwrap();
        assert_eq!(plan.chunk_days, 366);
        assert!(!plan.cont_flag);
        assert_eq!(plan.span.start(), date(2014, 1, 1));
        assert_eq!(plan.ranges().unwrap().len(), 1);
    }

    #[test]
    fn rejects_unknown_keys_and_bad_values() {
        assert!(FetchConfig::from_toml_str("chunk_size = 5").is_err());
        assert!(FetchConfig::from_toml_str("resolution = \"7\"").is_err());
        assert!(FetchConfig::from_toml_str("date_format = 2").is_err());
    }

    #[test]
    fn span_resolution() {
        let today = date(2024, 6, 15);
        let mut config = FetchConfig::default();
        assert_eq!(config.span(today).unwrap().start(), date(2014, 6, 14));

        config.years = 1;
        config.end = Some(date(2020, 2, 29));
        let span = config.span(today).unwrap();
        assert_eq!(span.start(), date(2019, 2, 28));

        config.end = None;
        config.start = Some(date(2024, 6, 1));
        assert_eq!(config.span(today).unwrap().end(), date(2024, 6, 14));

        config.start = Some(date(2025, 1, 1));
        assert!(config.span(today).is_err());
    }

    #[test]
    fn credentials_from_env_vars() {
        let vars: HashMap<&str, &str> = [
            (CLIENT_ID_VAR, "APP-100"),
            (ACCESS_TOKEN_VAR, " token \n"),
            (SECRET_KEY_VAR, "s3cret"),
        ]
        .into_iter()
        .collect();
        let creds = Credentials::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(creds.client_id, "APP-100");
        assert_eq!(creds.access_token(), "token");
        assert_eq!(creds.redirect_uri, None);

        let shown = format!("{creds:?}");
        assert!(!shown.contains("token\""));
        assert!(!shown.contains("s3cret"));
    }

    #[test]
    fn credentials_fall_back_to_token_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let token_path = temp_dir.path().join("access_token");
        fs::write(&token_path, "file-token\n").unwrap();
        let token_str = token_path.to_string_lossy().to_string();

        let creds = Credentials::from_lookup(|k| match k {
            CLIENT_ID_VAR => Some("APP-100".into()),
            TOKEN_FILE_VAR => Some(token_str.clone()),
            _ => None,
        })
        .unwrap();
        assert_eq!(creds.access_token(), "file-token");

        let missing = Credentials::from_lookup(|k| match k {
            CLIENT_ID_VAR => Some("APP-100".into()),
            TOKEN_FILE_VAR => Some(temp_dir.path().join("nope").to_string_lossy().to_string()),
            _ => None,
        });
        assert!(matches!(missing, Err(ConfigError::MissingToken { .. })));

        assert!(matches!(
            Credentials::from_lookup(|_| None),
            Err(ConfigError::MissingClientId)
        ));
    }
}
