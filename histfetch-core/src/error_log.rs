//! Append-only log of failed ranges.
//!
//! One line per failure:
//!
//! ```text
//! 2024-06-15 09:30:01: Error in range 2014-01-01 to 2014-04-10 [NSE:SBIN-EQ]: API error -50: Invalid symbol
//! ```
//!
//! The file is only ever opened in append mode; nothing here truncates or
//! rewrites it.

use crate::range::DateRange;
use chrono::{NaiveDate, NaiveDateTime};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_ERROR_LOG: &str = "error_log.txt";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const TIMESTAMP_LEN: usize = 19;
const RANGE_MARKER: &str = ": Error in range ";

#[derive(Debug, Error)]
pub enum ErrorLogError {
    #[error("failed to append to error log {}: {source}", .path.display())]
    Append {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read error log {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed error log line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}

/// One failed range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorLogEntry {
    pub timestamp: NaiveDateTime,
    pub subject: String,
    pub range: DateRange,
    pub message: String,
}

impl ErrorLogEntry {
    /// Multi-line messages are folded onto one line.
    pub fn new(
        timestamp: NaiveDateTime,
        subject: impl Into<String>,
        range: DateRange,
        message: &str,
    ) -> Self {
        Self {
            timestamp,
            subject: subject.into(),
            range,
            message: message.split_whitespace().collect::<Vec<_>>().join(" "),
        }
    }

    /// Entry stamped with the local wall-clock time.
    pub fn now(subject: impl Into<String>, range: DateRange, message: &str) -> Self {
        Self::new(chrono::Local::now().naive_local(), subject, range, message)
    }
}

impl fmt::Display for ErrorLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{RANGE_MARKER}{} [{}]: {}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.range,
            self.subject,
            self.message
        )
    }
}

impl FromStr for ErrorLogEntry {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let stamp = line.get(..TIMESTAMP_LEN).ok_or("line too short")?;
        let timestamp = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT)
            .map_err(|e| format!("bad timestamp '{stamp}': {e}"))?;

        let rest = line[TIMESTAMP_LEN..]
            .strip_prefix(RANGE_MARKER)
            .ok_or("missing range marker")?;
        let (start, rest) = rest.split_once(" to ").ok_or("missing range end")?;
        let (end, rest) = rest.split_once(" [").ok_or("missing subject")?;
        let (subject, message) = rest.split_once("]: ").ok_or("missing message")?;

        let parse_day = |s: &str| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("bad date '{s}': {e}"))
        };
        let range = DateRange::new(parse_day(start)?, parse_day(end)?).map_err(|e| e.to_string())?;

        Ok(Self {
            timestamp,
            subject: subject.to_string(),
            range,
            message: message.to_string(),
        })
    }
}

/// Handle to the error log file. Opened per append, so there is never a
/// long-lived writer.
#[derive(Debug, Clone)]
pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `{dir}/error_log.txt`
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(DEFAULT_ERROR_LOG))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, entry: &ErrorLogEntry) -> Result<(), ErrorLogError> {
        let to_err = |source| ErrorLogError::Append {
            path: self.path.clone(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(to_err)?;
        writeln!(file, "{entry}").map_err(to_err)
    }

    /// Parse every entry. A missing file means no failures were logged yet.
    pub fn entries(&self) -> Result<Vec<ErrorLogEntry>, ErrorLogError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(ErrorLogError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        text.lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                line.parse().map_err(|reason| ErrorLogError::Malformed {
                    line: i + 1,
                    reason,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2014, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2014, 4, 10).unwrap(),
        )
        .unwrap()
    }

    fn stamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 15)
            .unwrap()
            .and_hms_opt(9, 30, 1)
            .unwrap()
    }

    #[test]
    fn line_format() {
        let entry = ErrorLogEntry::new(stamp(), "NSE:SBIN-EQ", range(), "API error -50: bad\nsymbol");
        assert_eq!(
            entry.to_string(),
            "2024-06-15 09:30:01: Error in range 2014-01-01 to 2014-04-10 [NSE:SBIN-EQ]: API error -50: bad symbol"
        );
    }

    #[test]
    fn parses_its_own_lines() {
        let entry = ErrorLogEntry::new(stamp(), "NSE:SBIN-EQ", range(), "timeout: [connect] failed");
        let parsed: ErrorLogEntry = entry.to_string().parse().unwrap();
        assert_eq!(parsed, entry);
    }

    #[test]
    fn appends_without_truncating() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log = ErrorLog::in_dir(temp_dir.path());
        assert!(log.entries().unwrap().is_empty());

        log.append(&ErrorLogEntry::new(stamp(), "NSE:SBIN-EQ", range(), "first")).unwrap();
        let reopened = ErrorLog::in_dir(temp_dir.path());
        reopened
            .append(&ErrorLogEntry::new(stamp(), "NSE:TCS-EQ", range(), "second"))
            .unwrap();

        let entries = log.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "first");
        assert_eq!(entries[1].subject, "NSE:TCS-EQ");
    }

    #[test]
    fn reports_malformed_lines() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log = ErrorLog::in_dir(temp_dir.path());
        fs::write(log.path(), "not an entry\n").unwrap();
        assert!(matches!(
            log.entries(),
            Err(ErrorLogError::Malformed { line: 1, .. })
        ));
    }
}
