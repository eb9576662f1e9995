//! Merge per-range artifacts into one CSV per symbol.
//!
//! Candles are sorted by timestamp; when two artifacts overlap the first
//! occurrence (earliest range, then payload order) wins. Timestamps are
//! rendered in exchange-local time (IST, UTC+05:30).

use crate::domain::{Candle, Resolution, Subject};
use crate::store::{ArtifactStore, StoreError};
use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// IST offset from UTC in seconds.
pub const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

const CSV_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Error)]
pub enum ConsolidateError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("no artifacts found for {subject} at resolution {resolution}")]
    NoArtifacts {
        subject: Subject,
        resolution: Resolution,
    },

    #[error("candle timestamp {0} is out of range")]
    Timestamp(i64),

    #[error("invalid UTC offset of {0} seconds")]
    Offset(i32),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Counts from one consolidation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsolidateReport {
    pub artifacts: usize,
    pub candles: usize,
    pub duplicates: usize,
    pub output: PathBuf,
}

#[derive(Debug, Serialize)]
struct CsvRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

/// Sort candles by timestamp and drop repeated timestamps, keeping the first.
/// Returns the merged candles and the number of duplicates removed.
pub fn merge_candles(candles: Vec<Candle>) -> (Vec<Candle>, usize) {
    let mut merged = candles;
    let before = merged.len();
    // Stable sort keeps input order among equal timestamps.
    merged.sort_by_key(|c| c.timestamp);
    merged.dedup_by_key(|c| c.timestamp);
    let duplicates = before - merged.len();
    (merged, duplicates)
}

/// Fixed offset east of UTC, e.g. `IST_OFFSET_SECS`.
pub fn utc_offset(secs: i32) -> Result<FixedOffset, ConsolidateError> {
    FixedOffset::east_opt(secs).ok_or(ConsolidateError::Offset(secs))
}

/// Write candles as CSV with a `timestamp,open,high,low,close,volume` header.
pub fn write_csv<W: Write>(writer: W, candles: &[Candle]) -> Result<(), ConsolidateError> {
    let offset = utc_offset(IST_OFFSET_SECS)?;
    let mut csv_writer = csv::Writer::from_writer(writer);
    for candle in candles {
        let local = DateTime::from_timestamp(candle.timestamp, 0)
            .ok_or(ConsolidateError::Timestamp(candle.timestamp))?
            .with_timezone(&offset);
        csv_writer.serialize(CsvRow {
            timestamp: local.format(CSV_TIME_FORMAT).to_string(),
            open: candle.open,
            high: candle.high,
            low: candle.low,
            close: candle.close,
            volume: candle.volume,
        })?;
    }
    csv_writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Merge every artifact of `subject`/`resolution` in `store` into `output`.
pub fn consolidate(
    store: &ArtifactStore,
    subject: &Subject,
    resolution: Resolution,
    output: &Path,
) -> Result<ConsolidateReport, ConsolidateError> {
    let artifacts = store.list(subject, resolution)?;
    if artifacts.is_empty() {
        return Err(ConsolidateError::NoArtifacts {
            subject: subject.clone(),
            resolution,
        });
    }

    let mut candles = Vec::new();
    for (_, path) in &artifacts {
        candles.extend(store.load(path)?.candles);
    }
    let (merged, duplicates) = merge_candles(candles);

    let tmp_path = output.with_extension("csv.tmp");
    let file = fs::File::create(&tmp_path).map_err(|source| ConsolidateError::Io {
        path: tmp_path.clone(),
        source,
    })?;
    write_csv(io::BufWriter::new(file), &merged)?;
    fs::rename(&tmp_path, output).map_err(|source| {
        let _ = fs::remove_file(&tmp_path);
        ConsolidateError::Io {
            path: output.to_path_buf(),
            source,
        }
    })?;

    Ok(ConsolidateReport {
        artifacts: artifacts.len(),
        candles: merged.len(),
        duplicates,
        output: output.to_path_buf(),
    })
}

/// Default CSV path next to the artifacts: `{dir}/{SUBJECT}_{RESOLUTION}.csv`.
pub fn default_output(store: &ArtifactStore, subject: &Subject, resolution: Resolution) -> PathBuf {
    store
        .dir()
        .join(format!("{}_{}.csv", subject.file_label(), resolution.label()))
}
