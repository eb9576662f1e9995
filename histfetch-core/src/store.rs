//! Per-range JSON artifacts.
//!
//! Layout: `{output_dir}/{SUBJECT}_{RESOLUTION}_{YYYYMMDD}_to_{YYYYMMDD}.json`
//!
//! Writes are atomic (write to `.tmp`, rename into place) so an interrupted
//! run never leaves a truncated artifact that a resumed run would skip.

use crate::domain::{HistoryPayload, Resolution, Subject};
use crate::range::DateRange;
use chrono::NaiveDate;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

const FILE_DATE_FORMAT: &str = "%Y%m%d";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to create output directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write artifact {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("artifact {} is not a valid payload: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Directory of range-named history artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the output directory (and parents) if missing.
    pub fn ensure_dir(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(|source| StoreError::CreateDir {
            path: self.dir.clone(),
            source,
        })
    }

    /// Deterministic file name for one range, e.g. `SBIN_1min_20140101_to_20140410.json`.
    pub fn artifact_name(subject: &Subject, resolution: Resolution, range: &DateRange) -> String {
        format!(
            "{}_{}_{}_to_{}.json",
            subject.file_label(),
            resolution.label(),
            range.start().format(FILE_DATE_FORMAT),
            range.end().format(FILE_DATE_FORMAT),
        )
    }

    pub fn artifact_path(
        &self,
        subject: &Subject,
        resolution: Resolution,
        range: &DateRange,
    ) -> PathBuf {
        self.dir
            .join(Self::artifact_name(subject, resolution, range))
    }

    pub fn exists(&self, subject: &Subject, resolution: Resolution, range: &DateRange) -> bool {
        self.artifact_path(subject, resolution, range).is_file()
    }

    /// Serialize `payload` as pretty JSON into the range's artifact.
    pub fn save(
        &self,
        subject: &Subject,
        resolution: Resolution,
        range: &DateRange,
        payload: &HistoryPayload,
    ) -> Result<PathBuf, StoreError> {
        let path = self.artifact_path(subject, resolution, range);
        let tmp_path = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(payload)?;

        fs::write(&tmp_path, json).map_err(|source| {
            let _ = fs::remove_file(&tmp_path);
            StoreError::Write {
                path: tmp_path.clone(),
                source,
            }
        })?;

        fs::rename(&tmp_path, &path).map_err(|source| {
            let _ = fs::remove_file(&tmp_path);
            StoreError::Write {
                path: path.clone(),
                source,
            }
        })?;

        Ok(path)
    }

    pub fn load(&self, path: &Path) -> Result<HistoryPayload, StoreError> {
        let text = fs::read_to_string(path).map_err(|source| StoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| StoreError::Decode {
            path: path.to_path_buf(),
            source,
        })
    }

    /// All artifacts for one subject and resolution, ordered by range start.
    ///
    /// Files whose names do not parse as a range for this subject are ignored.
    pub fn list(
        &self,
        subject: &Subject,
        resolution: Resolution,
    ) -> Result<Vec<(DateRange, PathBuf)>, StoreError> {
        let prefix = format!("{}_{}_", subject.file_label(), resolution.label());
        let entries = fs::read_dir(&self.dir).map_err(|source| StoreError::Read {
            path: self.dir.clone(),
            source,
        })?;

        let mut found = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Read {
                path: self.dir.clone(),
                source,
            })?;
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(range) = parse_range_suffix(name, &prefix) {
                found.push((range, path));
            }
        }

        found.sort_by_key(|(range, _)| *range);
        Ok(found)
    }
}

/// Parse `{prefix}YYYYMMDD_to_YYYYMMDD.json` back into a range.
fn parse_range_suffix(name: &str, prefix: &str) -> Option<DateRange> {
    let middle = name.strip_prefix(prefix)?.strip_suffix(".json")?;
    let (start, end) = middle.split_once("_to_")?;
    let start = NaiveDate::parse_from_str(start, FILE_DATE_FORMAT).ok()?;
    let end = NaiveDate::parse_from_str(end, FILE_DATE_FORMAT).ok()?;
    DateRange::new(start, end).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Candle;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sbin() -> Subject {
        Subject::new("NSE:SBIN-EQ").unwrap()
    }

    #[test]
    fn artifact_name_format() {
        let range = DateRange::new(date(2014, 1, 1), date(2014, 4, 10)).unwrap();
        assert_eq!(
            ArtifactStore::artifact_name(&sbin(), Resolution::Min1, &range),
            "SBIN_1min_20140101_to_20140410.json"
        );
    }

    #[test]
    fn save_load_and_list() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(temp_dir.path().join("out"));
        store.ensure_dir().unwrap();

        let later = DateRange::new(date(2014, 4, 11), date(2014, 4, 20)).unwrap();
        let earlier = DateRange::new(date(2014, 1, 1), date(2014, 4, 10)).unwrap();
        let payload = HistoryPayload::ok(vec![Candle::from((1, 1.0, 1.0, 1.0, 1.0, 1.0))]);

        let path = store.save(&sbin(), Resolution::Min1, &later, &payload).unwrap();
        store.save(&sbin(), Resolution::Min1, &earlier, &payload).unwrap();
        assert!(store.exists(&sbin(), Resolution::Min1, &later));
        assert!(!path.with_extension("json.tmp").exists());
        assert_eq!(store.load(&path).unwrap(), payload);

        // Other resolutions and stray files are not listed.
        store.save(&sbin(), Resolution::Day, &earlier, &payload).unwrap();
        fs::write(store.dir().join("SBIN_1min_notes.json"), "{}").unwrap();

        let listed = store.list(&sbin(), Resolution::Min1).unwrap();
        let ranges: Vec<DateRange> = listed.iter().map(|(r, _)| *r).collect();
        assert_eq!(ranges, vec![earlier, later]);
    }

    #[test]
    fn pretty_json_on_disk() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(temp_dir.path());
        let range = DateRange::single(date(2014, 1, 1));
        let path = store
            .save(&sbin(), Resolution::Day, &range, &HistoryPayload::ok(Vec::new()))
            .unwrap();
        let text = fs::read_to_string(path).unwrap();
        assert!(text.contains('\n'));
        assert!(text.contains("\"s\": \"ok\""));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn failed_write_leaves_no_temp_file() {
        if !Path::new("/dev/full").exists() {
            return;
        }
        let temp_dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(temp_dir.path());
        let range = DateRange::single(date(2014, 1, 1));
        let tmp_path = store
            .artifact_path(&sbin(), Resolution::Min1, &range)
            .with_extension("json.tmp");
        // Every write to /dev/full fails with ENOSPC.
        std::os::unix::fs::symlink("/dev/full", &tmp_path).unwrap();

        let err = store
            .save(&sbin(), Resolution::Min1, &range, &HistoryPayload::ok(Vec::new()))
            .unwrap_err();

        assert!(matches!(err, StoreError::Write { .. }));
        assert!(fs::symlink_metadata(&tmp_path).is_err());
        assert!(!store.exists(&sbin(), Resolution::Min1, &range));
    }
}
