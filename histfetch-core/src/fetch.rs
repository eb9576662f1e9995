//! Sequential fetch-and-persist loop.
//!
//! Walks every (subject, range) pair strictly in order: fetch, persist the
//! payload or log the failure, pause, move on. A failed range never aborts the
//! run. Only a precondition violation (before the first request) or an
//! unwritable error log stops it.

use crate::domain::{DateFormat, Resolution, Subject};
use crate::error_log::{ErrorLog, ErrorLogEntry, ErrorLogError};
use crate::pacer::Pacer;
use crate::provider::{HistoryProvider, HistoryRequest};
use crate::range::{partition, DateRange, RangeError};
use crate::store::{ArtifactStore, StoreError};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

/// Days per request accepted by the history endpoint for intraday data.
pub const DEFAULT_CHUNK_DAYS: u32 = 100;

/// Fatal errors. Per-range failures are never reported through this type.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Range(#[from] RangeError),

    #[error("no symbols to fetch")]
    NoSubjects,

    #[error("symbols {first} and {second} both map to artifact label '{label}'")]
    ArtifactCollision {
        first: Subject,
        second: Subject,
        label: String,
    },

    #[error(transparent)]
    OutputDir(StoreError),

    #[error(transparent)]
    ErrorLog(#[from] ErrorLogError),
}

/// Everything one run needs to know besides its collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPlan {
    pub subjects: Vec<Subject>,
    pub span: DateRange,
    pub chunk_days: u32,
    pub resolution: Resolution,
    pub date_format: DateFormat,
    pub cont_flag: bool,
    /// Leave ranges whose artifact already exists untouched.
    pub skip_existing: bool,
}

impl FetchPlan {
    pub fn new(subjects: Vec<Subject>, span: DateRange) -> Self {
        Self {
            subjects,
            span,
            chunk_days: DEFAULT_CHUNK_DAYS,
            resolution: Resolution::default(),
            date_format: DateFormat::default(),
            cont_flag: true,
            skip_existing: true,
        }
    }

    /// Check the plan and partition its span.
    pub fn ranges(&self) -> Result<Vec<DateRange>, RunError> {
        if self.subjects.is_empty() {
            return Err(RunError::NoSubjects);
        }

        let mut labels: HashMap<String, &Subject> = HashMap::new();
        for subject in &self.subjects {
            if let Some(first) = labels.insert(subject.file_label(), subject) {
                return Err(RunError::ArtifactCollision {
                    first: first.clone(),
                    second: subject.clone(),
                    label: subject.file_label(),
                });
            }
        }

        Ok(partition(self.span.start(), self.span.end(), self.chunk_days)?)
    }

    fn request(&self, subject: &Subject, range: DateRange) -> HistoryRequest {
        HistoryRequest {
            symbol: subject.clone(),
            range,
            resolution: self.resolution,
            date_format: self.date_format,
            cont_flag: self.cont_flag,
        }
    }
}

/// What happened to one range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RangeOutcome {
    Saved { path: PathBuf },
    /// Artifact was already present; no request was made.
    Skipped { path: PathBuf },
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RangeReport {
    pub subject: Subject,
    pub range: DateRange,
    pub outcome: RangeOutcome,
}

/// Outcomes of a run in processing order. Payloads are not retained.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub saved: usize,
    pub skipped: usize,
    pub failed: usize,
    pub reports: Vec<RangeReport>,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.reports.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &RangeReport> {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, RangeOutcome::Failed { .. }))
    }

    fn record(&mut self, report: RangeReport) {
        match report.outcome {
            RangeOutcome::Saved { .. } => self.saved += 1,
            RangeOutcome::Skipped { .. } => self.skipped += 1,
            RangeOutcome::Failed { .. } => self.failed += 1,
        }
        self.reports.push(report);
    }
}

/// Progress callback for a run.
pub trait FetchProgress {
    fn on_range_start(&self, subject: &Subject, range: &DateRange, index: usize, total: usize);

    fn on_range_complete(&self, report: &RangeReport, index: usize, total: usize);

    fn on_run_complete(&self, summary: &RunSummary);
}

/// Progress reporter that emits `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl FetchProgress for LogProgress {
    fn on_range_start(&self, subject: &Subject, range: &DateRange, index: usize, total: usize) {
        info!("[{}/{total}] fetching {subject} {range}", index + 1);
    }

    fn on_range_complete(&self, report: &RangeReport, _index: usize, _total: usize) {
        match &report.outcome {
            RangeOutcome::Saved { path } => info!("  saved {}", path.display()),
            RangeOutcome::Skipped { path } => info!("  already present: {}", path.display()),
            RangeOutcome::Failed { message } => {
                warn!(subject = %report.subject, range = %report.range, "  failed: {message}")
            }
        }
    }

    fn on_run_complete(&self, summary: &RunSummary) {
        info!(
            "fetch complete: {} saved, {} skipped, {} failed of {}",
            summary.saved,
            summary.skipped,
            summary.failed,
            summary.total()
        );
    }
}

/// Collaborators of a run, borrowed for its duration.
pub struct Fetcher<'a> {
    pub provider: &'a dyn HistoryProvider,
    pub store: &'a ArtifactStore,
    pub log: &'a ErrorLog,
    pub pacer: &'a dyn Pacer,
    pub progress: &'a dyn FetchProgress,
}

impl Fetcher<'_> {
    /// Execute `plan`: subjects in the given order, ranges ascending within
    /// each subject.
    ///
    /// Every range ends up as exactly one of: a new artifact, an existing
    /// artifact (when `skip_existing`), or one error-log entry.
    pub fn run(&self, plan: &FetchPlan) -> Result<RunSummary, RunError> {
        let ranges = plan.ranges()?;
        self.store.ensure_dir().map_err(RunError::OutputDir)?;

        let total = ranges.len() * plan.subjects.len();
        info!(
            provider = self.provider.name(),
            symbols = plan.subjects.len(),
            ranges = ranges.len(),
            chunk_days = plan.chunk_days,
            resolution = %plan.resolution,
            "starting fetch of {} to {}",
            plan.span.start(),
            plan.span.end()
        );

        let mut summary = RunSummary::default();
        let mut index = 0;

        for subject in &plan.subjects {
            for range in &ranges {
                self.progress.on_range_start(subject, range, index, total);

                let existing = self.store.artifact_path(subject, plan.resolution, range);
                let outcome = if plan.skip_existing && existing.is_file() {
                    RangeOutcome::Skipped { path: existing }
                } else {
                    let outcome = self.attempt(&plan.request(subject, *range));
                    if let RangeOutcome::Failed { message } = &outcome {
                        self.log
                            .append(&ErrorLogEntry::now(subject.as_str(), *range, message))?;
                    }
                    self.pacer.pause();
                    outcome
                };

                let report = RangeReport {
                    subject: subject.clone(),
                    range: *range,
                    outcome,
                };
                self.progress.on_range_complete(&report, index, total);
                summary.record(report);
                index += 1;
            }
        }

        self.progress.on_run_complete(&summary);
        Ok(summary)
    }

    /// Fetch one range and persist it. Write failures count as range failures.
    fn attempt(&self, request: &HistoryRequest) -> RangeOutcome {
        let payload = match self.provider.history(request) {
            Ok(payload) => payload,
            Err(e) => {
                return RangeOutcome::Failed {
                    message: e.to_string(),
                }
            }
        };

        match self
            .store
            .save(&request.symbol, request.resolution, &request.range, &payload)
        {
            Ok(path) => RangeOutcome::Saved { path },
            Err(e) => RangeOutcome::Failed {
                message: e.to_string(),
            },
        }
    }
}
