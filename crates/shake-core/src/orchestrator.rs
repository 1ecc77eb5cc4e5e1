//! Day-by-day acquisition over a date range.
//!
//! ```text
//! for day in [start, end):
//!     archive.existing(day)?  ── yes ──► Skipped
//!     plan_day(day)           ── 24/H windows
//!     for window:
//!         pace (sleep)        ── pacing + jitter
//!         ChunkFetcher.fetch  ── always yields a stream
//!     assemble_day            ── None ──► NoData
//!     archive.persist         ── Ok ──► Saved, Err ──► Failed
//! ```
//!
//! Days and windows run strictly one after another. A day's failure is
//! reported in its [`DayOutcome`] and never stops the range.

use crate::archive::DayArchive;
use crate::assembler::assemble_day;
use crate::backoff::{jitter, BackoffPolicy};
use crate::config::Config;
use crate::error::{Result, ShakeError};
use crate::fetcher::{ChunkFetcher, ChunkOutcome, Provider, Sleeper};
use crate::types::{DayStatus, SkipReason};
use crate::window::{days, plan_day, validate_chunk_hours};
use chrono::NaiveDate;
use fdsn_client::StreamId;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// DayOutcome / RunSummary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DayOutcome {
    Skipped(SkipReason),
    NoData,
    Saved { path: PathBuf, coverage: f64 },
    Failed { error: String },
}

impl DayOutcome {
    pub fn status(&self) -> DayStatus {
        match self {
            DayOutcome::Skipped(_) => DayStatus::Skip,
            DayOutcome::NoData => DayStatus::NoData,
            DayOutcome::Saved { .. } => DayStatus::Ok,
            DayOutcome::Failed { .. } => DayStatus::Fail,
        }
    }

    /// One-line human description for tables.
    pub fn detail(&self) -> String {
        match self {
            DayOutcome::Skipped(reason) => reason.to_string(),
            DayOutcome::NoData => "no data returned".to_string(),
            DayOutcome::Saved { path, coverage } => {
                format!("{} ({:.1}% covered)", path.display(), coverage * 100.0)
            }
            DayOutcome::Failed { error } => error.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DayReport {
    pub day: NaiveDate,
    pub outcome: DayOutcome,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub days: Vec<DayReport>,
    pub skipped: usize,
    pub no_data: usize,
    pub saved: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn push(&mut self, day: NaiveDate, outcome: DayOutcome) {
        match outcome.status() {
            DayStatus::Skip => self.skipped += 1,
            DayStatus::NoData => self.no_data += 1,
            DayStatus::Ok => self.saved += 1,
            DayStatus::Fail => self.failed += 1,
        }
        self.days.push(DayReport { day, outcome });
    }

    pub fn total(&self) -> usize {
        self.days.len()
    }
}

// ---------------------------------------------------------------------------
// Acquisition
// ---------------------------------------------------------------------------

/// One acquisition identity with its settings and collaborators.
pub struct Acquisition<'a> {
    id: StreamId,
    chunk_hours: u32,
    pacing: Duration,
    jitter_max: Duration,
    max_retries: u32,
    policy: BackoffPolicy,
    archive: DayArchive,
    provider: &'a dyn Provider,
    sleeper: &'a dyn Sleeper,
    rng: StdRng,
}

impl<'a> Acquisition<'a> {
    /// Fails with [`ShakeError::InvalidChunkWidth`] before anything is fetched.
    pub fn new(
        config: &Config,
        root: &Path,
        provider: &'a dyn Provider,
        sleeper: &'a dyn Sleeper,
    ) -> Result<Self> {
        let acq = &config.acquisition;
        validate_chunk_hours(acq.chunk_hours)?;
        Ok(Self {
            id: config.identity.clone(),
            chunk_hours: acq.chunk_hours,
            pacing: acq.pacing(),
            jitter_max: acq.jitter_max(),
            max_retries: acq.max_retries,
            policy: acq.backoff_policy(),
            archive: DayArchive::from_config(root, config),
            provider,
            sleeper,
            rng: StdRng::from_entropy(),
        })
    }

    /// Deterministic jitter, for tests and reproducible runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn archive(&self) -> &DayArchive {
        &self.archive
    }

    /// Acquire every day in `[start, end)`, in order.
    pub fn run(&mut self, start: NaiveDate, end: NaiveDate) -> Result<RunSummary> {
        if end < start {
            return Err(ShakeError::InvalidRange { start, end });
        }
        tracing::info!(
            id = %self.id,
            %start,
            %end,
            chunk_hours = self.chunk_hours,
            "acquisition started"
        );
        let mut summary = RunSummary::default();
        for day in days(start, end) {
            let outcome = self.run_day(day);
            summary.push(day, outcome);
        }
        tracing::info!(
            days = summary.total(),
            saved = summary.saved,
            skipped = summary.skipped,
            no_data = summary.no_data,
            failed = summary.failed,
            "acquisition finished"
        );
        Ok(summary)
    }

    /// Acquire one day. Never fails; problems end up in the outcome.
    pub fn run_day(&mut self, day: NaiveDate) -> DayOutcome {
        if let Some(reason) = self.archive.existing(day) {
            tracing::info!(%day, %reason, "skip");
            return DayOutcome::Skipped(reason);
        }

        let windows = match plan_day(day, self.chunk_hours) {
            Ok(windows) => windows,
            Err(e) => return self.failed(day, e),
        };

        let fetcher = ChunkFetcher::new(self.provider, self.sleeper, &self.policy, self.max_retries);
        let mut streams = Vec::with_capacity(windows.len());
        for (k, window) in windows.iter().enumerate() {
            self.sleeper
                .sleep(self.pacing + jitter(&mut self.rng, self.jitter_max));
            tracing::info!(%day, chunk = k + 1, of = windows.len(), %window, "fetch");
            let outcome = fetcher.fetch(&self.id, window, &mut self.rng);
            if !matches!(outcome, ChunkOutcome::Fetched(_)) {
                tracing::debug!(%window, outcome = outcome.label(), "chunk finished");
            }
            streams.push(outcome.into_stream());
        }

        let Some(record) = assemble_day(day, &self.id, &streams) else {
            tracing::info!(%day, "none");
            return DayOutcome::NoData;
        };

        match self.archive.persist(&record) {
            Ok(path) => {
                let coverage = record.coverage();
                tracing::info!(
                    %day,
                    path = %path.display(),
                    samples = record.samples.len(),
                    coverage = format_args!("{:.1}%", coverage * 100.0),
                    unmerged = record.unmerged_segments(),
                    "ok"
                );
                DayOutcome::Saved { path, coverage }
            }
            Err(e) => self.failed(day, e),
        }
    }

    fn failed(&self, day: NaiveDate, err: ShakeError) -> DayOutcome {
        tracing::error!(%day, id = %self.id, error = %err, "fail");
        DayOutcome::Failed {
            error: err.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_tallies_outcomes() {
        let d = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let mut summary = RunSummary::default();
        summary.push(d, DayOutcome::NoData);
        summary.push(
            d,
            DayOutcome::Saved {
                path: PathBuf::from("a.mseed"),
                coverage: 0.5,
            },
        );
        summary.push(
            d,
            DayOutcome::Failed {
                error: "disk full".to_string(),
            },
        );
        summary.push(
            d,
            DayOutcome::Skipped(SkipReason::WaveformExists {
                path: PathBuf::from("a.mseed"),
            }),
        );
        assert_eq!(summary.total(), 4);
        assert_eq!(
            (summary.skipped, summary.no_data, summary.saved, summary.failed),
            (1, 1, 1, 1)
        );
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let report = DayReport {
            day: NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
            outcome: DayOutcome::Skipped(SkipReason::DayplotExists {
                path: PathBuf::from("p.png"),
            }),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["day"], "2025-06-02");
        assert_eq!(json["outcome"]["status"], "skipped");
        assert_eq!(json["outcome"]["type"], "dayplot_exists");
        assert_eq!(json["outcome"]["path"], "p.png");
    }

    #[test]
    fn saved_detail_shows_coverage() {
        let outcome = DayOutcome::Saved {
            path: PathBuf::from("x.mseed"),
            coverage: 0.25,
        };
        assert_eq!(outcome.status(), DayStatus::Ok);
        assert_eq!(outcome.detail(), "x.mseed (25.0% covered)");
    }
}
