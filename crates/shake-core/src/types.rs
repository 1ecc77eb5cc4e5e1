use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// TimeWindow
// ---------------------------------------------------------------------------

/// Half-open UTC interval `[start, end)`. Always non-empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    /// Returns `None` unless `start < end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    /// The 24 hours beginning at `start`.
    pub fn one_day(start: DateTime<Utc>) -> Self {
        Self {
            start,
            end: start + Duration::days(1),
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}..{}",
            self.start.format("%Y-%m-%dT%H:%M:%S"),
            self.end.format("%Y-%m-%dT%H:%M:%S")
        )
    }
}

// ---------------------------------------------------------------------------
// SkipReason
// ---------------------------------------------------------------------------

/// Why the idempotency gate turned a day away.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SkipReason {
    DayplotExists { path: PathBuf },
    WaveformExists { path: PathBuf },
}

impl SkipReason {
    pub fn path(&self) -> &PathBuf {
        match self {
            SkipReason::DayplotExists { path } | SkipReason::WaveformExists { path } => path,
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (what, path) = match self {
            SkipReason::DayplotExists { path } => ("dayplot", path),
            SkipReason::WaveformExists { path } => ("waveform", path),
        };
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        write!(f, "{what} already exists: {name}")
    }
}

// ---------------------------------------------------------------------------
// DayStatus
// ---------------------------------------------------------------------------

/// Short status label printed for each day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayStatus {
    Skip,
    NoData,
    Ok,
    Fail,
}

impl DayStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DayStatus::Skip => "skip",
            DayStatus::NoData => "none",
            DayStatus::Ok => "ok",
            DayStatus::Fail => "fail",
        }
    }
}

impl fmt::Display for DayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
