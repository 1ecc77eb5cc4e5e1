//! On-disk layout of per-day artifacts and the idempotency gate.

use crate::assembler::DayRecord;
use crate::config::Config;
use crate::error::Result;
use crate::io;
use crate::paths::{render_pattern, resolve_dir};
use crate::types::SkipReason;
use chrono::NaiveDate;
use fdsn_client::{mseed, StreamId};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct DayArchive {
    id: StreamId,
    waveform_dir: PathBuf,
    dayplot_dir: PathBuf,
    waveform_pattern: String,
    dayplot_pattern: String,
}

impl DayArchive {
    /// Build the archive for `config`, resolving relative directories
    /// against `root`.
    pub fn from_config(root: &Path, config: &Config) -> Self {
        let storage = &config.storage;
        Self {
            id: config.identity.clone(),
            waveform_dir: resolve_dir(root, &storage.waveform_dir),
            dayplot_dir: resolve_dir(root, &storage.dayplot_dir),
            waveform_pattern: storage.waveform_pattern.clone(),
            dayplot_pattern: storage.dayplot_pattern.clone(),
        }
    }

    pub fn id(&self) -> &StreamId {
        &self.id
    }

    pub fn waveform_dir(&self) -> &Path {
        &self.waveform_dir
    }

    pub fn waveform_path(&self, day: NaiveDate) -> PathBuf {
        self.waveform_dir
            .join(render_pattern(&self.waveform_pattern, &self.id, day))
    }

    pub fn dayplot_path(&self, day: NaiveDate) -> PathBuf {
        self.dayplot_dir
            .join(render_pattern(&self.dayplot_pattern, &self.id, day))
    }

    /// The artifact that already marks `day` as done, if any.
    ///
    /// A dayplot counts even when the waveform file is gone.
    pub fn existing(&self, day: NaiveDate) -> Option<SkipReason> {
        let dayplot = self.dayplot_path(day);
        if dayplot.is_file() {
            return Some(SkipReason::DayplotExists { path: dayplot });
        }
        let waveform = self.waveform_path(day);
        if waveform.is_file() {
            return Some(SkipReason::WaveformExists { path: waveform });
        }
        None
    }

    /// Encode `record` and write it as the day's waveform artifact.
    ///
    /// Extra segments follow the main trace in the same file. Never replaces
    /// an existing file.
    pub fn persist(&self, record: &DayRecord) -> Result<PathBuf> {
        let path = self.waveform_path(record.day);
        let bytes = mseed::encode_all(&record.to_traces())?;
        io::write_new(&path, &bytes)?;
        Ok(path)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
