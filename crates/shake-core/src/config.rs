use crate::backoff::{seconds, BackoffPolicy, MAX_CONFIG_SECONDS};
use crate::error::{Result, ShakeError};
use crate::paths;
use crate::window::HOURS_PER_DAY;
use chrono::NaiveDate;
use fdsn_client::StreamId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

fn default_identity() -> StreamId {
    StreamId::new("AM", "RF90E", "00", "EHZ")
}

// ---------------------------------------------------------------------------
// RangeConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeConfig {
    /// First day fetched (inclusive, UTC).
    #[serde(default = "default_start")]
    pub start: NaiveDate,
    /// First day not fetched (exclusive, UTC). Today when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<NaiveDate>,
}

fn default_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 1).unwrap_or(NaiveDate::MIN)
}

impl Default for RangeConfig {
    fn default() -> Self {
        Self {
            start: default_start(),
            end: None,
        }
    }
}

impl RangeConfig {
    pub fn resolved_end(&self, today: NaiveDate) -> NaiveDate {
        self.end.unwrap_or(today)
    }
}

// ---------------------------------------------------------------------------
// ProviderConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_base_url() -> String {
    fdsn_client::DEFAULT_BASE_URL.to_string()
}

fn default_timeout() -> u64 {
    120
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout(),
        }
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

// ---------------------------------------------------------------------------
// AcquisitionConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Width of one request window. Must divide 24.
    #[serde(default = "default_chunk_hours")]
    pub chunk_hours: u32,
    /// Pause before every window request, plus jitter.
    #[serde(default = "default_pacing")]
    pub pacing_seconds: f64,
    /// Retries after the first failed attempt of a window.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_initial")]
    pub backoff_initial_seconds: f64,
    #[serde(default = "default_backoff_max")]
    pub backoff_max_seconds: f64,
    #[serde(default = "default_jitter_max")]
    pub jitter_max_seconds: f64,
}

fn default_chunk_hours() -> u32 {
    4
}

fn default_pacing() -> f64 {
    5.0
}

fn default_max_retries() -> u32 {
    6
}

fn default_backoff_initial() -> f64 {
    10.0
}

fn default_backoff_max() -> f64 {
    600.0
}

fn default_jitter_max() -> f64 {
    1.5
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            chunk_hours: default_chunk_hours(),
            pacing_seconds: default_pacing(),
            max_retries: default_max_retries(),
            backoff_initial_seconds: default_backoff_initial(),
            backoff_max_seconds: default_backoff_max(),
            jitter_max_seconds: default_jitter_max(),
        }
    }
}

impl AcquisitionConfig {
    pub fn pacing(&self) -> Duration {
        seconds(self.pacing_seconds)
    }

    pub fn jitter_max(&self) -> Duration {
        seconds(self.jitter_max_seconds)
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            initial: seconds(self.backoff_initial_seconds),
            max: seconds(self.backoff_max_seconds),
            jitter_max: self.jitter_max(),
        }
    }
}

// ---------------------------------------------------------------------------
// StorageConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_waveform_dir")]
    pub waveform_dir: PathBuf,
    /// Where rendered dayplots live; their presence also marks a day done.
    #[serde(default = "default_dayplot_dir")]
    pub dayplot_dir: PathBuf,
    #[serde(default = "default_waveform_pattern")]
    pub waveform_pattern: String,
    #[serde(default = "default_dayplot_pattern")]
    pub dayplot_pattern: String,
}

fn default_waveform_dir() -> PathBuf {
    PathBuf::from(paths::WAVEFORM_DIR)
}

fn default_dayplot_dir() -> PathBuf {
    PathBuf::from(paths::DAYPLOT_DIR)
}

fn default_waveform_pattern() -> String {
    paths::WAVEFORM_PATTERN.to_string()
}

fn default_dayplot_pattern() -> String {
    paths::DAYPLOT_PATTERN.to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            waveform_dir: default_waveform_dir(),
            dayplot_dir: default_dayplot_dir(),
            waveform_pattern: default_waveform_pattern(),
            dayplot_pattern: default_dayplot_pattern(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_identity")]
    pub identity: StreamId,
    #[serde(default)]
    pub range: RangeConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            identity: default_identity(),
            range: RangeConfig::default(),
            provider: ProviderConfig::default(),
            acquisition: AcquisitionConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ShakeError::ConfigNotFound(path.to_path_buf()));
        }
        let data = std::fs::read_to_string(path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut push = |level: WarnLevel, message: String| {
            warnings.push(ConfigWarning { level, message });
        };

        // 1. Chunk width must tile the day
        let hours = self.acquisition.chunk_hours;
        if hours == 0 || HOURS_PER_DAY % hours != 0 {
            push(
                WarnLevel::Error,
                format!("acquisition.chunk_hours={hours} does not divide 24"),
            );
        }

        // 2. Identity codes must fit the SEED header
        let id = &self.identity;
        for (field, value, max) in [
            ("network", &id.network, 2),
            ("station", &id.station, 5),
            ("location", &id.location, 2),
            ("channel", &id.channel, 3),
        ] {
            if value.len() > max {
                push(
                    WarnLevel::Error,
                    format!("identity.{field} '{value}' is longer than {max} characters"),
                );
            }
        }
        if id.network.is_empty() || id.station.is_empty() || id.channel.is_empty() {
            push(
                WarnLevel::Error,
                "identity.network, station and channel must be set".to_string(),
            );
        }

        // 3. Timing values
        for (field, value) in [
            ("pacing_seconds", self.acquisition.pacing_seconds),
            ("backoff_initial_seconds", self.acquisition.backoff_initial_seconds),
            ("backoff_max_seconds", self.acquisition.backoff_max_seconds),
            ("jitter_max_seconds", self.acquisition.jitter_max_seconds),
        ] {
            if !value.is_finite() || value < 0.0 {
                push(
                    WarnLevel::Error,
                    format!("acquisition.{field}={value} must be a non-negative number"),
                );
            } else if value > MAX_CONFIG_SECONDS {
                push(
                    WarnLevel::Error,
                    format!("acquisition.{field}={value} exceeds {MAX_CONFIG_SECONDS} seconds"),
                );
            }
        }
        if self.acquisition.backoff_max_seconds < self.acquisition.backoff_initial_seconds {
            push(
                WarnLevel::Warning,
                "acquisition.backoff_max_seconds is below backoff_initial_seconds".to_string(),
            );
        }
        if self.acquisition.pacing_seconds == 0.0 {
            push(
                WarnLevel::Warning,
                "acquisition.pacing_seconds=0 sends requests back to back".to_string(),
            );
        }
        if self.acquisition.max_retries > 20 {
            push(
                WarnLevel::Warning,
                format!(
                    "acquisition.max_retries={} (>20 is unusual)",
                    self.acquisition.max_retries
                ),
            );
        }

        // 4. Range
        if let Some(end) = self.range.end {
            if end <= self.range.start {
                push(
                    WarnLevel::Warning,
                    format!("range {}..{end} is empty", self.range.start),
                );
            }
        }

        // 5. File-name patterns must be unique per day
        for (field, pattern) in [
            ("waveform_pattern", &self.storage.waveform_pattern),
            ("dayplot_pattern", &self.storage.dayplot_pattern),
        ] {
            if !pattern.contains("{date}") {
                push(
                    WarnLevel::Warning,
                    format!("storage.{field} has no {{date}} placeholder"),
                );
            }
            for unknown in paths::unknown_placeholders(pattern) {
                push(
                    WarnLevel::Warning,
                    format!("storage.{field} has unknown placeholder {unknown}"),
                );
            }
        }

        warnings
    }

    pub fn has_errors(warnings: &[ConfigWarning]) -> bool {
        warnings.iter().any(|w| w.level == WarnLevel::Error)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
