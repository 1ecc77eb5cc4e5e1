use chrono::NaiveDate;
use fdsn_client::StreamId;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

pub const CONFIG_FILE: &str = "shakefetch.yaml";

pub const WAVEFORM_DIR: &str = "shake_data";
pub const DAYPLOT_DIR: &str = "dayplots";

pub const WAVEFORM_PATTERN: &str = "{network}.{station}.{location}.{channel}.{date}.mseed";
pub const DAYPLOT_PATTERN: &str = "{network}_{station}_{channel}_{date}_5-40Hz.png";

/// Placeholders understood by [`render_pattern`].
pub const PLACEHOLDERS: &[&str] = &["{network}", "{station}", "{location}", "{channel}", "{date}"];

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// Resolve `dir` against `root` unless it is already absolute.
pub fn resolve_dir(root: &Path, dir: &Path) -> PathBuf {
    if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        root.join(dir)
    }
}

/// Expand a file-name pattern for one stream and day.
pub fn render_pattern(pattern: &str, id: &StreamId, day: NaiveDate) -> String {
    pattern
        .replace("{network}", &id.network)
        .replace("{station}", &id.station)
        .replace("{location}", &id.location)
        .replace("{channel}", &id.channel)
        .replace("{date}", &day.format("%Y-%m-%d").to_string())
}

static PLACEHOLDER_RE: OnceLock<Regex> = OnceLock::new();

/// Placeholders in `pattern` that [`render_pattern`] would leave untouched.
pub fn unknown_placeholders(pattern: &str) -> Vec<&str> {
    let re = PLACEHOLDER_RE.get_or_init(|| Regex::new(r"\{[^{}]*\}").unwrap());
    re.find_iter(pattern)
        .map(|m| m.as_str())
        .filter(|p| !PLACEHOLDERS.contains(p))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> StreamId {
        StreamId::new("AM", "RF90E", "00", "EHZ")
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
    }

    #[test]
    fn default_patterns_expand() {
        assert_eq!(
            render_pattern(WAVEFORM_PATTERN, &id(), day()),
            "AM.RF90E.00.EHZ.2025-06-02.mseed"
        );
        assert_eq!(
            render_pattern(DAYPLOT_PATTERN, &id(), day()),
            "AM_RF90E_EHZ_2025-06-02_5-40Hz.png"
        );
    }

    #[test]
    fn unknown_placeholders_are_reported() {
        assert!(unknown_placeholders(WAVEFORM_PATTERN).is_empty());
        assert_eq!(
            unknown_placeholders("{net}.{station}.{day}.mseed"),
            ["{net}", "{day}"]
        );
    }

    #[test]
    fn relative_dirs_resolve_under_root() {
        let root = Path::new("/data/station");
        assert_eq!(
            resolve_dir(root, Path::new(WAVEFORM_DIR)),
            PathBuf::from("/data/station/shake_data")
        );
        assert_eq!(
            resolve_dir(root, Path::new("/mnt/archive")),
            PathBuf::from("/mnt/archive")
        );
    }
}
