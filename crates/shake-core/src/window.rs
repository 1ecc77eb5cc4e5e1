//! Day boundaries and the chunk planner.

use crate::error::{Result, ShakeError};
use crate::types::TimeWindow;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

pub const HOURS_PER_DAY: u32 = 24;
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Midnight UTC at the start of `day`.
pub fn day_start(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}

/// The whole of `day` as one window.
pub fn day_window(day: NaiveDate) -> TimeWindow {
    TimeWindow::one_day(day_start(day))
}

/// Reject chunk widths that do not tile a day.
pub fn validate_chunk_hours(chunk_hours: u32) -> Result<()> {
    if chunk_hours == 0 || HOURS_PER_DAY % chunk_hours != 0 {
        return Err(ShakeError::InvalidChunkWidth(chunk_hours));
    }
    Ok(())
}

/// Split `day` into `24 / chunk_hours` contiguous windows, in order.
pub fn plan_day(day: NaiveDate, chunk_hours: u32) -> Result<Vec<TimeWindow>> {
    validate_chunk_hours(chunk_hours)?;
    let start = day_start(day);
    let width = Duration::hours(chunk_hours as i64);
    let windows = (0..HOURS_PER_DAY / chunk_hours)
        .filter_map(|k| {
            let t0 = start + width * k as i32;
            TimeWindow::new(t0, t0 + width)
        })
        .collect();
    Ok(windows)
}

/// Days in `[start, end)`, ascending.
pub fn days(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |d| *d < end)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
