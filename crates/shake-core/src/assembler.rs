//! Merge per-window streams into one zero-filled, exactly day-bounded record.
//!
//! Samples are placed on the day's sample grid. The first trace (in window
//! order) to claim a grid slot keeps it; later traces only fill slots nobody
//! claimed. Slots nobody claims stay at [`FILL_VALUE`].
//!
//! Traces at a different sample rate cannot share the grid. They are kept as
//! separate segments, trimmed to the day, and archived after the main trace.

use crate::window::{day_start, SECONDS_PER_DAY};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use fdsn_client::mseed::MAX_SAMPLE_RATE;
use fdsn_client::{SampleStream, StreamId, Trace};

pub const FILL_VALUE: i32 = 0;

/// Relative tolerance when deciding whether two traces share a sample rate.
const RATE_TOLERANCE: f64 = 1e-6;

// ---------------------------------------------------------------------------
// DayRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct DayRecord {
    pub id: StreamId,
    pub day: NaiveDate,
    pub sample_rate: f64,
    /// Exactly [`nominal_samples`] long.
    pub samples: Vec<i32>,
    /// Grid slots holding provider data rather than fill.
    pub covered: usize,
    /// Traces whose sample rate disagreed with the day's, trimmed to the day.
    pub extra_segments: Vec<Trace>,
}

impl DayRecord {
    pub fn start(&self) -> DateTime<Utc> {
        day_start(self.day)
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.start() + Duration::days(1)
    }

    /// Fraction of the day backed by real samples, in `[0, 1]`.
    pub fn coverage(&self) -> f64 {
        if self.samples.is_empty() {
            0.0
        } else {
            self.covered as f64 / self.samples.len() as f64
        }
    }

    pub fn filled(&self) -> usize {
        self.samples.len() - self.covered
    }

    pub fn unmerged_segments(&self) -> usize {
        self.extra_segments.len()
    }

    pub fn to_trace(&self) -> Trace {
        Trace {
            id: self.id.clone(),
            start: self.start(),
            sample_rate: self.sample_rate,
            samples: self.samples.clone(),
        }
    }

    /// The main trace followed by every extra segment.
    pub fn to_traces(&self) -> Vec<Trace> {
        let mut traces = Vec::with_capacity(1 + self.extra_segments.len());
        traces.push(self.to_trace());
        traces.extend(self.extra_segments.iter().cloned());
        traces
    }
}

/// Samples in one day at `sample_rate`.
pub fn nominal_samples(sample_rate: f64) -> usize {
    (SECONDS_PER_DAY as f64 * sample_rate).round() as usize
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

fn overlaps_day(trace: &Trace, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    !trace.is_empty() && trace.start < end && trace.end() > start
}

fn plausible_rate(rate: f64) -> bool {
    rate.is_finite() && rate > 0.0 && rate <= MAX_SAMPLE_RATE
}

fn same_rate(a: f64, b: f64) -> bool {
    (a - b).abs() <= RATE_TOLERANCE * a.abs().max(b.abs())
}

/// Grid index of a trace's first sample relative to `start`.
fn grid_offset(trace: &Trace, start: DateTime<Utc>, sample_rate: f64) -> Option<i64> {
    let nanos = (trace.start - start).num_nanoseconds()?;
    Some((nanos as f64 * sample_rate / 1e9).round() as i64)
}

/// The part of `trace` inside `[start, end)`, or `None` if nothing is left.
fn trim(trace: &Trace, start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Trace> {
    let index_at = |t: DateTime<Utc>| -> Option<usize> {
        let nanos = (t - trace.start).num_nanoseconds()?;
        let index = (nanos as f64 * trace.sample_rate / 1e9 - 1e-6).ceil().max(0.0);
        Some((index as usize).min(trace.len()))
    };
    let first = index_at(start)?;
    let stop = index_at(end)?;
    if first >= stop {
        return None;
    }
    let offset = (first as f64 * trace.period_nanos()).round() as i64;
    Some(Trace {
        id: trace.id.clone(),
        start: trace.start + Duration::nanoseconds(offset),
        sample_rate: trace.sample_rate,
        samples: trace.samples[first..stop].to_vec(),
    })
}

/// Assemble `streams` (in window order) into the record for `day`.
///
/// Only traces belonging to `id` are considered. Returns `None` when no
/// sample of `id` falls inside the day, which is a normal "no data" outcome.
pub fn assemble_day(day: NaiveDate, id: &StreamId, streams: &[SampleStream]) -> Option<DayRecord> {
    let start = day_start(day);
    let end = start + Duration::days(1);

    let traces: Vec<&Trace> = streams
        .iter()
        .flat_map(|s| s.select(id))
        .filter(|t| overlaps_day(t, start, end))
        .filter(|t| {
            let ok = plausible_rate(t.sample_rate);
            if !ok {
                tracing::warn!(
                    %day,
                    rate = t.sample_rate,
                    samples = t.len(),
                    "implausible sample rate, dropping segment"
                );
            }
            ok
        })
        .collect();
    let sample_rate = traces.first()?.sample_rate;

    let n = nominal_samples(sample_rate);
    if n == 0 {
        return None;
    }
    let mut samples = vec![FILL_VALUE; n];
    let mut claimed = vec![false; n];
    let mut covered = 0usize;
    let mut extra_segments = Vec::new();

    for trace in traces {
        if !same_rate(trace.sample_rate, sample_rate) {
            tracing::warn!(
                %day,
                expected = sample_rate,
                found = trace.sample_rate,
                samples = trace.len(),
                "sample rate mismatch, keeping segment separate"
            );
            extra_segments.extend(trim(trace, start, end));
            continue;
        }
        let Some(base) = grid_offset(trace, start, sample_rate) else {
            continue;
        };
        let skip = (-base).max(0) as usize;
        for (i, value) in trace.samples.iter().enumerate().skip(skip) {
            let idx = base + i as i64;
            if idx >= n as i64 {
                break;
            }
            let idx = idx as usize;
            if !claimed[idx] {
                claimed[idx] = true;
                samples[idx] = *value;
                covered += 1;
            }
        }
    }

    if covered == 0 {
        return None;
    }

    Some(DayRecord {
        id: id.clone(),
        day,
        sample_rate,
        samples,
        covered,
        extra_segments,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::plan_day;

    const RATE: f64 = 1.0;

    fn id() -> StreamId {
        StreamId::new("AM", "RF90E", "00", "EHZ")
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
    }

    fn trace_at(offset_secs: i64, samples: Vec<i32>) -> Trace {
        Trace {
            id: id(),
            start: day_start(day()) + Duration::seconds(offset_secs),
            sample_rate: RATE,
            samples,
        }
    }

    fn stream(traces: Vec<Trace>) -> SampleStream {
        SampleStream::new(traces)
    }

    #[test]
    fn all_empty_is_no_data() {
        let streams = vec![SampleStream::empty(); 6];
        assert!(assemble_day(day(), &id(), &streams).is_none());
        assert!(assemble_day(day(), &id(), &[]).is_none());
    }

    #[test]
    fn full_coverage_from_windows() {
        let streams: Vec<SampleStream> = plan_day(day(), 4)
            .unwrap()
            .iter()
            .enumerate()
            .map(|(k, w)| {
                let offset = (w.start() - day_start(day())).num_seconds();
                stream(vec![trace_at(offset, vec![k as i32 + 1; 4 * 3600])])
            })
            .collect();
        let record = assemble_day(day(), &id(), &streams).unwrap();
        assert_eq!(record.samples.len(), 86_400);
        assert_eq!(record.covered, 86_400);
        assert_eq!(record.coverage(), 1.0);
        assert_eq!(record.samples[0], 1);
        assert_eq!(record.samples[86_399], 6);
    }

    #[test]
    fn gaps_are_zero_filled_to_full_length() {
        let streams = vec![stream(vec![trace_at(100, vec![7; 10])])];
        let record = assemble_day(day(), &id(), &streams).unwrap();
        assert_eq!(record.samples.len(), nominal_samples(RATE));
        assert_eq!(record.covered, 10);
        assert_eq!(record.filled(), 86_390);
        assert_eq!(record.samples[99], FILL_VALUE);
        assert_eq!(record.samples[100], 7);
        assert_eq!(record.samples[109], 7);
        assert_eq!(record.samples[110], FILL_VALUE);
    }

    #[test]
    fn trims_to_day_boundary() {
        let before = trace_at(-5, vec![1; 10]);
        let after = trace_at(86_395, vec![2; 10]);
        let record = assemble_day(day(), &id(), &[stream(vec![before, after])]).unwrap();
        assert_eq!(record.samples.len(), 86_400);
        assert_eq!(&record.samples[..5], &[1; 5]);
        assert_eq!(record.samples[5], FILL_VALUE);
        assert_eq!(&record.samples[86_395..], &[2; 5]);
        assert_eq!(record.covered, 10);
    }

    #[test]
    fn data_entirely_outside_day_is_no_data() {
        let yesterday = trace_at(-100, vec![1; 50]);
        let tomorrow = trace_at(86_400, vec![1; 50]);
        assert!(assemble_day(day(), &id(), &[stream(vec![yesterday, tomorrow])]).is_none());
    }

    #[test]
    fn overlap_keeps_earlier_window() {
        let first = stream(vec![trace_at(0, vec![1; 20])]);
        let second = stream(vec![trace_at(10, vec![2; 20])]);
        let record = assemble_day(day(), &id(), &[first, second]).unwrap();
        assert_eq!(&record.samples[..20], &[1; 20]);
        assert_eq!(&record.samples[20..30], &[2; 10]);
        assert_eq!(record.covered, 30);
    }

    #[test]
    fn real_zero_is_not_overwritten() {
        let first = stream(vec![trace_at(0, vec![0; 5])]);
        let second = stream(vec![trace_at(0, vec![9; 5])]);
        let record = assemble_day(day(), &id(), &[first, second]).unwrap();
        assert_eq!(&record.samples[..5], &[0; 5]);
        assert_eq!(record.covered, 5);
    }

    #[test]
    fn other_channels_are_ignored() {
        let mut ehn = trace_at(0, vec![4; 10]);
        ehn.id.channel = "EHN".to_string();
        assert!(assemble_day(day(), &id(), &[stream(vec![ehn.clone()])]).is_none());

        let record =
            assemble_day(day(), &id(), &[stream(vec![ehn, trace_at(50, vec![3; 10])])]).unwrap();
        assert_eq!(record.covered, 10);
        assert_eq!(record.samples[0], FILL_VALUE);
    }

    #[test]
    fn mismatched_rate_segments_are_kept_separate() {
        let mut fast = trace_at(200, vec![5; 10]);
        fast.sample_rate = 2.0;
        let record = assemble_day(
            day(),
            &id(),
            &[stream(vec![trace_at(0, vec![1; 10]), fast.clone()])],
        )
        .unwrap();
        assert_eq!(record.sample_rate, RATE);
        assert_eq!(record.samples.len(), 86_400);
        assert_eq!(record.covered, 10);
        assert_eq!(record.unmerged_segments(), 1);
        assert_eq!(record.extra_segments, vec![fast]);
        assert_eq!(record.to_traces().len(), 2);
    }

    #[test]
    fn extra_segments_are_trimmed_to_the_day() {
        let mut early = trace_at(-2, vec![4; 10]);
        early.sample_rate = 2.0;
        let mut late = trace_at(86_398, vec![6; 10]);
        late.sample_rate = 2.0;
        let record = assemble_day(
            day(),
            &id(),
            &[stream(vec![trace_at(0, vec![1; 10]), early, late])],
        )
        .unwrap();

        let [head, tail] = record.extra_segments.as_slice() else {
            panic!("expected two extra segments, got {:?}", record.extra_segments);
        };
        assert_eq!(head.start, day_start(day()));
        assert_eq!(head.samples.len(), 6);
        assert_eq!(tail.start, day_start(day()) + Duration::seconds(86_398));
        assert_eq!(tail.samples.len(), 4);
        assert_eq!(tail.end(), record.end());
    }

    #[test]
    fn implausible_rate_is_dropped_without_allocating() {
        let mut absurd = trace_at(0, vec![1; 4]);
        absurd.sample_rate = 32767.0 * 32767.0;
        assert!(assemble_day(day(), &id(), &[stream(vec![absurd.clone()])]).is_none());

        let record =
            assemble_day(day(), &id(), &[stream(vec![absurd, trace_at(10, vec![2; 5])])]).unwrap();
        assert_eq!(record.sample_rate, RATE);
        assert_eq!(record.samples.len(), 86_400);
        assert_eq!(record.covered, 5);
        assert!(record.extra_segments.is_empty());
    }

    #[test]
    fn hundred_hertz_day_length() {
        let t = Trace {
            id: id(),
            start: day_start(day()) + Duration::milliseconds(4_000),
            sample_rate: 100.0,
            samples: vec![1; 3],
        };
        let record = assemble_day(day(), &id(), &[stream(vec![t])]).unwrap();
        assert_eq!(record.samples.len(), 8_640_000);
        assert_eq!(&record.samples[400..403], &[1, 1, 1]);
        assert_eq!(record.to_trace().end(), record.end());
    }
}
