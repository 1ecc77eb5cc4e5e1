use chrono::NaiveDate;
use fdsn_client::{mseed, DecodeMode, SampleStream, StreamId, Trace};
use shake_core::config::Config;
use shake_core::fetcher::{FetchError, Provider, Sleeper};
use shake_core::orchestrator::{Acquisition, DayOutcome};
use shake_core::types::{DayStatus, SkipReason, TimeWindow};
use shake_core::ShakeError;
use std::cell::{Cell, RefCell};
use std::time::Duration;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

type Respond = Box<dyn Fn(&TimeWindow) -> Result<SampleStream, FetchError>>;

struct FakeProvider {
    normal: Respond,
    lenient: Respond,
    calls: Cell<usize>,
    lenient_calls: Cell<usize>,
}

impl FakeProvider {
    fn new(normal: impl Fn(&TimeWindow) -> Result<SampleStream, FetchError> + 'static) -> Self {
        Self {
            normal: Box::new(normal),
            lenient: Box::new(|_| Ok(SampleStream::empty())),
            calls: Cell::new(0),
            lenient_calls: Cell::new(0),
        }
    }

    fn with_lenient(
        mut self,
        lenient: impl Fn(&TimeWindow) -> Result<SampleStream, FetchError> + 'static,
    ) -> Self {
        self.lenient = Box::new(lenient);
        self
    }
}

impl Provider for FakeProvider {
    fn fetch(&self, _: &StreamId, window: &TimeWindow) -> Result<SampleStream, FetchError> {
        self.calls.set(self.calls.get() + 1);
        (self.normal)(window)
    }

    fn fetch_lenient(&self, _: &StreamId, window: &TimeWindow) -> Result<SampleStream, FetchError> {
        self.lenient_calls.set(self.lenient_calls.get() + 1);
        (self.lenient)(window)
    }
}

#[derive(Default)]
struct RecordingSleeper {
    waits: RefCell<Vec<Duration>>,
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.waits.borrow_mut().push(duration);
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
}

fn config() -> Config {
    let mut cfg = Config::default();
    cfg.acquisition.jitter_max_seconds = 0.0;
    cfg
}

/// A 1 Hz trace covering the whole window.
fn full_window(window: &TimeWindow) -> SampleStream {
    let n = window.duration().num_seconds() as usize;
    let value = window.start().format("%H").to_string().parse::<i32>().unwrap_or(0);
    SampleStream::new(vec![Trace {
        id: Config::default().identity,
        start: window.start(),
        sample_rate: 1.0,
        samples: vec![value + 1; n],
    }])
}

fn is_last_window(window: &TimeWindow) -> bool {
    window.start().format("%H").to_string() == "20"
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn second_run_makes_no_fetch_calls() {
    let dir = TempDir::new().unwrap();
    let provider = FakeProvider::new(|w| Ok(full_window(w)));
    let sleeper = RecordingSleeper::default();
    let cfg = config();

    let mut acq = Acquisition::new(&cfg, dir.path(), &provider, &sleeper).unwrap().with_seed(1);
    let outcome = acq.run_day(day(2));
    assert_eq!(outcome.status(), DayStatus::Ok);
    assert_eq!(provider.calls.get(), 6);

    let mut again = Acquisition::new(&cfg, dir.path(), &provider, &sleeper).unwrap();
    let outcome = again.run_day(day(2));
    assert!(matches!(
        outcome,
        DayOutcome::Skipped(SkipReason::WaveformExists { .. })
    ));
    assert_eq!(provider.calls.get(), 6);
}

#[test]
fn corrupt_last_window_is_recovered_and_day_is_complete() {
    let dir = TempDir::new().unwrap();
    let provider = FakeProvider::new(|w| {
        if is_last_window(w) {
            Err(FetchError::Corrupt("steim frame error".to_string()))
        } else {
            Ok(full_window(w))
        }
    })
    .with_lenient(|w| Ok(full_window(w)));
    let sleeper = RecordingSleeper::default();
    let cfg = config();

    let mut acq = Acquisition::new(&cfg, dir.path(), &provider, &sleeper).unwrap();
    let DayOutcome::Saved { path, coverage } = acq.run_day(day(2)) else {
        panic!("expected a saved day");
    };
    assert_eq!(coverage, 1.0);
    assert_eq!(provider.calls.get(), 6);
    assert_eq!(provider.lenient_calls.get(), 1);
    // Pacing only: corruption never triggers a backoff sleep.
    assert_eq!(sleeper.waits.borrow().len(), 6);

    let bytes = std::fs::read(&path).unwrap();
    let stream = mseed::decode(&bytes, DecodeMode::Strict).unwrap();
    assert_eq!(stream.sample_count(), 86_400);
    let trace = &stream.traces[0];
    assert_eq!(trace.start, shake_core::window::day_start(day(2)));
    assert_eq!(trace.samples[0], 1);
    assert_eq!(trace.samples[86_399], 21);

    let files: Vec<_> = std::fs::read_dir(acq.archive().waveform_dir()).unwrap().collect();
    assert_eq!(files.len(), 1);
}

#[test]
fn all_empty_windows_report_no_data_and_write_nothing() {
    let dir = TempDir::new().unwrap();
    let provider = FakeProvider::new(|_| Ok(SampleStream::empty()));
    let sleeper = RecordingSleeper::default();
    let cfg = config();

    let mut acq = Acquisition::new(&cfg, dir.path(), &provider, &sleeper).unwrap();
    assert_eq!(acq.run_day(day(2)), DayOutcome::NoData);
    assert!(!acq.archive().waveform_path(day(2)).exists());
}

#[test]
fn invalid_chunk_width_fails_before_any_fetch() {
    let dir = TempDir::new().unwrap();
    let provider = FakeProvider::new(|w| Ok(full_window(w)));
    let sleeper = RecordingSleeper::default();
    let mut cfg = config();
    cfg.acquisition.chunk_hours = 5;

    let err = Acquisition::new(&cfg, dir.path(), &provider, &sleeper)
        .err()
        .unwrap();
    assert!(matches!(err, ShakeError::InvalidChunkWidth(5)));
    assert_eq!(provider.calls.get(), 0);
    assert!(sleeper.waits.borrow().is_empty());
}

#[test]
fn given_up_window_leaves_zero_filled_gap() {
    let dir = TempDir::new().unwrap();
    let provider = FakeProvider::new(|w| {
        if w.start().format("%H").to_string() == "08" {
            Err(FetchError::Other("HTTP 503: upstream unavailable".to_string()))
        } else {
            Ok(full_window(w))
        }
    });
    let sleeper = RecordingSleeper::default();
    let mut cfg = config();
    cfg.acquisition.max_retries = 2;

    let mut acq = Acquisition::new(&cfg, dir.path(), &provider, &sleeper).unwrap();
    let DayOutcome::Saved { path, coverage } = acq.run_day(day(2)) else {
        panic!("expected a saved day");
    };
    assert!((coverage - 5.0 / 6.0).abs() < 1e-9);
    assert_eq!(provider.calls.get(), 5 + 3);

    let waits = sleeper.waits.borrow();
    let pacing: Vec<_> = waits.iter().filter(|w| **w == Duration::from_secs(5)).collect();
    assert_eq!(pacing.len(), 6);
    assert!(waits.contains(&Duration::from_secs(10)));
    assert!(waits.contains(&Duration::from_secs(15)));
    assert_eq!(waits.len(), 8);

    let stream = mseed::decode(&std::fs::read(path).unwrap(), DecodeMode::Strict).unwrap();
    let samples = &stream.traces[0].samples;
    assert_eq!(samples[8 * 3600 - 1], 5);
    assert!(samples[8 * 3600..12 * 3600].iter().all(|s| *s == 0));
    assert_eq!(samples[12 * 3600], 13);
}

#[test]
fn range_skips_done_days_and_contains_failures() {
    let dir = TempDir::new().unwrap();
    let provider = FakeProvider::new(|w| Ok(full_window(w)));
    let sleeper = RecordingSleeper::default();
    let cfg = config();

    let mut acq = Acquisition::new(&cfg, dir.path(), &provider, &sleeper).unwrap();

    // Day 2 already rendered, day 3 blocked by a directory at the artifact path.
    let dayplot = acq.archive().dayplot_path(day(2));
    std::fs::create_dir_all(dayplot.parent().unwrap()).unwrap();
    std::fs::write(&dayplot, b"png").unwrap();
    std::fs::create_dir_all(acq.archive().waveform_path(day(3))).unwrap();

    let summary = acq.run(day(1), day(5)).unwrap();
    let statuses: Vec<_> = summary.days.iter().map(|r| r.outcome.status()).collect();
    assert_eq!(
        statuses,
        [DayStatus::Ok, DayStatus::Skip, DayStatus::Fail, DayStatus::Ok]
    );
    assert_eq!(
        (summary.saved, summary.skipped, summary.failed, summary.no_data),
        (2, 1, 1, 0)
    );
    // Day 2 was never fetched.
    assert_eq!(provider.calls.get(), 18);
    assert!(acq.archive().waveform_path(day(4)).is_file());
}

#[test]
fn reversed_range_is_rejected() {
    let dir = TempDir::new().unwrap();
    let provider = FakeProvider::new(|w| Ok(full_window(w)));
    let sleeper = RecordingSleeper::default();
    let cfg = config();

    let mut acq = Acquisition::new(&cfg, dir.path(), &provider, &sleeper).unwrap();
    assert!(matches!(
        acq.run(day(5), day(1)),
        Err(ShakeError::InvalidRange { .. })
    ));
    let empty = acq.run(day(5), day(5)).unwrap();
    assert_eq!(empty.total(), 0);
    assert_eq!(provider.calls.get(), 0);
}

#[test]
fn second_sample_rate_reaches_disk_and_absurd_rate_does_not_abort() {
    let dir = TempDir::new().unwrap();
    let provider = FakeProvider::new(|w| {
        let mut stream = full_window(w);
        if w.start().format("%H").to_string() == "04" {
            stream.traces.push(Trace {
                id: Config::default().identity,
                start: w.start() + chrono::Duration::minutes(10),
                sample_rate: 2.0,
                samples: vec![42; 8],
            });
        }
        if w.start().format("%H").to_string() == "12" {
            stream.traces.push(Trace {
                id: Config::default().identity,
                start: w.start(),
                sample_rate: 32767.0 * 32767.0,
                samples: vec![1; 4],
            });
        }
        Ok(stream)
    });
    let sleeper = RecordingSleeper::default();
    let cfg = config();

    let mut acq = Acquisition::new(&cfg, dir.path(), &provider, &sleeper).unwrap();
    let DayOutcome::Saved { path, coverage } = acq.run_day(day(2)) else {
        panic!("expected a saved day");
    };
    assert_eq!(coverage, 1.0);

    let stream = mseed::decode(&std::fs::read(path).unwrap(), DecodeMode::Strict).unwrap();
    assert_eq!(stream.traces.len(), 2);
    assert_eq!(stream.traces[0].len(), 86_400);
    let extra = &stream.traces[1];
    assert_eq!(extra.sample_rate, 2.0);
    assert_eq!(extra.samples, vec![42; 8]);
    assert_eq!(
        extra.start,
        shake_core::window::day_start(day(2)) + chrono::Duration::minutes(250)
    );
}
