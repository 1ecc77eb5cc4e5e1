use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// StreamId
// ---------------------------------------------------------------------------

/// SEED stream identity: network, station, location and channel codes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamId {
    pub network: String,
    pub station: String,
    #[serde(default)]
    pub location: String,
    pub channel: String,
}

impl StreamId {
    pub fn new(
        network: impl Into<String>,
        station: impl Into<String>,
        location: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            network: network.into(),
            station: station.into(),
            location: location.into(),
            channel: channel.into(),
        }
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.network, self.station, self.location, self.channel
        )
    }
}

// ---------------------------------------------------------------------------
// Trace
// ---------------------------------------------------------------------------

/// One contiguous run of evenly spaced samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    pub id: StreamId,
    pub start: DateTime<Utc>,
    pub sample_rate: f64,
    pub samples: Vec<i32>,
}

impl Trace {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration of one sample period, in nanoseconds.
    pub fn period_nanos(&self) -> f64 {
        if self.sample_rate > 0.0 {
            1e9 / self.sample_rate
        } else {
            0.0
        }
    }

    /// Time of the sample that would follow the last one.
    pub fn end(&self) -> DateTime<Utc> {
        let nanos = (self.samples.len() as f64 * self.period_nanos()).round() as i64;
        self.start + Duration::nanoseconds(nanos)
    }
}

// ---------------------------------------------------------------------------
// SampleStream
// ---------------------------------------------------------------------------

/// An ordered collection of traces, as returned by one provider request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleStream {
    pub traces: Vec<Trace>,
}

impl SampleStream {
    pub fn new(traces: Vec<Trace>) -> Self {
        Self { traces }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// True when the stream holds no samples at all.
    pub fn is_empty(&self) -> bool {
        self.traces.iter().all(Trace::is_empty)
    }

    pub fn sample_count(&self) -> usize {
        self.traces.iter().map(Trace::len).sum()
    }

    /// Traces whose identity equals `id`.
    pub fn select<'a>(&'a self, id: &'a StreamId) -> impl Iterator<Item = &'a Trace> + 'a {
        self.traces.iter().filter(move |t| &t.id == id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
