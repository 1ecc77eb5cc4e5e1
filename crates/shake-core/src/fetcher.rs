//! Per-window fetch with retry, backoff and corrupt-record fallback.
//!
//! ```text
//!            ┌──────────── Backoff (sleep) ◄──────────┐
//!            ▼                                        │ RateLimited / Transient,
//!       Attempting ── ok ──► Fetched                  │ attempt <= max_retries
//!            │                                        │
//!            ├── RateLimited / Transient ─────────────┘
//!            │        └─ attempt > max_retries ──► GivenUp
//!            │
//!            └── CorruptRecord ──► lenient fetch (once)
//!                                   ├─ non-empty ──► Recovered
//!                                   ├─ empty ──────► RecoveryEmpty
//!                                   └─ error ──────► RecoveryFailed
//! ```
//!
//! Every terminal state yields a (possibly empty) stream; nothing escapes.

use crate::backoff::BackoffPolicy;
use crate::classify::{classify, FailureClassification};
use crate::types::TimeWindow;
use fdsn_client::{SampleStream, StreamId};
use rand::RngCore;
use std::time::Duration;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Collaborator seams
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("{0}")]
    RateLimit(String),

    #[error("{0}")]
    Other(String),
}

/// Source of raw samples for one stream and window.
pub trait Provider {
    fn fetch(&self, id: &StreamId, window: &TimeWindow) -> Result<SampleStream, FetchError>;

    /// Like [`fetch`](Self::fetch), but malformed sub-records are dropped
    /// instead of failing the request.
    fn fetch_lenient(&self, id: &StreamId, window: &TimeWindow)
        -> Result<SampleStream, FetchError>;
}

/// The only suspension point of the engine.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

// ---------------------------------------------------------------------------
// ChunkOutcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ChunkOutcome {
    /// The normal fetch returned, possibly with no data.
    Fetched(SampleStream),
    /// The lenient fallback salvaged data from a corrupt response.
    Recovered(SampleStream),
    /// The lenient fallback succeeded but had nothing usable.
    RecoveryEmpty,
    RecoveryFailed { error: String },
    GivenUp {
        attempts: u32,
        /// Total backoff slept before giving up.
        waited: Duration,
        last_error: String,
    },
}

impl ChunkOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ChunkOutcome::Fetched(_) => "fetched",
            ChunkOutcome::Recovered(_) => "recovered",
            ChunkOutcome::RecoveryEmpty => "recovery-empty",
            ChunkOutcome::RecoveryFailed { .. } => "recovery-failed",
            ChunkOutcome::GivenUp { .. } => "given-up",
        }
    }

    /// The window's samples; terminal failures are an empty stream.
    pub fn into_stream(self) -> SampleStream {
        match self {
            ChunkOutcome::Fetched(stream) | ChunkOutcome::Recovered(stream) => stream,
            _ => SampleStream::empty(),
        }
    }
}

// ---------------------------------------------------------------------------
// RetryState
// ---------------------------------------------------------------------------

/// Retry bookkeeping for a single window. Dropped when the window terminates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    /// Failed recoverable attempts so far.
    pub attempt: u32,
    /// Backoff slept so far.
    pub waited: Duration,
}

// ---------------------------------------------------------------------------
// ChunkFetcher
// ---------------------------------------------------------------------------

pub struct ChunkFetcher<'a> {
    provider: &'a dyn Provider,
    sleeper: &'a dyn Sleeper,
    policy: &'a BackoffPolicy,
    max_retries: u32,
}

impl<'a> ChunkFetcher<'a> {
    pub fn new(
        provider: &'a dyn Provider,
        sleeper: &'a dyn Sleeper,
        policy: &'a BackoffPolicy,
        max_retries: u32,
    ) -> Self {
        Self {
            provider,
            sleeper,
            policy,
            max_retries,
        }
    }

    /// Run the window to a terminal state.
    ///
    /// Makes at most `1 + max_retries` normal attempts and at most one
    /// lenient attempt.
    pub fn fetch(&self, id: &StreamId, window: &TimeWindow, rng: &mut dyn RngCore) -> ChunkOutcome {
        let mut state = RetryState::default();
        loop {
            let err = match self.provider.fetch(id, window) {
                Ok(stream) => return ChunkOutcome::Fetched(stream),
                Err(err) => err,
            };

            let class = classify(&err);
            if class == FailureClassification::CorruptRecord {
                tracing::warn!(%window, error = %err, "corrupt miniSEED, trying lenient decode");
                return self.recover(id, window);
            }

            state.attempt += 1;
            if state.attempt > self.max_retries {
                tracing::warn!(
                    %window,
                    attempts = state.attempt,
                    waited_secs = format_args!("{:.1}", state.waited.as_secs_f64()),
                    error = %truncate(&err.to_string()),
                    "giving up on chunk"
                );
                return ChunkOutcome::GivenUp {
                    attempts: state.attempt,
                    waited: state.waited,
                    last_error: err.to_string(),
                };
            }

            let wait = self.policy.wait(state.attempt, class, rng);
            state.waited += wait;
            tracing::info!(
                %window,
                attempt = state.attempt,
                max_retries = self.max_retries,
                wait_secs = format_args!("{:.1}", wait.as_secs_f64()),
                kind = class.as_str(),
                "retrying chunk"
            );
            self.sleeper.sleep(wait);
        }
    }

    fn recover(&self, id: &StreamId, window: &TimeWindow) -> ChunkOutcome {
        match self.provider.fetch_lenient(id, window) {
            Ok(stream) if stream.is_empty() => {
                tracing::warn!(%window, "lenient decode yielded no usable data");
                ChunkOutcome::RecoveryEmpty
            }
            Ok(stream) => {
                tracing::info!(%window, traces = stream.traces.len(), "lenient decode recovered data");
                ChunkOutcome::Recovered(stream)
            }
            Err(err) => {
                tracing::warn!(%window, error = %err, "lenient decode failed, skipping chunk");
                ChunkOutcome::RecoveryFailed {
                    error: err.to_string(),
                }
            }
        }
    }
}

fn truncate(message: &str) -> String {
    message.chars().take(180).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
