use crate::classify::FailureClassification;
use rand::{Rng, RngCore};
use std::time::Duration;

pub const DEFAULT_INITIAL: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX: Duration = Duration::from_secs(600);
pub const DEFAULT_JITTER_MAX: Duration = Duration::from_millis(1500);

/// Longest timing value, in seconds, taken from configuration.
pub const MAX_CONFIG_SECONDS: f64 = 86_400.0;

const RATE_LIMIT_GROWTH: f64 = 2.0;
const TRANSIENT_GROWTH: f64 = 1.5;

/// Wait schedule between retries of one window.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub max: Duration,
    pub jitter_max: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: DEFAULT_INITIAL,
            max: DEFAULT_MAX,
            jitter_max: DEFAULT_JITTER_MAX,
        }
    }
}

impl BackoffPolicy {
    /// Wait before retry number `attempt` (1-based), without jitter.
    ///
    /// A provider hint is taken as-is, capped at `max`. Otherwise the wait is
    /// `initial * growth^(attempt - 1)`, capped at `max`, where growth is 2.0
    /// for throttling and 1.5 for everything else.
    pub fn base_wait(&self, attempt: u32, class: FailureClassification) -> Duration {
        if let Some(hint) = class.hint_seconds() {
            return Duration::from_secs(hint).min(self.max);
        }
        let growth = match class {
            FailureClassification::RateLimited { .. } => RATE_LIMIT_GROWTH,
            _ => TRANSIENT_GROWTH,
        };
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial.as_secs_f64() * growth.powi(exponent);
        let capped = secs.min(self.max.as_secs_f64());
        if capped.is_finite() && capped > 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            Duration::ZERO
        }
    }

    /// [`base_wait`](Self::base_wait) plus a uniform jitter in `[0, jitter_max)`.
    pub fn wait(
        &self,
        attempt: u32,
        class: FailureClassification,
        rng: &mut dyn RngCore,
    ) -> Duration {
        self.base_wait(attempt, class) + jitter(rng, self.jitter_max)
    }
}

/// Uniform random delay in `[0, max)`.
pub fn jitter(rng: &mut dyn RngCore, max: Duration) -> Duration {
    if max.is_zero() {
        return Duration::ZERO;
    }
    max.mul_f64(rng.gen::<f64>())
}

/// Seconds from configuration as a duration.
///
/// Negative or non-finite is zero; anything above [`MAX_CONFIG_SECONDS`] is
/// clamped to it.
pub fn seconds(value: f64) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::from_secs_f64(value.min(MAX_CONFIG_SECONDS))
    } else {
        Duration::ZERO
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
