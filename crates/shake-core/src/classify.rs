//! Failure classification over the provider's error channel.
//!
//! Providers surface failures as loosely structured text. Classification is
//! best-effort: anything not recognised as corruption or throttling is
//! treated as transient.

use crate::fetcher::FetchError;
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClassification {
    CorruptRecord,
    RateLimited { hint_seconds: Option<u64> },
    TransientError,
}

impl FailureClassification {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureClassification::CorruptRecord => "corrupt",
            FailureClassification::RateLimited { .. } => "429",
            FailureClassification::TransientError => "error",
        }
    }

    pub fn hint_seconds(self) -> Option<u64> {
        match self {
            FailureClassification::RateLimited { hint_seconds } => hint_seconds,
            _ => None,
        }
    }
}

impl fmt::Display for FailureClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

static RATE_LIMIT_RE: OnceLock<Regex> = OnceLock::new();
static RETRY_AFTER_RE: OnceLock<Regex> = OnceLock::new();
static RETRY_IN_RE: OnceLock<Regex> = OnceLock::new();

fn rate_limit_re() -> &'static Regex {
    RATE_LIMIT_RE
        .get_or_init(|| Regex::new(r"(?i)\b429\b|too many requests|rate[ -]?limit").unwrap())
}

/// `Retry-After: 30`, `retry-after 30`
fn retry_after_re() -> &'static Regex {
    RETRY_AFTER_RE.get_or_init(|| Regex::new(r"(?i)retry-after[:\s]+(\d+)").unwrap())
}

/// `retry in 30 seconds`, `Retry after 5s`, `retry 12 second`
fn retry_in_re() -> &'static Regex {
    RETRY_IN_RE.get_or_init(|| {
        Regex::new(r"(?i)retry(?:\s+in|\s+after)?\s+(\d+)\s*s(?:ec(?:ond)?s?)?\b").unwrap()
    })
}

/// True when `message` looks like provider throttling.
pub fn is_rate_limit_message(message: &str) -> bool {
    rate_limit_re().is_match(message)
}

/// Pull a wait hint, in whole seconds, out of free text.
///
/// A `Retry-After` header echo wins over an inline "retry in N seconds".
pub fn parse_retry_hint(message: &str) -> Option<u64> {
    [retry_after_re(), retry_in_re()]
        .into_iter()
        .find_map(|re| re.captures(message)?.get(1)?.as_str().parse().ok())
}

/// Assign exactly one classification to a provider failure. Never fails.
pub fn classify(err: &FetchError) -> FailureClassification {
    match err {
        FetchError::Corrupt(_) => FailureClassification::CorruptRecord,
        FetchError::RateLimit(message) => FailureClassification::RateLimited {
            hint_seconds: parse_retry_hint(message),
        },
        FetchError::Other(message) if is_rate_limit_message(message) => {
            FailureClassification::RateLimited {
                hint_seconds: parse_retry_hint(message),
            }
        }
        FetchError::Other(_) => FailureClassification::TransientError,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corrupt_variant_wins() {
        let err = FetchError::Corrupt("steim frame error, 429 bytes".to_string());
        assert_eq!(classify(&err), FailureClassification::CorruptRecord);
    }

    #[test]
    fn rate_limit_variant_extracts_header_hint() {
        let err = FetchError::RateLimit("HTTP 429 Too Many Requests (Retry-After: 30)".to_string());
        assert_eq!(
            classify(&err),
            FailureClassification::RateLimited {
                hint_seconds: Some(30)
            }
        );
    }

    #[test]
    fn free_text_throttling_is_rate_limited() {
        for msg in [
            "HTTP Error 429",
            "Too Many Requests",
            "client hit the Rate Limit",
            "rate-limit exceeded, retry in 12 seconds",
        ] {
            let class = classify(&FetchError::Other(msg.to_string()));
            assert!(
                matches!(class, FailureClassification::RateLimited { .. }),
                "{msg}"
            );
        }
        let class = classify(&FetchError::Other(
            "rate-limit exceeded, retry in 12 seconds".to_string(),
        ));
        assert_eq!(class.hint_seconds(), Some(12));
    }

    #[test]
    fn everything_else_is_transient() {
        for msg in ["", "connection reset by peer", "HTTP 503: upstream", "port 4290 refused"] {
            assert_eq!(
                classify(&FetchError::Other(msg.to_string())),
                FailureClassification::TransientError,
                "{msg:?}"
            );
        }
    }

    #[test]
    fn hint_patterns() {
        assert_eq!(parse_retry_hint("Retry-After: 120"), Some(120));
        assert_eq!(parse_retry_hint("retry-After 7"), Some(7));
        assert_eq!(parse_retry_hint("retry-after: 30"), Some(30));
        assert_eq!(parse_retry_hint("Retry-after: 30"), Some(30));
        assert_eq!(parse_retry_hint("RETRY-AFTER 4"), Some(4));
        assert_eq!(parse_retry_hint("please RETRY AFTER 9 seconds"), Some(9));
        assert_eq!(parse_retry_hint("retry 3s"), Some(3));
        assert_eq!(parse_retry_hint("Retry-After: Wed, 21 Oct 2026 07:28:00 GMT"), None);
        assert_eq!(parse_retry_hint("no hint here"), None);
        assert_eq!(parse_retry_hint("retry in 99999999999999999999999 seconds"), None);
    }

    #[test]
    fn header_hint_preferred_over_inline() {
        assert_eq!(
            parse_retry_hint("Retry-After: 40; or retry in 5 seconds"),
            Some(40)
        );
    }
}
