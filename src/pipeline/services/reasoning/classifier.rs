use crate::error::ServiceErrorKind;

use super::request::BackendFailure;

// The service has no typed error channel; these markers are matched against
// the lowercased failure message.
const RATE_LIMIT_MARKERS: &[&str] = &[
    "quota",
    "rate limit",
    "rate_limit",
    "resource_exhausted",
    "too many requests",
];

const TRANSIENT_MARKERS: &[&str] = &[
    "timed out",
    "timeout",
    "deadline",
    "unavailable",
    "overloaded",
    "connection",
    "error sending request",
    "reset by peer",
    "internal error",
];

/// Map an opaque backend failure onto the retry taxonomy.
pub fn classify(failure: &BackendFailure) -> ServiceErrorKind {
    let message = failure.message.to_lowercase();

    match failure.status {
        Some(429) => return ServiceErrorKind::RateLimited,
        Some(408) => return ServiceErrorKind::Transient,
        Some(status) if status >= 500 => {
            // Quota exhaustion is occasionally reported with a 5xx status
            if mentions_rate_limit(&message) {
                return ServiceErrorKind::RateLimited;
            }
            return ServiceErrorKind::Transient;
        }
        _ => {}
    }

    if mentions_rate_limit(&message) {
        ServiceErrorKind::RateLimited
    } else if contains_any(&message, TRANSIENT_MARKERS) {
        ServiceErrorKind::Transient
    } else {
        ServiceErrorKind::InvalidResponse
    }
}

fn contains_any(message: &str, markers: &[&str]) -> bool {
    markers.iter().any(|marker| message.contains(marker))
}

// Only a standalone `429` counts; digits inside ids and paths do not.
fn mentions_rate_limit(message: &str) -> bool {
    contains_any(message, RATE_LIMIT_MARKERS)
        || message
            .split(|c: char| !c.is_ascii_alphanumeric())
            .any(|token| token == "429")
}
