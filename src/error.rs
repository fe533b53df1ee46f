//! Closed error taxonomy and the pure classifier that maps any upstream
//! failure into it.
//!
//! Ported from the teacher's `browser::BrowserError` / rate-limiter idiom:
//! a `thiserror` enum for the failure shape the HTTP layer actually saw,
//! plus a free function that never performs I/O and never panics.

use std::fmt;

/// Anything that can go wrong while talking to the upstream e-konsulat API
/// or the CAPTCHA solver, before classification.
///
/// This is the raw shape the classifier consumes. It intentionally keeps
/// the upstream reason string (when present) separate from the HTTP status,
/// since the classifier needs both.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiFailure {
    #[error("http {status}: {reason:?}")]
    Http {
        status: u16,
        /// Decoded `reason` field from the JSON body, if the body parsed
        /// and carried one (e.g. `LIMIT_Z_JEDNEGO_IP_PRZEKROCZONY`).
        reason: Option<String>,
        /// Raw body, kept for messages the classifier matches on substring
        /// (e.g. "too many requests") when there is no structured reason.
        body: Option<String>,
    },
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("request cancelled")]
    Cancelled,
    #[error("network error: {0}")]
    Network(String),
    #[error("failed to decode response: {0}")]
    Decode(String),
    #[error("captcha rejected: {0}")]
    Captcha(String),
    /// HTTP 200 from `createReservation` whose `ticketId` was absent, the
    /// domain-level "someone already took it" signal (§4.1 rule 1).
    #[error("slot no longer available")]
    SlotUnavailable,
    /// A request was rejected before it left the client (empty locationId,
    /// non-positive partySize, empty token, malformed date). Spec §4.4
    /// classifies these as `api`, same bucket as upstream 4xx.
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("{0}")]
    Other(String),
}

impl ApiFailure {
    pub fn http(status: u16, reason: Option<String>, body: Option<String>) -> Self {
        Self::Http { status, reason, body }
    }
}

/// The closed taxonomy every failure is mapped into (spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Upstream reason `LIMIT_Z_JEDNEGO_IP_PRZEKROCZONY`, session-terminating
    /// IP ban. Fatal: the caller must stop.
    RateLimitHard,
    /// HTTP 429, CAPTCHA-verify 403, or a "too many requests" message.
    RateLimitSoft,
    /// CAPTCHA not accepted, or the solver produced an invalid code.
    Captcha,
    /// HTTP 200 with a null ticket, or upstream reason `TERMIN_ZAJETY`.
    SlotUnavailable,
    /// Other structured upstream failure with a known or unknown reason.
    Api,
    /// Per-request deadline elapsed, or cancellation fired mid-request.
    Timeout,
    /// Transport-level failure (connection refused, DNS, etc).
    Network,
    /// Anything the rules below don't recognize.
    Unknown,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::RateLimitHard => "rate_limit_hard",
            Self::RateLimitSoft => "rate_limit_soft",
            Self::Captcha => "captcha",
            Self::SlotUnavailable => "slot_unavailable",
            Self::Api => "api",
            Self::Timeout => "timeout",
            Self::Network => "network",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Reason code from the upstream `reason` field, preserved verbatim when
/// the classifier has one (e.g. `NIEPRAWIDLOWY_TOKEN`).
pub type UpstreamReason = Option<String>;

const REASON_RATE_LIMIT_HARD: &str = "LIMIT_Z_JEDNEGO_IP_PRZEKROCZONY";
const KNOWN_API_REASONS: &[&str] = &[
    "BRAK_WOLNYCH_TERMINOW",
    "NIEPRAWIDLOWY_TOKEN",
    "TERMIN_ZAJETY",
];

/// Classify an [`ApiFailure`] into `(class, upstream_reason)` per spec §4.1.
///
/// Pure: no I/O, never panics. Rules are applied in the order given in the
/// spec; the first match wins.
pub fn classify(failure: &ApiFailure) -> (ErrorClass, UpstreamReason) {
    match failure {
        // Rule 1: domain-level slot-unavailable signal.
        ApiFailure::SlotUnavailable => (ErrorClass::SlotUnavailable, None),

        ApiFailure::Http { status, reason, body } => {
            // Rule 2: hard IP ban.
            if reason.as_deref() == Some(REASON_RATE_LIMIT_HARD) {
                return (ErrorClass::RateLimitHard, reason.clone());
            }

            // Rule 3: soft rate limit via 429 or message text.
            if *status == 429 || contains_ci(body, "too many requests") || contains_ci(reason, "too many requests") {
                return (ErrorClass::RateLimitSoft, reason.clone());
            }

            // Rule 4: known 4xx reasons.
            if (400..500).contains(status) {
                if let Some(r) = reason {
                    if KNOWN_API_REASONS.iter().any(|known| known == r) {
                        if r == "TERMIN_ZAJETY" {
                            return (ErrorClass::SlotUnavailable, reason.clone());
                        }
                        return (ErrorClass::Api, reason.clone());
                    }
                }
            }

            // Rule 5: CAPTCHA-verify 403 is a throttle, not an auth failure.
            if *status == 403 {
                return (ErrorClass::RateLimitSoft, reason.clone());
            }

            // Rule 6: message mentions captcha.
            if contains_ci(body, "captcha") || contains_ci(reason, "captcha") {
                return (ErrorClass::Captcha, reason.clone());
            }

            // Rule 9: any remaining 4xx/5xx.
            if (400..600).contains(status) {
                return (ErrorClass::Api, reason.clone());
            }

            (ErrorClass::Unknown, reason.clone())
        }

        ApiFailure::Captcha(msg) => (ErrorClass::Captcha, Some(msg.clone())),

        // Rule 7: timeout / cancellation.
        ApiFailure::Timeout(_) | ApiFailure::Cancelled => (ErrorClass::Timeout, None),

        // Rule 8: network/transport failure.
        ApiFailure::Network(_) => (ErrorClass::Network, None),

        ApiFailure::Decode(msg) => (ErrorClass::Unknown, Some(msg.clone())),

        ApiFailure::Validation(msg) => (ErrorClass::Api, Some(msg.clone())),

        // Rule 10: anything else.
        ApiFailure::Other(msg) => (ErrorClass::Unknown, Some(msg.clone())),
    }
}

fn contains_ci(haystack: &Option<String>, needle: &str) -> bool {
    haystack
        .as_deref()
        .map(|s| s.to_lowercase().contains(needle))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_unavailable_signal_classifies_directly() {
        let (class, reason) = classify(&ApiFailure::SlotUnavailable);
        assert_eq!(class, ErrorClass::SlotUnavailable);
        assert!(reason.is_none());
    }

    #[test]
    fn hard_rate_limit_reason_wins_even_on_400() {
        let f = ApiFailure::http(400, Some(REASON_RATE_LIMIT_HARD.to_string()), None);
        let (class, reason) = classify(&f);
        assert_eq!(class, ErrorClass::RateLimitHard);
        assert_eq!(reason.as_deref(), Some(REASON_RATE_LIMIT_HARD));
    }

    #[test]
    fn http_429_is_soft_rate_limit() {
        let f = ApiFailure::http(429, None, None);
        assert_eq!(classify(&f).0, ErrorClass::RateLimitSoft);
    }

    #[test]
    fn too_many_requests_body_is_soft_rate_limit_even_on_other_status() {
        let f = ApiFailure::http(400, None, Some("Too Many Requests, slow down".into()));
        assert_eq!(classify(&f).0, ErrorClass::RateLimitSoft);
    }

    #[test]
    fn known_api_reason_preserved() {
        let f = ApiFailure::http(400, Some("NIEPRAWIDLOWY_TOKEN".into()), None);
        let (class, reason) = classify(&f);
        assert_eq!(class, ErrorClass::Api);
        assert_eq!(reason.as_deref(), Some("NIEPRAWIDLOWY_TOKEN"));
    }

    #[test]
    fn termin_zajety_is_slot_unavailable_not_api() {
        let f = ApiFailure::http(400, Some("TERMIN_ZAJETY".into()), None);
        assert_eq!(classify(&f).0, ErrorClass::SlotUnavailable);
    }

    #[test]
    fn captcha_verify_403_is_soft_rate_limit() {
        let f = ApiFailure::http(403, None, None);
        assert_eq!(classify(&f).0, ErrorClass::RateLimitSoft);
    }

    #[test]
    fn message_mentioning_captcha_classifies_as_captcha() {
        let f = ApiFailure::http(500, None, Some("captcha verification failed".into()));
        assert_eq!(classify(&f).0, ErrorClass::Captcha);
    }

    #[test]
    fn timeout_and_cancellation_both_classify_as_timeout() {
        assert_eq!(classify(&ApiFailure::Timeout("deadline".into())).0, ErrorClass::Timeout);
        assert_eq!(classify(&ApiFailure::Cancelled).0, ErrorClass::Timeout);
    }

    #[test]
    fn network_error_classifies_as_network() {
        assert_eq!(classify(&ApiFailure::Network("connection refused".into())).0, ErrorClass::Network);
    }

    #[test]
    fn unknown_4xx_without_reason_is_api() {
        let f = ApiFailure::http(418, None, None);
        assert_eq!(classify(&f).0, ErrorClass::Api);
    }

    #[test]
    fn validation_failure_classifies_as_api() {
        let f = ApiFailure::Validation("locationId is empty".into());
        assert_eq!(classify(&f).0, ErrorClass::Api);
    }

    #[test]
    fn classifier_is_total() {
        // Every variant must produce a result without panicking.
        let samples = vec![
            ApiFailure::SlotUnavailable,
            ApiFailure::http(200, None, None),
            ApiFailure::Timeout("x".into()),
            ApiFailure::Cancelled,
            ApiFailure::Network("x".into()),
            ApiFailure::Decode("x".into()),
            ApiFailure::Captcha("x".into()),
            ApiFailure::Validation("x".into()),
            ApiFailure::Other("x".into()),
        ];
        for f in samples {
            let _ = classify(&f);
        }
    }
}
