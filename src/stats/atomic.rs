//! Lock-free statistics using atomic operations.
//!
//! Ported from the teacher's `stats::atomic::{SessionStats, GlobalStats}`,
//! same `AtomicU64` + `Ordering::Relaxed` shape, generalized to the
//! counters spec §9 names: captcha attempts/successes/failures, average
//! solve duration, total running time, per-class error counts.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::ErrorClass;

const CLASS_COUNT: usize = 8;

fn class_index(class: ErrorClass) -> usize {
    match class {
        ErrorClass::RateLimitHard => 0,
        ErrorClass::RateLimitSoft => 1,
        ErrorClass::Captcha => 2,
        ErrorClass::SlotUnavailable => 3,
        ErrorClass::Api => 4,
        ErrorClass::Timeout => 5,
        ErrorClass::Network => 6,
        ErrorClass::Unknown => 7,
    }
}

fn class_name(index: usize) -> &'static str {
    match index {
        0 => "rate_limit_hard",
        1 => "rate_limit_soft",
        2 => "captcha",
        3 => "slot_unavailable",
        4 => "api",
        5 => "timeout",
        6 => "network",
        _ => "unknown",
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Engine-wide statistics, mutated only from within the state actor so
/// every update is still a single-writer action like any other (spec §9).
#[derive(Debug)]
pub struct EngineStats {
    pub search_attempts: AtomicU64,
    pub reservation_attempts: AtomicU64,
    pub captcha_attempts: AtomicU64,
    pub captcha_successes: AtomicU64,
    pub captcha_failures: AtomicU64,
    pub total_captcha_solve_ms: AtomicU64,
    error_counts: [AtomicU64; CLASS_COUNT],
    start_time: AtomicU64,
}

impl Default for EngineStats {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineStats {
    pub fn new() -> Self {
        Self {
            search_attempts: AtomicU64::new(0),
            reservation_attempts: AtomicU64::new(0),
            captcha_attempts: AtomicU64::new(0),
            captcha_successes: AtomicU64::new(0),
            captcha_failures: AtomicU64::new(0),
            total_captcha_solve_ms: AtomicU64::new(0),
            error_counts: Default::default(),
            start_time: AtomicU64::new(0),
        }
    }

    /// Records the run's start time if it hasn't been recorded yet
    /// (START_SEARCH's "set stats.startTime if unset" clause).
    pub fn mark_started_if_unset(&self) {
        let _ = self
            .start_time
            .compare_exchange(0, now_secs(), Ordering::Relaxed, Ordering::Relaxed);
    }

    pub fn record_search_attempt(&self) {
        self.search_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reservation_attempt(&self) {
        self.reservation_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_captcha_success(&self, solve_ms: u64) {
        self.captcha_attempts.fetch_add(1, Ordering::Relaxed);
        self.captcha_successes.fetch_add(1, Ordering::Relaxed);
        self.total_captcha_solve_ms.fetch_add(solve_ms, Ordering::Relaxed);
    }

    pub fn record_captcha_failure(&self) {
        self.captcha_attempts.fetch_add(1, Ordering::Relaxed);
        self.captcha_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self, class: ErrorClass) {
        self.error_counts[class_index(class)].fetch_add(1, Ordering::Relaxed);
    }

    pub fn average_captcha_solve_ms(&self) -> f64 {
        let successes = self.captcha_successes.load(Ordering::Relaxed);
        if successes == 0 {
            return 0.0;
        }
        self.total_captcha_solve_ms.load(Ordering::Relaxed) as f64 / successes as f64
    }

    pub fn running_duration_secs(&self) -> u64 {
        let start = self.start_time.load(Ordering::Relaxed);
        if start == 0 {
            return 0;
        }
        now_secs().saturating_sub(start)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let mut error_counts_by_class = std::collections::HashMap::with_capacity(CLASS_COUNT);
        for (i, counter) in self.error_counts.iter().enumerate() {
            let count = counter.load(Ordering::Relaxed);
            if count > 0 {
                error_counts_by_class.insert(class_name(i).to_string(), count);
            }
        }

        StatsSnapshot {
            search_attempts: self.search_attempts.load(Ordering::Relaxed),
            reservation_attempts: self.reservation_attempts.load(Ordering::Relaxed),
            captcha_attempts: self.captcha_attempts.load(Ordering::Relaxed),
            captcha_successes: self.captcha_successes.load(Ordering::Relaxed),
            captcha_failures: self.captcha_failures.load(Ordering::Relaxed),
            average_captcha_solve_ms: self.average_captcha_solve_ms(),
            running_duration_secs: self.running_duration_secs(),
            error_counts_by_class,
        }
    }
}

/// Serializable snapshot of [`EngineStats`] for UI/CLI consumers.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub search_attempts: u64,
    pub reservation_attempts: u64,
    pub captcha_attempts: u64,
    pub captcha_successes: u64,
    pub captcha_failures: u64,
    pub average_captcha_solve_ms: f64,
    pub running_duration_secs: u64,
    pub error_counts_by_class: std::collections::HashMap<String, u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captcha_counters_track_attempts_successes_failures() {
        let stats = EngineStats::new();
        stats.record_captcha_failure();
        stats.record_captcha_failure();
        stats.record_captcha_success(150);

        let snap = stats.snapshot();
        assert_eq!(snap.captcha_attempts, 3);
        assert_eq!(snap.captcha_failures, 2);
        assert_eq!(snap.captcha_successes, 1);
        assert_eq!(snap.average_captcha_solve_ms, 150.0);
    }

    #[test]
    fn error_counts_are_bucketed_by_class() {
        let stats = EngineStats::new();
        stats.record_error(ErrorClass::Captcha);
        stats.record_error(ErrorClass::Captcha);
        stats.record_error(ErrorClass::Network);

        let snap = stats.snapshot();
        assert_eq!(snap.error_counts_by_class.get("captcha"), Some(&2));
        assert_eq!(snap.error_counts_by_class.get("network"), Some(&1));
        assert_eq!(snap.error_counts_by_class.get("timeout"), None);
    }

    #[test]
    fn start_time_is_set_once() {
        let stats = EngineStats::new();
        assert_eq!(stats.running_duration_secs(), 0);
        stats.mark_started_if_unset();
        // A second call must not reset the clock.
        let first = stats.start_time.load(Ordering::Relaxed);
        stats.mark_started_if_unset();
        assert_eq!(stats.start_time.load(Ordering::Relaxed), first);
    }
}
