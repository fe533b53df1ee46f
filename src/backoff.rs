//! Backoff policy: translates an [`ErrorClass`](crate::error::ErrorClass) and
//! a consecutive-failure count into the next inter-attempt delay.
//!
//! Adapted from the teacher's `rate::limiter::calculate_backoff_with_jitter`,
//! same jitter-via-`rand::thread_rng` shape, but table-driven per class
//! instead of a single exponential curve, per spec §4.2.

use std::time::Duration;

use rand::Rng;

use crate::error::ErrorClass;

/// All constants from spec §4.2's table. Every field is independently
/// overridable so tests can shrink them to keep runtimes short.
#[derive(Debug, Clone, Copy)]
pub struct BackoffConfig {
    pub base_ms: u64,
    pub jitter_ms: u64,
    pub soft_base_ms: u64,
    pub captcha_base_ms: u64,
    pub captcha_max_ms: u64,
    pub captcha_multiplier: f64,
    pub slot_switch_delay_ms: u64,
    pub retry_delay_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_ms: 500,
            jitter_ms: 1000,
            soft_base_ms: 3000,
            captcha_base_ms: 2500,
            captcha_max_ms: 12000,
            captcha_multiplier: 2.0,
            slot_switch_delay_ms: 100,
            retry_delay_ms: 200,
        }
    }
}

fn jitter(max: u64) -> u64 {
    if max == 0 {
        0
    } else {
        rand::thread_rng().gen_range(0..=max)
    }
}

impl BackoffConfig {
    /// Delay to use between successful search polls.
    pub fn success_delay(&self) -> Duration {
        Duration::from_millis(self.base_ms + jitter(self.jitter_ms))
    }

    /// Delay for the booking loop's slot-switch step.
    pub fn slot_switch_delay(&self) -> Duration {
        Duration::from_millis(self.slot_switch_delay_ms)
    }

    /// Delay for the booking loop's same-slot retry step.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Next delay for a given error class, given the count of *consecutive*
    /// captcha failures seen so far (only meaningful for `Captcha`).
    ///
    /// Returns `None` for `RateLimitHard`, which is fatal. Callers must
    /// stop rather than sleep and retry.
    pub fn delay_for(&self, class: ErrorClass, consecutive_captcha_failures: u32) -> Option<Duration> {
        match class {
            ErrorClass::RateLimitHard => None,
            ErrorClass::RateLimitSoft => {
                Some(Duration::from_millis(self.soft_base_ms + jitter(2 * self.jitter_ms)))
            }
            ErrorClass::Captcha => {
                let k = consecutive_captcha_failures.min(32);
                let exp = self.captcha_multiplier.powi(k as i32);
                let scaled = (self.captcha_base_ms as f64 * exp).min(self.captcha_max_ms as f64);
                Some(Duration::from_millis(scaled as u64 + jitter(self.jitter_ms)))
            }
            ErrorClass::Network | ErrorClass::Timeout => {
                Some(Duration::from_millis(2 * self.base_ms + jitter(self.jitter_ms)))
            }
            ErrorClass::SlotUnavailable => Some(self.slot_switch_delay()),
            ErrorClass::Api | ErrorClass::Unknown => Some(self.retry_delay()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_hard_has_no_delay() {
        let cfg = BackoffConfig::default();
        assert!(cfg.delay_for(ErrorClass::RateLimitHard, 0).is_none());
    }

    #[test]
    fn soft_rate_limit_is_at_least_soft_base() {
        let cfg = BackoffConfig::default();
        for _ in 0..50 {
            let d = cfg.delay_for(ErrorClass::RateLimitSoft, 0).unwrap();
            assert!(d.as_millis() as u64 >= cfg.soft_base_ms);
            assert!(d.as_millis() as u64 <= cfg.soft_base_ms + 2 * cfg.jitter_ms);
        }
    }

    #[test]
    fn captcha_backoff_grows_with_consecutive_failures_and_caps() {
        let cfg = BackoffConfig::default();
        let d0 = cfg.delay_for(ErrorClass::Captcha, 0).unwrap().as_millis() as u64;
        let d1 = cfg.delay_for(ErrorClass::Captcha, 1).unwrap().as_millis() as u64;
        let d_big = cfg.delay_for(ErrorClass::Captcha, 20).unwrap().as_millis() as u64;

        // Base case should be close to captcha_base_ms (plus jitter).
        assert!(d0 >= cfg.captcha_base_ms);
        assert!(d0 <= cfg.captcha_base_ms + cfg.jitter_ms);

        // k=1 should be strictly larger in the no-jitter floor.
        assert!(d1 >= (cfg.captcha_base_ms as f64 * cfg.captcha_multiplier) as u64);

        // Large k must be capped at captcha_max_ms + jitter.
        assert!(d_big <= cfg.captcha_max_ms + cfg.jitter_ms);
    }

    #[test]
    fn network_and_timeout_use_double_base() {
        let cfg = BackoffConfig::default();
        for class in [ErrorClass::Network, ErrorClass::Timeout] {
            let d = cfg.delay_for(class, 0).unwrap().as_millis() as u64;
            assert!(d >= 2 * cfg.base_ms);
            assert!(d <= 2 * cfg.base_ms + cfg.jitter_ms);
        }
    }

    #[test]
    fn slot_unavailable_and_api_use_fixed_short_delays() {
        let cfg = BackoffConfig::default();
        assert_eq!(cfg.delay_for(ErrorClass::SlotUnavailable, 0).unwrap().as_millis() as u64, cfg.slot_switch_delay_ms);
        assert_eq!(cfg.delay_for(ErrorClass::Api, 0).unwrap().as_millis() as u64, cfg.retry_delay_ms);
        assert_eq!(cfg.delay_for(ErrorClass::Unknown, 0).unwrap().as_millis() as u64, cfg.retry_delay_ms);
    }

    #[test]
    fn success_delay_is_base_plus_bounded_jitter() {
        let cfg = BackoffConfig::default();
        for _ in 0..50 {
            let d = cfg.success_delay().as_millis() as u64;
            assert!(d >= cfg.base_ms);
            assert!(d <= cfg.base_ms + cfg.jitter_ms);
        }
    }
}
