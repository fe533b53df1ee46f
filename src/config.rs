//! Runtime configuration, loaded from `EKONSULAT_*` environment variables.
//!
//! Mirrors the teacher's env-driven config shape (`RateLimiterConfig`,
//! `ScheduleConfig`) but sourced from the process environment instead of a
//! saved JSON file, since there is no persistence layer in this engine.

use std::time::Duration;

use crate::backoff::BackoffConfig;

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_u64(key: &str, default: u64) -> u64 {
    env_string(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingRequired(&'static str),
    #[error("environment variable {0} has an invalid value: {1}")]
    Invalid(&'static str, String),
}

/// Everything the engine needs to start, resolved once at process startup.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub location_id: String,
    pub party_size: u32,
    pub captcha_api_key: String,
    pub base_url: String,
    pub request_timeout: Duration,
    pub backoff: BackoffConfig,
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let location_id = env_string("EKONSULAT_LOCATION_ID")
            .ok_or(ConfigError::MissingRequired("EKONSULAT_LOCATION_ID"))?;

        let party_size = env_string("EKONSULAT_PARTY_SIZE")
            .ok_or(ConfigError::MissingRequired("EKONSULAT_PARTY_SIZE"))?
            .parse::<u32>()
            .map_err(|e| ConfigError::Invalid("EKONSULAT_PARTY_SIZE", e.to_string()))?;
        if party_size == 0 {
            return Err(ConfigError::Invalid("EKONSULAT_PARTY_SIZE", "must be positive".into()));
        }

        let captcha_api_key = env_string("EKONSULAT_CAPTCHA_API_KEY")
            .ok_or(ConfigError::MissingRequired("EKONSULAT_CAPTCHA_API_KEY"))?;

        let base_url = env_string("EKONSULAT_BASE_URL").unwrap_or_else(|| "https://e-konsulat.gov.pl".to_string());
        let request_timeout = Duration::from_secs(env_u64("EKONSULAT_REQUEST_TIMEOUT_SECS", 30));

        let backoff = BackoffConfig {
            base_ms: env_u64("EKONSULAT_BASE_MS", BackoffConfig::default().base_ms),
            jitter_ms: env_u64("EKONSULAT_JITTER_MS", BackoffConfig::default().jitter_ms),
            soft_base_ms: env_u64("EKONSULAT_SOFT_BASE_MS", BackoffConfig::default().soft_base_ms),
            captcha_base_ms: env_u64("EKONSULAT_CAP_BASE_MS", BackoffConfig::default().captcha_base_ms),
            captcha_max_ms: env_u64("EKONSULAT_CAP_MAX_MS", BackoffConfig::default().captcha_max_ms),
            slot_switch_delay_ms: env_u64(
                "EKONSULAT_SLOT_SWITCH_DELAY_MS",
                BackoffConfig::default().slot_switch_delay_ms,
            ),
            retry_delay_ms: env_u64("EKONSULAT_RETRY_DELAY_MS", BackoffConfig::default().retry_delay_ms),
            ..BackoffConfig::default()
        };

        Ok(Self {
            location_id,
            party_size,
            captcha_api_key,
            base_url,
            request_timeout,
            backoff,
        })
    }
}
