//! e-konsulat polling-and-booking engine.
//!
//! A CAPTCHA-gated search loop produces fresh `(token, slot-list)` pairs; a
//! booking loop consumes them and races for tickets; both are coordinated
//! through a single serialized state actor and a shared error-classifier /
//! backoff policy that keeps the engine alive under rate limits and
//! transient failures.

pub mod api;
pub mod backoff;
pub mod booking;
pub mod captcha;
pub mod config;
pub mod coordinator;
pub mod error;
mod http;
pub mod search;
pub mod state;
pub mod stats;

pub use config::EngineConfig;
pub use coordinator::Coordinator;

/// Top-level setup failure, distinct from [`error::ErrorClass`], that
/// taxonomy never escapes the engine, this one is what a CLI driver sees
/// before the engine has anything running to classify.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Initializes structured logging: an env-filtered console layer plus a
/// daily-rolling file layer under `EKONSULAT_LOG_DIR` (default `./logs`).
/// Ported from the teacher's `init_logging()`.
pub fn init_logging() -> tracing_appender::non_blocking::WorkerGuard {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let console_layer = tracing_subscriber::fmt::layer().with_target(true).with_thread_ids(false);

    let log_dir = std::env::var("EKONSULAT_LOG_DIR").unwrap_or_else(|_| "logs".to_string());
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "ekonsulat-engine.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(non_blocking);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    guard
}
