//! Search loop: the producer half of the dual-loop engine (spec §4.6).
//!
//! Shaped like the teacher's session loops in `bot.rs`, a `tokio::select!`
//! between a cancellation token and the next unit of work, `tracing` calls
//! at the same transition points, generalized to the capture-token /
//! check-slots / publish cycle instead of a click loop.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::backoff::BackoffConfig;
use crate::captcha::CaptchaPipeline;
use crate::error::{classify, ErrorClass};
use crate::state::{EngineAction, EngineStateHandle, Phase};

/// Runs until `phase = success` or `cancel` fires. Intended to be spawned
/// as its own task by the coordinator.
pub async fn run(
    state: EngineStateHandle,
    api: ApiClient,
    captcha: CaptchaPipeline,
    backoff: BackoffConfig,
    location_id: String,
    party_size: u32,
    cancel: CancellationToken,
) {
    let mut consecutive_captcha_failures: u32 = 0;

    loop {
        if cancel.is_cancelled() || state.snapshot().phase == Phase::Success {
            break;
        }

        state.dispatch(EngineAction::IncrementSearchAttempt).await;

        let outcome = run_one_attempt(
            &state,
            &api,
            &captcha,
            &location_id,
            party_size,
            &cancel,
            &mut consecutive_captcha_failures,
        )
        .await;

        match outcome {
            Ok(()) => {
                if state.snapshot().phase == Phase::Success {
                    break;
                }
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(backoff.success_delay()) => {}
                }
            }
            Err(failure) => {
                if state.snapshot().phase == Phase::Success {
                    break;
                }

                let (class, reason) = classify(&failure);
                state
                    .dispatch(EngineAction::LogSearchError {
                        class,
                        reason,
                        message: failure.to_string(),
                    })
                    .await;

                if class == ErrorClass::RateLimitHard {
                    warn!("hard rate limit hit in search loop, stopping engine");
                    state.dispatch(EngineAction::StopAll).await;
                    return;
                }

                if class == ErrorClass::Captcha {
                    consecutive_captcha_failures += 1;
                } else if matches!(class, ErrorClass::RateLimitSoft | ErrorClass::Network | ErrorClass::Timeout) {
                    consecutive_captcha_failures = 0;
                }

                let Some(delay) = backoff.delay_for(class, consecutive_captcha_failures) else {
                    break;
                };
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }

    info!("search loop exiting");
}

async fn run_one_attempt(
    state: &EngineStateHandle,
    api: &ApiClient,
    captcha: &CaptchaPipeline,
    location_id: &str,
    party_size: u32,
    cancel: &CancellationToken,
    consecutive_captcha_failures: &mut u32,
) -> Result<(), crate::error::ApiFailure> {
    let solved = captcha.solve_verified(cancel).await?;
    state
        .dispatch(EngineAction::RecordCaptchaSuccess { duration_ms: solved.duration.as_millis() as u64 })
        .await;
    // Reset right after the solve succeeds (spec §4.6), not after checkSlots
    // too, so a checkSlots failure following a good solve doesn't inflate
    // the next captcha backoff.
    *consecutive_captcha_failures = 0;
    let result = api.check_slots(location_id, party_size, &solved.token, cancel).await?;

    if state.snapshot().phase == Phase::Success {
        return Ok(());
    }

    state.dispatch(EngineAction::UpdateSearch { result }).await;
    Ok(())
}
