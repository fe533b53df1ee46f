//! Booking loop: the consumer half of the dual-loop engine (spec §4.7).
//!
//! Never races multiple reservations in parallel within this loop;
//! parallelism is only between this loop and the search loop (spec §4.7).

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::backoff::BackoffConfig;
use crate::error::{classify, ErrorClass};
use crate::state::{EngineAction, EngineStateHandle, Phase};

const EMPTY_SLOTS_POLL: Duration = Duration::from_millis(100);

pub async fn run(
    state: EngineStateHandle,
    api: ApiClient,
    backoff: BackoffConfig,
    location_id: String,
    party_size: u32,
    only_children: bool,
    cancel: CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            break;
        }
        let snapshot = state.snapshot();
        if snapshot.phase == Phase::Success {
            break;
        }

        if snapshot.search.slots.is_empty() {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(EMPTY_SLOTS_POLL) => continue,
            }
        }

        if snapshot.phase == Phase::Searching {
            ensure_consulate_details(&state, &api, &cancel).await;
            state.dispatch(EngineAction::StartReservation).await;
        }

        let snapshot = state.snapshot();
        let idx = snapshot.reservation.current_slot_index;
        let Some(slot) = snapshot.search.slots.get(idx) else {
            // Slots moved under us (shrank) between the check above and
            // here; wait for the next UPDATE_SEARCH rather than guess.
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(EMPTY_SLOTS_POLL) => continue,
            }
        };
        let date = slot.date.clone();
        // Token read atomically with the slots snapshot it came from,
        // never paired with a fresher or staler token (spec §5 ordering).
        let Some(token) = snapshot.search.token.clone() else {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(EMPTY_SLOTS_POLL) => continue,
            }
        };

        state.dispatch(EngineAction::IncrementReservationAttempt).await;

        match api
            .create_reservation(&date, &location_id, &token, party_size, only_children, &cancel)
            .await
        {
            Ok(result) => {
                // Cancellation fires before the success action publishes,
                // so no concurrent checkSlots can overwrite slots after
                // this point (spec §9 cancellation plumbing).
                cancel.cancel();
                state.dispatch(EngineAction::ReservationSuccess(result)).await;
                info!("booking loop latched success, returning");
                return;
            }
            Err(failure) => {
                if state.snapshot().phase == Phase::Success {
                    break;
                }

                let (class, reason) = classify(&failure);
                state
                    .dispatch(EngineAction::LogReservationError {
                        class,
                        reason,
                        message: failure.to_string(),
                    })
                    .await;

                if class == ErrorClass::RateLimitHard {
                    warn!("hard rate limit hit in booking loop, stopping engine");
                    state.dispatch(EngineAction::StopAll).await;
                    return;
                }

                if class == ErrorClass::SlotUnavailable {
                    state.dispatch(EngineAction::TryNextSlot).await;
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(backoff.slot_switch_delay()) => {}
                    }
                } else {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(backoff.retry_delay()) => {}
                    }
                }
            }
        }
    }

    info!("booking loop exiting");
}

/// Fetches consulate/location details once, the first time the booking loop
/// is about to enter `booking` (spec §4.7's `ensureConsulateDetails()`).
/// Best-effort: these are display metadata for collaborators building a
/// form URL later (spec §3), not required for the reservation race itself,
/// so a failure here is logged and otherwise ignored.
async fn ensure_consulate_details(state: &EngineStateHandle, api: &ApiClient, cancel: &CancellationToken) {
    if state.snapshot().consulate_details.is_some() {
        return;
    }
    match api.list_countries(cancel).await {
        Ok(countries) => state.dispatch(EngineAction::SetConsulateDetails(countries)).await,
        Err(e) => warn!(error = %e, "failed to fetch consulate details, proceeding without them"),
    }
}
