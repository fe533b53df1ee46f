//! The single-writer actor that owns `EngineState` (spec §4.5, §5).
//!
//! All mutation goes through one `mpsc` channel into one task; every
//! applied action re-publishes a full snapshot on a `watch` channel. This
//! is the mechanism, not a `Mutex`/`RwLock`, because Property 3 (token
//! freshness) requires the booking loop to read `(slots, token)` as one
//! atomically consistent pair, a snapshot clone gives it that for free.

use std::time::Instant;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::api::{CheckSlotsResult, Country, ReservationResult};
use crate::error::ErrorClass;
use crate::stats::EngineStats;

use super::types::{EngineParams, EngineStateSnapshot, ErrorLogEntry, Phase};

/// One named mutation, per the action table in spec §4.5.
#[derive(Debug)]
pub enum EngineAction {
    SetParams(EngineParams),
    StartSearch,
    IncrementSearchAttempt,
    UpdateSearch {
        result: CheckSlotsResult,
    },
    /// Not in the action table itself, but the search loop's pseudocontract
    /// (spec §4.6) calls `stats.recordCaptchaSuccess` right after a solve,
    /// routed through the actor so every stats mutation stays serialized.
    RecordCaptchaSuccess {
        duration_ms: u64,
    },
    LogSearchError {
        class: ErrorClass,
        reason: Option<String>,
        message: String,
    },
    /// Idempotent: only the first call stores anything, since
    /// `ensureConsulateDetails()` in spec §4.7 means "fetch once".
    SetConsulateDetails(Vec<Country>),
    StartReservation,
    IncrementReservationAttempt,
    TryNextSlot,
    LogReservationError {
        class: ErrorClass,
        reason: Option<String>,
        message: String,
    },
    ReservationSuccess(ReservationResult),
    StopAll,
}

/// Handle given to the loops and the coordinator. Cheap to clone: the
/// sender is an `mpsc::Sender` and the receiver a `watch::Receiver`.
#[derive(Clone)]
pub struct EngineStateHandle {
    actions: mpsc::Sender<EngineAction>,
    snapshots: watch::Receiver<EngineStateSnapshot>,
}

impl EngineStateHandle {
    /// Dispatches an action to the actor. Fire-and-forget: callers observe
    /// the effect through the snapshot channel, not a return value, since
    /// the actor is the sole source of truth.
    pub async fn dispatch(&self, action: EngineAction) {
        // The actor task only exits once every handle (and its sender) has
        // been dropped, so a closed channel here means the engine already
        // shut down, nothing left to apply the action to.
        let _ = self.actions.send(action).await;
    }

    pub fn snapshot(&self) -> EngineStateSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<EngineStateSnapshot> {
        self.snapshots.clone()
    }
}

/// Spawns the actor task and returns a handle to it. The task runs until
/// every clone of the returned handle (and any derived from it) is dropped.
pub fn spawn() -> EngineStateHandle {
    let (action_tx, action_rx) = mpsc::channel(256);
    let (snapshot_tx, snapshot_rx) = watch::channel(EngineStateSnapshot::initial());

    tokio::spawn(run(action_rx, snapshot_tx));

    EngineStateHandle {
        actions: action_tx,
        snapshots: snapshot_rx,
    }
}

async fn run(mut actions: mpsc::Receiver<EngineAction>, snapshots: watch::Sender<EngineStateSnapshot>) {
    let mut state = EngineStateSnapshot::initial();
    let stats = EngineStats::new();

    while let Some(action) = actions.recv().await {
        apply(&mut state, &stats, action);
        state.stats = stats.snapshot();
        // Only fails if every receiver (including the coordinator's own
        // subscription) has been dropped, which only happens at shutdown.
        let _ = snapshots.send(state.clone());
    }
}

fn apply(state: &mut EngineStateSnapshot, stats: &EngineStats, action: EngineAction) {
    // RESERVATION_SUCCESS is the only transition into Success and is
    // idempotent: once there, every other action attempt is ignored.
    if state.phase == Phase::Success && !matches!(action, EngineAction::StopAll) {
        return;
    }

    match action {
        EngineAction::SetParams(params) => {
            if state.phase == Phase::Params {
                state.params = Some(params);
            }
        }

        EngineAction::StartSearch => {
            if state.params.is_some() {
                state.phase = Phase::Searching;
                state.search.slots.clear();
                state.search.token = None;
                state.search.result = None;
                state.search.errors.clear();
                state.search.is_running = true;
                stats.mark_started_if_unset();
                info!("search started");
            }
        }

        EngineAction::IncrementSearchAttempt => {
            state.search.attempts += 1;
            state.search.last_attempt = Some(Instant::now());
            stats.record_search_attempt();
        }

        EngineAction::UpdateSearch { result } => {
            let token_changed = state.search.token.as_deref() != Some(result.token.as_str());
            let shrank = result.slots.len() < state.reservation.current_slot_index + 1;

            state.search.slots = result.slots.clone();
            state.search.token = Some(result.token.clone());
            state.search.result = Some(result);

            if token_changed || shrank {
                state.reservation.current_slot_index = 0;
            } else if state.reservation.current_slot_index >= state.search.slots.len() {
                state.reservation.current_slot_index = 0;
            }
        }

        EngineAction::RecordCaptchaSuccess { duration_ms } => {
            stats.record_captcha_success(duration_ms);
        }

        EngineAction::LogSearchError { class, reason, message } => {
            if class == ErrorClass::Captcha {
                stats.record_captcha_failure();
            }
            stats.record_error(class);
            state.search.errors.push(ErrorLogEntry { class, reason, message, at: Instant::now() });
            debug!(class = %class, "search error logged");
        }

        EngineAction::SetConsulateDetails(countries) => {
            if state.consulate_details.is_none() {
                state.consulate_details = Some(countries);
            }
        }

        EngineAction::StartReservation => {
            if state.phase == Phase::Searching && !state.search.slots.is_empty() {
                state.phase = Phase::Booking;
                state.reservation.attempts = 0;
                state.reservation.current_slot_index = 0;
                state.reservation.errors.clear();
                state.reservation.is_running = true;
                info!("reservation phase started");
            }
        }

        EngineAction::IncrementReservationAttempt => {
            if state.phase == Phase::Booking {
                state.reservation.attempts += 1;
                stats.record_reservation_attempt();
            }
        }

        EngineAction::TryNextSlot => {
            if state.phase == Phase::Booking && !state.search.slots.is_empty() {
                state.reservation.current_slot_index =
                    (state.reservation.current_slot_index + 1) % state.search.slots.len();
            }
        }

        EngineAction::LogReservationError { class, reason, message } => {
            stats.record_error(class);
            state.reservation.errors.push(ErrorLogEntry { class, reason, message, at: Instant::now() });
            debug!(class = %class, "reservation error logged");
        }

        EngineAction::ReservationSuccess(result) => {
            if state.phase == Phase::Booking {
                info!(ticket = %result.primary_ticket.ticket_id, "reservation succeeded");
                state.reservation.result = Some(result);
                state.phase = Phase::Success;
                state.search.is_running = false;
                state.reservation.is_running = false;
            }
        }

        EngineAction::StopAll => {
            state.search.is_running = false;
            state.reservation.is_running = false;
        }
    }
}
