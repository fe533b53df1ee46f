//! EngineState's substructures and the immutable snapshot handed to
//! observers (spec §3, §4.5).

use std::time::Instant;

use serde::Serialize;

use crate::api::{CheckSlotsResult, Country, ReservationResult, Slot};
use crate::error::ErrorClass;
use crate::stats::StatsSnapshot;

/// `phase` is monotonic except for the `booking ↔ searching` cycle; once it
/// reaches `Success` no action moves it anywhere else (spec §3 invariants).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Params,
    Searching,
    Booking,
    Success,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineParams {
    pub location_id: String,
    pub party_size: u32,
}

/// One classified failure, kept for diagnostics and the `captcha` consecutive-
/// failure accounting in §4.2's backoff table.
#[derive(Debug, Clone)]
pub struct ErrorLogEntry {
    pub class: ErrorClass,
    pub reason: Option<String>,
    pub message: String,
    pub at: Instant,
}

#[derive(Debug, Clone, Default)]
pub struct SearchState {
    pub attempts: u64,
    pub last_attempt: Option<Instant>,
    pub slots: Vec<Slot>,
    pub token: Option<String>,
    pub result: Option<CheckSlotsResult>,
    pub errors: Vec<ErrorLogEntry>,
    pub is_running: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ReservationState {
    pub attempts: u64,
    pub current_slot_index: usize,
    pub errors: Vec<ErrorLogEntry>,
    pub result: Option<ReservationResult>,
    pub is_running: bool,
}

/// Immutable copy of the engine's state, handed to subscribers. Never
/// mutated in place, every publish replaces it wholesale.
#[derive(Debug, Clone)]
pub struct EngineStateSnapshot {
    pub phase: Phase,
    pub params: Option<EngineParams>,
    pub search: SearchState,
    pub reservation: ReservationState,
    pub stats: StatsSnapshot,
    /// Fetched once, the first time the booking loop enters `booking`
    /// (spec §4.7's `ensureConsulateDetails()`), and handed to the UI
    /// alongside the reservation result on success (spec §4.8).
    pub consulate_details: Option<Vec<Country>>,
}

impl EngineStateSnapshot {
    pub fn initial() -> Self {
        Self {
            phase: Phase::Params,
            params: None,
            search: SearchState::default(),
            reservation: ReservationState::default(),
            stats: StatsSnapshot::default(),
            consulate_details: None,
        }
    }
}
