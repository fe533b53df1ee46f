//! Typed client over the upstream e-konsulat API, and the domain types its
//! responses are mapped into.

mod client;
mod types;

pub use client::ApiClient;
pub use types::{CheckSlotsResult, Country, Location, ReservationResult, ReservationTicket, Slot};
