//! Typed wrapper over the five fixed upstream endpoints (spec §4.4, §6).
//!
//! Stateless beyond the shared [`reqwest::Client`], safe to hold behind an
//! `Arc` and call concurrently from the search and booking loops, same as
//! the teacher's `auth::client` holds one `reqwest::Client` for the whole
//! session.

use std::time::Duration;

use regex::Regex;
use reqwest::Client;
use tokio_util::sync::CancellationToken;

use crate::error::ApiFailure;
use crate::http;

use super::types::{
    CheckSlotsResponseDto, CheckSlotsResult, Country, CountryDto, CreateReservationRequestDto,
    ReservationResponseDto, ReservationResult, Slot,
};

/// Language version id the upstream form always submits for the Polish
/// consular portal's default locale.
const DEFAULT_LANGUAGE_VERSION_ID: u32 = 2;

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let base_url = base_url.into();
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(http::default_headers(&base_url))
            .build()?;
        Ok(Self { client, base_url })
    }

    pub async fn list_countries(&self, cancel: &CancellationToken) -> Result<Vec<Country>, ApiFailure> {
        let url = format!(
            "{}/api/konfiguracja/placowki/placowki-w-krajach/2",
            self.base_url
        );
        let response = http::execute(self.client.get(url), cancel).await?;
        let response = http::ensure_success(response).await?;
        let dtos: Vec<CountryDto> = response.json().await.map_err(|e| ApiFailure::Decode(e.to_string()))?;
        Ok(dtos.into_iter().map(Country::from).collect())
    }

    /// Fails fast with `api`-classified [`ApiFailure::Validation`] for any
    /// empty `location_id`, non-positive `party_size`, or empty
    /// `verified_token`, these never leave the client (spec §4.4).
    pub async fn check_slots(
        &self,
        location_id: &str,
        party_size: u32,
        verified_token: &str,
        cancel: &CancellationToken,
    ) -> Result<CheckSlotsResult, ApiFailure> {
        if location_id.is_empty() {
            return Err(ApiFailure::Validation("locationId is empty".into()));
        }
        if party_size == 0 {
            return Err(ApiFailure::Validation("partySize must be positive".into()));
        }
        if verified_token.is_empty() {
            return Err(ApiFailure::Validation("verifiedToken is empty".into()));
        }

        let url = format!(
            "{}/api/rezerwacja-wizyt-wizowych/terminy/{}/{}",
            self.base_url, location_id, party_size
        );
        let builder = self.client.post(url).json(&serde_json::json!({
            "captchaToken": verified_token,
        }));

        let response = http::execute(builder, cancel).await?;
        let response = http::ensure_success(response).await?;
        let dto: CheckSlotsResponseDto = response.json().await.map_err(|e| ApiFailure::Decode(e.to_string()))?;

        // The source falls back to the input token when the response token
        // is empty (spec §9 Open Questions).
        let token = dto
            .token
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| verified_token.to_string());

        Ok(CheckSlotsResult {
            slots: dto.tabela_dni.into_iter().map(Slot::from).collect(),
            token,
            consulate_id: dto.id_placowki,
            service_type: dto.rodzaj_uslugi,
            location_id: location_id.to_string(),
        })
    }

    /// Validates `date` against `^\d{4}-\d{2}-\d{2}$`, `party_size > 0`, and
    /// non-empty token/location before issuing the request (spec §4.4).
    pub async fn create_reservation(
        &self,
        date: &str,
        location_id: &str,
        verified_token: &str,
        party_size: u32,
        only_children: bool,
        cancel: &CancellationToken,
    ) -> Result<ReservationResult, ApiFailure> {
        if !date_regex().is_match(date) {
            return Err(ApiFailure::Validation(format!("date {date:?} is not YYYY-MM-DD")));
        }
        if party_size == 0 {
            return Err(ApiFailure::Validation("partySize must be positive".into()));
        }
        if location_id.is_empty() {
            return Err(ApiFailure::Validation("locationId is empty".into()));
        }
        if verified_token.is_empty() {
            return Err(ApiFailure::Validation("verifiedToken is empty".into()));
        }

        let url = format!("{}/api/rezerwacja-wizyt-wizowych/rezerwacje", self.base_url);
        let body = CreateReservationRequestDto {
            data: date.to_string(),
            id_lokalizacji: location_id.to_string(),
            id_wersji_jezykowej: DEFAULT_LANGUAGE_VERSION_ID,
            token: verified_token.to_string(),
            liczba_osob: party_size,
            tylko_dzieci: only_children,
        };

        let response = http::execute(self.client.post(url).json(&body), cancel).await?;
        let response = http::ensure_success(response).await?;
        let dto: ReservationResponseDto = response.json().await.map_err(|e| ApiFailure::Decode(e.to_string()))?;

        // Presence of a non-null ticket is the only success indicator.
        let primary = dto.bilet.ok_or(ApiFailure::SlotUnavailable)?;
        let primary_ticket = crate::api::types::ReservationTicket::from(primary);
        let tickets = dto.lista_biletow.into_iter().map(Into::into).collect();

        Ok(ReservationResult {
            is_child_application: primary_ticket.is_child_application,
            primary_ticket,
            tickets,
        })
    }
}

fn date_regex() -> &'static Regex {
    use std::sync::OnceLock;
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("static pattern is valid"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_regex_accepts_iso_dates_only() {
        assert!(date_regex().is_match("2026-01-12"));
        assert!(!date_regex().is_match("2026-1-12"));
        assert!(!date_regex().is_match("12-01-2026"));
        assert!(!date_regex().is_match(""));
    }
}
