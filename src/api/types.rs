//! Domain types the API client returns, plus the upstream wire DTOs they
//! are mapped from. Field names follow the Polish upstream verbatim in the
//! `*Dto` structs; the domain types translate them into the vocabulary the
//! rest of the engine (and spec) uses.

use serde::{Deserialize, Serialize};

/// A candidate appointment date. Upstream returns dates only, `time` is
/// cosmetic and the booking path never selects on it (spec §9).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub date: String,
    pub time: Option<String>,
}

/// Full record returned by the slot-search endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckSlotsResult {
    pub slots: Vec<Slot>,
    pub token: String,
    pub consulate_id: Option<String>,
    pub service_type: Option<String>,
    pub location_id: String,
}

/// `ticketId` presence is the only success indicator (spec §3 GLOSSARY).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationTicket {
    pub ticket_id: String,
    pub date: String,
    pub time: Option<String>,
    pub is_child_application: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationResult {
    pub primary_ticket: ReservationTicket,
    pub tickets: Vec<ReservationTicket>,
    pub is_child_application: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Country {
    pub id: String,
    pub name: String,
    pub locations: Vec<Location>,
}

// ---- upstream wire DTOs -------------------------------------------------

#[derive(Debug, Deserialize)]
pub(super) struct LocationDto {
    pub id: String,
    pub nazwa: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct CountryDto {
    pub id: String,
    pub nazwa: String,
    pub placowki: Vec<LocationDto>,
}

impl From<LocationDto> for Location {
    fn from(dto: LocationDto) -> Self {
        Location { id: dto.id, name: dto.nazwa }
    }
}

impl From<CountryDto> for Country {
    fn from(dto: CountryDto) -> Self {
        Country {
            id: dto.id,
            name: dto.nazwa,
            locations: dto.placowki.into_iter().map(Location::from).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct SlotDayDto {
    pub data: String,
    pub godziny: Option<Vec<String>>,
}

impl From<SlotDayDto> for Slot {
    fn from(dto: SlotDayDto) -> Self {
        Slot {
            date: dto.data,
            time: dto.godziny.and_then(|hours| hours.into_iter().next()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct CheckSlotsResponseDto {
    #[serde(rename = "tabelaDni")]
    pub tabela_dni: Vec<SlotDayDto>,
    pub token: Option<String>,
    #[serde(rename = "idPlacowki")]
    pub id_placowki: Option<String>,
    #[serde(rename = "rodzajUslugi")]
    pub rodzaj_uslugi: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct CreateReservationRequestDto {
    pub data: String,
    pub id_lokalizacji: String,
    pub id_wersji_jezykowej: u32,
    pub token: String,
    pub liczba_osob: u32,
    pub tylko_dzieci: bool,
}

#[derive(Debug, Deserialize)]
pub(super) struct TicketDto {
    pub id: String,
    pub data: String,
    pub godzina: Option<String>,
    #[serde(default)]
    pub tylko_dzieci: bool,
}

impl From<TicketDto> for ReservationTicket {
    fn from(dto: TicketDto) -> Self {
        ReservationTicket {
            ticket_id: dto.id,
            date: dto.data,
            time: dto.godzina,
            is_child_application: dto.tylko_dzieci,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct ReservationResponseDto {
    pub bilet: Option<TicketDto>,
    #[serde(rename = "listaBiletow", default)]
    pub lista_biletow: Vec<TicketDto>,
}
