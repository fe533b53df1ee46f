//! End-to-end scenarios E1/E2/E4 (spec §8) against a mocked upstream.
//!
//! The API client and CAPTCHA pipeline are concrete HTTP types, so "fake"
//! here means a `wiremock` server standing in for e-konsulat, plus a fake
//! [`ImageSolver`] standing in for the out-of-scope external model.
//! Backoff constants are shrunk to a handful of milliseconds rather than
//! using `tokio::time::pause`/`advance`, since that API requires a
//! current-thread runtime and doesn't mix well with wiremock's own
//! background server task.
//!
//! E3 (token rotation), E5 (soft-limit recovery), and E6 (captcha backoff
//! growth) are covered at the unit level instead: E3/E5's shape by
//! `state::actor`'s `update_search_resets_slot_index_on_token_change` and
//! `backoff`'s soft/network bound tests, E6 by `backoff`'s
//! `captcha_backoff_grows_with_consecutive_failures_and_caps` test.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ekonsulat_engine::api::ApiClient;
use ekonsulat_engine::backoff::BackoffConfig;
use ekonsulat_engine::captcha::{CaptchaError, CaptchaImage, CaptchaPipeline, ImageSolver};
use ekonsulat_engine::coordinator::Coordinator;
use ekonsulat_engine::state::Phase;

struct FixedSolver;

#[async_trait]
impl ImageSolver for FixedSolver {
    async fn solve(&self, _image: &CaptchaImage) -> Result<String, CaptchaError> {
        Ok("ABCD".to_string())
    }
}

fn fast_backoff() -> BackoffConfig {
    BackoffConfig {
        base_ms: 1,
        jitter_ms: 1,
        soft_base_ms: 2,
        captcha_base_ms: 1,
        captcha_max_ms: 4,
        captcha_multiplier: 2.0,
        slot_switch_delay_ms: 1,
        retry_delay_ms: 1,
    }
}

async fn mount_captcha_endpoints(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path_regex(r"^/api/u-captcha/generuj$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "img-1",
            "iloscZnakow": 4,
            "image": "aGVsbG8=",
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path_regex(r"^/api/u-captcha/sprawdz$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "token": "T1",
        })))
        .mount(server)
        .await;
}

async fn build_engine(server: &MockServer, backoff: BackoffConfig) -> Coordinator {
    let api = ApiClient::new(server.uri(), Duration::from_secs(5)).unwrap();
    let captcha = CaptchaPipeline::new(server.uri(), Duration::from_secs(5), Arc::new(FixedSolver)).unwrap();
    Coordinator::new(api, captcha, backoff)
}

async fn wait_for_phase(coordinator: &Coordinator, target: Phase, timeout: Duration) -> bool {
    let mut snapshots = coordinator.subscribe();
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if snapshots.borrow().phase == target {
            return true;
        }
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            return false;
        }
        if tokio::time::timeout(remaining, snapshots.changed()).await.is_err() {
            return false;
        }
    }
}

#[tokio::test]
async fn e1_happy_path_latches_success_with_one_reservation_call() {
    let server = MockServer::start().await;
    mount_captcha_endpoints(&server).await;

    Mock::given(method("POST"))
        .and(path_regex(r"^/api/rezerwacja-wizyt-wizowych/terminy/191/1$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tabelaDni": [{"data": "2026-01-12"}, {"data": "2026-01-13"}],
            "token": "T1",
            "idPlacowki": "191",
            "rodzajUslugi": "wiza",
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path_regex(r"^/api/rezerwacja-wizyt-wizowych/rezerwacje$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "bilet": {"id": "DAAAAAAAAA", "data": "2026-01-12", "godzina": null},
            "listaBiletow": [{"id": "DAAAAAAAAA", "data": "2026-01-12", "godzina": null}],
        })))
        .mount(&server)
        .await;

    let coordinator = build_engine(&server, fast_backoff()).await;
    coordinator.configure("191".to_string(), 1).await;
    coordinator.start().await;

    assert!(wait_for_phase(&coordinator, Phase::Success, Duration::from_secs(5)).await);

    let snapshot = coordinator.snapshot();
    assert_eq!(snapshot.reservation.result.unwrap().primary_ticket.ticket_id, "DAAAAAAAAA");
    assert_eq!(snapshot.reservation.attempts, 1);

    coordinator.stop().await;
}

#[tokio::test]
async fn e2_first_slot_taken_advances_to_second() {
    let server = MockServer::start().await;
    mount_captcha_endpoints(&server).await;

    Mock::given(method("POST"))
        .and(path_regex(r"^/api/rezerwacja-wizyt-wizowych/terminy/191/1$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tabelaDni": [{"data": "2026-01-12"}, {"data": "2026-01-13"}],
            "token": "T1",
        })))
        .mount(&server)
        .await;

    // First reservation attempt (whichever date) comes back with no ticket;
    // every subsequent attempt succeeds.
    Mock::given(method("POST"))
        .and(path_regex(r"^/api/rezerwacja-wizyt-wizowych/rezerwacje$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "bilet": null })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path_regex(r"^/api/rezerwacja-wizyt-wizowych/rezerwacje$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "bilet": {"id": "DBBBBBBBBB", "data": "2026-01-13", "godzina": null},
            "listaBiletow": [{"id": "DBBBBBBBBB", "data": "2026-01-13", "godzina": null}],
        })))
        .mount(&server)
        .await;

    let coordinator = build_engine(&server, fast_backoff()).await;
    coordinator.configure("191".to_string(), 1).await;
    coordinator.start().await;

    assert!(wait_for_phase(&coordinator, Phase::Success, Duration::from_secs(5)).await);

    let snapshot = coordinator.snapshot();
    assert_eq!(snapshot.reservation.attempts, 2);
    assert_eq!(snapshot.reservation.result.unwrap().primary_ticket.ticket_id, "DBBBBBBBBB");

    coordinator.stop().await;
}

#[tokio::test]
async fn e4_hard_rate_limit_stops_both_loops_without_reaching_success() {
    let server = MockServer::start().await;
    mount_captcha_endpoints(&server).await;

    Mock::given(method("POST"))
        .and(path_regex(r"^/api/rezerwacja-wizyt-wizowych/terminy/191/1$"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "reason": "LIMIT_Z_JEDNEGO_IP_PRZEKROCZONY",
        })))
        .mount(&server)
        .await;

    let coordinator = build_engine(&server, fast_backoff()).await;
    coordinator.configure("191".to_string(), 1).await;
    coordinator.start().await;

    // Give the search loop a bounded window to observe the hard limit and
    // stop; it must never reach `success`.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let snapshot = coordinator.snapshot();
    assert_eq!(snapshot.phase, Phase::Searching);
    assert!(!snapshot.search.is_running);
    assert!(snapshot
        .search
        .errors
        .iter()
        .any(|e| e.class == ekonsulat_engine::error::ErrorClass::RateLimitHard));

    coordinator.stop().await;
}
