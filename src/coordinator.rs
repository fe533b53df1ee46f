//! Wires the state actor, the API client, and the CAPTCHA pipeline into the
//! two loops and exposes the engine boundary consumed by UI/CLI
//! collaborators (spec §4.8, §6): `configure`, `start`, `stop`, `subscribe`.

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::api::ApiClient;
use crate::backoff::BackoffConfig;
use crate::captcha::CaptchaPipeline;
use crate::state::{self, EngineAction, EngineParams, EngineStateHandle, EngineStateSnapshot};

struct RunningLoops {
    cancel: CancellationToken,
    search: JoinHandle<()>,
    booking: JoinHandle<()>,
}

pub struct Coordinator {
    state: EngineStateHandle,
    api: ApiClient,
    captcha: CaptchaPipeline,
    backoff: BackoffConfig,
    running: Mutex<Option<RunningLoops>>,
}

impl Coordinator {
    pub fn new(api: ApiClient, captcha: CaptchaPipeline, backoff: BackoffConfig) -> Self {
        Self {
            state: state::spawn(),
            api,
            captcha,
            backoff,
            running: Mutex::new(None),
        }
    }

    pub async fn configure(&self, location_id: String, party_size: u32) {
        self.state
            .dispatch(EngineAction::SetParams(EngineParams { location_id, party_size }))
            .await;
    }

    /// Starts the two loops, once, against the currently configured params.
    /// A second call while already running is a no-op.
    pub async fn start(&self) {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return;
        }

        let Some(params) = self.state.snapshot().params.clone() else {
            return;
        };

        self.state.dispatch(EngineAction::StartSearch).await;

        let cancel = CancellationToken::new();

        let search_handle = tokio::spawn(crate::search::run(
            self.state.clone(),
            self.api.clone(),
            self.captcha.clone(),
            self.backoff,
            params.location_id.clone(),
            params.party_size,
            cancel.clone(),
        ));

        let booking_handle = tokio::spawn(crate::booking::run(
            self.state.clone(),
            self.api.clone(),
            self.backoff,
            params.location_id,
            params.party_size,
            false, // onlyChildren: plumbed through, never set (spec §9)
            cancel.clone(),
        ));

        info!("coordinator started both loops");
        *running = Some(RunningLoops { cancel, search: search_handle, booking: booking_handle });
    }

    /// Cancels both loops and joins them. Safe to call whether or not
    /// `start` was ever called, and safe to call more than once.
    pub async fn stop(&self) {
        self.state.dispatch(EngineAction::StopAll).await;

        let Some(loops) = self.running.lock().await.take() else {
            return;
        };
        loops.cancel.cancel();
        let _ = loops.search.await;
        let _ = loops.booking.await;
        info!("coordinator stopped, both loops joined");
    }

    pub fn subscribe(&self) -> watch::Receiver<EngineStateSnapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> EngineStateSnapshot {
        self.state.snapshot()
    }
}
