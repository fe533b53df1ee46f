//! CLI driver: wires config, the API client, the CAPTCHA solver, and the
//! coordinator together, then prints state snapshots until the engine
//! reaches `success` or the operator hits Ctrl-C.
//!
//! Deliberately minimal, the rich parameter-picking / progress UI is an
//! out-of-scope collaborator (spec §1).

use std::sync::Arc;

use ekonsulat_engine::api::ApiClient;
use ekonsulat_engine::captcha::{CaptchaPipeline, TwoCaptchaImageSolver};
use ekonsulat_engine::state::Phase;
use ekonsulat_engine::{init_logging, Coordinator, EngineConfig, EngineError};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _log_guard = init_logging();

    let config = EngineConfig::from_env().map_err(EngineError::from)?;
    info!(location_id = %config.location_id, party_size = config.party_size, "starting engine");

    let api = ApiClient::new(config.base_url.clone(), config.request_timeout).map_err(EngineError::from)?;
    let solver = Arc::new(TwoCaptchaImageSolver::new(config.captcha_api_key.clone())?);
    let captcha =
        CaptchaPipeline::new(config.base_url.clone(), config.request_timeout, solver).map_err(EngineError::from)?;

    let coordinator = Arc::new(Coordinator::new(api, captcha, config.backoff));
    coordinator.configure(config.location_id, config.party_size).await;
    coordinator.start().await;

    let mut snapshots = coordinator.subscribe();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("ctrl-c received, stopping engine");
                break;
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow().clone();
                if snapshot.phase == Phase::Success {
                    if let Some(result) = snapshot.reservation.result {
                        println!("reserved ticket {}", result.primary_ticket.ticket_id);
                    }
                    break;
                }
                println!(
                    "phase={:?} search.attempts={} reservation.attempts={} slots={}",
                    snapshot.phase,
                    snapshot.search.attempts,
                    snapshot.reservation.attempts,
                    snapshot.search.slots.len()
                );
            }
        }
    }

    coordinator.stop().await;
    Ok(())
}
