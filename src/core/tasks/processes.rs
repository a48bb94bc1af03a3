use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, Duration, MissedTickBehavior};

use super::{ProcessDeltaSummary, SubsystemUpdate};
use crate::core::process::ProcessDeltaEngine;

/// Drives the process delta engine. Ticks run on the blocking pool since the
/// enumeration and per-process lookups are synchronous native calls.
pub async fn process_task(
    mut engine: ProcessDeltaEngine,
    period: Duration,
    update_tx: mpsc::Sender<SubsystemUpdate>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let joined = tokio::task::spawn_blocking(move || {
                    let result = engine.tick();
                    let records = engine.snapshot();
                    (engine, result, records)
                })
                .await;

                let (returned, result, records) = match joined {
                    Ok(parts) => parts,
                    Err(e) => {
                        log::error!("Process sampling thread failed: {}", e);
                        break;
                    }
                };
                engine = returned;

                let update = match result {
                    Ok(delta) => SubsystemUpdate::Processes {
                        summary: ProcessDeltaSummary::from(&delta),
                        records,
                    },
                    Err(e) => SubsystemUpdate::ProcessTickFailed(e.to_string()),
                };

                if let Err(e) = update_tx.send(update).await {
                    log::error!("Failed to send process update: {}", e);
                    break;
                }
            }
            _ = shutdown.recv() => {
                log::debug!("Process task shutting down");
                break;
            }
        }
    }
}
