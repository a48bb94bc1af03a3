use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, Duration, MissedTickBehavior};

use super::SubsystemUpdate;
use crate::core::gpu::GpuService;

/// Polls the GPU service. The timing estimator sleeps between its two
/// samples, so each poll runs on the blocking pool.
pub async fn gpu_task(
    mut service: GpuService,
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
                    let usage = service.usage();
                    (service, usage)
                })
                .await;

                let usage = match joined {
                    Ok((returned, usage)) => {
                        service = returned;
                        usage
                    }
                    Err(e) => {
                        log::error!("GPU sampling thread failed: {}", e);
                        break;
                    }
                };

                if let Err(e) = update_tx.send(SubsystemUpdate::Gpu(usage)).await {
                    log::error!("Failed to send GPU update: {}", e);
                    break;
                }
            }
            _ = shutdown.recv() => {
                log::debug!("GPU task shutting down");
                break;
            }
        }
    }
}
