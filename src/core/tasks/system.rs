use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, Duration, MissedTickBehavior};

use super::{SubsystemUpdate, SystemUsage};
use crate::core::performance::PerformanceReader;

pub async fn system_task(
    mut reader: PerformanceReader,
    period: Duration,
    update_tx: mpsc::Sender<SubsystemUpdate>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let usage = SystemUsage {
                    cpu_percent: reader.cpu_usage(),
                    memory: reader.memory_usage(),
                    disk: reader.disk_usage(),
                    network: reader.network_usage(),
                };

                if let Err(e) = update_tx.send(SubsystemUpdate::System(usage)).await {
                    log::error!("Failed to send system update: {}", e);
                    break;
                }
            }
            _ = shutdown.recv() => {
                log::debug!("System task shutting down");
                break;
            }
        }
    }
}
