//! Tokio runtime and orchestrator for the telemetry engines.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::Duration;

use super::config::EngineConfig;
use super::gpu::{GpuAdapterDynamicInfo, GpuService};
use super::performance::PerformanceReader;
use super::process::{ProcessDeltaEngine, ProcessRecord};
use super::tasks::{gpu_task, process_task, system_task, ProcessDeltaSummary, SubsystemUpdate, SystemUsage};

/// Everything the presentation layer needs for one frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub timestamp: i64,
    pub process_ticks: u64,
    pub last_delta: ProcessDeltaSummary,
    pub processes: Vec<ProcessRecord>,
    pub process_error: Option<String>,
    pub gpu: GpuAdapterDynamicInfo,
    pub gpu_provider: String,
    pub system: SystemUsage,
}

/// Engines the runtime takes ownership of.
pub struct TelemetryEngines {
    pub processes: ProcessDeltaEngine,
    pub gpu: GpuService,
    pub system: PerformanceReader,
}

pub struct TelemetryRuntime {
    pub snapshot_rx: watch::Receiver<Arc<TelemetrySnapshot>>,
    shutdown_tx: broadcast::Sender<()>,
    _runtime_handle: tokio::runtime::Runtime,
}

impl TelemetryRuntime {
    pub fn start(engines: TelemetryEngines, config: &EngineConfig) -> anyhow::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_time()
            .thread_name("telemetry-worker")
            .build()?;

        let initial = TelemetrySnapshot {
            gpu_provider: engines.gpu.provider_name(),
            ..Default::default()
        };
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(initial));
        let (shutdown_tx, _) = broadcast::channel::<()>(1);

        let period = config.process.tick_interval();
        let shutdown = shutdown_tx.subscribe();
        runtime.spawn(async move { spawn_all_tasks(engines, period, snapshot_tx, shutdown).await });

        log::info!("Telemetry runtime started ({} ms interval)", period.as_millis());

        Ok(Self {
            snapshot_rx,
            shutdown_tx,
            _runtime_handle: runtime,
        })
    }

    pub fn latest(&self) -> Arc<TelemetrySnapshot> {
        self.snapshot_rx.borrow().clone()
    }

    /// Block until the orchestrator publishes a new snapshot or `timeout` passes.
    pub fn wait_for_update(&mut self, timeout: Duration) -> Option<Arc<TelemetrySnapshot>> {
        let rx = &mut self.snapshot_rx;
        let changed = self
            ._runtime_handle
            .block_on(async { tokio::time::timeout(timeout, rx.changed()).await });
        match changed {
            Ok(Ok(())) => Some(self.snapshot_rx.borrow_and_update().clone()),
            _ => None,
        }
    }

    pub fn shutdown(self) {
        log::debug!("Shutting down telemetry runtime");
        let _ = self.shutdown_tx.send(());
    }
}

pub async fn spawn_all_tasks(
    engines: TelemetryEngines,
    period: Duration,
    snapshot_tx: watch::Sender<Arc<TelemetrySnapshot>>,
    shutdown: broadcast::Receiver<()>,
) {
    let (update_tx, update_rx) = mpsc::channel::<SubsystemUpdate>(32);
    let provider_name = engines.gpu.provider_name();

    tokio::spawn(orchestrator_task(
        update_rx,
        snapshot_tx,
        provider_name,
        shutdown.resubscribe(),
    ));

    tokio::spawn(process_task(
        engines.processes,
        period,
        update_tx.clone(),
        shutdown.resubscribe(),
    ));

    tokio::spawn(gpu_task(engines.gpu, period, update_tx.clone(), shutdown.resubscribe()));

    tokio::spawn(system_task(engines.system, period, update_tx, shutdown.resubscribe()));
}

/// Merges subsystem updates into the published snapshot.
async fn orchestrator_task(
    mut update_rx: mpsc::Receiver<SubsystemUpdate>,
    snapshot_tx: watch::Sender<Arc<TelemetrySnapshot>>,
    gpu_provider: String,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut current = TelemetrySnapshot {
        gpu_provider,
        ..Default::default()
    };

    loop {
        tokio::select! {
            Some(update) = update_rx.recv() => {
                apply_update(&mut current, update);
                current.timestamp = chrono::Utc::now().timestamp();

                // Fails only when nobody is listening.
                let _ = snapshot_tx.send(Arc::new(current.clone()));
            }
            _ = shutdown.recv() => {
                log::debug!("Orchestrator task shutting down");
                break;
            }
        }
    }
}

pub fn apply_update(current: &mut TelemetrySnapshot, update: SubsystemUpdate) {
    match update {
        SubsystemUpdate::Processes { summary, records } => {
            current.process_ticks += 1;
            current.last_delta = summary;
            current.processes = records;
            current.process_error = None;
        }
        SubsystemUpdate::ProcessTickFailed(error) => {
            current.process_error = Some(error);
        }
        SubsystemUpdate::Gpu(gpu) => {
            current.gpu = gpu;
        }
        SubsystemUpdate::System(system) => {
            current.system = system;
        }
    }
}
