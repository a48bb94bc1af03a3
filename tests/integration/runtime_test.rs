// Background runtime wired to scripted engines

use std::sync::Arc;
use std::time::Duration;

use taskscope::core::config::{EngineConfig, GpuConfig, ProcessConfig};
use taskscope::core::counters::{CounterResolver, UnavailableCounters};
use taskscope::core::gpu::{
    GpuProviderChain, GpuService, ModernProvider, NoMemoryBudget, StaticInventoryProvider, VendorBackends,
    VendorProvider, LEGACY_PROVIDER_NAME,
};
use taskscope::core::hardware::HardwareFacts;
use taskscope::core::performance::{NoHostStatus, PerformanceReader};
use taskscope::core::process::{NoIcons, NoInspection, NoOwners, NoWindows, ProcessBackends, ProcessDeltaEngine};
use taskscope::core::runtime::{TelemetryEngines, TelemetryRuntime};

use super::support::{sample, FakeInventory, Frame, ScriptedSnapshots};

fn engines(config: &EngineConfig) -> TelemetryEngines {
    let processes = ProcessDeltaEngine::new(
        ProcessBackends {
            snapshots: Box::new(ScriptedSnapshots::new(vec![
                Frame::ok(1_000, vec![sample(10, "a.exe", 1), sample(11, "b.exe", 2)]),
                Frame::ok(2_000, vec![sample(10, "a.exe", 1), sample(12, "c.exe", 3)]),
            ])),
            owners: Box::new(NoOwners),
            windows: Box::new(NoWindows),
            inspector: Box::new(NoInspection),
            icons: Arc::new(NoIcons),
        },
        config.process.clone(),
    );

    let facts = Arc::new(HardwareFacts::new(FakeInventory::named("Test GPU")));
    let counters = Arc::new(UnavailableCounters);
    let gpu = GpuService::select(
        GpuProviderChain {
            modern: Box::new(ModernProvider::new(
                CounterResolver::new(counters.clone()),
                Box::new(NoMemoryBudget),
                None,
                Arc::clone(&facts),
                &config.gpu,
            )),
            vendor: Box::new(VendorProvider::new(Arc::clone(&facts), VendorBackends::default())),
            legacy: Box::new(StaticInventoryProvider::new(Arc::clone(&facts))),
        },
        config.gpu.enable_secondary_provider,
    );

    let system = PerformanceReader::new(counters, Box::new(NoHostStatus), facts.total_physical_memory());

    TelemetryEngines { processes, gpu, system }
}

#[test]
fn test_runtime_publishes_process_ticks() {
    let config = EngineConfig {
        process: ProcessConfig {
            tick_interval_ms: 20,
            ..Default::default()
        },
        gpu: GpuConfig::default(),
    };
    let mut runtime = TelemetryRuntime::start(engines(&config), &config).unwrap();
    assert_eq!(runtime.latest().gpu_provider, LEGACY_PROVIDER_NAME);

    let mut reached = None;
    for _ in 0..200 {
        let Some(snapshot) = runtime.wait_for_update(Duration::from_secs(2)) else {
            break;
        };
        if snapshot.process_ticks >= 2 {
            reached = Some(snapshot);
            break;
        }
    }
    runtime.shutdown();

    let snapshot = reached.expect("two process ticks within the deadline");
    assert!(snapshot.process_error.is_none());
    let mut pids: Vec<u32> = snapshot.processes.iter().map(|r| r.pid).collect();
    pids.sort_unstable();
    assert_eq!(pids, vec![10, 12]);
    assert_eq!(snapshot.gpu_provider, LEGACY_PROVIDER_NAME);
    assert_eq!(snapshot.gpu.global_usage_percent, 0.0);
}
