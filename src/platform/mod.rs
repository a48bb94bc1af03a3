//! Native backends behind the core engine traits, and the factories that
//! wire them together for the running OS.

pub mod gpu;
#[cfg(not(windows))]
pub mod portable;
#[cfg(windows)]
pub mod windows;

use std::sync::Arc;

use log::debug;

use crate::core::config::{EngineConfig, GpuConfig};
use crate::core::counters::{CounterBackend, CounterResolver};
use crate::core::gpu::{
    GpuProviderChain, GpuService, MemoryBudgetSource, ModernProvider, NodeTimeSource, NodeTimingEstimator,
    StaticInventoryProvider, VendorBackends, VendorProvider,
};
use crate::core::hardware::{HardwareFacts, HardwareInventory};
use crate::core::performance::{HostStatus, PerformanceReader};
use crate::core::process::{ProcessBackends, ProcessDeltaEngine};
use crate::core::runtime::TelemetryEngines;

/// Process-table backends for this OS.
#[cfg(windows)]
pub fn process_backends() -> ProcessBackends {
    ProcessBackends {
        snapshots: Box::new(windows::NtProcessSource::new()),
        owners: Box::new(windows::TokenOwners::new()),
        windows: Box::new(windows::TopLevelWindows::new()),
        inspector: Box::new(windows::WindowsInspector::new()),
        icons: Arc::new(windows::ShellIcons::new()),
    }
}

#[cfg(not(windows))]
pub fn process_backends() -> ProcessBackends {
    use crate::core::process::{NoIcons, NoWindows};

    ProcessBackends {
        snapshots: Box::new(portable::SysinfoProcessSource::new()),
        owners: Box::new(portable::SysinfoOwners::new()),
        windows: Box::new(NoWindows),
        inspector: Box::new(portable::SysinfoInspector::new()),
        icons: Arc::new(NoIcons),
    }
}

pub fn counter_backend() -> Arc<dyn CounterBackend> {
    #[cfg(windows)]
    {
        Arc::new(windows::PdhBackend::new())
    }
    #[cfg(not(windows))]
    {
        Arc::new(crate::core::counters::UnavailableCounters)
    }
}

pub fn hardware_inventory() -> Arc<dyn HardwareInventory> {
    #[cfg(windows)]
    {
        Arc::new(windows::WmiInventory::new())
    }
    #[cfg(not(windows))]
    {
        Arc::new(portable::PortableInventory)
    }
}

pub fn memory_budget() -> Box<dyn MemoryBudgetSource> {
    #[cfg(windows)]
    {
        Box::new(windows::D3dkmtMemoryBudget::new())
    }
    #[cfg(not(windows))]
    {
        Box::new(crate::core::gpu::NoMemoryBudget)
    }
}

/// Node running-time source, where the OS exposes one.
pub fn node_time_source() -> Option<Box<dyn NodeTimeSource>> {
    #[cfg(windows)]
    {
        Some(Box::new(windows::D3dkmtNodeTimes::new()))
    }
    #[cfg(target_os = "linux")]
    {
        Some(Box::new(portable::DrmFdinfoSource::new()))
    }
    #[cfg(not(any(windows, target_os = "linux")))]
    {
        None
    }
}

fn node_estimator(config: &GpuConfig) -> Option<NodeTimingEstimator> {
    node_time_source().map(|source| NodeTimingEstimator::new(source, config.timing_sample_gap()))
}

pub fn vendor_backends(config: &GpuConfig) -> VendorBackends {
    VendorBackends {
        nvidia: gpu::nvidia_backend(),
        amd: gpu::amd_backend(),
        estimator: node_estimator(config),
    }
}

pub fn host_status() -> Box<dyn HostStatus> {
    #[cfg(windows)]
    {
        Box::new(windows::MemoryStatusHost::new())
    }
    #[cfg(not(windows))]
    {
        Box::new(portable::SysinfoHostStatus::new())
    }
}

/// Probe the provider chain and keep the first supported provider.
pub fn build_gpu_service(config: &EngineConfig, counters: Arc<dyn CounterBackend>) -> GpuService {
    let facts = HardwareFacts::install(hardware_inventory());
    let gpu = &config.gpu;

    let modern = ModernProvider::new(
        CounterResolver::new(counters),
        memory_budget(),
        node_estimator(gpu),
        Arc::clone(&facts),
        gpu,
    );
    let chain = GpuProviderChain {
        modern: Box::new(modern),
        vendor: Box::new(VendorProvider::new(Arc::clone(&facts), vendor_backends(gpu))),
        legacy: Box::new(StaticInventoryProvider::new(facts)),
    };
    GpuService::select(chain, gpu.enable_secondary_provider)
}

/// All three engines over the native backends.
pub fn build_engines(config: &EngineConfig) -> TelemetryEngines {
    let counters = counter_backend();
    let facts = HardwareFacts::install(hardware_inventory());
    debug!("Host: {} with {} bytes RAM", facts.cpu_name(), facts.total_physical_memory());

    TelemetryEngines {
        processes: ProcessDeltaEngine::new(process_backends(), config.process.clone()),
        gpu: build_gpu_service(config, Arc::clone(&counters)),
        system: PerformanceReader::new(counters, host_status(), facts.total_physical_memory()),
    }
}
