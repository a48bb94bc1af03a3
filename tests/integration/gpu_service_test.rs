// Provider selection and fallback

use std::sync::Arc;
use std::time::{Duration, Instant};

use taskscope::core::config::GpuConfig;
use taskscope::core::counters::{CounterBackend, CounterResolver, UnavailableCounters};
use taskscope::core::gpu::{
    GpuProviderChain, GpuService, GpuUsageProvider, MemoryUsage, ModernProvider, NoMemoryBudget, NodeTimeSource,
    NodeTimingEstimator, StaticInventoryProvider, VendorBackend, VendorBackends, VendorProvider, VendorSource,
    LEGACY_PROVIDER_NAME, MODERN_PROVIDER_NAME, VENDOR_PROVIDER_NAME,
};
use taskscope::core::hardware::HardwareFacts;

use super::support::{FakeCounters, FakeInventory, FixedVendor};

const ADAPTER_3D: &str = "luid_0x00000000_0x0000A000_phys_0_eng_0_engtype_3D";

fn service(
    counters: Arc<dyn CounterBackend>,
    gpu_name: &str,
    nvidia: Option<FixedVendor>,
    enable_secondary: bool,
) -> GpuService {
    let facts = Arc::new(HardwareFacts::new(FakeInventory::named(gpu_name)));
    let config = GpuConfig {
        min_sampling_interval_ms: 0,
        enable_secondary_provider: enable_secondary,
        ..GpuConfig::default()
    };

    let chain = GpuProviderChain {
        modern: Box::new(ModernProvider::new(
            CounterResolver::new(counters),
            Box::new(NoMemoryBudget),
            None,
            Arc::clone(&facts),
            &config,
        )),
        vendor: Box::new(VendorProvider::new(
            Arc::clone(&facts),
            VendorBackends {
                nvidia: nvidia.map(|v| Box::new(v) as Box<dyn VendorBackend>),
                ..Default::default()
            },
        )),
        legacy: Box::new(StaticInventoryProvider::new(facts)),
    };
    GpuService::select(chain, config.enable_secondary_provider)
}

fn nvidia_at(usage: f64) -> Option<FixedVendor> {
    Some(FixedVendor {
        usage: Some(usage),
        memory: Some(MemoryUsage {
            dedicated_used: 512,
            shared_used: 64,
        }),
    })
}

#[test]
fn test_no_sources_falls_back_to_static_inventory() {
    let mut service = service(Arc::new(UnavailableCounters), "Generic Display", None, true);

    assert_eq!(service.provider_name(), LEGACY_PROVIDER_NAME);
    assert!(!service.has_secondary());
    assert_eq!(service.static_info().name, "Generic Display");
    assert_eq!(service.static_info().total_shared_bytes, 8 * 1024 * 1024 * 1024);
    assert_eq!(service.usage().global_usage_percent, 0.0);
}

#[test]
fn test_vendor_provider_when_counters_missing() {
    let mut service = service(
        Arc::new(UnavailableCounters),
        "NVIDIA GeForce RTX 3060",
        nvidia_at(42.0),
        true,
    );

    assert_eq!(service.provider_name(), VENDOR_PROVIDER_NAME);
    let usage = service.usage();
    assert_eq!(usage.global_usage_percent, 42.0);
    assert_eq!(usage.dedicated_memory_used, 512);
}

#[test]
fn test_vendor_interface_skipped_for_other_brand() {
    let mut service = service(
        Arc::new(UnavailableCounters),
        "Intel(R) UHD Graphics 620",
        nvidia_at(42.0),
        true,
    );

    assert_eq!(service.provider_name(), LEGACY_PROVIDER_NAME);
    assert_eq!(service.usage().global_usage_percent, 0.0);
}

#[test]
fn test_modern_primary_with_vendor_secondary() {
    let counters = Arc::new(FakeCounters::new().with_category(
        "GPU Engine",
        &["Utilization Percentage"],
        &[ADAPTER_3D],
    ));
    counters.set_value(ADAPTER_3D, 20.0);

    let mut service = service(counters.clone(), "NVIDIA GeForce RTX 3060", nvidia_at(35.0), true);
    assert!(service.has_secondary());
    assert_eq!(service.provider_name(), format!("{} + Fallback", MODERN_PROVIDER_NAME));

    // Secondary reports more, and the counters have no memory figures.
    let usage = service.usage();
    assert_eq!(usage.global_usage_percent, 35.0);
    assert_eq!(usage.dedicated_memory_used, 512);
    assert_eq!(usage.adapters.len(), 1);

    counters.set_value(ADAPTER_3D, 90.0);
    let usage = service.usage();
    assert!(usage.global_usage_percent > 35.0);
}

#[test]
fn test_secondary_disabled_by_config() {
    let counters = Arc::new(FakeCounters::new().with_category(
        "GPU Engine",
        &["Utilization Percentage"],
        &[ADAPTER_3D],
    ));

    let service = service(counters, "NVIDIA GeForce RTX 3060", nvidia_at(35.0), false);
    assert!(!service.has_secondary());
    assert_eq!(service.provider_name(), MODERN_PROVIDER_NAME);
}

/// Nodes busy for half of the elapsed wall time.
struct HalfBusyNodes {
    origin: Instant,
}

impl NodeTimeSource for HalfBusyNodes {
    fn sample(&mut self) -> Option<Vec<u64>> {
        let half = self.origin.elapsed().as_nanos() as u64 / 2;
        Some(vec![half, 0])
    }
}

fn half_busy_estimator() -> NodeTimingEstimator {
    NodeTimingEstimator::new(
        Box::new(HalfBusyNodes {
            origin: Instant::now(),
        }),
        Duration::from_millis(20),
    )
}

#[test]
fn test_vendor_provider_falls_back_to_node_timing() {
    let facts = Arc::new(HardwareFacts::new(FakeInventory::named("Generic Display")));
    let mut provider = VendorProvider::new(
        facts,
        VendorBackends {
            estimator: Some(half_busy_estimator()),
            ..Default::default()
        },
    );

    provider.initialize();
    assert!(provider.is_supported());
    assert_eq!(provider.active_source(), Some(VendorSource::NodeTiming));

    let busy = provider.usage().global_usage_percent;
    assert!((30.0..=70.0).contains(&busy), "busy {}", busy);
}

#[test]
fn test_service_uses_node_timing_without_counters_or_vendor_library() {
    let facts = Arc::new(HardwareFacts::new(FakeInventory::named("Generic Display")));
    let config = GpuConfig {
        min_sampling_interval_ms: 0,
        ..GpuConfig::default()
    };
    let chain = GpuProviderChain {
        modern: Box::new(ModernProvider::new(
            CounterResolver::new(Arc::new(UnavailableCounters)),
            Box::new(NoMemoryBudget),
            None,
            Arc::clone(&facts),
            &config,
        )),
        vendor: Box::new(VendorProvider::new(
            Arc::clone(&facts),
            VendorBackends {
                estimator: Some(half_busy_estimator()),
                ..Default::default()
            },
        )),
        legacy: Box::new(StaticInventoryProvider::new(facts)),
    };
    let mut service = GpuService::select(chain, config.enable_secondary_provider);

    assert_eq!(service.provider_name(), VENDOR_PROVIDER_NAME);
    assert!(!service.has_secondary());
    assert!(service.usage().global_usage_percent > 0.0);
}

#[test]
fn test_vendor_library_wins_over_node_timing() {
    let facts = Arc::new(HardwareFacts::new(FakeInventory::named("NVIDIA GeForce RTX 3060")));
    let mut provider = VendorProvider::new(
        facts,
        VendorBackends {
            nvidia: nvidia_at(12.0).map(|v| Box::new(v) as Box<dyn VendorBackend>),
            amd: None,
            estimator: Some(half_busy_estimator()),
        },
    );

    provider.initialize();
    assert_eq!(provider.active_source(), Some(VendorSource::Nvidia));
    assert_eq!(provider.usage().global_usage_percent, 12.0);
}
