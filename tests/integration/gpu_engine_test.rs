// GPU engine-counter aggregation against an in-memory counter subsystem

use std::sync::Arc;

use taskscope::core::config::GpuConfig;
use taskscope::core::counters::{CounterBackend, CounterResolver};
use taskscope::core::gpu::{GpuAggregationEngine, InstanceScope};

use super::support::FakeCounters;

const ADAPTER_A_3D: &str = "luid_0x00000000_0x0000A000_phys_0_eng_0_engtype_3D";
const ADAPTER_A_COMPUTE: &str = "luid_0x00000000_0x0000A000_phys_0_eng_1_engtype_Compute";
const ADAPTER_B_3D: &str = "luid_0x00000000_0x0000B000_phys_0_eng_0_engtype_3D";
const PROCESS_A_3D: &str = "pid_1234_luid_0x00000000_0x0000A000_phys_0_eng_0_engtype_3D";

fn engine_category(instances: &[&str]) -> Arc<FakeCounters> {
    Arc::new(FakeCounters::new().with_category(
        "GPU Engine",
        &["Running Time", "Utilization Percentage"],
        instances,
    ))
}

fn engine_over(counters: &Arc<FakeCounters>, config: GpuConfig) -> GpuAggregationEngine {
    let backend: Arc<dyn CounterBackend> = counters.clone();
    GpuAggregationEngine::new(CounterResolver::new(backend), config)
}

#[test]
fn test_missing_category_is_unavailable() {
    let counters = Arc::new(FakeCounters::new().with_category("Processor", &["% Processor Time"], &["_Total"]));
    let mut engine = engine_over(&counters, GpuConfig::default());

    assert!(!engine.initialize());
    assert!(engine.is_initialized());
    assert!(!engine.is_available());
    assert!(engine.last_error().is_some());

    let snapshot = engine.refresh();
    assert!(snapshot.adapters.is_empty());
    assert_eq!(snapshot.highest_adapter_usage, 0.0);
    assert_eq!(engine.counter_count(), 0);
}

#[test]
fn test_initialize_runs_once() {
    let counters = engine_category(&[ADAPTER_A_3D]);
    let mut engine = engine_over(&counters, GpuConfig::default());

    assert!(engine.initialize());
    let opened = counters.open_count();
    assert!(engine.initialize());
    assert_eq!(counters.open_count(), opened);
}

#[test]
fn test_per_adapter_aggregation_and_smoothing() {
    let counters = engine_category(&[ADAPTER_A_3D, ADAPTER_A_COMPUTE, ADAPTER_B_3D, PROCESS_A_3D]);
    counters.set_value(ADAPTER_A_3D, 30.0);
    counters.set_value(ADAPTER_A_COMPUTE, 20.0);
    counters.set_value(ADAPTER_B_3D, 10.0);

    let config = GpuConfig {
        ema_alpha: 0.5,
        ..GpuConfig::default()
    };
    let mut engine = engine_over(&counters, config);
    assert!(engine.initialize());
    assert_eq!(engine.scope(), InstanceScope::Aggregated);
    // Adapter-level instances only.
    assert_eq!(engine.counter_count(), 3);
    assert_eq!(
        engine.adapter_keys(),
        vec![
            "0x00000000_0x0000A000_phys_0".to_string(),
            "0x00000000_0x0000B000_phys_0".to_string()
        ]
    );

    // First sample primes the average.
    let first = engine.refresh();
    let a = &first.adapters[0];
    assert_eq!(a.usage_percent, 50.0);
    assert_eq!(a.three_d_percent, 30.0);
    assert_eq!(a.compute_percent, 20.0);
    assert_eq!(first.adapters[1].usage_percent, 10.0);
    assert_eq!(first.highest_adapter_usage, 50.0);

    counters.set_value(ADAPTER_A_3D, 70.0);
    let second = engine.refresh();
    assert!((second.adapters[0].usage_percent - 70.0).abs() < 1e-9);
    assert_eq!(second.adapters[0].three_d_percent, 70.0);
    assert!((second.highest_adapter_usage - 70.0).abs() < 1e-9);
}

#[test]
fn test_engine_sums_are_clamped() {
    let counters = engine_category(&[ADAPTER_A_3D, ADAPTER_A_COMPUTE]);
    counters.set_value(ADAPTER_A_3D, 90.0);
    counters.set_value(ADAPTER_A_COMPUTE, 80.0);

    let mut engine = engine_over(&counters, GpuConfig::default());
    engine.initialize();
    let snapshot = engine.refresh();

    assert_eq!(snapshot.adapters[0].usage_percent, 100.0);
    assert!(snapshot.highest_adapter_usage <= 100.0);
}

#[test]
fn test_flat_counters_rebuild_with_per_process_instances() {
    let counters = engine_category(&[ADAPTER_A_3D, ADAPTER_B_3D, PROCESS_A_3D]);
    let mut engine = engine_over(&counters, GpuConfig::default());
    engine.initialize();
    assert_eq!(engine.counter_count(), 2);

    for _ in 0..4 {
        engine.refresh();
    }
    assert_eq!(engine.zero_streak(), 4);
    assert_eq!(engine.rebuild_count(), 0);

    engine.refresh();
    assert_eq!(engine.rebuild_count(), 1);
    assert_eq!(engine.zero_streak(), 0);
    assert_eq!(engine.scope(), InstanceScope::PerProcess);
    assert_eq!(engine.counter_count(), 3);
    // Old handles were closed before the new set was opened.
    assert_eq!(counters.open_count(), 3);
}

#[test]
fn test_activity_resets_zero_streak() {
    let counters = engine_category(&[ADAPTER_A_3D]);
    let mut engine = engine_over(&counters, GpuConfig::default());
    engine.initialize();

    engine.refresh();
    engine.refresh();
    assert_eq!(engine.zero_streak(), 2);

    counters.set_value(ADAPTER_A_3D, 12.0);
    engine.refresh();
    assert_eq!(engine.zero_streak(), 0);
}

#[test]
fn test_falls_back_to_per_process_when_no_adapter_instances() {
    let counters = engine_category(&[PROCESS_A_3D]);
    counters.set_value(PROCESS_A_3D, 40.0);

    let mut engine = engine_over(&counters, GpuConfig::default());
    assert!(engine.initialize());
    assert_eq!(engine.scope(), InstanceScope::PerProcess);
    assert_eq!(engine.refresh().highest_adapter_usage, 40.0);
}

#[test]
fn test_handles_closed_on_drop() {
    let counters = engine_category(&[ADAPTER_A_3D, ADAPTER_A_COMPUTE]);
    {
        let mut engine = engine_over(&counters, GpuConfig::default());
        engine.initialize();
        assert_eq!(counters.open_count(), 2);
    }
    assert_eq!(counters.open_count(), 0);
}
