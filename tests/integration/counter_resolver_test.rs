// Locale-tolerant name resolution

use std::sync::Arc;

use taskscope::core::counters::{CounterBackend, CounterResolver, GPU_ENGINE_CATEGORY};
use taskscope::TelemetryError;

use super::support::FakeCounters;

fn spanish_host() -> Arc<FakeCounters> {
    Arc::new(
        FakeCounters::new()
            .with_category("Procesador", &["% de tiempo de procesador"], &["_Total"])
            .with_category("Motor de GPU", &["Porcentaje de utilización"], &["luid_0x0_0x1_phys_0_eng_0_engtype_3D"])
            .with_category("Memoria", &["MBytes disponibles"], &[]),
    )
}

fn resolver(counters: &Arc<FakeCounters>) -> CounterResolver {
    let backend: Arc<dyn CounterBackend> = counters.clone();
    CounterResolver::new(backend)
}

#[test]
fn test_localized_category_resolves() {
    let counters = spanish_host();
    let resolver = resolver(&counters);

    assert_eq!(
        resolver.resolve_category(&["GPU Engine", "Motor de GPU"]).unwrap(),
        "Motor de GPU"
    );
    assert_eq!(
        resolver.resolve_category(&["Processor", "Procesador"]).unwrap(),
        "Procesador"
    );
}

#[test]
fn test_exact_pass_beats_containment() {
    let counters = Arc::new(
        FakeCounters::new()
            .with_category("Processor Information", &[], &[])
            .with_category("Processor", &[], &[]),
    );
    let resolver = resolver(&counters);

    assert_eq!(resolver.resolve_category(&["processor"]).unwrap(), "Processor");
    assert_eq!(
        resolver.resolve_category(&["information"]).unwrap(),
        "Processor Information"
    );
}

#[test]
fn test_resolution_is_stable_across_calls() {
    let counters = spanish_host();
    let resolver = resolver(&counters);

    let first = resolver.resolve_category(&["Memory", "Memoria"]).unwrap();
    let second = resolver.resolve_category(&["Memory", "Memoria"]).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_unresolvable_category_lists_candidates() {
    let counters = spanish_host();
    let resolver = resolver(&counters);

    match resolver.resolve_category(&["Network Interface", "Interfaz de red"]) {
        Err(TelemetryError::CategoryUnresolvable(candidates)) => {
            assert_eq!(candidates, vec!["Network Interface", "Interfaz de red"]);
        }
        other => panic!("unexpected resolution: {:?}", other),
    }
    assert_eq!(resolver.try_resolve_category(&["Network Interface"]), None);
}

#[test]
fn test_gpu_engine_emergency_fallback() {
    let counters = Arc::new(FakeCounters::new().with_category("Processor", &[], &[]));
    let resolver = resolver(&counters);

    assert_eq!(
        resolver.resolve_category(&["GPU Engine"]).unwrap(),
        GPU_ENGINE_CATEGORY
    );
}

#[test]
fn test_counter_name_resolution() {
    let counters = spanish_host();
    let resolver = resolver(&counters);

    assert_eq!(
        resolver.resolve_counter("Motor de GPU", &["Utilization Percentage", "Porcentaje de utilización"]),
        "Porcentaje de utilización"
    );
    // Nothing matches: first candidate verbatim.
    assert_eq!(
        resolver.resolve_counter("Procesador", &["Interrupts/sec"]),
        "Interrupts/sec"
    );
    assert_eq!(
        resolver.resolve_counter("Missing", &["Whatever"]),
        "Whatever"
    );
}
