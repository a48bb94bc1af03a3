//! Per-adapter GPU usage from engine utilization counters.

use std::collections::BTreeMap;

use log::{debug, info, warn};

use super::ema::EmaBank;
use super::instance::{adapter_key, engine_type, select_instances, InstanceScope};
use super::types::{clamp_percent, EngineType, GpuAdapterSnapshot, GpuGlobalSnapshot};
use crate::core::config::GpuConfig;
use crate::core::counters::{CounterHandle, CounterPath, CounterResolver, GPU_ENGINE_CATEGORY};

/// Localized names of the engine category.
pub const GPU_ENGINE_ALIASES: &[&str] = &[GPU_ENGINE_CATEGORY, "Motor de GPU"];

const UTILIZATION_COUNTERS: &[&str] = &[
    "Utilization Percentage",
    "Porcentaje de utilización",
    "% GPU Usage",
    "GPU Usage",
    "Utilization",
];

/// Readings at or below this are treated as idle by the self-heal check.
const IDLE_EPSILON: f64 = 0.1;
/// Below this the engine-sum is considered a classification miss.
const NEGLIGIBLE_USAGE: f64 = 0.5;

struct EngineCounter {
    engine: EngineType,
    handle: CounterHandle,
}

/// Per-engine totals for one adapter before smoothing.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EngineTotals {
    pub three_d: f64,
    pub compute: f64,
    pub copy: f64,
    pub video_decode: f64,
    pub video_encode: f64,
    /// Highest single clamped instance value.
    pub max_engine: f64,
}

impl EngineTotals {
    /// `3D + Compute` clamped, or `max_engine` when that sum is negligible.
    pub fn raw_usage(&self) -> f64 {
        let raw = clamp_percent(self.three_d + self.compute);
        if raw < NEGLIGIBLE_USAGE && self.max_engine > raw {
            self.max_engine
        } else {
            raw
        }
    }

    pub fn is_idle(&self) -> bool {
        self.max_engine <= IDLE_EPSILON
    }
}

/// Sum readings per engine type, each value and each sum clamped to 0..=100.
pub fn aggregate_engines(readings: &[(EngineType, f64)]) -> EngineTotals {
    let mut totals = EngineTotals::default();

    for &(engine, raw) in readings {
        if !raw.is_finite() {
            continue;
        }
        let value = clamp_percent(raw);
        totals.max_engine = totals.max_engine.max(value);

        let slot = match engine {
            EngineType::ThreeD => &mut totals.three_d,
            EngineType::Compute => &mut totals.compute,
            EngineType::Copy => &mut totals.copy,
            EngineType::VideoDecode => &mut totals.video_decode,
            EngineType::VideoEncode => &mut totals.video_encode,
            EngineType::Other => continue,
        };
        *slot = (*slot + value).min(100.0);
    }

    totals
}

pub struct GpuAggregationEngine {
    resolver: CounterResolver,
    config: GpuConfig,
    category: Option<String>,
    counter_name: Option<String>,
    adapters: BTreeMap<String, Vec<EngineCounter>>,
    ema: EmaBank,
    scope: InstanceScope,
    initialized: bool,
    available: bool,
    zero_streak: u32,
    ticks_since_enumeration: u32,
    rebuilds: u32,
    last_snapshot: GpuGlobalSnapshot,
    last_error: Option<String>,
}

impl GpuAggregationEngine {
    pub fn new(resolver: CounterResolver, config: GpuConfig) -> Self {
        let ema = EmaBank::new(config.ema_alpha);
        Self {
            resolver,
            config,
            category: None,
            counter_name: None,
            adapters: BTreeMap::new(),
            ema,
            scope: InstanceScope::Aggregated,
            initialized: false,
            available: false,
            zero_streak: 0,
            ticks_since_enumeration: 0,
            rebuilds: 0,
            last_snapshot: GpuGlobalSnapshot::default(),
            last_error: None,
        }
    }

    /// Probe for the engine category and open counters. Runs once; later
    /// calls return the first outcome.
    pub fn initialize(&mut self) -> bool {
        if self.initialized {
            return self.available;
        }
        self.initialized = true;

        let Some(category) = self.resolver.try_resolve_category(GPU_ENGINE_ALIASES) else {
            info!("GPU engine counters unavailable on this host");
            self.last_error = Some("GPU engine category not found".to_string());
            return false;
        };
        // The resolver may hand back the hardcoded name; it still has to exist.
        if !self.resolver.backend().category_exists(&category) {
            info!("GPU engine category '{}' is not present", category);
            self.last_error = Some(format!("category '{}' not present", category));
            return false;
        }

        let counter = self.resolver.resolve_counter(&category, UTILIZATION_COUNTERS);
        debug!("GPU engine category '{}' counter '{}'", category, counter);
        self.category = Some(category);
        self.counter_name = Some(counter);
        self.available = true;
        self.rebuild(InstanceScope::Aggregated);
        self.available
    }

    /// Drop every handle and reopen against the current instance list.
    fn rebuild(&mut self, scope: InstanceScope) {
        self.adapters.clear();
        self.ticks_since_enumeration = 0;

        let (Some(category), Some(counter)) = (self.category.clone(), self.counter_name.clone()) else {
            return;
        };

        let backend = self.resolver.backend();
        let instances = match backend.instance_names(&category) {
            Ok(instances) => instances,
            Err(e) => {
                warn!("Failed to enumerate GPU engine instances: {}", e);
                self.last_error = Some(e.to_string());
                return;
            }
        };

        let (selected, used_scope) = select_instances(
            &instances,
            scope,
            self.config.max_aggregated_instances,
            self.config.max_per_process_instances,
        );
        self.scope = used_scope;

        let mut opened = 0usize;
        for instance in selected {
            let Some(engine) = engine_type(&instance) else {
                continue;
            };
            let path = CounterPath::new(&category, &counter, Some(&instance));
            match CounterHandle::open_primed(backend, path) {
                Ok(handle) => {
                    self.adapters
                        .entry(adapter_key(&instance))
                        .or_default()
                        .push(EngineCounter { engine, handle });
                    opened += 1;
                }
                Err(e) => debug!("Skipping GPU instance {}: {}", instance, e),
            }
        }

        debug!(
            "GPU engine counters rebuilt: {} handles across {} adapters ({:?})",
            opened,
            self.adapters.len(),
            self.scope
        );
    }

    /// Read all counters and produce this tick's snapshot. Never fails;
    /// an unavailable engine yields an empty snapshot.
    pub fn refresh(&mut self) -> GpuGlobalSnapshot {
        if !self.available {
            self.last_snapshot = GpuGlobalSnapshot::default();
            return self.last_snapshot.clone();
        }

        self.ticks_since_enumeration += 1;
        if self.ticks_since_enumeration >= self.config.instance_refresh_ticks {
            self.rebuild(self.scope);
        }

        let mut adapters = Vec::with_capacity(self.adapters.len());
        let mut all_idle = true;

        for (key, counters) in self.adapters.iter_mut() {
            let mut readings = Vec::with_capacity(counters.len());
            counters.retain(|counter| match counter.handle.read() {
                Ok(value) => {
                    readings.push((counter.engine, value));
                    true
                }
                Err(e) => {
                    debug!("Dropping stale GPU counter {}: {}", counter.handle.path(), e);
                    false
                }
            });

            let totals = aggregate_engines(&readings);
            if !totals.is_idle() {
                all_idle = false;
            }

            let smoothed = clamp_percent(self.ema.update(key, totals.raw_usage()));
            adapters.push(GpuAdapterSnapshot {
                adapter_key: key.clone(),
                usage_percent: smoothed,
                three_d_percent: totals.three_d,
                compute_percent: totals.compute,
                copy_percent: totals.copy,
                video_decode_percent: totals.video_decode,
                video_encode_percent: totals.video_encode,
                dedicated_memory_used: 0,
                shared_memory_used: 0,
            });
        }

        self.adapters.retain(|_, counters| !counters.is_empty());
        self.track_idle(all_idle);

        let highest = adapters
            .iter()
            .map(|adapter| adapter.usage_percent)
            .fold(0.0, f64::max);
        self.last_snapshot = GpuGlobalSnapshot {
            adapters,
            highest_adapter_usage: highest,
        };
        self.last_snapshot.clone()
    }

    fn track_idle(&mut self, all_idle: bool) {
        if !all_idle {
            self.zero_streak = 0;
            return;
        }

        self.zero_streak += 1;
        if self.zero_streak >= self.config.zero_streak_threshold {
            info!(
                "GPU counters flat for {} ticks, rebuilding with per-process instances",
                self.zero_streak
            );
            self.rebuild(InstanceScope::PerProcess);
            self.rebuilds += 1;
            self.zero_streak = 0;
        }
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn scope(&self) -> InstanceScope {
        self.scope
    }

    pub fn counter_count(&self) -> usize {
        self.adapters.values().map(Vec::len).sum()
    }

    pub fn adapter_keys(&self) -> Vec<String> {
        self.adapters.keys().cloned().collect()
    }

    pub fn rebuild_count(&self) -> u32 {
        self.rebuilds
    }

    pub fn zero_streak(&self) -> u32 {
        self.zero_streak
    }

    pub fn last_snapshot(&self) -> &GpuGlobalSnapshot {
        &self.last_snapshot
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn resolver(&self) -> &CounterResolver {
        &self.resolver
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sums_clamped_per_engine() {
        let totals = aggregate_engines(&[
            (EngineType::ThreeD, 70.0),
            (EngineType::ThreeD, 60.0),
            (EngineType::Compute, 150.0),
            (EngineType::Copy, 5.0),
        ]);
        assert_eq!(totals.three_d, 100.0);
        assert_eq!(totals.compute, 100.0);
        assert_eq!(totals.copy, 5.0);
        assert_eq!(totals.max_engine, 100.0);
        assert_eq!(totals.raw_usage(), 100.0);
    }

    #[test]
    fn test_max_engine_floor_when_negligible() {
        let totals = aggregate_engines(&[
            (EngineType::ThreeD, 0.2),
            (EngineType::VideoDecode, 35.0),
        ]);
        assert_eq!(totals.raw_usage(), 35.0);

        let busy = aggregate_engines(&[(EngineType::ThreeD, 20.0), (EngineType::VideoDecode, 35.0)]);
        assert_eq!(busy.raw_usage(), 20.0);
    }

    #[test]
    fn test_non_finite_and_negative_readings() {
        let totals = aggregate_engines(&[
            (EngineType::ThreeD, f64::NAN),
            (EngineType::Compute, -4.0),
            (EngineType::Other, 0.05),
        ]);
        assert_eq!(totals.raw_usage(), 0.05);
        assert!(totals.is_idle());
    }
}
