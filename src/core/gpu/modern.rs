use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info};

use super::aggregator::GpuAggregationEngine;
use super::memory::{GpuMemoryReader, MemoryBudgetSource};
use super::provider::GpuUsageProvider;
use super::timing::NodeTimingEstimator;
use super::types::{clamp_percent, GpuAdapterDynamicInfo, GpuDetailInfo};
use crate::core::config::GpuConfig;
use crate::core::counters::CounterResolver;
use crate::core::hardware::HardwareFacts;

pub const MODERN_PROVIDER_NAME: &str = "Modern (engine counters + memory budget)";

/// Engine-counter provider: per-adapter aggregation, budget-query memory
/// and an optional node-timing floor.
pub struct ModernProvider {
    engine: GpuAggregationEngine,
    memory: GpuMemoryReader,
    estimator: Option<NodeTimingEstimator>,
    facts: Arc<HardwareFacts>,
    min_interval: Duration,
    last_sample_at: Option<Instant>,
    last_usage: GpuAdapterDynamicInfo,
    supported: bool,
}

impl ModernProvider {
    pub fn new(
        resolver: CounterResolver,
        budget: Box<dyn MemoryBudgetSource>,
        estimator: Option<NodeTimingEstimator>,
        facts: Arc<HardwareFacts>,
        config: &GpuConfig,
    ) -> Self {
        Self {
            engine: GpuAggregationEngine::new(resolver, config.clone()),
            memory: GpuMemoryReader::new(budget, config.memory_cache_ttl()),
            estimator,
            facts,
            min_interval: config.min_sampling_interval(),
            last_sample_at: None,
            last_usage: GpuAdapterDynamicInfo::default(),
            supported: false,
        }
    }

    pub fn engine(&self) -> &GpuAggregationEngine {
        &self.engine
    }
}

impl GpuUsageProvider for ModernProvider {
    fn name(&self) -> &str {
        MODERN_PROVIDER_NAME
    }

    fn is_supported(&self) -> bool {
        self.supported
    }

    fn initialize(&mut self) {
        if !self.engine.initialize() {
            self.supported = false;
            return;
        }

        self.memory.open_counters(self.engine.resolver());
        self.supported = self.engine.counter_count() > 0 || self.memory.has_counters();
        if self.supported {
            info!(
                "Modern GPU provider ready: {} engine counters, memory counters: {}",
                self.engine.counter_count(),
                self.memory.has_counters()
            );
        }
    }

    fn static_info(&self) -> GpuDetailInfo {
        self.facts.gpu().clone()
    }

    fn usage(&mut self) -> GpuAdapterDynamicInfo {
        if !self.supported {
            return GpuAdapterDynamicInfo::default();
        }

        let now = Instant::now();
        if let Some(at) = self.last_sample_at {
            if now.duration_since(at) < self.min_interval {
                return self.last_usage.clone();
            }
        }
        self.last_sample_at = Some(now);

        let snapshot = self.engine.refresh();
        let memory = self.memory.read_at(now);

        let (three_d, compute) = snapshot
            .busiest()
            .map(|adapter| (adapter.three_d_percent, adapter.compute_percent))
            .unwrap_or_default();

        let mut global = snapshot.highest_adapter_usage;
        if let Some(estimator) = self.estimator.as_mut() {
            if let Some(busy) = estimator.estimate() {
                if busy > global {
                    debug!("Node timing floor {:.2}% over counters {:.2}%", busy, global);
                }
                global = global.max(busy);
            }
        }

        let mut adapters = snapshot.adapters;
        for adapter in adapters.iter_mut() {
            let usage = memory.for_adapter(&adapter.adapter_key);
            adapter.dedicated_memory_used = usage.dedicated_used;
            adapter.shared_memory_used = usage.shared_used;
        }
        let total = memory.total();

        self.last_usage = GpuAdapterDynamicInfo {
            global_usage_percent: clamp_percent(global),
            three_d_percent: three_d,
            compute_percent: compute,
            dedicated_memory_used: total.dedicated_used,
            shared_memory_used: total.shared_used,
            adapters,
        };
        self.last_usage.clone()
    }
}
