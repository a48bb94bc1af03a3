//! GPU memory readout: an OS budget query, cached briefly, with adapter
//! memory counters as the secondary source.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::debug;

use super::instance::{adapter_key, adapter_luid};
use super::types::MemoryUsage;
use crate::core::counters::{CounterHandle, CounterPath, CounterResolver};

pub const GPU_MEMORY_ALIASES: &[&str] = &["GPU Adapter Memory", "Memoria de adaptador de GPU"];
const DEDICATED_COUNTERS: &[&str] = &["Dedicated Usage", "Bytes dedicados", "Dedicated Memory"];
const SHARED_COUNTERS: &[&str] = &["Shared Usage", "Bytes compartidos", "Shared Memory"];
const MAX_MEMORY_INSTANCES: usize = 4;
/// A cached budget older than this many TTLs is discarded when re-query fails.
const STALE_BUDGET_TTLS: u32 = 3;

/// Budget-query result for one adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterMemory {
    /// `0xHIGH_0xLOW` LUID, matching the prefix of counter adapter keys.
    pub luid: Option<String>,
    pub usage: MemoryUsage,
}

/// OS memory-budget query.
pub trait MemoryBudgetSource: Send {
    fn query(&mut self) -> Option<Vec<AdapterMemory>>;
}

/// Source for hosts without a budget query.
#[derive(Debug, Default)]
pub struct NoMemoryBudget;

impl MemoryBudgetSource for NoMemoryBudget {
    fn query(&mut self) -> Option<Vec<AdapterMemory>> {
        None
    }
}

/// One tick's memory figures from both sources.
#[derive(Debug, Clone, Default)]
pub struct MemoryReadout {
    budget: Vec<AdapterMemory>,
    counters: HashMap<String, MemoryUsage>,
}

impl MemoryReadout {
    fn budget_for(&self, key: &str) -> MemoryUsage {
        let luid = adapter_luid(key).map(str::to_ascii_lowercase);
        self.budget
            .iter()
            .filter(|entry| match (&entry.luid, &luid) {
                (Some(entry_luid), Some(luid)) => entry_luid.to_ascii_lowercase() == *luid,
                _ => false,
            })
            .fold(MemoryUsage::default(), |acc, entry| add(acc, entry.usage))
    }

    /// Memory of one adapter; each figure prefers the budget when nonzero.
    pub fn for_adapter(&self, key: &str) -> MemoryUsage {
        let budget = self.budget_for(key);
        let counters = self.counters.get(key).copied().unwrap_or_default();
        prefer_nonzero(budget, counters)
    }

    pub fn total(&self) -> MemoryUsage {
        let budget = self
            .budget
            .iter()
            .fold(MemoryUsage::default(), |acc, entry| add(acc, entry.usage));
        let counters = self
            .counters
            .values()
            .fold(MemoryUsage::default(), |acc, usage| add(acc, *usage));
        prefer_nonzero(budget, counters)
    }
}

fn add(a: MemoryUsage, b: MemoryUsage) -> MemoryUsage {
    MemoryUsage {
        dedicated_used: a.dedicated_used.saturating_add(b.dedicated_used),
        shared_used: a.shared_used.saturating_add(b.shared_used),
    }
}

fn prefer_nonzero(primary: MemoryUsage, secondary: MemoryUsage) -> MemoryUsage {
    MemoryUsage {
        dedicated_used: if primary.dedicated_used > 0 {
            primary.dedicated_used
        } else {
            secondary.dedicated_used
        },
        shared_used: if primary.shared_used > 0 {
            primary.shared_used
        } else {
            secondary.shared_used
        },
    }
}

struct MemoryCounterPair {
    adapter_key: String,
    dedicated: CounterHandle,
    shared: CounterHandle,
}

pub struct GpuMemoryReader {
    budget: Box<dyn MemoryBudgetSource>,
    ttl: Duration,
    cached: Option<(Instant, Vec<AdapterMemory>)>,
    counters: Vec<MemoryCounterPair>,
}

impl GpuMemoryReader {
    pub fn new(budget: Box<dyn MemoryBudgetSource>, ttl: Duration) -> Self {
        Self {
            budget,
            ttl,
            cached: None,
            counters: Vec::new(),
        }
    }

    /// Open the adapter memory counters. Missing category is not an error.
    pub fn open_counters(&mut self, resolver: &CounterResolver) {
        self.counters.clear();

        let Some(category) = resolver.try_resolve_category(GPU_MEMORY_ALIASES) else {
            return;
        };
        let backend = resolver.backend();
        if !backend.category_exists(&category) {
            return;
        }
        let instances = match backend.instance_names(&category) {
            Ok(instances) => instances,
            Err(e) => {
                debug!("GPU memory instances unavailable: {}", e);
                return;
            }
        };

        let dedicated_name = resolver.resolve_counter(&category, DEDICATED_COUNTERS);
        let shared_name = resolver.resolve_counter(&category, SHARED_COUNTERS);

        for instance in instances.iter().take(MAX_MEMORY_INSTANCES) {
            let dedicated = CounterHandle::open_primed(
                backend,
                CounterPath::new(&category, &dedicated_name, Some(instance)),
            );
            let shared = CounterHandle::open_primed(
                backend,
                CounterPath::new(&category, &shared_name, Some(instance)),
            );
            if let (Ok(dedicated), Ok(shared)) = (dedicated, shared) {
                self.counters.push(MemoryCounterPair {
                    adapter_key: adapter_key(instance),
                    dedicated,
                    shared,
                });
            }
        }
    }

    pub fn has_counters(&self) -> bool {
        !self.counters.is_empty()
    }

    /// Budget entries, re-queried at most once per TTL. A failed query keeps
    /// the previous result for up to a few TTLs, then reports nothing.
    fn budget_entries(&mut self, now: Instant) -> Vec<AdapterMemory> {
        let fresh = matches!(&self.cached, Some((at, _)) if now.duration_since(*at) <= self.ttl);
        if !fresh {
            match self.budget.query() {
                Some(entries) => self.cached = Some((now, entries)),
                None => {
                    let expired = matches!(
                        &self.cached,
                        Some((at, _)) if now.duration_since(*at) > self.ttl * STALE_BUDGET_TTLS
                    );
                    if expired {
                        debug!("Dropping stale GPU memory budget");
                        self.cached = None;
                    }
                }
            }
        }
        self.cached
            .as_ref()
            .map(|(_, entries)| entries.clone())
            .unwrap_or_default()
    }

    pub fn read(&mut self) -> MemoryReadout {
        self.read_at(Instant::now())
    }

    pub fn read_at(&mut self, now: Instant) -> MemoryReadout {
        let budget = self.budget_entries(now);

        let mut counters: HashMap<String, MemoryUsage> = HashMap::new();
        self.counters.retain(|pair| {
            match (pair.dedicated.read(), pair.shared.read()) {
                (Ok(dedicated), Ok(shared)) => {
                    let entry = counters.entry(pair.adapter_key.clone()).or_default();
                    entry.dedicated_used = entry.dedicated_used.saturating_add(to_bytes(dedicated));
                    entry.shared_used = entry.shared_used.saturating_add(to_bytes(shared));
                    true
                }
                _ => {
                    debug!("Dropping stale GPU memory counters for {}", pair.adapter_key);
                    false
                }
            }
        });

        MemoryReadout { budget, counters }
    }
}

fn to_bytes(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value as u64
    } else {
        0
    }
}
