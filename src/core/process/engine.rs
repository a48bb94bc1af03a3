//! Live process table reconciled against a fresh snapshot every tick.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::{debug, trace, warn};

use super::classify::classify;
use super::icons::{IconBackend, IconResourceCache};
use super::record::{
    ProcessCategory, ProcessRecord, ProcessTableDelta, RawProcessSample, RemovedProcess, SystemTimes,
};
use super::snapshot::ProcessSnapshotSource;
use super::sources::{ProcessInspector, UsernameResolver, WindowCatalog, UNKNOWN_OWNER};
use crate::core::config::ProcessConfig;
use crate::error::Result;

/// Native collaborators of the delta engine.
pub struct ProcessBackends {
    pub snapshots: Box<dyn ProcessSnapshotSource>,
    pub owners: Box<dyn UsernameResolver>,
    pub windows: Box<dyn WindowCatalog>,
    pub inspector: Box<dyn ProcessInspector>,
    pub icons: Arc<dyn IconBackend>,
}

pub struct ProcessDeltaEngine {
    snapshots: Box<dyn ProcessSnapshotSource>,
    owners: Box<dyn UsernameResolver>,
    windows: Box<dyn WindowCatalog>,
    inspector: Box<dyn ProcessInspector>,
    icon_cache: IconResourceCache,
    table: HashMap<u32, ProcessRecord>,
    baseline: Option<SystemTimes>,
    config: ProcessConfig,
    ticks: u64,
    consecutive_failures: u32,
    last_error: Option<String>,
}

/// Share of `system_delta` consumed by a process, in 0..=100.
pub fn cpu_share(proc_delta: u64, system_delta: u64) -> f64 {
    if system_delta == 0 {
        return 0.0;
    }
    (100.0 * proc_delta as f64 / system_delta as f64).clamp(0.0, 100.0)
}

/// Per-second rate of a cumulative byte counter. A counter that went
/// backwards reports zero.
pub fn byte_rate(previous: u64, current: u64, interval_secs: f64) -> u64 {
    if interval_secs <= 0.0 {
        return 0;
    }
    (current.saturating_sub(previous) as f64 / interval_secs) as u64
}

impl ProcessDeltaEngine {
    pub fn new(backends: ProcessBackends, config: ProcessConfig) -> Self {
        Self {
            snapshots: backends.snapshots,
            owners: backends.owners,
            windows: backends.windows,
            inspector: backends.inspector,
            icon_cache: IconResourceCache::new(backends.icons),
            table: HashMap::new(),
            baseline: None,
            config,
            ticks: 0,
            consecutive_failures: 0,
            last_error: None,
        }
    }

    /// Run one sampling cycle. On error the live table is left exactly as it was.
    pub fn tick(&mut self) -> Result<ProcessTableDelta> {
        match self.try_tick() {
            Ok(delta) => {
                self.ticks += 1;
                self.consecutive_failures = 0;
                self.last_error = None;
                debug!(
                    "Process tick {}: +{} ~{} -{} ({} tracked)",
                    self.ticks,
                    delta.added.len(),
                    delta.updated.len(),
                    delta.removed.len(),
                    self.table.len()
                );
                Ok(delta)
            }
            Err(e) => {
                self.consecutive_failures += 1;
                self.last_error = Some(e.to_string());
                warn!(
                    "Process tick aborted ({} consecutive): {}",
                    self.consecutive_failures, e
                );
                Err(e)
            }
        }
    }

    fn try_tick(&mut self) -> Result<ProcessTableDelta> {
        let current_times = self.snapshots.system_times()?;
        let samples = self.snapshots.capture_all()?;

        // Nothing below can fail, so committing the baseline here keeps it
        // paired with the table it was used for.
        let system_delta = self
            .baseline
            .map(|previous| current_times.delta_since(&previous))
            .unwrap_or(0);
        self.baseline = Some(current_times);

        let app_windows = self.windows.application_windows();
        let interval_secs = self.config.tick_interval().as_secs_f64();

        let mut delta = ProcessTableDelta {
            system_delta,
            ..Default::default()
        };
        let mut seen = HashSet::with_capacity(samples.len());

        for sample in samples {
            let pid = sample.pid;
            if !seen.insert(pid) {
                trace!("Duplicate pid {} in snapshot ignored", pid);
                continue;
            }

            let (category, title) = classify(&sample, &app_windows);
            let same_instance = self.table.get(&pid).map(|record| record.is_same_instance(&sample));

            match same_instance {
                Some(true) => {
                    if let Some(record) = self.table.get_mut(&pid) {
                        apply_sample(record, sample, system_delta, interval_secs);
                        record.category = category;
                        record.main_window_title = title.unwrap_or_default();
                        delta.updated.push(pid);
                    }
                }
                Some(false) => {
                    if let Some(previous) = self.table.remove(&pid) {
                        debug!("Pid {} reused ({} -> {})", pid, previous.name, sample.name);
                        self.release_icon(&previous);
                        delta.removed.push(RemovedProcess {
                            pid,
                            name: previous.name,
                        });
                    }
                    self.admit(sample, category, title);
                    delta.added.push(pid);
                }
                None => {
                    self.admit(sample, category, title);
                    delta.added.push(pid);
                }
            }
        }

        let gone: Vec<u32> = self
            .table
            .keys()
            .filter(|pid| !seen.contains(pid))
            .copied()
            .collect();
        for pid in gone {
            if let Some(record) = self.table.remove(&pid) {
                self.release_icon(&record);
                delta.removed.push(RemovedProcess {
                    pid,
                    name: record.name,
                });
            }
        }

        Ok(delta)
    }

    /// First sighting: rates start at zero, lazy attributes are resolved once.
    fn admit(&mut self, sample: RawProcessSample, category: ProcessCategory, title: Option<String>) {
        let pid = sample.pid;
        let mut record = ProcessRecord::from_sample(sample);
        record.category = category;
        record.main_window_title = title.unwrap_or_default();

        record.username = if self.config.resolve_usernames {
            self.owners.resolve_owner(pid)
        } else {
            UNKNOWN_OWNER.to_string()
        };

        if self.config.resolve_command_lines {
            record.command_line = self.inspector.command_line(pid).unwrap_or_default();
        }
        record.architecture = self.inspector.architecture(pid).unwrap_or_default();

        if self.config.resolve_icons {
            let key = record.icon_cache_key();
            let backend = Arc::clone(self.icon_cache.backend());
            record.icon = self.icon_cache.acquire(&key, || backend.extract(pid));
            if record.icon.is_some() {
                record.icon_key = Some(key);
            }
        }

        self.table.insert(pid, record);
    }

    fn release_icon(&self, record: &ProcessRecord) {
        if let Some(key) = &record.icon_key {
            self.icon_cache.release(key);
        }
    }

    pub fn get(&self, pid: u32) -> Option<&ProcessRecord> {
        self.table.get(&pid)
    }

    pub fn records(&self) -> impl Iterator<Item = &ProcessRecord> {
        self.table.values()
    }

    /// Owned copy of the table ordered by pid, safe to hand to another thread.
    pub fn snapshot(&self) -> Vec<ProcessRecord> {
        let mut records: Vec<ProcessRecord> = self.table.values().cloned().collect();
        records.sort_by_key(|record| record.pid);
        records
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn icon_cache(&self) -> &IconResourceCache {
        &self.icon_cache
    }

    pub fn config(&self) -> &ProcessConfig {
        &self.config
    }

    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

impl Drop for ProcessDeltaEngine {
    fn drop(&mut self) {
        for (_, record) in self.table.drain() {
            if let Some(key) = &record.icon_key {
                self.icon_cache.release(key);
            }
        }
        self.icon_cache.clear();
    }
}

fn apply_sample(record: &mut ProcessRecord, sample: RawProcessSample, system_delta: u64, interval_secs: f64) {
    let proc_delta = sample.cpu_time().saturating_sub(record.cpu_time());
    record.cpu_usage = cpu_share(proc_delta, system_delta);
    record.read_bytes_per_sec = byte_rate(record.read_bytes, sample.read_bytes, interval_secs);
    record.write_bytes_per_sec = byte_rate(record.write_bytes, sample.write_bytes, interval_secs);

    record.name = sample.name;
    record.parent_pid = sample.parent_pid;
    record.kernel_time = sample.kernel_time;
    record.user_time = sample.user_time;
    record.working_set_bytes = sample.working_set_bytes;
    record.private_bytes = sample.private_bytes;
    record.thread_count = sample.thread_count;
    record.handle_count = sample.handle_count;
    record.session_id = sample.session_id;
    record.read_bytes = sample.read_bytes;
    record.write_bytes = sample.write_bytes;
    record.read_operations = sample.read_operations;
    record.write_operations = sample.write_operations;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_share_bounds() {
        assert_eq!(cpu_share(250_000, 1_000_000), 25.0);
        assert_eq!(cpu_share(5, 0), 0.0);
        assert_eq!(cpu_share(3_000_000, 1_000_000), 100.0);
    }

    #[test]
    fn test_byte_rate_clamps_rollover() {
        assert_eq!(byte_rate(10_000, 500, 1.0), 0);
        assert_eq!(byte_rate(1_000, 3_000, 2.0), 1_000);
        assert_eq!(byte_rate(0, 3_000, 0.0), 0);
    }
}
