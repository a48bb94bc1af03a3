//! System-wide CPU, memory, disk and network usage.

use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::core::counters::{
    CounterBackend, CounterCatalog, CounterHandle, DiskCounters, NetworkCounters,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryUsageInfo {
    pub total_physical_bytes: u64,
    pub used_physical_bytes: u64,
    pub available_bytes: u64,
    pub committed_bytes: u64,
    pub commit_limit: u64,
}

impl MemoryUsageInfo {
    pub fn used_percentage(&self) -> f64 {
        if self.total_physical_bytes == 0 {
            0.0
        } else {
            self.used_physical_bytes as f64 / self.total_physical_bytes as f64 * 100.0
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskUsageInfo {
    pub active_time_percent: f64,
    pub read_bytes_per_sec: f64,
    pub write_bytes_per_sec: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkUsageInfo {
    pub bytes_sent_per_sec: f64,
    pub bytes_received_per_sec: f64,
    pub bandwidth_bytes_per_sec: f64,
}

impl NetworkUsageInfo {
    pub fn total_bytes_per_sec(&self) -> f64 {
        self.bytes_sent_per_sec + self.bytes_received_per_sec
    }
}

/// Direct OS status queries that do not go through counters.
pub trait HostStatus: Send {
    fn memory(&mut self) -> Option<MemoryUsageInfo>;

    /// Used only when the processor counter cannot be opened.
    fn cpu_percent(&mut self) -> Option<f64> {
        None
    }
}

#[derive(Debug, Default)]
pub struct NoHostStatus;

impl HostStatus for NoHostStatus {
    fn memory(&mut self) -> Option<MemoryUsageInfo> {
        None
    }
}

fn read_or_zero(handle: &CounterHandle) -> f64 {
    match handle.read() {
        Ok(value) if value.is_finite() => value,
        _ => 0.0,
    }
}

pub struct PerformanceReader {
    cpu: Option<CounterHandle>,
    memory_available: Option<CounterHandle>,
    disk: Option<DiskCounters>,
    network: Option<NetworkCounters>,
    host: Box<dyn HostStatus>,
    total_memory: u64,
}

impl PerformanceReader {
    /// Open every counter group; a group that fails stays absent and reads as zero.
    pub fn new(backend: Arc<dyn CounterBackend>, host: Box<dyn HostStatus>, total_memory: u64) -> Self {
        let catalog = CounterCatalog::new(backend);

        let cpu = catalog
            .cpu_total()
            .map_err(|e| debug!("CPU counter unavailable: {}", e))
            .ok();
        let memory_available = catalog
            .memory_available()
            .map_err(|e| debug!("Memory counter unavailable: {}", e))
            .ok();
        let disk = catalog
            .disk()
            .map_err(|e| debug!("Disk counters unavailable: {}", e))
            .ok();
        let network = catalog
            .network()
            .map_err(|e| debug!("Network counters unavailable: {}", e))
            .ok();

        Self {
            cpu,
            memory_available,
            disk,
            network,
            host,
            total_memory,
        }
    }

    pub fn cpu_usage(&mut self) -> f64 {
        let value = match &self.cpu {
            Some(counter) => read_or_zero(counter),
            None => self.host.cpu_percent().unwrap_or(0.0),
        };
        value.clamp(0.0, 100.0)
    }

    /// Direct status query first, then the available-bytes counter.
    pub fn memory_usage(&mut self) -> MemoryUsageInfo {
        if let Some(info) = self.host.memory() {
            return info;
        }

        let total = self.total_memory;
        match &self.memory_available {
            Some(counter) => {
                let available = read_or_zero(counter) as u64;
                MemoryUsageInfo {
                    total_physical_bytes: total,
                    available_bytes: available,
                    used_physical_bytes: total.saturating_sub(available),
                    ..Default::default()
                }
            }
            None => MemoryUsageInfo {
                total_physical_bytes: total,
                ..Default::default()
            },
        }
    }

    pub fn disk_usage(&self) -> DiskUsageInfo {
        let Some(disk) = &self.disk else {
            return DiskUsageInfo::default();
        };
        let idle = disk.idle_time.read().unwrap_or(100.0);
        DiskUsageInfo {
            active_time_percent: (100.0 - idle).clamp(0.0, 100.0),
            read_bytes_per_sec: read_or_zero(&disk.read_bytes).max(0.0),
            write_bytes_per_sec: read_or_zero(&disk.write_bytes).max(0.0),
        }
    }

    pub fn network_usage(&self) -> NetworkUsageInfo {
        let Some(network) = &self.network else {
            return NetworkUsageInfo::default();
        };
        let sent: f64 = network.sent.iter().map(read_or_zero).sum();
        let received: f64 = network.received.iter().map(read_or_zero).sum();
        let bandwidth_bits = network.bandwidth.as_ref().map(read_or_zero).unwrap_or(0.0);
        NetworkUsageInfo {
            bytes_sent_per_sec: sent,
            bytes_received_per_sec: received,
            bandwidth_bytes_per_sec: bandwidth_bits / 8.0,
        }
    }
}
