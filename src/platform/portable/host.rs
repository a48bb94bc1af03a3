use sysinfo::{CpuRefreshKind, MemoryRefreshKind, RefreshKind, System};

use crate::core::gpu::GpuDetailInfo;
use crate::core::hardware::HardwareInventory;
use crate::core::performance::{HostStatus, MemoryUsageInfo};

/// Memory and CPU load through sysinfo.
pub struct SysinfoHostStatus {
    system: System,
}

impl SysinfoHostStatus {
    pub fn new() -> Self {
        let system = System::new_with_specifics(
            RefreshKind::nothing()
                .with_memory(MemoryRefreshKind::everything())
                .with_cpu(CpuRefreshKind::nothing().with_cpu_usage()),
        );
        Self { system }
    }
}

impl Default for SysinfoHostStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl HostStatus for SysinfoHostStatus {
    fn memory(&mut self) -> Option<MemoryUsageInfo> {
        self.system.refresh_memory();
        let total = self.system.total_memory();
        if total == 0 {
            return None;
        }
        Some(MemoryUsageInfo {
            total_physical_bytes: total,
            used_physical_bytes: self.system.used_memory(),
            available_bytes: self.system.available_memory(),
            committed_bytes: self.system.used_memory() + self.system.used_swap(),
            commit_limit: total + self.system.total_swap(),
        })
    }

    fn cpu_percent(&mut self) -> Option<f64> {
        self.system.refresh_cpu_usage();
        Some(f64::from(self.system.global_cpu_usage()))
    }
}

/// Static inventory from sysinfo, NVML and sysfs.
#[derive(Debug, Default)]
pub struct PortableInventory;

impl HardwareInventory for PortableInventory {
    fn cpu_name(&self) -> Option<String> {
        let system = System::new_with_specifics(RefreshKind::nothing().with_cpu(CpuRefreshKind::nothing()));
        system
            .cpus()
            .first()
            .map(|cpu| cpu.brand().trim().to_string())
            .filter(|brand| !brand.is_empty())
    }

    fn total_physical_memory(&self) -> Option<u64> {
        let system = System::new_with_specifics(RefreshKind::nothing().with_memory(MemoryRefreshKind::nothing().with_ram()));
        Some(system.total_memory()).filter(|&total| total > 0)
    }

    fn gpu_details(&self) -> Option<GpuDetailInfo> {
        if let Some(info) = crate::platform::gpu::nvidia_gpu_details() {
            return Some(info);
        }
        #[cfg(target_os = "linux")]
        {
            super::drm::sysfs_gpu_details()
        }
        #[cfg(not(target_os = "linux"))]
        {
            None
        }
    }
}
