//! Static hardware facts: queried once, then served from memory.

use std::sync::Arc;

use chrono::NaiveDate;
use log::debug;
use once_cell::sync::OnceCell;

use crate::core::gpu::GpuDetailInfo;

/// Boundary to the platform's hardware inventory queries.
pub trait HardwareInventory: Send + Sync {
    fn cpu_name(&self) -> Option<String>;
    fn total_physical_memory(&self) -> Option<u64>;
    fn gpu_details(&self) -> Option<GpuDetailInfo>;
}

/// Lazily filled cache over a [`HardwareInventory`]. Each fact is queried
/// at most once for the lifetime of the cache.
pub struct HardwareFacts {
    inventory: Arc<dyn HardwareInventory>,
    cpu_name: OnceCell<String>,
    total_memory: OnceCell<u64>,
    gpu: OnceCell<GpuDetailInfo>,
}

static GLOBAL_FACTS: OnceCell<Arc<HardwareFacts>> = OnceCell::new();

impl HardwareFacts {
    pub fn new(inventory: Arc<dyn HardwareInventory>) -> Self {
        Self {
            inventory,
            cpu_name: OnceCell::new(),
            total_memory: OnceCell::new(),
            gpu: OnceCell::new(),
        }
    }

    /// Install the process-wide instance. The first call wins; later calls
    /// return the already installed facts.
    pub fn install(inventory: Arc<dyn HardwareInventory>) -> Arc<HardwareFacts> {
        GLOBAL_FACTS
            .get_or_init(|| Arc::new(HardwareFacts::new(inventory)))
            .clone()
    }

    pub fn global() -> Option<Arc<HardwareFacts>> {
        GLOBAL_FACTS.get().cloned()
    }

    pub fn cpu_name(&self) -> &str {
        self.cpu_name
            .get_or_init(|| self.inventory.cpu_name().unwrap_or_else(|| "Unknown CPU".to_string()))
    }

    pub fn total_physical_memory(&self) -> u64 {
        *self
            .total_memory
            .get_or_init(|| self.inventory.total_physical_memory().unwrap_or(0))
    }

    /// GPU identity. Shared memory defaults to half of physical RAM.
    pub fn gpu(&self) -> &GpuDetailInfo {
        self.gpu.get_or_init(|| {
            let mut info = self.inventory.gpu_details().unwrap_or_default();
            if info.name.is_empty() {
                info.name = "Generic GPU".to_string();
            }
            if info.total_shared_bytes == 0 {
                info.total_shared_bytes = self.total_physical_memory() / 2;
            }
            debug!("GPU inventory: {} ({})", info.name, info.driver_version);
            info
        })
    }
}

/// Parse a CIM datetime such as `20230815000000.000000-000` down to its date.
pub fn parse_driver_date(raw: &str) -> Option<NaiveDate> {
    let digits = raw.get(..8)?;
    NaiveDate::parse_from_str(digits, "%Y%m%d").ok()
}

/// Coarse vendor classification from an adapter name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuVendor {
    Nvidia,
    Amd,
    Intel,
    Unknown,
}

impl GpuVendor {
    pub fn from_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.contains("nvidia") || lower.contains("geforce") || lower.contains("quadro") {
            GpuVendor::Nvidia
        } else if lower.contains("amd") || lower.contains("radeon") || lower.contains("ati ") {
            GpuVendor::Amd
        } else if lower.contains("intel") {
            GpuVendor::Intel
        } else {
            GpuVendor::Unknown
        }
    }
}
