#[cfg(feature = "nvml")]
use nvml_wrapper::Nvml;
#[cfg(feature = "nvml")]
use once_cell::sync::Lazy;

use crate::core::gpu::{GpuDetailInfo, MemoryUsage, VendorBackend};
use crate::error::{Result, TelemetryError};

/// NVML must be initialized once per process.
#[cfg(feature = "nvml")]
static NVML: Lazy<Option<Nvml>> = Lazy::new(|| Nvml::init().ok());

/// NVIDIA utilization through NVML.
pub struct NvidiaBackend {
    device_index: u32,
}

impl NvidiaBackend {
    /// Bind to the first NVIDIA device.
    pub fn new() -> Result<Self> {
        Self::with_device_index(0)
    }

    pub fn with_device_index(index: u32) -> Result<Self> {
        #[cfg(feature = "nvml")]
        {
            let nvml = NVML.as_ref().ok_or_else(|| {
                TelemetryError::gpu_not_available("NVML not available (driver missing or incompatible)")
            })?;
            nvml.device_by_index(index).map_err(|e| {
                TelemetryError::gpu_not_available(format!("GPU {} not found: {}", index, e))
            })?;
            Ok(Self { device_index: index })
        }
        #[cfg(not(feature = "nvml"))]
        {
            let _ = index;
            Err(TelemetryError::gpu_not_available("NVIDIA GPU support not enabled"))
        }
    }
}

impl VendorBackend for NvidiaBackend {
    fn name(&self) -> &'static str {
        "NVML"
    }

    fn usage_percent(&mut self) -> Option<f64> {
        #[cfg(feature = "nvml")]
        {
            let device = NVML.as_ref()?.device_by_index(self.device_index).ok()?;
            let rates = device.utilization_rates().ok()?;
            Some(f64::from(rates.gpu))
        }
        #[cfg(not(feature = "nvml"))]
        {
            None
        }
    }

    fn memory(&mut self) -> Option<MemoryUsage> {
        #[cfg(feature = "nvml")]
        {
            let device = NVML.as_ref()?.device_by_index(self.device_index).ok()?;
            let info = device.memory_info().ok()?;
            Some(MemoryUsage {
                dedicated_used: info.used,
                shared_used: 0,
            })
        }
        #[cfg(not(feature = "nvml"))]
        {
            None
        }
    }
}

/// Identity of the first NVIDIA device, for hosts without a richer
/// inventory source.
pub fn nvidia_gpu_details() -> Option<GpuDetailInfo> {
    #[cfg(feature = "nvml")]
    {
        let nvml = NVML.as_ref()?;
        let device = nvml.device_by_index(0).ok()?;
        Some(GpuDetailInfo {
            name: device.name().ok()?,
            driver_version: nvml.sys_driver_version().unwrap_or_default(),
            driver_date: None,
            pnp_device_id: device.pci_info().map(|p| p.bus_id).unwrap_or_default(),
            total_dedicated_bytes: device.memory_info().map(|m| m.total).unwrap_or(0),
            total_shared_bytes: 0,
        })
    }
    #[cfg(not(feature = "nvml"))]
    {
        None
    }
}
