#[cfg(all(unix, feature = "rocm"))]
use rocm_smi_lib::{DeviceHandle, RocmSmi};

use crate::core::gpu::{MemoryUsage, VendorBackend};
use crate::error::{Result, TelemetryError};

/// AMD busy percentage through ROCm SMI.
pub struct RocmBackend {
    #[cfg(all(unix, feature = "rocm"))]
    rocm: RocmSmi,
    device_index: u32,
}

impl RocmBackend {
    pub fn new() -> Result<Self> {
        Self::with_device_index(0)
    }

    pub fn with_device_index(index: u32) -> Result<Self> {
        #[cfg(all(unix, feature = "rocm"))]
        {
            let rocm = RocmSmi::init().map_err(|e| {
                TelemetryError::gpu_not_available(format!("Failed to init ROCm SMI: {:?}", e))
            })?;

            let device_count = rocm.get_device_count().map_err(|e| {
                TelemetryError::gpu_not_available(format!("Failed to get device count: {:?}", e))
            })?;
            if index >= device_count as u32 {
                return Err(TelemetryError::gpu_not_available(format!(
                    "GPU {} not found (only {} devices available)",
                    index, device_count
                )));
            }

            Ok(Self {
                rocm,
                device_index: index,
            })
        }
        #[cfg(not(all(unix, feature = "rocm")))]
        {
            let _ = index;
            Err(TelemetryError::gpu_not_available(
                "AMD GPU support not enabled or not on Unix",
            ))
        }
    }

    #[cfg(all(unix, feature = "rocm"))]
    fn device(&self) -> Option<DeviceHandle> {
        self.rocm.get_device_handle(self.device_index).ok()
    }
}

impl VendorBackend for RocmBackend {
    fn name(&self) -> &'static str {
        "ROCm SMI"
    }

    fn usage_percent(&mut self) -> Option<f64> {
        #[cfg(all(unix, feature = "rocm"))]
        {
            let device = self.device()?;
            self.rocm.get_busy_percent(&device).ok().map(|p| p as f64)
        }
        #[cfg(not(all(unix, feature = "rocm")))]
        {
            let _ = self.device_index;
            None
        }
    }

    fn memory(&mut self) -> Option<MemoryUsage> {
        #[cfg(all(unix, feature = "rocm"))]
        {
            let device = self.device()?;
            let used = self.rocm.get_memory_used(&device).ok()?;
            Some(MemoryUsage {
                dedicated_used: used,
                shared_used: 0,
            })
        }
        #[cfg(not(all(unix, feature = "rocm")))]
        {
            None
        }
    }
}
