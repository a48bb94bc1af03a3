use log::debug;
use serde::Deserialize;
use windows_sys::Win32::System::SystemInformation::{GlobalMemoryStatusEx, MEMORYSTATUSEX};
use wmi::WMIConnection;

use crate::core::gpu::GpuDetailInfo;
use crate::core::hardware::{parse_driver_date, HardwareInventory};
use crate::core::performance::{HostStatus, MemoryUsageInfo};
use crate::error::{Result, TelemetryError};

#[derive(Deserialize, Debug)]
#[serde(rename = "Win32_VideoController")]
#[serde(rename_all = "PascalCase")]
struct Win32VideoController {
    name: Option<String>,
    driver_version: Option<String>,
    driver_date: Option<String>,
    #[serde(rename = "PNPDeviceID")]
    pnp_device_id: Option<String>,
    #[serde(rename = "AdapterRAM")]
    adapter_ram: Option<u64>,
}

#[derive(Deserialize, Debug)]
#[serde(rename = "Win32_Processor")]
#[serde(rename_all = "PascalCase")]
struct Win32Processor {
    name: Option<String>,
}

fn wmi_query<T: serde::de::DeserializeOwned>() -> Result<Vec<T>> {
    let wmi_con = WMIConnection::new()
        .map_err(|e| TelemetryError::platform(format!("Failed to connect to WMI: {}", e)))?;
    wmi_con
        .query()
        .map_err(|e| TelemetryError::platform(format!("WMI query failed: {}", e)))
}

fn memory_status() -> Option<MEMORYSTATUSEX> {
    // SAFETY: MEMORYSTATUSEX is plain data.
    let mut status: MEMORYSTATUSEX = unsafe { std::mem::zeroed() };
    status.dwLength = std::mem::size_of::<MEMORYSTATUSEX>() as u32;
    // SAFETY: dwLength is set as the API requires.
    let ok = unsafe { GlobalMemoryStatusEx(&mut status) };
    (ok != 0).then_some(status)
}

/// Static inventory through WMI and the memory status call.
#[derive(Debug, Default)]
pub struct WmiInventory;

impl WmiInventory {
    pub fn new() -> Self {
        Self
    }
}

impl HardwareInventory for WmiInventory {
    fn cpu_name(&self) -> Option<String> {
        let processors: Vec<Win32Processor> = wmi_query().map_err(|e| debug!("{}", e)).ok()?;
        processors
            .into_iter()
            .find_map(|p| p.name)
            .map(|name| name.trim().to_string())
    }

    fn total_physical_memory(&self) -> Option<u64> {
        memory_status().map(|status| status.ullTotalPhys)
    }

    fn gpu_details(&self) -> Option<GpuDetailInfo> {
        let controllers: Vec<Win32VideoController> = match wmi_query() {
            Ok(controllers) => controllers,
            Err(e) => {
                debug!("{}", e);
                return crate::platform::gpu::nvidia_gpu_details();
            }
        };

        let controller = controllers.into_iter().find(|c| c.name.is_some())?;
        Some(GpuDetailInfo {
            name: controller.name.unwrap_or_default(),
            driver_version: controller.driver_version.unwrap_or_default(),
            driver_date: controller.driver_date.as_deref().and_then(parse_driver_date),
            pnp_device_id: controller.pnp_device_id.unwrap_or_default(),
            total_dedicated_bytes: controller.adapter_ram.unwrap_or(0),
            total_shared_bytes: 0,
        })
    }
}

/// Memory status via `GlobalMemoryStatusEx`. CPU load has no direct query
/// here; the processor counter covers it.
#[derive(Debug, Default)]
pub struct MemoryStatusHost;

impl MemoryStatusHost {
    pub fn new() -> Self {
        Self
    }
}

impl HostStatus for MemoryStatusHost {
    fn memory(&mut self) -> Option<MemoryUsageInfo> {
        let status = memory_status()?;
        Some(MemoryUsageInfo {
            total_physical_bytes: status.ullTotalPhys,
            used_physical_bytes: status.ullTotalPhys.saturating_sub(status.ullAvailPhys),
            available_bytes: status.ullAvailPhys,
            committed_bytes: status.ullTotalPageFile.saturating_sub(status.ullAvailPageFile),
            commit_limit: status.ullTotalPageFile,
        })
    }
}
