//! Vendor GPU interfaces.
//!
//! NVIDIA through NVML on every platform. AMD through ROCm SMI on unix and
//! the ADL overdrive interface on Windows.

mod amd;
mod nvidia;

pub use amd::RocmBackend;
pub use nvidia::{nvidia_gpu_details, NvidiaBackend};

use log::debug;

use crate::core::gpu::VendorBackend;

/// First NVIDIA device, if NVML loads.
pub fn nvidia_backend() -> Option<Box<dyn VendorBackend>> {
    match NvidiaBackend::new() {
        Ok(backend) => Some(Box::new(backend)),
        Err(e) => {
            debug!("{}", e);
            None
        }
    }
}

/// First AMD device through whichever interface the platform offers.
pub fn amd_backend() -> Option<Box<dyn VendorBackend>> {
    #[cfg(windows)]
    {
        match crate::platform::windows::AdlBackend::load() {
            Ok(backend) => return Some(Box::new(backend)),
            Err(e) => debug!("{}", e),
        }
    }
    match RocmBackend::new() {
        Ok(backend) => Some(Box::new(backend)),
        Err(e) => {
            debug!("{}", e);
            None
        }
    }
}
