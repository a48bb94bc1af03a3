use std::sync::Arc;

use log::{debug, info};

use super::provider::GpuUsageProvider;
use super::timing::NodeTimingEstimator;
use super::types::{GpuAdapterDynamicInfo, GpuDetailInfo, MemoryUsage};
use crate::core::hardware::{GpuVendor, HardwareFacts};

pub const VENDOR_PROVIDER_NAME: &str = "Vendor (NVML/ADL/ROCm + node timing)";

/// A vendor query interface for overall GPU busy percentage.
pub trait VendorBackend: Send {
    fn name(&self) -> &'static str;

    fn usage_percent(&mut self) -> Option<f64>;

    fn memory(&mut self) -> Option<MemoryUsage> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VendorSource {
    Nvidia,
    Amd,
    NodeTiming,
}

/// Candidate backends, each absent when its library could not be loaded.
#[derive(Default)]
pub struct VendorBackends {
    pub nvidia: Option<Box<dyn VendorBackend>>,
    pub amd: Option<Box<dyn VendorBackend>>,
    pub estimator: Option<NodeTimingEstimator>,
}

/// Vendor interfaces first (NVIDIA, then AMD), node-timing estimate last.
pub struct VendorProvider {
    facts: Arc<HardwareFacts>,
    backends: VendorBackends,
    active: Option<VendorSource>,
}

impl VendorProvider {
    pub fn new(facts: Arc<HardwareFacts>, backends: VendorBackends) -> Self {
        Self {
            facts,
            backends,
            active: None,
        }
    }

    pub fn active_source(&self) -> Option<VendorSource> {
        self.active
    }

    fn probe(backend: &mut Option<Box<dyn VendorBackend>>) -> bool {
        match backend.as_mut() {
            Some(backend) => {
                let ok = backend.usage_percent().is_some();
                debug!("Vendor backend {} probe: {}", backend.name(), ok);
                ok
            }
            None => false,
        }
    }

    fn select(&mut self, vendor: GpuVendor) -> Option<VendorSource> {
        let unknown = vendor == GpuVendor::Unknown;

        if (vendor == GpuVendor::Nvidia || unknown) && Self::probe(&mut self.backends.nvidia) {
            return Some(VendorSource::Nvidia);
        }
        if (vendor == GpuVendor::Amd || unknown) && Self::probe(&mut self.backends.amd) {
            return Some(VendorSource::Amd);
        }
        let timing = self
            .backends
            .estimator
            .as_mut()
            .is_some_and(NodeTimingEstimator::is_supported);
        timing.then_some(VendorSource::NodeTiming)
    }
}

impl GpuUsageProvider for VendorProvider {
    fn name(&self) -> &str {
        VENDOR_PROVIDER_NAME
    }

    fn is_supported(&self) -> bool {
        self.active.is_some()
    }

    fn initialize(&mut self) {
        if self.active.is_some() {
            return;
        }
        let vendor = GpuVendor::from_name(&self.facts.gpu().name);
        self.active = self.select(vendor);

        // Release the interfaces that lost.
        if self.active != Some(VendorSource::Nvidia) {
            self.backends.nvidia = None;
        }
        if self.active != Some(VendorSource::Amd) {
            self.backends.amd = None;
        }

        match self.active {
            Some(source) => info!("Vendor GPU provider using {:?} ({:?} adapter)", source, vendor),
            None => debug!("No vendor GPU interface available"),
        }
    }

    fn static_info(&self) -> GpuDetailInfo {
        self.facts.gpu().clone()
    }

    fn usage(&mut self) -> GpuAdapterDynamicInfo {
        let backend = match self.active {
            Some(VendorSource::Nvidia) => self.backends.nvidia.as_mut(),
            Some(VendorSource::Amd) => self.backends.amd.as_mut(),
            Some(VendorSource::NodeTiming) => {
                let busy = self
                    .backends
                    .estimator
                    .as_mut()
                    .and_then(NodeTimingEstimator::estimate)
                    .unwrap_or(0.0);
                return GpuAdapterDynamicInfo::with_usage(busy);
            }
            None => return GpuAdapterDynamicInfo::default(),
        };

        let Some(backend) = backend else {
            return GpuAdapterDynamicInfo::default();
        };
        let mut info = GpuAdapterDynamicInfo::with_usage(backend.usage_percent().unwrap_or(0.0));
        if let Some(memory) = backend.memory() {
            info.dedicated_memory_used = memory.dedicated_used;
            info.shared_memory_used = memory.shared_used;
        }
        info
    }
}
