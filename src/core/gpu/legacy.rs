use std::sync::Arc;

use super::provider::GpuUsageProvider;
use super::types::{GpuAdapterDynamicInfo, GpuDetailInfo};
use crate::core::hardware::HardwareFacts;

pub const LEGACY_PROVIDER_NAME: &str = "Legacy (static inventory)";

/// Last resort: identity from the hardware inventory, no live usage.
pub struct StaticInventoryProvider {
    facts: Arc<HardwareFacts>,
}

impl StaticInventoryProvider {
    pub fn new(facts: Arc<HardwareFacts>) -> Self {
        Self { facts }
    }
}

impl GpuUsageProvider for StaticInventoryProvider {
    fn name(&self) -> &str {
        LEGACY_PROVIDER_NAME
    }

    fn is_supported(&self) -> bool {
        true
    }

    fn initialize(&mut self) {}

    fn static_info(&self) -> GpuDetailInfo {
        self.facts.gpu().clone()
    }

    fn usage(&mut self) -> GpuAdapterDynamicInfo {
        GpuAdapterDynamicInfo::default()
    }
}
