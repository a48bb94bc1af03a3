use log::{info, warn};

use super::provider::GpuUsageProvider;
use super::types::{GpuAdapterDynamicInfo, GpuDetailInfo};

/// Provider candidates in fallback order.
pub struct GpuProviderChain {
    pub modern: Box<dyn GpuUsageProvider>,
    pub vendor: Box<dyn GpuUsageProvider>,
    pub legacy: Box<dyn GpuUsageProvider>,
}

/// Primary provider plus, when the engine-counter provider is primary, the
/// vendor provider as a secondary estimator.
pub struct GpuService {
    primary: Box<dyn GpuUsageProvider>,
    secondary: Option<Box<dyn GpuUsageProvider>>,
    static_info: GpuDetailInfo,
}

impl GpuService {
    /// Initialize providers in order and keep the first supported one.
    pub fn select(chain: GpuProviderChain, enable_secondary: bool) -> Self {
        let GpuProviderChain {
            mut modern,
            mut vendor,
            mut legacy,
        } = chain;

        modern.initialize();
        let (primary, secondary) = if modern.is_supported() {
            info!("GPU provider: {}", modern.name());
            let secondary = if enable_secondary {
                vendor.initialize();
                if vendor.is_supported() {
                    info!("GPU secondary estimator: {}", vendor.name());
                    Some(vendor)
                } else {
                    None
                }
            } else {
                None
            };
            (modern, secondary)
        } else {
            drop(modern);
            vendor.initialize();
            if vendor.is_supported() {
                info!("GPU provider: {}", vendor.name());
                (vendor, None)
            } else {
                drop(vendor);
                warn!("No live GPU source available, using {}", legacy.name());
                legacy.initialize();
                (legacy, None)
            }
        };

        let static_info = primary.static_info();
        Self {
            primary,
            secondary,
            static_info,
        }
    }

    pub fn usage(&mut self) -> GpuAdapterDynamicInfo {
        let primary = self.primary.usage();
        match self.secondary.as_mut() {
            Some(secondary) => reconcile(primary, secondary.usage()),
            None => primary,
        }
    }

    pub fn provider_name(&self) -> String {
        if self.secondary.is_some() {
            format!("{} + Fallback", self.primary.name())
        } else {
            self.primary.name().to_string()
        }
    }

    pub fn static_info(&self) -> &GpuDetailInfo {
        &self.static_info
    }

    pub fn has_secondary(&self) -> bool {
        self.secondary.is_some()
    }
}

/// Take the higher plausible usage; each memory figure comes from whichever
/// reading has it nonzero, primary first.
pub fn reconcile(
    primary: GpuAdapterDynamicInfo,
    secondary: GpuAdapterDynamicInfo,
) -> GpuAdapterDynamicInfo {
    let secondary_wins = secondary.global_usage_percent > primary.global_usage_percent
        && secondary.global_usage_percent <= 100.0;

    let dedicated = if primary.dedicated_memory_used != 0 {
        primary.dedicated_memory_used
    } else {
        secondary.dedicated_memory_used
    };
    let shared = if primary.shared_memory_used != 0 {
        primary.shared_memory_used
    } else {
        secondary.shared_memory_used
    };

    let mut merged = if secondary_wins {
        GpuAdapterDynamicInfo {
            global_usage_percent: secondary.global_usage_percent,
            ..primary
        }
    } else {
        primary
    };
    merged.dedicated_memory_used = dedicated;
    merged.shared_memory_used = shared;
    merged
}
