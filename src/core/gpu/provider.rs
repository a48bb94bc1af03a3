use super::types::{GpuAdapterDynamicInfo, GpuDetailInfo};

/// A source of GPU usage figures.
///
/// `initialize` is called once before anything else; an unsupported provider
/// returns zeroed usage and is not retried. Native resources are released
/// on drop.
pub trait GpuUsageProvider: Send {
    fn name(&self) -> &str;

    fn is_supported(&self) -> bool;

    fn initialize(&mut self);

    fn static_info(&self) -> GpuDetailInfo;

    /// Current usage. Never fails; degraded sources report zeros.
    fn usage(&mut self) -> GpuAdapterDynamicInfo;
}
