//! GPU usage: engine-counter aggregation, provider variants and the
//! fallback policy that composes them.

mod aggregator;
mod ema;
mod instance;
mod legacy;
mod memory;
mod modern;
mod provider;
mod service;
mod timing;
mod types;
mod vendor;

pub use aggregator::{aggregate_engines, EngineTotals, GpuAggregationEngine, GPU_ENGINE_ALIASES};
pub use ema::{Ema, EmaBank};
pub use instance::{
    adapter_key, adapter_luid, engine_type, select_instances, InstanceScope, DEFAULT_ADAPTER_KEY,
};
pub use legacy::{StaticInventoryProvider, LEGACY_PROVIDER_NAME};
pub use memory::{
    AdapterMemory, GpuMemoryReader, MemoryBudgetSource, MemoryReadout, NoMemoryBudget,
    GPU_MEMORY_ALIASES,
};
pub use modern::{ModernProvider, MODERN_PROVIDER_NAME};
pub use provider::GpuUsageProvider;
pub use service::{reconcile, GpuProviderChain, GpuService};
pub use timing::{busy_percent, scan_node_block, NodeTimeSource, NodeTimingEstimator};
pub use types::{
    clamp_percent, EngineType, GpuAdapterDynamicInfo, GpuAdapterSnapshot, GpuDetailInfo,
    GpuGlobalSnapshot, MemoryUsage,
};
pub use vendor::{VendorBackend, VendorBackends, VendorProvider, VendorSource, VENDOR_PROVIDER_NAME};
