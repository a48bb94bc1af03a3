use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Functional unit of an adapter with its own utilization counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EngineType {
    ThreeD,
    Compute,
    Copy,
    VideoDecode,
    VideoEncode,
    Other,
}

impl EngineType {
    pub fn label(&self) -> &'static str {
        match self {
            EngineType::ThreeD => "3D",
            EngineType::Compute => "Compute",
            EngineType::Copy => "Copy",
            EngineType::VideoDecode => "VideoDecode",
            EngineType::VideoEncode => "VideoEncode",
            EngineType::Other => "Other",
        }
    }
}

/// Smoothed usage of one physical adapter for one tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GpuAdapterSnapshot {
    pub adapter_key: String,
    /// EMA-smoothed overall usage, 0..=100.
    pub usage_percent: f64,
    pub three_d_percent: f64,
    pub compute_percent: f64,
    pub copy_percent: f64,
    pub video_decode_percent: f64,
    pub video_encode_percent: f64,
    pub dedicated_memory_used: u64,
    pub shared_memory_used: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GpuGlobalSnapshot {
    pub adapters: Vec<GpuAdapterSnapshot>,
    pub highest_adapter_usage: f64,
}

impl GpuGlobalSnapshot {
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    pub fn busiest(&self) -> Option<&GpuAdapterSnapshot> {
        self.adapters
            .iter()
            .max_by(|a, b| a.usage_percent.total_cmp(&b.usage_percent))
    }
}

/// Dedicated and shared memory in use, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryUsage {
    pub dedicated_used: u64,
    pub shared_used: u64,
}

impl MemoryUsage {
    pub fn is_zero(&self) -> bool {
        self.dedicated_used == 0 && self.shared_used == 0
    }
}

/// What a provider reports each tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GpuAdapterDynamicInfo {
    pub global_usage_percent: f64,
    pub three_d_percent: f64,
    pub compute_percent: f64,
    pub dedicated_memory_used: u64,
    pub shared_memory_used: u64,
    /// Per-adapter breakdown; empty for providers without one.
    pub adapters: Vec<GpuAdapterSnapshot>,
}

impl GpuAdapterDynamicInfo {
    pub fn with_usage(percent: f64) -> Self {
        Self {
            global_usage_percent: clamp_percent(percent),
            ..Default::default()
        }
    }
}

/// Static GPU identity, fetched once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GpuDetailInfo {
    pub name: String,
    pub driver_version: String,
    pub driver_date: Option<NaiveDate>,
    pub pnp_device_id: String,
    pub total_dedicated_bytes: u64,
    pub total_shared_bytes: u64,
}

/// Clamp into 0..=100, mapping NaN to 0.
pub fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}
