//! Sampling tasks. Each engine runs on its own interval and reports to the
//! orchestrator through [`SubsystemUpdate`].

mod gpu;
mod processes;
mod system;

pub use gpu::gpu_task;
pub use processes::process_task;
pub use system::system_task;

use serde::{Deserialize, Serialize};

use crate::core::gpu::GpuAdapterDynamicInfo;
use crate::core::performance::{DiskUsageInfo, MemoryUsageInfo, NetworkUsageInfo};
use crate::core::process::{ProcessRecord, ProcessTableDelta};

/// Counts of one process tick's changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessDeltaSummary {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
}

impl From<&ProcessTableDelta> for ProcessDeltaSummary {
    fn from(delta: &ProcessTableDelta) -> Self {
        Self {
            added: delta.added.len(),
            updated: delta.updated.len(),
            removed: delta.removed.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemUsage {
    pub cpu_percent: f64,
    pub memory: MemoryUsageInfo,
    pub disk: DiskUsageInfo,
    pub network: NetworkUsageInfo,
}

#[derive(Debug, Clone)]
pub enum SubsystemUpdate {
    /// A completed process tick with an owned copy of the table.
    Processes {
        summary: ProcessDeltaSummary,
        records: Vec<ProcessRecord>,
    },

    /// A process tick was aborted; the previous table stays current.
    ProcessTickFailed(String),

    Gpu(GpuAdapterDynamicInfo),

    System(SystemUsage),
}
