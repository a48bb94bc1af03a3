// Core telemetry engines

pub mod config;
pub mod counters;
pub mod gpu;
pub mod hardware;
pub mod performance;
pub mod process;
pub mod runtime;
pub mod tasks;

// Re-export commonly used items
pub use config::{EngineConfig, GpuConfig, ProcessConfig};
pub use process::ProcessDeltaEngine;
pub use runtime::{TelemetryRuntime, TelemetrySnapshot};
