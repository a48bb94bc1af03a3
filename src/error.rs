use std::io;
use thiserror::Error;

/// Custom error type for the telemetry engines
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The process enumeration call could not be completed. Fatal to the current tick only.
    #[error("System query failed ({context}): status 0x{status:08X}")]
    SystemQuery { status: u32, context: String },

    #[error("Counter error: {0}")]
    Counter(String),

    #[error("No performance counter category matches any of: {}", .0.join(", "))]
    CategoryUnresolvable(Vec<String>),

    #[error("GPU not available: {0}")]
    GpuNotAvailable(String),

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for the telemetry engines
pub type Result<T> = std::result::Result<T, TelemetryError>;

impl TelemetryError {
    /// Create a config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        TelemetryError::Config(msg.into())
    }

    /// Create a system query error carrying the native status code
    pub fn system_query<S: Into<String>>(status: u32, context: S) -> Self {
        TelemetryError::SystemQuery {
            status,
            context: context.into(),
        }
    }

    pub fn counter<S: Into<String>>(msg: S) -> Self {
        TelemetryError::Counter(msg.into())
    }

    pub fn gpu_not_available<S: Into<String>>(msg: S) -> Self {
        TelemetryError::GpuNotAvailable(msg.into())
    }

    pub fn platform<S: Into<String>>(msg: S) -> Self {
        TelemetryError::Platform(msg.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        TelemetryError::Other(msg.into())
    }

    /// Whether the failure is expected to clear on its own (retry next tick)
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TelemetryError::Counter(_) | TelemetryError::SystemQuery { .. } | TelemetryError::Io(_)
        )
    }
}
