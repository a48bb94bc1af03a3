//! Performance-counter access.
//!
//! The OS counter subsystem is reached through [`CounterBackend`]. Names are
//! locale and driver dependent, so callers go through [`CounterResolver`]
//! before opening anything. Every successful open is wrapped in a
//! [`CounterHandle`] whose `Drop` performs the single matching close.

mod catalog;
mod resolver;

pub use catalog::{
    is_valid_network_instance, CounterCatalog, DiskCounters, NetworkCounters, TOTAL_INSTANCE,
};
pub use resolver::{CounterResolver, GPU_ENGINE_CATEGORY};

use std::fmt;
use std::sync::Arc;

use crate::error::Result;

/// Opaque id the backend hands out for an open counter.
pub type RawCounterId = u64;

/// A fully qualified (category, counter, instance) identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterPath {
    pub category: String,
    pub counter: String,
    pub instance: Option<String>,
}

impl CounterPath {
    pub fn new(category: &str, counter: &str, instance: Option<&str>) -> Self {
        Self {
            category: category.to_string(),
            counter: counter.to_string(),
            instance: instance.map(str::to_string),
        }
    }

    pub fn instance_name(&self) -> &str {
        self.instance.as_deref().unwrap_or("")
    }
}

impl fmt::Display for CounterPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.instance {
            Some(instance) => write!(f, "\\{}({})\\{}", self.category, instance, self.counter),
            None => write!(f, "\\{}\\{}", self.category, self.counter),
        }
    }
}

/// Native performance-counter subsystem.
///
/// Implementations must tolerate concurrent calls; `close` is called exactly
/// once per id returned from a successful `open`.
pub trait CounterBackend: Send + Sync {
    /// All counter categories (localized display names).
    fn list_categories(&self) -> Result<Vec<String>>;

    /// Direct existence probe, used when enumeration itself fails.
    fn category_exists(&self, category: &str) -> bool;

    fn instance_names(&self, category: &str) -> Result<Vec<String>>;

    /// Counter names of `category`, inspected through `instance` when the
    /// category is multi-instance.
    fn counter_names(&self, category: &str, instance: Option<&str>) -> Result<Vec<String>>;

    fn open(&self, path: &CounterPath) -> Result<RawCounterId>;

    /// Current value. Rate counters report the value since the previous read.
    fn read(&self, id: RawCounterId) -> Result<f64>;

    fn close(&self, id: RawCounterId);
}

/// An open counter reading handle, released on drop.
pub struct CounterHandle {
    id: RawCounterId,
    path: CounterPath,
    backend: Arc<dyn CounterBackend>,
}

impl CounterHandle {
    pub fn open(backend: &Arc<dyn CounterBackend>, path: CounterPath) -> Result<Self> {
        let id = backend.open(&path)?;
        Ok(Self {
            id,
            path,
            backend: Arc::clone(backend),
        })
    }

    /// Open and take one throwaway reading so the next read yields a rate.
    /// A handle that cannot be primed is released before the error returns.
    pub fn open_primed(backend: &Arc<dyn CounterBackend>, path: CounterPath) -> Result<Self> {
        let handle = Self::open(backend, path)?;
        handle.read()?;
        Ok(handle)
    }

    pub fn read(&self) -> Result<f64> {
        self.backend.read(self.id)
    }

    pub fn path(&self) -> &CounterPath {
        &self.path
    }

    pub fn instance(&self) -> &str {
        self.path.instance_name()
    }
}

impl fmt::Debug for CounterHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CounterHandle")
            .field("id", &self.id)
            .field("path", &self.path)
            .finish()
    }
}

impl Drop for CounterHandle {
    fn drop(&mut self) {
        self.backend.close(self.id);
    }
}

/// Backend for hosts without a counter subsystem: every category is missing.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableCounters;

impl CounterBackend for UnavailableCounters {
    fn list_categories(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn category_exists(&self, _category: &str) -> bool {
        false
    }

    fn instance_names(&self, category: &str) -> Result<Vec<String>> {
        Err(crate::error::TelemetryError::counter(format!(
            "category '{}' does not exist",
            category
        )))
    }

    fn counter_names(&self, category: &str, _instance: Option<&str>) -> Result<Vec<String>> {
        self.instance_names(category)
    }

    fn open(&self, path: &CounterPath) -> Result<RawCounterId> {
        Err(crate::error::TelemetryError::counter(format!(
            "counter {} is not available on this platform",
            path
        )))
    }

    fn read(&self, id: RawCounterId) -> Result<f64> {
        Err(crate::error::TelemetryError::counter(format!(
            "counter id {} is not open",
            id
        )))
    }

    fn close(&self, _id: RawCounterId) {}
}
