//! Reference-counted cache of native icon handles.
//!
//! Processes sharing a key (command line or name) share one handle. The
//! handle is destroyed exactly once, when the last holder releases it.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, trace};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Opaque native icon handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IconHandle(pub usize);

/// Extraction and destruction of native icons.
pub trait IconBackend: Send + Sync {
    fn extract(&self, pid: u32) -> Option<IconHandle>;
    fn destroy(&self, handle: IconHandle);
}

/// Backend for platforms without an icon concept.
#[derive(Debug, Default)]
pub struct NoIcons;

impl IconBackend for NoIcons {
    fn extract(&self, _pid: u32) -> Option<IconHandle> {
        None
    }

    fn destroy(&self, _handle: IconHandle) {}
}

#[derive(Debug)]
struct IconEntry {
    handle: IconHandle,
    refs: usize,
}

/// Result of releasing a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Decremented(usize),
    Destroyed,
    /// The key had no live entry; nothing was done.
    Unknown,
}

pub struct IconResourceCache {
    entries: Mutex<HashMap<String, IconEntry>>,
    backend: Arc<dyn IconBackend>,
}

impl IconResourceCache {
    pub fn new(backend: Arc<dyn IconBackend>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            backend,
        }
    }

    pub fn backend(&self) -> &Arc<dyn IconBackend> {
        &self.backend
    }

    /// Return the cached handle for `key`, bumping its count, or run
    /// `extract` and cache the result. A failed extraction caches nothing.
    pub fn acquire<F>(&self, key: &str, extract: F) -> Option<IconHandle>
    where
        F: FnOnce() -> Option<IconHandle>,
    {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(key) {
            entry.refs += 1;
            trace!("Icon '{}' shared, refs={}", key, entry.refs);
            return Some(entry.handle);
        }

        let handle = extract()?;
        entries.insert(key.to_string(), IconEntry { handle, refs: 1 });
        debug!("Icon '{}' extracted", key);
        Some(handle)
    }

    pub fn release(&self, key: &str) -> ReleaseOutcome {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(key) else {
            return ReleaseOutcome::Unknown;
        };

        entry.refs = entry.refs.saturating_sub(1);
        if entry.refs > 0 {
            return ReleaseOutcome::Decremented(entry.refs);
        }

        if let Some(entry) = entries.remove(key) {
            self.backend.destroy(entry.handle);
            debug!("Icon '{}' destroyed", key);
        }
        ReleaseOutcome::Destroyed
    }

    pub fn ref_count(&self, key: &str) -> Option<usize> {
        self.entries.lock().get(key).map(|entry| entry.refs)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Destroy every cached handle regardless of outstanding references.
    pub fn clear(&self) {
        let drained: Vec<IconEntry> = self.entries.lock().drain().map(|(_, entry)| entry).collect();
        for entry in drained {
            self.backend.destroy(entry.handle);
        }
    }
}

impl Drop for IconResourceCache {
    fn drop(&mut self) {
        self.clear();
    }
}
