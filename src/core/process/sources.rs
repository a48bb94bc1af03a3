//! Per-process lookups consumed by the delta engine.
//!
//! Each lookup is best-effort: access-denied and vanished processes are
//! ordinary outcomes and map to a default value, never an error.

use std::collections::HashMap;

/// Placeholder owner for processes whose token cannot be read.
pub const UNKNOWN_OWNER: &str = "N/A";

pub trait UsernameResolver: Send {
    /// `domain\name` of the process owner, or [`UNKNOWN_OWNER`].
    fn resolve_owner(&mut self, pid: u32) -> String;
}

/// Set of processes owning a top-level, visible, titled window.
pub trait WindowCatalog: Send {
    /// Map of pid to the title of its first qualifying window.
    fn application_windows(&mut self) -> HashMap<u32, String>;
}

pub trait ProcessInspector: Send {
    fn command_line(&mut self, pid: u32) -> Option<String>;

    /// Architecture tag such as `x64` or `ARM64`.
    fn architecture(&mut self, pid: u32) -> Option<String>;
}

/// Resolver used when owner lookup is disabled or unsupported.
#[derive(Debug, Default)]
pub struct NoOwners;

impl UsernameResolver for NoOwners {
    fn resolve_owner(&mut self, _pid: u32) -> String {
        UNKNOWN_OWNER.to_string()
    }
}

/// Catalog for hosts without a desktop window manager.
#[derive(Debug, Default)]
pub struct NoWindows;

impl WindowCatalog for NoWindows {
    fn application_windows(&mut self) -> HashMap<u32, String> {
        HashMap::new()
    }
}

#[derive(Debug, Default)]
pub struct NoInspection;

impl ProcessInspector for NoInspection {
    fn command_line(&mut self, _pid: u32) -> Option<String> {
        None
    }

    fn architecture(&mut self, _pid: u32) -> Option<String> {
        None
    }
}
