//! Windows native backends.
//!
//! Everything here is a thin FFI layer; the parsing and bookkeeping live in
//! `core` so they can be exercised on any host.

mod adl;
mod d3dkmt;
mod handle;
mod icons;
mod inspect;
mod inventory;
mod pdh;
mod process;
mod security;
mod window;

pub use adl::AdlBackend;
pub use d3dkmt::{D3dkmtMemoryBudget, D3dkmtNodeTimes};
pub use icons::ShellIcons;
pub use inspect::WindowsInspector;
pub use inventory::{MemoryStatusHost, WmiInventory};
pub use pdh::PdhBackend;
pub use process::NtProcessSource;
pub use security::TokenOwners;
pub use window::TopLevelWindows;

/// NUL-terminated UTF-16 copy of `s`.
pub(crate) fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Text up to the first NUL.
pub(crate) fn from_wide(buf: &[u16]) -> String {
    let end = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    String::from_utf16_lossy(&buf[..end])
}

/// Split a double-NUL-terminated list of strings.
pub(crate) fn split_multi_sz(buf: &[u16]) -> Vec<String> {
    buf.split(|&c| c == 0)
        .take_while(|item| !item.is_empty())
        .map(String::from_utf16_lossy)
        .collect()
}
