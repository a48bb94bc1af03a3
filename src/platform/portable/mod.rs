//! Backends for hosts without the Windows native interfaces.
//!
//! There is no performance-counter subsystem here, so counter-driven paths
//! report unavailable and the vendor chain carries GPU usage.

#[cfg(target_os = "linux")]
mod drm;
mod host;
mod inspect;
mod process;

#[cfg(target_os = "linux")]
pub use drm::{parse_drm_uevent, parse_fdinfo, sysfs_gpu_details, DrmFdinfoSource, FdinfoClient};
pub use host::{PortableInventory, SysinfoHostStatus};
pub use inspect::{elf_architecture, SysinfoInspector};
pub use process::{SysinfoOwners, SysinfoProcessSource};
