//! DRM client statistics from `/proc/<pid>/fdinfo`.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use log::trace;

use crate::core::gpu::{GpuDetailInfo, NodeTimeSource};

/// Engine busy times reported by one DRM file descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FdinfoClient {
    pub driver: Option<String>,
    pub client_id: Option<u64>,
    /// `(engine, busy nanoseconds)` in file order.
    pub engines: Vec<(String, u64)>,
}

/// Parse one fdinfo file. `None` when it does not describe a DRM client.
pub fn parse_fdinfo(text: &str) -> Option<FdinfoClient> {
    let mut client = FdinfoClient::default();

    for line in text.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();

        if key == "drm-driver" {
            client.driver = Some(value.to_string());
        } else if key == "drm-client-id" {
            client.client_id = value.parse().ok();
        } else if let Some(engine) = key.strip_prefix("drm-engine-") {
            // drm-engine-capacity-<name> is a count, not a time.
            if engine.starts_with("capacity-") {
                continue;
            }
            let Some(ns) = value.strip_suffix("ns").map(str::trim) else {
                continue;
            };
            if let Ok(ns) = ns.parse::<u64>() {
                client.engines.push((engine.to_string(), ns));
            }
        }
    }

    if client.driver.is_none() && client.engines.is_empty() {
        None
    } else {
        Some(client)
    }
}

/// Sums engine busy time across every DRM client on the host.
///
/// Several descriptors can share one client; those are counted once.
#[derive(Debug)]
pub struct DrmFdinfoSource {
    proc_root: std::path::PathBuf,
}

impl DrmFdinfoSource {
    pub fn new() -> Self {
        Self::with_root("/proc")
    }

    pub fn with_root<P: AsRef<Path>>(root: P) -> Self {
        Self {
            proc_root: root.as_ref().to_path_buf(),
        }
    }

    fn collect(&self) -> Option<BTreeMap<String, u64>> {
        let mut totals = BTreeMap::new();
        let mut seen = HashSet::new();

        for entry in fs::read_dir(&self.proc_root).ok()?.flatten() {
            let fdinfo = entry.path().join("fdinfo");
            let Ok(fds) = fs::read_dir(&fdinfo) else {
                continue;
            };
            for fd in fds.flatten() {
                let Ok(text) = fs::read_to_string(fd.path()) else {
                    continue;
                };
                let Some(client) = parse_fdinfo(&text) else {
                    continue;
                };
                if let Some(id) = client.client_id {
                    if !seen.insert((client.driver.clone(), id)) {
                        continue;
                    }
                }
                for (engine, ns) in client.engines {
                    *totals.entry(engine).or_insert(0u64) += ns;
                }
            }
        }

        trace!("DRM engines sampled: {:?}", totals);
        if totals.is_empty() {
            None
        } else {
            Some(totals)
        }
    }
}

impl Default for DrmFdinfoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeTimeSource for DrmFdinfoSource {
    fn sample(&mut self) -> Option<Vec<u64>> {
        self.collect().map(|totals| totals.into_values().collect())
    }
}

/// `(driver, pci id)` from a `device/uevent` file under `/sys/class/drm`.
pub fn parse_drm_uevent(text: &str) -> Option<(String, Option<String>)> {
    let mut driver = None;
    let mut pci_id = None;
    for line in text.lines() {
        if let Some(value) = line.strip_prefix("DRIVER=") {
            driver = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("PCI_ID=") {
            pci_id = Some(value.trim().to_string());
        }
    }
    driver.map(|driver| (driver, pci_id))
}

fn display_name(driver: &str) -> String {
    let vendor = match driver {
        "amdgpu" | "radeon" => "AMD Radeon",
        "i915" | "xe" => "Intel Graphics",
        "nvidia" | "nouveau" => "NVIDIA GPU",
        _ => "GPU",
    };
    format!("{} ({})", vendor, driver)
}

/// Identity of the first DRM card that has a bound driver.
pub fn sysfs_gpu_details() -> Option<GpuDetailInfo> {
    let mut cards: Vec<_> = fs::read_dir("/sys/class/drm")
        .ok()?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("card") && !n.contains('-'))
        })
        .collect();
    cards.sort();

    cards.into_iter().find_map(|card| {
        let device = card.join("device");
        let uevent = fs::read_to_string(device.join("uevent")).ok()?;
        let (driver, pci_id) = parse_drm_uevent(&uevent)?;
        let vram = fs::read_to_string(device.join("mem_info_vram_total"))
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0);
        Some(GpuDetailInfo {
            name: display_name(&driver),
            driver_version: driver,
            driver_date: None,
            pnp_device_id: pci_id.unwrap_or_default(),
            total_dedicated_bytes: vram,
            total_shared_bytes: 0,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const AMD_FDINFO: &str = "pos:\t0\nflags:\t02100002\nmnt_id:\t24\ndrm-driver:\tamdgpu\n\
drm-client-id:\t17\ndrm-engine-gfx:\t1502000 ns\ndrm-engine-compute:\t0 ns\n\
drm-engine-capacity-gfx:\t2\ndrm-memory-vram:\t4096 KiB\n";

    #[test]
    fn test_parse_fdinfo_engines() {
        let client = parse_fdinfo(AMD_FDINFO).unwrap();
        assert_eq!(client.driver.as_deref(), Some("amdgpu"));
        assert_eq!(client.client_id, Some(17));
        assert_eq!(
            client.engines,
            vec![("gfx".to_string(), 1_502_000), ("compute".to_string(), 0)]
        );
    }

    #[test]
    fn test_parse_fdinfo_ignores_plain_files() {
        assert!(parse_fdinfo("pos:\t0\nflags:\t0100002\nmnt_id:\t26\n").is_none());
    }

    #[test]
    fn test_shared_client_counted_once() {
        let root = tempfile::tempdir().unwrap();
        for (pid, fd) in [("100", "5"), ("100", "6"), ("200", "3")] {
            let dir = root.path().join(pid).join("fdinfo");
            fs::create_dir_all(&dir).unwrap();
            let text = if pid == "200" {
                "drm-driver:\ti915\ndrm-client-id:\t4\ndrm-engine-render:\t500 ns\n"
            } else {
                AMD_FDINFO
            };
            fs::write(dir.join(fd), text).unwrap();
        }

        let mut source = DrmFdinfoSource::with_root(root.path());
        let sample = source.sample().unwrap();
        // BTreeMap order: compute, gfx, render.
        assert_eq!(sample, vec![0, 1_502_000, 500]);
    }

    #[test]
    fn test_parse_drm_uevent() {
        let text = "DRIVER=amdgpu\nPCI_CLASS=30000\nPCI_ID=1002:73BF\nPCI_SLOT_NAME=0000:03:00.0\n";
        assert_eq!(
            parse_drm_uevent(text),
            Some(("amdgpu".to_string(), Some("1002:73BF".to_string())))
        );
        assert_eq!(parse_drm_uevent("PCI_ID=8086:46A6\n"), None);
        assert!(display_name("amdgpu").starts_with("AMD Radeon"));
    }
}
