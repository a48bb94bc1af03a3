use std::time::Instant;

use sysinfo::{
    CpuRefreshKind, Pid, ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System, UpdateKind, Users,
};

use crate::core::process::{ProcessSnapshotSource, RawProcessSample, SystemTimes, UsernameResolver, UNKNOWN_OWNER};
use crate::error::Result;

/// Process table through sysinfo.
///
/// CPU times are in milliseconds. sysinfo has no machine-wide busy+idle
/// counter, so the system side is wall time since construction scaled by the
/// logical CPU count.
pub struct SysinfoProcessSource {
    system: System,
    origin: Instant,
    cpu_count: u64,
}

impl SysinfoProcessSource {
    pub fn new() -> Self {
        let system = System::new_with_specifics(RefreshKind::nothing().with_cpu(CpuRefreshKind::nothing()));
        let cpu_count = system.cpus().len().max(1) as u64;
        Self {
            system,
            origin: Instant::now(),
            cpu_count,
        }
    }
}

impl Default for SysinfoProcessSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessSnapshotSource for SysinfoProcessSource {
    fn system_times(&mut self) -> Result<SystemTimes> {
        let elapsed_ms = self.origin.elapsed().as_millis() as u64;
        Ok(SystemTimes {
            kernel: 0,
            user: elapsed_ms.saturating_mul(self.cpu_count),
        })
    }

    fn capture_all(&mut self) -> Result<Vec<RawProcessSample>> {
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing()
                .with_cpu()
                .with_memory()
                .with_disk_usage()
                .with_tasks(),
        );

        let samples = self
            .system
            .processes()
            .iter()
            .filter(|(pid, _)| pid.as_u32() != 0)
            .map(|(pid, process)| {
                let disk = process.disk_usage();
                RawProcessSample {
                    pid: pid.as_u32(),
                    parent_pid: process.parent().map(Pid::as_u32).unwrap_or(0),
                    name: process.name().to_string_lossy().into_owned(),
                    create_time: process.start_time(),
                    kernel_time: 0,
                    user_time: process.accumulated_cpu_time(),
                    working_set_bytes: process.memory(),
                    private_bytes: 0,
                    thread_count: process.tasks().map(|t| t.len() as u32).unwrap_or(1),
                    handle_count: 0,
                    session_id: process.session_id().map(Pid::as_u32).unwrap_or(0),
                    read_bytes: disk.total_read_bytes,
                    write_bytes: disk.total_written_bytes,
                    read_operations: 0,
                    write_operations: 0,
                }
            })
            .collect();

        Ok(samples)
    }
}

/// Owner lookup by uid.
pub struct SysinfoOwners {
    system: System,
    users: Users,
}

impl SysinfoOwners {
    pub fn new() -> Self {
        Self {
            system: System::new(),
            users: Users::new_with_refreshed_list(),
        }
    }
}

impl Default for SysinfoOwners {
    fn default() -> Self {
        Self::new()
    }
}

impl UsernameResolver for SysinfoOwners {
    fn resolve_owner(&mut self, pid: u32) -> String {
        let pid = Pid::from_u32(pid);
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_user(UpdateKind::OnlyIfNotSet),
        );

        let Some(uid) = self.system.process(pid).and_then(|p| p.user_id()) else {
            return UNKNOWN_OWNER.to_string();
        };
        if self.users.get_user_by_id(uid).is_none() {
            // New account since startup.
            self.users.refresh();
        }
        self.users
            .get_user_by_id(uid)
            .map(|user| user.name().to_string())
            .unwrap_or_else(|| UNKNOWN_OWNER.to_string())
    }
}
