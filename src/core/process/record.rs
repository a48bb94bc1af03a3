use serde::{Deserialize, Serialize};

use super::icons::IconHandle;

/// How a process is presented. The delta engine assigns Application or
/// Background; `SystemWindow` is reserved for presentation layers that group
/// shell-owned windows themselves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessCategory {
    Application,
    #[default]
    Background,
    SystemWindow,
}

/// System-wide cumulative CPU time, in the same tick unit as the
/// per-process kernel/user counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemTimes {
    pub kernel: u64,
    pub user: u64,
}

impl SystemTimes {
    pub fn total(&self) -> u64 {
        self.kernel.saturating_add(self.user)
    }

    /// Elapsed busy+idle time since `previous`, zero if the counters went backwards.
    pub fn delta_since(&self, previous: &SystemTimes) -> u64 {
        self.total().saturating_sub(previous.total())
    }
}

/// One process as reported by a single snapshot capture.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawProcessSample {
    pub pid: u32,
    pub parent_pid: u32,
    pub name: String,
    /// Creation timestamp; distinguishes two lifetimes of the same pid.
    pub create_time: u64,
    pub kernel_time: u64,
    pub user_time: u64,
    pub working_set_bytes: u64,
    pub private_bytes: u64,
    pub thread_count: u32,
    pub handle_count: u32,
    pub session_id: u32,
    pub read_bytes: u64,
    pub write_bytes: u64,
    pub read_operations: u64,
    pub write_operations: u64,
}

impl RawProcessSample {
    pub fn cpu_time(&self) -> u64 {
        self.kernel_time.saturating_add(self.user_time)
    }
}

/// A live entry of the process table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub pid: u32,
    pub parent_pid: u32,
    pub name: String,
    pub username: String,
    pub create_time: u64,
    pub working_set_bytes: u64,
    pub private_bytes: u64,
    pub thread_count: u32,
    pub handle_count: u32,
    pub session_id: u32,
    pub kernel_time: u64,
    pub user_time: u64,
    pub read_bytes: u64,
    pub write_bytes: u64,
    pub read_operations: u64,
    pub write_operations: u64,
    /// Share of total system CPU time over the last tick, 0..=100.
    pub cpu_usage: f64,
    pub read_bytes_per_sec: u64,
    pub write_bytes_per_sec: u64,
    pub category: ProcessCategory,
    pub main_window_title: String,
    pub command_line: String,
    pub architecture: String,
    #[serde(skip)]
    pub(crate) icon: Option<IconHandle>,
    #[serde(skip)]
    pub(crate) icon_key: Option<String>,
}

impl ProcessRecord {
    /// Start tracking a first sighting. Derived rates begin at zero.
    pub fn from_sample(sample: RawProcessSample) -> Self {
        Self {
            pid: sample.pid,
            parent_pid: sample.parent_pid,
            name: sample.name,
            username: String::new(),
            create_time: sample.create_time,
            working_set_bytes: sample.working_set_bytes,
            private_bytes: sample.private_bytes,
            thread_count: sample.thread_count,
            handle_count: sample.handle_count,
            session_id: sample.session_id,
            kernel_time: sample.kernel_time,
            user_time: sample.user_time,
            read_bytes: sample.read_bytes,
            write_bytes: sample.write_bytes,
            read_operations: sample.read_operations,
            write_operations: sample.write_operations,
            cpu_usage: 0.0,
            read_bytes_per_sec: 0,
            write_bytes_per_sec: 0,
            category: ProcessCategory::Background,
            main_window_title: String::new(),
            command_line: String::new(),
            architecture: String::new(),
            icon: None,
            icon_key: None,
        }
    }

    pub fn cpu_time(&self) -> u64 {
        self.kernel_time.saturating_add(self.user_time)
    }

    pub fn icon(&self) -> Option<IconHandle> {
        self.icon
    }

    /// Whether `sample` describes the same process lifetime as this record.
    pub fn is_same_instance(&self, sample: &RawProcessSample) -> bool {
        self.pid == sample.pid && self.create_time == sample.create_time
    }

    /// Key under which this process shares an icon: the full command line,
    /// or the process name when no command line is known.
    pub fn icon_cache_key(&self) -> String {
        if self.command_line.is_empty() {
            self.name.clone()
        } else {
            self.command_line.clone()
        }
    }
}

/// A process that left the table during a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovedProcess {
    pub pid: u32,
    pub name: String,
}

/// Changes applied to the live table by one tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessTableDelta {
    pub added: Vec<u32>,
    pub updated: Vec<u32>,
    pub removed: Vec<RemovedProcess>,
    /// Total system CPU time elapsed since the previous successful tick.
    pub system_delta: u64,
}

impl ProcessTableDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}
