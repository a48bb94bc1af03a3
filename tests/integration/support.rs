// Scripted stand-ins for the native backends.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use taskscope::core::counters::{CounterBackend, CounterPath, RawCounterId};
use taskscope::core::gpu::{GpuDetailInfo, MemoryUsage, VendorBackend};
use taskscope::core::hardware::HardwareInventory;
use taskscope::core::process::{
    IconBackend, IconHandle, ProcessSnapshotSource, RawProcessSample, SystemTimes,
};
use taskscope::error::{Result, TelemetryError};

pub fn sample(pid: u32, name: &str, create_time: u64) -> RawProcessSample {
    RawProcessSample {
        pid,
        parent_pid: 1,
        name: name.to_string(),
        create_time,
        thread_count: 1,
        ..Default::default()
    }
}

/// One scripted capture. `samples: None` makes the capture fail.
pub struct Frame {
    pub times: SystemTimes,
    pub samples: Option<Vec<RawProcessSample>>,
}

impl Frame {
    pub fn ok(user_time: u64, samples: Vec<RawProcessSample>) -> Self {
        Self {
            times: SystemTimes {
                kernel: 0,
                user: user_time,
            },
            samples: Some(samples),
        }
    }

    pub fn failing(user_time: u64) -> Self {
        Self {
            times: SystemTimes {
                kernel: 0,
                user: user_time,
            },
            samples: None,
        }
    }
}

/// Replays frames in order; once exhausted the last successful frame repeats.
pub struct ScriptedSnapshots {
    frames: VecDeque<Frame>,
    current: Option<Frame>,
    last_ok: Vec<RawProcessSample>,
}

impl ScriptedSnapshots {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames: frames.into(),
            current: None,
            last_ok: Vec::new(),
        }
    }
}

impl ProcessSnapshotSource for ScriptedSnapshots {
    fn system_times(&mut self) -> Result<SystemTimes> {
        let next = match self.frames.pop_front() {
            Some(frame) => frame,
            None => {
                let user = self.current.as_ref().map(|f| f.times.user).unwrap_or(0) + 1_000;
                Frame::ok(user, self.last_ok.clone())
            }
        };
        let times = next.times;
        self.current = Some(next);
        Ok(times)
    }

    fn capture_all(&mut self) -> Result<Vec<RawProcessSample>> {
        match self.current.as_ref().and_then(|frame| frame.samples.clone()) {
            Some(samples) => {
                self.last_ok = samples.clone();
                Ok(samples)
            }
            None => Err(TelemetryError::system_query(0xC000_0001, "scripted failure")),
        }
    }
}

/// Icon backend handing out fresh handles and counting destroys.
#[derive(Default)]
pub struct CountingIcons {
    next: AtomicUsize,
    pub extracted: AtomicUsize,
    pub destroyed: AtomicUsize,
}

impl IconBackend for CountingIcons {
    fn extract(&self, _pid: u32) -> Option<IconHandle> {
        self.extracted.fetch_add(1, Ordering::SeqCst);
        Some(IconHandle(self.next.fetch_add(1, Ordering::SeqCst) + 1))
    }

    fn destroy(&self, _handle: IconHandle) {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

struct FakeCategory {
    counters: Vec<String>,
    instances: Vec<String>,
}

/// In-memory counter subsystem. Values are keyed by instance name and can
/// be changed between reads.
#[derive(Default)]
pub struct FakeCounters {
    categories: Mutex<Vec<(String, FakeCategory)>>,
    values: Mutex<HashMap<String, f64>>,
    open: Mutex<HashMap<RawCounterId, CounterPath>>,
    next_id: AtomicU64,
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub listings: AtomicUsize,
}

impl FakeCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_category(self, name: &str, counters: &[&str], instances: &[&str]) -> Self {
        self.categories.lock().push((
            name.to_string(),
            FakeCategory {
                counters: counters.iter().map(|c| c.to_string()).collect(),
                instances: instances.iter().map(|i| i.to_string()).collect(),
            },
        ));
        self
    }

    pub fn set_value(&self, instance: &str, value: f64) {
        self.values.lock().insert(instance.to_string(), value);
    }

    pub fn open_count(&self) -> usize {
        self.open.lock().len()
    }

    fn with_named<T>(&self, category: &str, f: impl FnOnce(&FakeCategory) -> T) -> Result<T> {
        let categories = self.categories.lock();
        categories
            .iter()
            .find(|(name, _)| name == category)
            .map(|(_, c)| f(c))
            .ok_or_else(|| TelemetryError::counter(format!("no category '{}'", category)))
    }
}

impl CounterBackend for FakeCounters {
    fn list_categories(&self) -> Result<Vec<String>> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        Ok(self.categories.lock().iter().map(|(name, _)| name.clone()).collect())
    }

    fn category_exists(&self, category: &str) -> bool {
        self.categories.lock().iter().any(|(name, _)| name == category)
    }

    fn instance_names(&self, category: &str) -> Result<Vec<String>> {
        self.with_named(category, |c| c.instances.clone())
    }

    fn counter_names(&self, category: &str, _instance: Option<&str>) -> Result<Vec<String>> {
        self.with_named(category, |c| c.counters.clone())
    }

    fn open(&self, path: &CounterPath) -> Result<RawCounterId> {
        let known = self.with_named(&path.category, |c| {
            c.counters.contains(&path.counter)
                && path.instance.as_ref().map_or(true, |i| c.instances.contains(i))
        })?;
        if !known {
            return Err(TelemetryError::counter(format!("no counter {}", path)));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.open.lock().insert(id, path.clone());
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    fn read(&self, id: RawCounterId) -> Result<f64> {
        let open = self.open.lock();
        let path = open
            .get(&id)
            .ok_or_else(|| TelemetryError::counter(format!("id {} not open", id)))?;
        Ok(self
            .values
            .lock()
            .get(path.instance_name())
            .copied()
            .unwrap_or(0.0))
    }

    fn close(&self, id: RawCounterId) {
        if self.open.lock().remove(&id).is_some() {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

pub struct FakeInventory {
    pub gpu_name: String,
}

impl FakeInventory {
    pub fn named(gpu_name: &str) -> Arc<Self> {
        Arc::new(Self {
            gpu_name: gpu_name.to_string(),
        })
    }
}

impl HardwareInventory for FakeInventory {
    fn cpu_name(&self) -> Option<String> {
        Some("Test CPU".to_string())
    }

    fn total_physical_memory(&self) -> Option<u64> {
        Some(16 * 1024 * 1024 * 1024)
    }

    fn gpu_details(&self) -> Option<GpuDetailInfo> {
        Some(GpuDetailInfo {
            name: self.gpu_name.clone(),
            driver_version: "1.0".to_string(),
            ..Default::default()
        })
    }
}

/// Vendor interface returning a fixed reading.
pub struct FixedVendor {
    pub usage: Option<f64>,
    pub memory: Option<MemoryUsage>,
}

impl VendorBackend for FixedVendor {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn usage_percent(&mut self) -> Option<f64> {
        self.usage
    }

    fn memory(&mut self) -> Option<MemoryUsage> {
        self.memory
    }
}
