use std::collections::HashMap;
use std::ptr;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use windows_sys::Win32::System::Performance::{
    PdhAddCounterW, PdhCloseQuery, PdhCollectQueryData, PdhEnumObjectItemsW, PdhEnumObjectsW,
    PdhGetFormattedCounterValue, PdhOpenQueryW, PDH_FMT_COUNTERVALUE, PDH_HCOUNTER, PDH_HQUERY,
};

use super::{split_multi_sz, to_wide};
use crate::core::counters::{CounterBackend, CounterPath, RawCounterId};
use crate::error::{Result, TelemetryError};

const ERROR_SUCCESS: u32 = 0;
const PDH_MORE_DATA: u32 = 0x8000_07D2;
const PDH_FMT_DOUBLE: u32 = 0x0000_0200;
const PDH_FMT_NOCAP100: u32 = 0x0000_8000;
const PERF_DETAIL_WIZARD: u32 = 400;

/// Query and counter handles of one open counter.
struct OpenCounter {
    query: isize,
    counter: isize,
}

/// PDH counter subsystem. Each open counter gets its own query so reads
/// of one never disturb the rate baseline of another.
pub struct PdhBackend {
    counters: Mutex<HashMap<RawCounterId, OpenCounter>>,
    next_id: AtomicU64,
}

impl PdhBackend {
    pub fn new() -> Self {
        Self {
            counters: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Counter and instance lists of `category`.
    fn object_items(category: &str) -> Result<(Vec<String>, Vec<String>)> {
        let object = to_wide(category);
        let mut counter_len = 0u32;
        let mut instance_len = 0u32;

        // SAFETY: null buffers with zero lengths request the required sizes.
        let status = unsafe {
            PdhEnumObjectItemsW(
                ptr::null(),
                ptr::null(),
                object.as_ptr(),
                ptr::null_mut(),
                &mut counter_len,
                ptr::null_mut(),
                &mut instance_len,
                PERF_DETAIL_WIZARD,
                0,
            )
        } as u32;
        if status != PDH_MORE_DATA && status != ERROR_SUCCESS {
            return Err(TelemetryError::counter(format!(
                "category '{}' not enumerable (0x{:08X})",
                category, status
            )));
        }

        let mut counters = vec![0u16; counter_len as usize + 2];
        let mut instances = vec![0u16; instance_len as usize + 2];
        counter_len = counters.len() as u32;
        instance_len = instances.len() as u32;
        // SAFETY: both buffers are writable for the lengths passed.
        let status = unsafe {
            PdhEnumObjectItemsW(
                ptr::null(),
                ptr::null(),
                object.as_ptr(),
                counters.as_mut_ptr(),
                &mut counter_len,
                instances.as_mut_ptr(),
                &mut instance_len,
                PERF_DETAIL_WIZARD,
                0,
            )
        } as u32;
        if status != ERROR_SUCCESS {
            return Err(TelemetryError::counter(format!(
                "enumerating '{}' failed (0x{:08X})",
                category, status
            )));
        }

        Ok((split_multi_sz(&counters), split_multi_sz(&instances)))
    }
}

impl Default for PdhBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterBackend for PdhBackend {
    fn list_categories(&self) -> Result<Vec<String>> {
        let mut len = 0u32;
        // SAFETY: null buffer with zero length requests the required size; refresh is on.
        let status = unsafe {
            PdhEnumObjectsW(ptr::null(), ptr::null(), ptr::null_mut(), &mut len, PERF_DETAIL_WIZARD, 1)
        } as u32;
        if status != PDH_MORE_DATA && status != ERROR_SUCCESS {
            return Err(TelemetryError::counter(format!(
                "counter objects not enumerable (0x{:08X})",
                status
            )));
        }

        let mut buf = vec![0u16; len as usize + 2];
        len = buf.len() as u32;
        // SAFETY: the buffer is writable for `len` characters.
        let status = unsafe {
            PdhEnumObjectsW(ptr::null(), ptr::null(), buf.as_mut_ptr(), &mut len, PERF_DETAIL_WIZARD, 0)
        } as u32;
        if status != ERROR_SUCCESS {
            return Err(TelemetryError::counter(format!(
                "enumerating counter objects failed (0x{:08X})",
                status
            )));
        }
        Ok(split_multi_sz(&buf))
    }

    fn category_exists(&self, category: &str) -> bool {
        Self::object_items(category).is_ok()
    }

    fn instance_names(&self, category: &str) -> Result<Vec<String>> {
        Self::object_items(category).map(|(_, instances)| instances)
    }

    fn counter_names(&self, category: &str, _instance: Option<&str>) -> Result<Vec<String>> {
        Self::object_items(category).map(|(counters, _)| counters)
    }

    fn open(&self, path: &CounterPath) -> Result<RawCounterId> {
        let full_path = to_wide(&path.to_string());

        // SAFETY: zeroed query/counter handles are the null handle of either representation.
        let mut query: PDH_HQUERY = unsafe { std::mem::zeroed() };
        // SAFETY: `query` is a valid out-pointer.
        let status = unsafe { PdhOpenQueryW(ptr::null(), 0, &mut query) } as u32;
        if status != ERROR_SUCCESS {
            return Err(TelemetryError::counter(format!("PdhOpenQuery failed (0x{:08X})", status)));
        }

        // SAFETY: as above.
        let mut counter: PDH_HCOUNTER = unsafe { std::mem::zeroed() };
        // SAFETY: `query` is open and `full_path` is NUL-terminated.
        let status = unsafe { PdhAddCounterW(query, full_path.as_ptr(), 0, &mut counter) } as u32;
        if status != ERROR_SUCCESS {
            // SAFETY: the query was opened above and is not stored anywhere.
            unsafe {
                PdhCloseQuery(query);
            }
            return Err(TelemetryError::counter(format!("cannot open {} (0x{:08X})", path, status)));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.counters.lock().insert(
            id,
            OpenCounter {
                query: query as isize,
                counter: counter as isize,
            },
        );
        Ok(id)
    }

    fn read(&self, id: RawCounterId) -> Result<f64> {
        let counters = self.counters.lock();
        let open = counters
            .get(&id)
            .ok_or_else(|| TelemetryError::counter(format!("counter {} is not open", id)))?;

        // SAFETY: the query stays open while it is in the map, and the map lock is held.
        let status = unsafe { PdhCollectQueryData(open.query as _) } as u32;
        if status != ERROR_SUCCESS {
            return Err(TelemetryError::counter(format!("collect failed (0x{:08X})", status)));
        }

        // SAFETY: PDH_FMT_COUNTERVALUE is plain data.
        let mut value: PDH_FMT_COUNTERVALUE = unsafe { std::mem::zeroed() };
        let mut kind = 0u32;
        // SAFETY: the counter belongs to the open query; out-pointers are live locals.
        let status = unsafe {
            PdhGetFormattedCounterValue(open.counter as _, PDH_FMT_DOUBLE | PDH_FMT_NOCAP100, &mut kind, &mut value)
        } as u32;
        if status != ERROR_SUCCESS {
            return Err(TelemetryError::counter(format!("format failed (0x{:08X})", status)));
        }
        // SAFETY: PDH_FMT_DOUBLE selects the double member.
        Ok(unsafe { value.Anonymous.doubleValue })
    }

    fn close(&self, id: RawCounterId) {
        if let Some(open) = self.counters.lock().remove(&id) {
            // SAFETY: removed from the map, so this is the only close.
            unsafe {
                PdhCloseQuery(open.query as _);
            }
        }
    }
}

impl Drop for PdhBackend {
    fn drop(&mut self) {
        for (_, open) in self.counters.lock().drain() {
            // SAFETY: every stored query is open exactly until this point.
            unsafe {
                PdhCloseQuery(open.query as _);
            }
        }
    }
}
