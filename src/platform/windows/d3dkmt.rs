//! Kernel-mode graphics thunks exported by gdi32.

use std::ffi::c_void;
use std::ptr;

use log::trace;

use crate::core::gpu::{scan_node_block, AdapterMemory, MemoryBudgetSource, MemoryUsage, NodeTimeSource};
use crate::core::process::AlignedBuffer;

const STATISTICS_BUFFER_LEN: usize = 8192;
const QUERYSTATISTICS_ADAPTER: u32 = 0;
const SEGMENT_GROUP_LOCAL: u32 = 0;
const SEGMENT_GROUP_NON_LOCAL: u32 = 1;
/// Node running times are reported in 100 ns units.
const RUNNING_TIME_TO_NS: u64 = 100;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
struct Luid {
    low_part: u32,
    high_part: i32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
struct AdapterInfo {
    adapter: u32,
    luid: Luid,
    num_sources: u32,
    precise_present_regions_preferred: i32,
}

#[repr(C)]
struct EnumAdapters2 {
    num_adapters: u32,
    adapters: *mut AdapterInfo,
}

#[repr(C)]
struct QueryVideoMemoryInfo {
    process: *mut c_void,
    adapter: u32,
    memory_segment_group: u32,
    budget: u64,
    current_usage: u64,
    current_reservation: u64,
    available_for_reservation: u64,
    physical_adapter_index: u32,
}

#[repr(C)]
struct CloseAdapter {
    adapter: u32,
}

#[link(name = "gdi32")]
extern "system" {
    fn D3DKMTEnumAdapters2(args: *mut EnumAdapters2) -> i32;
    fn D3DKMTQueryVideoMemoryInfo(args: *mut QueryVideoMemoryInfo) -> i32;
    fn D3DKMTCloseAdapter(args: *const CloseAdapter) -> i32;
    fn D3DKMTQueryStatistics(args: *mut c_void) -> i32;
}

/// `0xHIGH_0xLOW`, as it appears in counter instance names.
fn luid_key(luid: Luid) -> String {
    format!("0x{:08X}_0x{:08X}", luid.high_part as u32, luid.low_part)
}

/// Open adapter handles, closed on drop.
struct Adapters(Vec<AdapterInfo>);

impl Adapters {
    fn enumerate() -> Option<Self> {
        let mut args = EnumAdapters2 {
            num_adapters: 0,
            adapters: ptr::null_mut(),
        };
        // SAFETY: a null array asks only for the count.
        if unsafe { D3DKMTEnumAdapters2(&mut args) } < 0 || args.num_adapters == 0 {
            return None;
        }

        let mut adapters = vec![AdapterInfo::default(); args.num_adapters as usize];
        args.adapters = adapters.as_mut_ptr();
        // SAFETY: the array holds `num_adapters` entries.
        if unsafe { D3DKMTEnumAdapters2(&mut args) } < 0 {
            return None;
        }
        adapters.truncate(args.num_adapters as usize);
        Some(Self(adapters))
    }
}

impl Drop for Adapters {
    fn drop(&mut self) {
        for info in &self.0 {
            let args = CloseAdapter { adapter: info.adapter };
            // SAFETY: each handle came from the enumeration and is closed once.
            unsafe {
                D3DKMTCloseAdapter(&args);
            }
        }
    }
}

fn segment_usage(adapter: u32, group: u32) -> Option<u64> {
    let mut args = QueryVideoMemoryInfo {
        process: ptr::null_mut(),
        adapter,
        memory_segment_group: group,
        budget: 0,
        current_usage: 0,
        current_reservation: 0,
        available_for_reservation: 0,
        physical_adapter_index: 0,
    };
    // SAFETY: `args` is fully initialized and outlives the call.
    let status = unsafe { D3DKMTQueryVideoMemoryInfo(&mut args) };
    (status >= 0).then_some(args.current_usage)
}

/// Per-adapter memory usage from the video memory budget query.
#[derive(Debug, Default)]
pub struct D3dkmtMemoryBudget;

impl D3dkmtMemoryBudget {
    pub fn new() -> Self {
        Self
    }
}

impl MemoryBudgetSource for D3dkmtMemoryBudget {
    fn query(&mut self) -> Option<Vec<AdapterMemory>> {
        let adapters = Adapters::enumerate()?;
        let entries: Vec<AdapterMemory> = adapters
            .0
            .iter()
            .filter_map(|info| {
                let dedicated = segment_usage(info.adapter, SEGMENT_GROUP_LOCAL);
                let shared = segment_usage(info.adapter, SEGMENT_GROUP_NON_LOCAL);
                if dedicated.is_none() && shared.is_none() {
                    return None;
                }
                Some(AdapterMemory {
                    luid: Some(luid_key(info.luid)),
                    usage: MemoryUsage {
                        dedicated_used: dedicated.unwrap_or(0),
                        shared_used: shared.unwrap_or(0),
                    },
                })
            })
            .collect();

        if entries.is_empty() {
            None
        } else {
            Some(entries)
        }
    }
}

/// Cumulative node running times of the first adapter.
#[derive(Debug, Default)]
pub struct D3dkmtNodeTimes;

impl D3dkmtNodeTimes {
    pub fn new() -> Self {
        Self
    }
}

impl NodeTimeSource for D3dkmtNodeTimes {
    fn sample(&mut self) -> Option<Vec<u64>> {
        let luid = Adapters::enumerate().and_then(|adapters| adapters.0.first().map(|info| info.luid));

        let mut buffer = AlignedBuffer::with_len(STATISTICS_BUFFER_LEN);
        {
            let bytes = buffer.as_mut_bytes();
            bytes[0..4].copy_from_slice(&QUERYSTATISTICS_ADAPTER.to_le_bytes());
            if let Some(luid) = luid {
                bytes[4..8].copy_from_slice(&luid.low_part.to_le_bytes());
                bytes[8..12].copy_from_slice(&luid.high_part.to_le_bytes());
            }
        }

        // SAFETY: the buffer is 8-byte aligned and larger than the statistics record.
        let status = unsafe { D3DKMTQueryStatistics(buffer.as_mut_bytes().as_mut_ptr().cast()) };
        if status < 0 {
            trace!("D3DKMTQueryStatistics failed: 0x{:08X}", status as u32);
            return None;
        }

        let bytes = buffer.as_bytes();
        let node_count = i32::from_le_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);
        scan_node_block(bytes, node_count)
            .map(|times| times.into_iter().map(|t| t.saturating_mul(RUNNING_TIME_TO_NS)).collect())
    }
}
