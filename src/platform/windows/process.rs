use std::ffi::c_void;

use windows_sys::Win32::Foundation::FILETIME;
use windows_sys::Win32::System::Threading::GetSystemTimes;

use crate::core::process::{
    parse_process_buffer, query_with_growing_buffer, ProcessSnapshotSource, QueryStatus, RawProcessSample,
    RecordLayout, SystemTimes,
};
use crate::error::{Result, TelemetryError};

const SYSTEM_PROCESS_INFORMATION: u32 = 5;
const STATUS_INFO_LENGTH_MISMATCH: i32 = 0xC000_0004_u32 as i32;
const STATUS_BUFFER_TOO_SMALL: i32 = 0xC000_0023_u32 as i32;

#[link(name = "ntdll")]
extern "system" {
    fn NtQuerySystemInformation(
        class: u32,
        information: *mut c_void,
        length: u32,
        return_length: *mut u32,
    ) -> i32;
}

fn filetime_ticks(ft: &FILETIME) -> u64 {
    (u64::from(ft.dwHighDateTime) << 32) | u64::from(ft.dwLowDateTime)
}

/// Whole-system process snapshot through `NtQuerySystemInformation`.
/// Times are in 100 ns ticks.
#[derive(Debug, Default)]
pub struct NtProcessSource;

impl NtProcessSource {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessSnapshotSource for NtProcessSource {
    fn system_times(&mut self) -> Result<SystemTimes> {
        // SAFETY: FILETIME is plain data.
        let mut idle: FILETIME = unsafe { std::mem::zeroed() };
        let mut kernel: FILETIME = unsafe { std::mem::zeroed() };
        let mut user: FILETIME = unsafe { std::mem::zeroed() };

        // SAFETY: all three out-pointers reference live locals.
        let ok = unsafe { GetSystemTimes(&mut idle, &mut kernel, &mut user) };
        if ok == 0 {
            return Err(TelemetryError::from(std::io::Error::last_os_error()));
        }

        // Kernel time already includes idle time.
        Ok(SystemTimes {
            kernel: filetime_ticks(&kernel),
            user: filetime_ticks(&user),
        })
    }

    fn capture_all(&mut self) -> Result<Vec<RawProcessSample>> {
        let buffer = query_with_growing_buffer(|buf| {
            let mut needed: u32 = 0;
            let len = u32::try_from(buf.len()).unwrap_or(u32::MAX);
            let ptr = if buf.is_empty() {
                std::ptr::null_mut()
            } else {
                buf.as_mut_bytes().as_mut_ptr().cast::<c_void>()
            };

            // SAFETY: `ptr` is either null with length 0 or points to `len`
            // writable, 8-byte aligned bytes owned by `buf`.
            let status = unsafe { NtQuerySystemInformation(SYSTEM_PROCESS_INFORMATION, ptr, len, &mut needed) };

            match status {
                s if s >= 0 => QueryStatus::Filled(if needed == 0 { buf.len() } else { (needed as usize).min(buf.len()) }),
                STATUS_INFO_LENGTH_MISMATCH | STATUS_BUFFER_TOO_SMALL => QueryStatus::TooSmall(needed as usize),
                s => QueryStatus::Failed(s as u32),
            }
        })?;

        Ok(parse_process_buffer(
            buffer.as_bytes(),
            buffer.base_addr(),
            RecordLayout::native(),
        ))
    }
}
