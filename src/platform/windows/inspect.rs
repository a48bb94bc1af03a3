use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::debug;
use serde::Deserialize;
use windows_sys::Win32::System::Threading::IsWow64Process2;
use wmi::WMIConnection;

use super::handle::OwnedHandle;
use crate::core::process::ProcessInspector;
use crate::error::{Result, TelemetryError};

#[derive(Deserialize, Debug)]
#[serde(rename = "Win32_Process")]
#[serde(rename_all = "PascalCase")]
struct Win32Process {
    process_id: u32,
    command_line: Option<String>,
}

/// Minimum spacing between full command-line table refreshes.
const REFRESH_SPACING: Duration = Duration::from_secs(1);

/// Label for an `IMAGE_FILE_MACHINE_*` value.
pub(crate) fn machine_label(machine: u16) -> Option<&'static str> {
    match machine {
        0x8664 => Some("x64"),
        0x014C => Some("x86"),
        0xAA64 => Some("ARM64"),
        0x01C4 => Some("ARM"),
        _ => None,
    }
}

/// Command lines through WMI, architecture through `IsWow64Process2`.
///
/// WMI connections are bound to the calling thread, so each refresh opens
/// its own and pulls the whole process table at once.
pub struct WindowsInspector {
    command_lines: HashMap<u32, String>,
    refreshed_at: Option<Instant>,
}

impl WindowsInspector {
    pub fn new() -> Self {
        Self {
            command_lines: HashMap::new(),
            refreshed_at: None,
        }
    }

    fn refresh(&mut self) -> Result<()> {
        let wmi_con = WMIConnection::new()
            .map_err(|e| TelemetryError::platform(format!("Failed to connect to WMI: {}", e)))?;
        let rows: Vec<Win32Process> = wmi_con
            .query()
            .map_err(|e| TelemetryError::platform(format!("WMI query failed: {}", e)))?;

        self.command_lines = rows
            .into_iter()
            .filter_map(|row| {
                let line = row.command_line?;
                (!line.trim().is_empty()).then_some((row.process_id, line))
            })
            .collect();
        Ok(())
    }
}

impl Default for WindowsInspector {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessInspector for WindowsInspector {
    fn command_line(&mut self, pid: u32) -> Option<String> {
        if let Some(line) = self.command_lines.get(&pid) {
            return Some(line.clone());
        }

        let stale = self
            .refreshed_at
            .is_none_or(|at| at.elapsed() >= REFRESH_SPACING);
        if stale {
            self.refreshed_at = Some(Instant::now());
            if let Err(e) = self.refresh() {
                debug!("{}", e);
            }
        }
        self.command_lines.get(&pid).cloned()
    }

    fn architecture(&mut self, pid: u32) -> Option<String> {
        let process = OwnedHandle::open_limited(pid)?;
        let mut process_machine = 0u16;
        let mut native_machine = 0u16;
        // SAFETY: both out-pointers reference live locals.
        let ok = unsafe { IsWow64Process2(process.as_raw(), &mut process_machine, &mut native_machine) };
        if ok == 0 {
            return None;
        }
        // IMAGE_FILE_MACHINE_UNKNOWN means the process runs natively.
        let machine = if process_machine == 0 { native_machine } else { process_machine };
        machine_label(machine).map(str::to_string)
    }
}
