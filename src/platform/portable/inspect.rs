use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};

use crate::core::process::ProcessInspector;

const ELF_MAGIC: &[u8; 4] = b"\x7fELF";
const ELF_HEADER_LEN: usize = 20;

/// Architecture tag from the first bytes of an ELF image.
pub fn elf_architecture(header: &[u8]) -> Option<&'static str> {
    if header.len() < ELF_HEADER_LEN || &header[..4] != ELF_MAGIC {
        return None;
    }
    // EI_DATA: 1 little endian, 2 big endian.
    let machine = match header[5] {
        2 => u16::from_be_bytes([header[18], header[19]]),
        _ => u16::from_le_bytes([header[18], header[19]]),
    };
    match machine {
        0x3E => Some("x64"),
        0x03 => Some("x86"),
        0xB7 => Some("ARM64"),
        0x28 => Some("ARM"),
        0xF3 => Some(if header[4] == 2 { "RISC-V64" } else { "RISC-V" }),
        _ => None,
    }
}

/// Command line and image architecture through sysinfo and the executable header.
pub struct SysinfoInspector {
    system: System,
}

impl SysinfoInspector {
    pub fn new() -> Self {
        Self { system: System::new() }
    }

    fn refresh(&mut self, pid: Pid) {
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing()
                .with_cmd(UpdateKind::OnlyIfNotSet)
                .with_exe(UpdateKind::OnlyIfNotSet),
        );
    }

    fn executable(&mut self, pid: u32) -> Option<PathBuf> {
        if cfg!(target_os = "linux") {
            return Some(PathBuf::from(format!("/proc/{}/exe", pid)));
        }
        let pid = Pid::from_u32(pid);
        self.refresh(pid);
        self.system.process(pid)?.exe().map(PathBuf::from)
    }
}

impl Default for SysinfoInspector {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessInspector for SysinfoInspector {
    fn command_line(&mut self, pid: u32) -> Option<String> {
        let pid = Pid::from_u32(pid);
        self.refresh(pid);
        let cmd = self.system.process(pid)?.cmd();
        if cmd.is_empty() {
            return None;
        }
        let joined = cmd
            .iter()
            .map(|arg| arg.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ");
        Some(joined)
    }

    fn architecture(&mut self, pid: u32) -> Option<String> {
        let path = self.executable(pid)?;
        let mut header = [0u8; ELF_HEADER_LEN];
        File::open(path).ok()?.read_exact(&mut header).ok()?;
        elf_architecture(&header).map(str::to_string)
    }
}
