use std::collections::HashMap;

use windows_sys::Win32::Foundation::{HWND, LPARAM};
use windows_sys::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetShellWindow, GetWindow, GetWindowTextLengthW, GetWindowTextW, GetWindowThreadProcessId,
    IsWindowVisible, GW_OWNER,
};

use crate::core::process::WindowCatalog;

const DESKTOP_TITLE: &str = "Program Manager";

struct Enumeration {
    shell: HWND,
    windows: HashMap<u32, String>,
}

fn window_title(hwnd: HWND) -> Option<String> {
    // SAFETY: `hwnd` comes from EnumWindows and the buffer is sized from the reported length.
    unsafe {
        let len = GetWindowTextLengthW(hwnd);
        if len <= 0 {
            return None;
        }
        let mut buf = vec![0u16; len as usize + 1];
        let copied = GetWindowTextW(hwnd, buf.as_mut_ptr(), buf.len() as i32);
        if copied <= 0 {
            return None;
        }
        Some(String::from_utf16_lossy(&buf[..copied as usize]))
    }
}

unsafe extern "system" fn collect_window(hwnd: HWND, lparam: LPARAM) -> i32 {
    // SAFETY: `lparam` is the `Enumeration` passed to EnumWindows below,
    // alive and exclusively borrowed for the whole enumeration.
    let state = &mut *(lparam as *mut Enumeration);

    if hwnd == state.shell || IsWindowVisible(hwnd) == 0 {
        return 1;
    }
    let owner = GetWindow(hwnd, GW_OWNER);
    if !owner.is_null() && IsWindowVisible(owner) != 0 {
        return 1;
    }
    let Some(title) = window_title(hwnd) else {
        return 1;
    };
    if title.trim().is_empty() || title == DESKTOP_TITLE {
        return 1;
    }

    let mut pid = 0u32;
    GetWindowThreadProcessId(hwnd, &mut pid);
    if pid != 0 {
        state.windows.entry(pid).or_insert(title);
    }
    1
}

/// Visible, unowned, titled top-level windows.
#[derive(Debug, Default)]
pub struct TopLevelWindows;

impl TopLevelWindows {
    pub fn new() -> Self {
        Self
    }
}

impl WindowCatalog for TopLevelWindows {
    fn application_windows(&mut self) -> HashMap<u32, String> {
        let mut state = Enumeration {
            // SAFETY: no arguments.
            shell: unsafe { GetShellWindow() },
            windows: HashMap::new(),
        };
        // SAFETY: the callback only touches `state` through `lparam` and
        // EnumWindows returns before `state` goes out of scope.
        unsafe {
            EnumWindows(Some(collect_window), &mut state as *mut Enumeration as LPARAM);
        }
        state.windows
    }
}
