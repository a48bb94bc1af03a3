use windows_sys::Win32::Foundation::{CloseHandle, HANDLE};
use windows_sys::Win32::System::Threading::{OpenProcess, PROCESS_QUERY_LIMITED_INFORMATION};

/// Owned kernel handle, closed on drop.
pub(crate) struct OwnedHandle(HANDLE);

impl OwnedHandle {
    /// Wrap `raw` unless it is null.
    pub(crate) fn from_raw(raw: HANDLE) -> Option<Self> {
        if raw.is_null() {
            None
        } else {
            Some(Self(raw))
        }
    }

    /// Open `pid` with limited query rights. Access denied and exited
    /// processes both come back as `None`.
    pub(crate) fn open_limited(pid: u32) -> Option<Self> {
        // SAFETY: plain call with value arguments; a null result is handled.
        let raw = unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, 0, pid) };
        Self::from_raw(raw)
    }

    pub(crate) fn as_raw(&self) -> HANDLE {
        self.0
    }
}

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        // SAFETY: the handle is owned and closed exactly once.
        unsafe {
            CloseHandle(self.0);
        }
    }
}
