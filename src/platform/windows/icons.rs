use windows_sys::Win32::Storage::FileSystem::FILE_ATTRIBUTE_NORMAL;
use windows_sys::Win32::System::Threading::QueryFullProcessImageNameW;
use windows_sys::Win32::UI::Shell::{SHGetFileInfoW, SHFILEINFOW};
use windows_sys::Win32::UI::WindowsAndMessaging::DestroyIcon;

use super::handle::OwnedHandle;
use crate::core::process::{IconBackend, IconHandle};

const SHGFI_ICON: u32 = 0x100;
const SHGFI_SMALLICON: u32 = 0x1;
const MAX_IMAGE_PATH: usize = 1024;

/// Full image path of `pid`, NUL-terminated.
pub(crate) fn image_path_wide(pid: u32) -> Option<Vec<u16>> {
    let process = OwnedHandle::open_limited(pid)?;
    let mut buf = vec![0u16; MAX_IMAGE_PATH];
    let mut len = buf.len() as u32;
    // SAFETY: `buf` is writable for `len` characters.
    let ok = unsafe { QueryFullProcessImageNameW(process.as_raw(), 0, buf.as_mut_ptr(), &mut len) };
    if ok == 0 || len == 0 {
        return None;
    }
    buf.truncate(len as usize);
    buf.push(0);
    Some(buf)
}

/// Small shell icons of process images.
#[derive(Debug, Default)]
pub struct ShellIcons;

impl ShellIcons {
    pub fn new() -> Self {
        Self
    }
}

impl IconBackend for ShellIcons {
    fn extract(&self, pid: u32) -> Option<IconHandle> {
        let path = image_path_wide(pid)?;
        // SAFETY: SHFILEINFOW is plain data.
        let mut info: SHFILEINFOW = unsafe { std::mem::zeroed() };
        // SAFETY: `path` is NUL-terminated and `info` is sized as passed.
        let result = unsafe {
            SHGetFileInfoW(
                path.as_ptr(),
                FILE_ATTRIBUTE_NORMAL,
                &mut info,
                std::mem::size_of::<SHFILEINFOW>() as u32,
                SHGFI_ICON | SHGFI_SMALLICON,
            )
        };
        if result == 0 || info.hIcon.is_null() {
            return None;
        }
        Some(IconHandle(info.hIcon as usize))
    }

    fn destroy(&self, handle: IconHandle) {
        // SAFETY: the handle came from SHGetFileInfoW and the cache destroys it once.
        unsafe {
            DestroyIcon(handle.0 as _);
        }
    }
}
