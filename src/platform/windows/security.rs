use std::ptr;

use windows_sys::Win32::Foundation::HANDLE;
use windows_sys::Win32::Security::{GetTokenInformation, LookupAccountSidW, TokenUser, TOKEN_QUERY, TOKEN_USER};
use windows_sys::Win32::System::Threading::OpenProcessToken;

use super::from_wide;
use super::handle::OwnedHandle;
use crate::core::process::{UsernameResolver, UNKNOWN_OWNER};

const NAME_CAPACITY: usize = 256;

/// Owner lookup from the process token's user SID.
#[derive(Debug, Default)]
pub struct TokenOwners;

impl TokenOwners {
    pub fn new() -> Self {
        Self
    }

    fn lookup(pid: u32) -> Option<String> {
        let process = OwnedHandle::open_limited(pid)?;

        let mut raw_token: HANDLE = ptr::null_mut();
        // SAFETY: `process` is a live handle and `raw_token` a valid out-pointer.
        if unsafe { OpenProcessToken(process.as_raw(), TOKEN_QUERY, &mut raw_token) } == 0 {
            return None;
        }
        let token = OwnedHandle::from_raw(raw_token)?;

        // u64 backing keeps TOKEN_USER suitably aligned.
        let mut info = [0u64; 64];
        let mut needed = 0u32;
        // SAFETY: the buffer is writable for the length passed.
        let ok = unsafe {
            GetTokenInformation(
                token.as_raw(),
                TokenUser,
                info.as_mut_ptr().cast(),
                std::mem::size_of_val(&info) as u32,
                &mut needed,
            )
        };
        if ok == 0 {
            return None;
        }
        // SAFETY: on success the buffer starts with a TOKEN_USER whose SID
        // points inside the same buffer.
        let sid = unsafe { (*(info.as_ptr() as *const TOKEN_USER)).User.Sid };

        let mut name = [0u16; NAME_CAPACITY];
        let mut domain = [0u16; NAME_CAPACITY];
        let mut name_len = NAME_CAPACITY as u32;
        let mut domain_len = NAME_CAPACITY as u32;
        let mut sid_use = 0;
        // SAFETY: both output buffers are writable for the lengths passed.
        let ok = unsafe {
            LookupAccountSidW(
                ptr::null(),
                sid,
                name.as_mut_ptr(),
                &mut name_len,
                domain.as_mut_ptr(),
                &mut domain_len,
                &mut sid_use,
            )
        };
        if ok == 0 {
            return None;
        }

        let name = from_wide(&name);
        let domain = from_wide(&domain);
        Some(if domain.is_empty() { name } else { format!("{}\\{}", domain, name) })
    }
}

impl UsernameResolver for TokenOwners {
    fn resolve_owner(&mut self, pid: u32) -> String {
        Self::lookup(pid).unwrap_or_else(|| UNKNOWN_OWNER.to_string())
    }
}
