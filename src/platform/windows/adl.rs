use std::ffi::c_void;

use windows_sys::Win32::Foundation::HMODULE;
use windows_sys::Win32::System::LibraryLoader::{FreeLibrary, GetProcAddress, LoadLibraryW};

use super::to_wide;
use crate::core::gpu::VendorBackend;
use crate::error::{Result, TelemetryError};

const ADL_OK: i32 = 0;
const ADL_LIBRARIES: &[&str] = &["atiadlxx.dll", "atiadlxy.dll"];

type AllocCallback = extern "C" fn(i32) -> *mut c_void;
type MainControlCreate = unsafe extern "C" fn(AllocCallback, i32) -> i32;
type MainControlDestroy = unsafe extern "C" fn() -> i32;
type NumberOfAdaptersGet = unsafe extern "C" fn(*mut i32) -> i32;
type CurrentActivityGet = unsafe extern "C" fn(i32, *mut PmActivity) -> i32;

#[repr(C)]
#[derive(Debug, Default)]
struct PmActivity {
    size: i32,
    engine_clock: i32,
    memory_clock: i32,
    vddc: i32,
    activity_percent: i32,
    current_performance_level: i32,
    current_bus_speed: i32,
    current_bus_lanes: i32,
    maximum_bus_lanes: i32,
    reserved: i32,
}

/// ADL only allocates for adapter-info lists, which are never requested;
/// the memory is handed over and never reclaimed.
extern "C" fn adl_alloc(size: i32) -> *mut c_void {
    let len = usize::try_from(size).unwrap_or(0).max(1);
    Box::into_raw(vec![0u8; len].into_boxed_slice()).cast()
}

/// AMD overdrive activity through the ADL driver library.
pub struct AdlBackend {
    module: isize,
    destroy: MainControlDestroy,
    adapter_count: NumberOfAdaptersGet,
    activity: CurrentActivityGet,
}

/// # Safety
/// `T` must be the function pointer type of the export named `name`.
unsafe fn export<T: Copy>(module: HMODULE, name: &str) -> Option<T> {
    let symbol = format!("{}\0", name);
    let proc = GetProcAddress(module, symbol.as_ptr())?;
    Some(std::mem::transmute_copy(&proc))
}

impl AdlBackend {
    pub fn load() -> Result<Self> {
        let module = ADL_LIBRARIES
            .iter()
            .map(|name| {
                let wide = to_wide(name);
                // SAFETY: `wide` is NUL-terminated.
                unsafe { LoadLibraryW(wide.as_ptr()) }
            })
            .find(|module| !module.is_null())
            .ok_or_else(|| TelemetryError::gpu_not_available("ADL library not found"))?;

        // SAFETY: each type matches the documented ADL export signature.
        let exports = unsafe {
            (
                export::<MainControlCreate>(module, "ADL_Main_Control_Create"),
                export::<MainControlDestroy>(module, "ADL_Main_Control_Destroy"),
                export::<NumberOfAdaptersGet>(module, "ADL_Adapter_NumberOfAdapters_Get"),
                export::<CurrentActivityGet>(module, "ADL_Overdrive5_CurrentActivity_Get"),
            )
        };

        let (Some(create), Some(destroy), Some(adapter_count), Some(activity)) = exports else {
            // SAFETY: the module was loaded above and nothing else references it.
            unsafe {
                FreeLibrary(module);
            }
            return Err(TelemetryError::gpu_not_available("ADL exports missing"));
        };

        // SAFETY: `adl_alloc` matches the callback ADL expects.
        if unsafe { create(adl_alloc, 1) } != ADL_OK {
            // SAFETY: as above.
            unsafe {
                FreeLibrary(module);
            }
            return Err(TelemetryError::gpu_not_available("ADL initialization failed"));
        }

        Ok(Self {
            module: module as isize,
            destroy,
            adapter_count,
            activity,
        })
    }
}

impl VendorBackend for AdlBackend {
    fn name(&self) -> &'static str {
        "ADL"
    }

    fn usage_percent(&mut self) -> Option<f64> {
        let mut count = 0i32;
        // SAFETY: the library is initialized for the lifetime of `self`.
        if unsafe { (self.adapter_count)(&mut count) } != ADL_OK || count <= 0 {
            return None;
        }

        let mut activity = PmActivity {
            size: std::mem::size_of::<PmActivity>() as i32,
            ..PmActivity::default()
        };
        // SAFETY: `activity` is a correctly sized, live struct.
        if unsafe { (self.activity)(0, &mut activity) } != ADL_OK {
            return None;
        }
        Some(f64::from(activity.activity_percent.clamp(0, 100)))
    }
}

impl Drop for AdlBackend {
    fn drop(&mut self) {
        // SAFETY: initialized in `load`; torn down once here before the module is freed.
        unsafe {
            (self.destroy)();
            FreeLibrary(self.module as HMODULE);
        }
    }
}
