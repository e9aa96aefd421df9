//! Dynamic loading on top of `LoadLibraryW` and `GetProcAddress`.

use crate::error::GENERIC_FAILURE_EXIT_CODE;
use crate::invoker::LoaderFailure;
use std::ffi::CString;
use std::ffi::c_void;
use std::os::windows::ffi::OsStrExt as _;
use std::path::Path;
use std::ptr::NonNull;
use windows_sys::Win32::Foundation::FreeLibrary;
use windows_sys::Win32::Foundation::GetLastError;
use windows_sys::Win32::Foundation::HMODULE;
use windows_sys::Win32::System::LibraryLoader::GetProcAddress;
use windows_sys::Win32::System::LibraryLoader::LoadLibraryW;

/// Win32 `ERROR_INVALID_PARAMETER`.
const ERROR_INVALID_PARAMETER: i32 = 87;

pub(crate) struct Handle(HMODULE);

pub(crate) fn open(path: &Path) -> Result<Handle, LoaderFailure> {
    let wide: Vec<u16> = path
        .as_os_str()
        .encode_wide()
        .chain(std::iter::once(0))
        .collect();
    // Safety: `wide` is NUL-terminated and outlives the call.
    let module = unsafe { LoadLibraryW(wide.as_ptr()) };
    if module.is_null() {
        return Err(last_failure());
    }
    Ok(Handle(module))
}

pub(crate) fn symbol(handle: &Handle, name: &str) -> Result<NonNull<c_void>, LoaderFailure> {
    let c_name = CString::new(name).map_err(|_| LoaderFailure {
        code: ERROR_INVALID_PARAMETER,
        detail: "export name contains a NUL byte".to_owned(),
    })?;
    // Safety: The module handle is live for as long as `handle` is and `c_name` is
    // NUL-terminated.
    let address = unsafe { GetProcAddress(handle.0, c_name.as_ptr().cast()) };
    address
        .and_then(|function| NonNull::new(function as *mut c_void))
        .ok_or_else(last_failure)
}

impl Drop for Handle {
    fn drop(&mut self) {
        // Safety: We own the module reference and nothing resolved from it outlives us.
        if unsafe { FreeLibrary(self.0) } == 0 {
            tracing::warn!(code = unsafe { GetLastError() }, "FreeLibrary failed");
        }
    }
}

fn last_failure() -> LoaderFailure {
    // Safety: GetLastError has no preconditions.
    let code = unsafe { GetLastError() } as i32;
    let code = if code == 0 {
        GENERIC_FAILURE_EXIT_CODE
    } else {
        code
    };
    LoaderFailure {
        code,
        detail: std::io::Error::from_raw_os_error(code).to_string(),
    }
}
