//! Dynamic loading on top of `dlopen` and friends.

use crate::error::GENERIC_FAILURE_EXIT_CODE;
use crate::invoker::LoaderFailure;
use std::ffi::CStr;
use std::ffi::CString;
use std::ffi::c_void;
use std::os::unix::ffi::OsStrExt as _;
use std::path::Path;
use std::ptr::NonNull;

pub(crate) struct Handle(NonNull<c_void>);

pub(crate) fn open(path: &Path) -> Result<Handle, LoaderFailure> {
    let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| LoaderFailure {
        code: libc::EINVAL,
        detail: "path contains a NUL byte".to_owned(),
    })?;
    take_dlerror();
    // Safety: `c_path` is NUL-terminated and outlives the call.
    let raw = unsafe { libc::dlopen(c_path.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL) };
    NonNull::new(raw).map(Handle).ok_or_else(last_failure)
}

pub(crate) fn symbol(handle: &Handle, name: &str) -> Result<NonNull<c_void>, LoaderFailure> {
    let c_name = CString::new(name).map_err(|_| LoaderFailure {
        code: libc::EINVAL,
        detail: "export name contains a NUL byte".to_owned(),
    })?;
    take_dlerror();
    // Safety: The handle came from a successful dlopen and hasn't been closed, since closing
    // consumes it.
    let address = unsafe { libc::dlsym(handle.0.as_ptr(), c_name.as_ptr()) };
    NonNull::new(address).ok_or_else(last_failure)
}

impl Drop for Handle {
    fn drop(&mut self) {
        // Safety: We own the handle and nothing resolved from it outlives us, since exports
        // borrow the library.
        if unsafe { libc::dlclose(self.0.as_ptr()) } != 0 {
            tracing::warn!(detail = ?take_dlerror(), "dlclose failed");
        }
    }
}

/// The dynamic loader reports failures only as text via dlerror. errno isn't part of that
/// contract and may still hold a value from an unrelated call, so every loader failure gets the
/// generic code.
fn last_failure() -> LoaderFailure {
    let detail = take_dlerror().unwrap_or_else(|| "unknown dynamic loader error".to_owned());
    LoaderFailure {
        code: GENERIC_FAILURE_EXIT_CODE,
        detail,
    }
}

/// Returns and clears the calling thread's pending loader error, if any.
fn take_dlerror() -> Option<String> {
    // Safety: dlerror returns either null or a NUL-terminated string that stays valid until the
    // next dl* call on this thread. We copy it out before making any such call.
    unsafe {
        let message = libc::dlerror();
        if message.is_null() {
            None
        } else {
            Some(CStr::from_ptr(message).to_string_lossy().into_owned())
        }
    }
}
