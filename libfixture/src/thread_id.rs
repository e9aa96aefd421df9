//! OS-level identifiers for the calling thread. These are the IDs a profiler or debugger attached
//! to the fixture would report, unlike `std::thread::ThreadId`.

#[cfg(any(target_os = "linux", target_os = "android"))]
#[must_use]
pub fn current() -> u64 {
    // Safety: gettid has no preconditions and cannot fail.
    (unsafe { libc::gettid() }) as u64
}

#[cfg(all(unix, not(any(target_os = "linux", target_os = "android"))))]
#[must_use]
pub fn current() -> u64 {
    // Safety: pthread_self has no preconditions and cannot fail.
    (unsafe { libc::pthread_self() }) as u64
}

#[cfg(windows)]
#[must_use]
pub fn current() -> u64 {
    // Safety: GetCurrentThreadId has no preconditions and cannot fail.
    u64::from(unsafe { windows_sys::Win32::System::Threading::GetCurrentThreadId() })
}
