//! A hook that the platform loader calls when the module holding our thread-local state is loaded
//! into a process.
//!
//! The hook is registered by placing a function pointer into one of the tables the loader walks
//! while initialising a module. Which table depends on the object format:
//!
//! * ELF: `.init_array`, called once after the module is mapped and relocated.
//! * Mach-O: `__DATA,__mod_init_func`, equivalent to `.init_array`.
//! * PE/COFF: the TLS callback table (`.CRT$XLB`). These callbacks receive a reason code and are
//!   also called for every thread attach and detach.
//!
//! Only a process attach produces output. Whichever mechanism fires first wins and the hook never
//! fires twice within a process. On a platform without any of these tables,
//! [`AttachHook::ensure_attached`] fires the hook explicitly before the first worker is spawned.

use std::io::Write;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

/// The name that a fired hook writes. Test runners look for this line.
pub const TLS_CALLBACK_NAME: &str = "TLS callback 1";

/// Why the loader called us. The numbering matches the reason codes passed to PE TLS callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachReason {
    ProcessDetach,
    ProcessAttach,
    ThreadAttach,
    ThreadDetach,
    Other(u32),
}

impl AttachReason {
    #[must_use]
    pub fn from_raw(reason: u32) -> Self {
        match reason {
            0 => AttachReason::ProcessDetach,
            1 => AttachReason::ProcessAttach,
            2 => AttachReason::ThreadAttach,
            3 => AttachReason::ThreadDetach,
            other => AttachReason::Other(other),
        }
    }
}

/// Process-wide, once-only notification that the module has become active.
pub struct AttachHook {
    name: &'static str,
    fired: AtomicBool,
}

impl AttachHook {
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            fired: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Entry point for the loader. Writes to stdout.
    ///
    /// There's no caller to return a write failure to. The hook is left unfired instead, so that
    /// [`AttachHook::ensure_attached`] tries again from `main` and reports the error there.
    pub fn on_event(&self, reason: AttachReason) {
        if let Err(error) = self.on_event_with(reason, &mut std::io::stdout()) {
            tracing::warn!(hook = self.name, %error, "Attach hook failed to write its output");
        }
    }

    /// Handles a loader event, writing our name to `out` if this is the first process attach.
    /// Returns whether the hook fired. If the write fails, the hook counts as not having fired.
    pub fn on_event_with(
        &self,
        reason: AttachReason,
        out: &mut dyn Write,
    ) -> std::io::Result<bool> {
        if reason != AttachReason::ProcessAttach {
            return Ok(false);
        }
        if self.fired.swap(true, Ordering::AcqRel) {
            return Ok(false);
        }
        let written = writeln!(out, "{}", self.name).and_then(|()| out.flush());
        if let Err(error) = written {
            self.fired.store(false, Ordering::Release);
            return Err(error);
        }
        Ok(true)
    }

    /// Fires the hook if the loader didn't. Call this before spawning any threads.
    pub fn ensure_attached(&self) -> std::io::Result<bool> {
        self.ensure_attached_with(&mut std::io::stdout())
    }

    pub fn ensure_attached_with(&self, out: &mut dyn Write) -> std::io::Result<bool> {
        if self.has_fired() {
            tracing::debug!(hook = self.name, "Loader already ran attach hook");
            return Ok(false);
        }
        tracing::debug!(hook = self.name, "No loader callback observed, attaching explicitly");
        self.on_event_with(AttachReason::ProcessAttach, out)
    }
}

/// Registers `$hook` (a `static` [`AttachHook`]) with the platform loader of the module that
/// expands this macro.
///
/// This must be expanded in the crate that produces the final module (an executable or dylib)
/// rather than a library it links, otherwise the linker may drop the table entry along with an
/// otherwise unreferenced object file.
#[macro_export]
macro_rules! register_attach_hook {
    ($hook:ident) => {
        #[cfg(any(
            target_os = "linux",
            target_os = "android",
            target_os = "freebsd",
            target_os = "netbsd",
            target_os = "openbsd",
            target_os = "dragonfly",
            target_os = "illumos",
        ))]
        #[used]
        #[unsafe(link_section = ".init_array")]
        static __ATTACH_HOOK_INIT_ARRAY_ENTRY: extern "C" fn() = {
            extern "C" fn on_module_load() {
                $hook.on_event($crate::attach::AttachReason::ProcessAttach);
            }
            on_module_load
        };

        #[cfg(any(target_os = "macos", target_os = "ios"))]
        #[used]
        #[unsafe(link_section = "__DATA,__mod_init_func")]
        static __ATTACH_HOOK_MOD_INIT_ENTRY: extern "C" fn() = {
            extern "C" fn on_module_load() {
                $hook.on_event($crate::attach::AttachReason::ProcessAttach);
            }
            on_module_load
        };

        #[cfg(windows)]
        #[used]
        #[unsafe(link_section = ".CRT$XLB")]
        static __ATTACH_HOOK_TLS_CALLBACK: unsafe extern "system" fn(
            *mut ::core::ffi::c_void,
            u32,
            *mut ::core::ffi::c_void,
        ) = {
            unsafe extern "system" fn on_tls_callback(
                _module: *mut ::core::ffi::c_void,
                reason: u32,
                _reserved: *mut ::core::ffi::c_void,
            ) {
                $hook.on_event($crate::attach::AttachReason::from_raw(reason));
            }
            on_tls_callback
        };
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_codes() {
        assert_eq!(AttachReason::from_raw(0), AttachReason::ProcessDetach);
        assert_eq!(AttachReason::from_raw(1), AttachReason::ProcessAttach);
        assert_eq!(AttachReason::from_raw(2), AttachReason::ThreadAttach);
        assert_eq!(AttachReason::from_raw(3), AttachReason::ThreadDetach);
        assert_eq!(AttachReason::from_raw(9), AttachReason::Other(9));
    }

    #[test]
    fn fires_once_on_process_attach() {
        let hook = AttachHook::new(TLS_CALLBACK_NAME);
        let mut out = Vec::new();
        assert!(hook.on_event_with(AttachReason::ProcessAttach, &mut out).unwrap());
        assert!(!hook.on_event_with(AttachReason::ProcessAttach, &mut out).unwrap());
        assert!(hook.has_fired());
        assert_eq!(String::from_utf8(out).unwrap(), "TLS callback 1\n");
    }

    #[test]
    fn ignores_thread_and_detach_events() {
        let hook = AttachHook::new(TLS_CALLBACK_NAME);
        let mut out = Vec::new();
        for reason in [
            AttachReason::ThreadAttach,
            AttachReason::ThreadDetach,
            AttachReason::ProcessDetach,
            AttachReason::Other(7),
        ] {
            assert!(!hook.on_event_with(reason, &mut out).unwrap());
        }
        assert!(!hook.has_fired());
        assert!(out.is_empty());
    }

    #[test]
    fn explicit_attach_is_skipped_after_loader_attach() {
        let hook = AttachHook::new(TLS_CALLBACK_NAME);
        let mut out = Vec::new();
        hook.on_event_with(AttachReason::ProcessAttach, &mut out).unwrap();
        assert!(!hook.ensure_attached_with(&mut out).unwrap());
        assert_eq!(out.iter().filter(|&&b| b == b'\n').count(), 1);
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failed_write_leaves_hook_unfired() {
        let hook = AttachHook::new(TLS_CALLBACK_NAME);
        let error = hook
            .on_event_with(AttachReason::ProcessAttach, &mut BrokenPipe)
            .unwrap_err();
        assert_eq!(error.kind(), std::io::ErrorKind::BrokenPipe);
        assert!(!hook.has_fired());

        // The explicit attach from `main` gets another go.
        let mut out = Vec::new();
        assert!(hook.ensure_attached_with(&mut out).unwrap());
        assert!(hook.has_fired());
        assert_eq!(String::from_utf8(out).unwrap(), "TLS callback 1\n");
    }

    #[test]
    fn explicit_attach_fires_when_loader_did_not() {
        let hook = AttachHook::new("custom hook");
        let mut out = Vec::new();
        assert!(hook.ensure_attached_with(&mut out).unwrap());
        assert!(!hook.ensure_attached_with(&mut out).unwrap());
        assert_eq!(String::from_utf8(out).unwrap(), "custom hook\n");
    }
}
