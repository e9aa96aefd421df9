//! A shared library whose only job is to have exports. Loaders, linkers and binary readers are
//! tested against it: it exports a type constructor, a mutable global and a function.
//!
//! Everything here uses unmangled names and the C ABI so that the exports look the same as they
//! would from any other language.

use std::ffi::c_int;
use std::sync::atomic::AtomicI32;

/// Value returned by [`fixture_function`].
pub const FIXTURE_FUNCTION_RESULT: c_int = 42;

/// The exported type. Foreign callers allocate it and run [`fixture_object_construct`] on the
/// storage, as they would a C++ constructor.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FixtureObject {
    pub value: c_int,
}

/// Constructs a [`FixtureObject`] in place and returns `this`, the way a C++ constructor does. A
/// null `this` is returned unchanged.
///
/// # Safety
/// `this` must be null or valid for writes of a `FixtureObject`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fixture_object_construct(this: *mut FixtureObject) -> *mut FixtureObject {
    if !this.is_null() {
        // Safety: Non-null and the caller guarantees it's valid for writes.
        unsafe { this.write(FixtureObject::default()) };
    }
    this
}

/// A mutable global. `AtomicI32` has the same layout as a C `int`, so foreign code can read and
/// write it through the exported symbol directly.
#[unsafe(no_mangle)]
#[allow(non_upper_case_globals)]
pub static fixture_global: AtomicI32 = AtomicI32::new(0);

#[unsafe(no_mangle)]
pub extern "C" fn fixture_function() -> c_int {
    FIXTURE_FUNCTION_RESULT
}
