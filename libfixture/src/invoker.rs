//! Loads a dynamic library and calls one of its exports. This backs the `invoke-export` tool that
//! test runners use to check that a library can be loaded and its exports resolved.

use crate::loader;
use std::ffi::c_void;
use std::fmt::Display;
use std::marker::PhantomData;
use std::path::Path;
use std::path::PathBuf;
use std::ptr::NonNull;

/// Which step of loading or resolving failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    Resolve,
}

/// A failure to load a library or find an export in it. Carries the platform's error code, which
/// the CLI uses as its exit status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeError {
    stage: Stage,
    code: i32,
    detail: String,
}

/// A platform loader failure before it's attributed to a stage.
pub(crate) struct LoaderFailure {
    pub(crate) code: i32,
    pub(crate) detail: String,
}

/// A loaded dynamic library. Unloaded on drop.
pub struct Library {
    handle: loader::Handle,
    path: PathBuf,
}

/// The address of a resolved export. Borrows the library so that it can't outlive it.
pub struct Export<'lib> {
    name: String,
    address: NonNull<c_void>,
    _library: PhantomData<&'lib Library>,
}

impl InvokeError {
    #[must_use]
    pub fn new(stage: Stage, code: i32, detail: impl Into<String>) -> Self {
        Self {
            stage,
            code,
            detail: detail.into(),
        }
    }

    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// The platform error code. Never zero, so it's always usable as a failing exit status.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        if self.code == 0 {
            crate::error::GENERIC_FAILURE_EXIT_CODE
        } else {
            self.code
        }
    }

    #[must_use]
    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl Display for InvokeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let what = match self.stage {
            Stage::Load => "failed to load library",
            Stage::Resolve => "failed to resolve export",
        };
        write!(f, "{what}: {} (error code {})", self.detail, self.code)
    }
}

impl core::error::Error for InvokeError {}

impl Library {
    #[tracing::instrument(name = "Load library")]
    pub fn open(path: &Path) -> Result<Self, InvokeError> {
        let handle = loader::open(path).map_err(|failure| {
            InvokeError::new(
                Stage::Load,
                failure.code,
                format!("`{}`: {}", path.display(), failure.detail),
            )
        })?;
        tracing::debug!("Library loaded");
        Ok(Library {
            handle,
            path: path.to_owned(),
        })
    }

    #[tracing::instrument(
        skip(self),
        name = "Resolve export",
        fields(library = %self.path.display())
    )]
    pub fn resolve(&self, name: &str) -> Result<Export<'_>, InvokeError> {
        let address = loader::symbol(&self.handle, name).map_err(|failure| {
            InvokeError::new(
                Stage::Resolve,
                failure.code,
                format!(
                    "`{name}` in `{}`: {}",
                    self.path.display(),
                    failure.detail
                ),
            )
        })?;
        tracing::debug!(address = ?address, "Export resolved");
        Ok(Export {
            name: name.to_owned(),
            address,
            _library: PhantomData,
        })
    }
}

impl Export<'_> {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn address(&self) -> NonNull<c_void> {
        self.address
    }

    /// Calls the export as a function taking no arguments. Whatever it returns is ignored.
    ///
    /// # Safety
    /// The export must be a function using the C calling convention that is sound to call with no
    /// arguments. Calling an export that's actually data, or that expects arguments, is undefined
    /// behaviour.
    pub unsafe fn call(&self) {
        // Safety: The caller guarantees that the address is a nullary extern "C" function. Any
        // return value left in registers is simply never read.
        let function: extern "C" fn() =
            unsafe { std::mem::transmute::<*mut c_void, extern "C" fn()>(self.address.as_ptr()) };
        function();
    }
}

/// Loads `library`, resolves `export` and calls it with no arguments.
///
/// # Safety
/// See [`Export::call`].
pub unsafe fn invoke(library: &Path, export: &str) -> Result<(), InvokeError> {
    let library = Library::open(library)?;
    let export = library.resolve(export)?;
    tracing::info!(export = export.name(), "Invoking export");
    // Safety: Forwarded to our caller.
    unsafe { export.call() };
    Ok(())
}
