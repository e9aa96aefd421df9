use crate::invoker::InvokeError;
use std::fmt::Display;

pub use anyhow::Error;

pub type Result<T = (), E = Error> = core::result::Result<T, E>;

/// Exit code used for errors that don't carry a platform error code of their own.
pub const GENERIC_FAILURE_EXIT_CODE: i32 = 1;

/// An error indicating that we attempted to initialise global state that can only be initialised
/// once.
#[derive(Debug, Clone, Copy)]
pub struct AlreadyInitialised;

impl Display for AlreadyInitialised {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Attempted to initialise global state more than once")
    }
}

impl core::error::Error for AlreadyInitialised {}

/// Returns the process exit code that should be used for `error`. If a failure to load a library
/// or resolve an export is anywhere in the chain, that carries the platform's error code.
#[must_use]
pub fn exit_code_for(error: &Error) -> i32 {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<InvokeError>())
        .map_or(GENERIC_FAILURE_EXIT_CODE, InvokeError::exit_code)
}

/// Prints `error` with its full chain of causes to stderr, then exits.
pub fn report_error_and_exit(error: &Error) -> ! {
    eprintln!("error: {error:?}");
    std::process::exit(exit_code_for(error));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoker::Stage;
    use anyhow::Context as _;

    #[test]
    fn plain_errors_use_generic_code() {
        let error = anyhow::anyhow!("something went wrong");
        assert_eq!(exit_code_for(&error), GENERIC_FAILURE_EXIT_CODE);
    }

    #[test]
    fn invoke_errors_propagate_their_code_through_context() {
        let result: Result = Err(InvokeError::new(Stage::Resolve, 127, "no such symbol").into());
        let error = result.context("Running export").unwrap_err();
        assert_eq!(exit_code_for(&error), 127);
    }
}
