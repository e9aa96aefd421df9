//! Loads a dynamic library and calls a named export with no arguments. Exits with the platform's
//! error code if either step fails.

use libfixture::args::Action;
use libfixture::args::InvokerArgs;
use libfixture::error::Result;

fn main() {
    if let Err(error) = run() {
        libfixture::error::report_error_and_exit(&error)
    }
}

fn run() -> Result {
    libfixture::init_tracing()?;

    match InvokerArgs::from_env().action() {
        Action::PrintUsage => {
            println!("{}", InvokerArgs::usage());
        }
        Action::Invoke { library, export } => {
            // Safety: Whoever invokes this tool is responsible for naming an export that can be
            // called with no arguments.
            unsafe { libfixture::invoker::invoke(&library, &export) }?;
        }
    }
    Ok(())
}
