//! Command-line arguments for `invoke-export`.
//!
//! Both positionals are optional as far as clap is concerned. A run with fewer than two arguments
//! isn't an error for this tool: it prints usage and exits successfully, so test runners can probe
//! it without arguments.

use clap::CommandFactory as _;
use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;

#[derive(Parser, Debug, Default, Clone)]
#[command(
    name = "invoke-export",
    version,
    about = "Loads a dynamic library and calls one of its exports with no arguments"
)]
pub struct InvokerArgs {
    /// Path to the dynamic library to load.
    pub library: Option<PathBuf>,

    /// Name of the exported function to call.
    pub export: Option<String>,
}

/// What `invoke-export` should do.
#[derive(Debug, PartialEq, Eq)]
pub enum Action {
    PrintUsage,
    Invoke { library: PathBuf, export: String },
}

impl InvokerArgs {
    #[must_use]
    pub fn from_env() -> Self {
        Self::parse()
    }

    pub fn try_from_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Self::try_parse_from(args)
    }

    #[must_use]
    pub fn action(self) -> Action {
        match (self.library, self.export) {
            (Some(library), Some(export)) => Action::Invoke { library, export },
            _ => Action::PrintUsage,
        }
    }

    #[must_use]
    pub fn usage() -> String {
        Self::command().render_usage().to_string()
    }
}
