use error::AlreadyInitialised;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub mod args;
pub mod attach;
pub mod config;
pub mod error;
pub mod invoker;
pub mod launcher;
#[cfg(unix)]
#[path = "loader_unix.rs"]
pub(crate) mod loader;
#[cfg(windows)]
#[path = "loader_windows.rs"]
pub(crate) mod loader;
pub mod thread_id;
pub mod tls;
pub mod worker;

pub use attach::AttachHook;
pub use config::Config;
pub use launcher::Launcher;

/// Sets up logging, filtered by `RUST_LOG`. Logs go to stderr, since stdout carries the output
/// that test runners inspect.
pub fn init_tracing() -> Result<(), AlreadyInitialised> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .map_err(|_| AlreadyInitialised)
}
