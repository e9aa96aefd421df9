//! Spawns a handful of threads that each print and then bump their own copy of some thread-local
//! state. A hook registered with the loader prints once when the program is loaded, before any of
//! that happens.

use libfixture::AttachHook;
use libfixture::Config;
use libfixture::Launcher;
use libfixture::attach::TLS_CALLBACK_NAME;
use libfixture::error::Result;
use std::io::Read as _;
use std::io::Write as _;
use std::sync::Mutex;

static ATTACH_HOOK: AttachHook = AttachHook::new(TLS_CALLBACK_NAME);

libfixture::register_attach_hook!(ATTACH_HOOK);

fn main() {
    if let Err(error) = run() {
        libfixture::error::report_error_and_exit(&error)
    }
}

fn run() -> Result {
    libfixture::init_tracing()?;

    // Normally a no-op, since the loader has already called the hook.
    ATTACH_HOOK.ensure_attached()?;

    let config = Config::from_env()?;
    tracing::debug!(?config, "Starting");

    let stdout = Mutex::new(std::io::stdout());
    let summary = Launcher::new(config.worker_count).run(&stdout)?;
    tracing::info!(workers = summary.reports.len(), "Workers finished");

    if config.pause_before_exit {
        pause()?;
    }
    Ok(())
}

fn pause() -> Result {
    let mut stdout = std::io::stdout().lock();
    write!(stdout, "Press any key to continue . . . ")?;
    stdout.flush()?;
    let mut byte = [0u8; 1];
    // EOF counts as a key press.
    let _ = std::io::stdin().read(&mut byte)?;
    writeln!(stdout)?;
    Ok(())
}
