use thiserror::Error;
use tracing::debug;

/// Fatal startup failures; the process aborts before any state exists.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("another window manager is already running")]
    OtherWmRunning,
    #[error("could not acquire the WM_S{0} manager selection")]
    SelectionRefused(usize),
}

/// Log and ignore X11 errors (for cleanup operations and stale windows).
pub fn log_and_ignore<T, E: std::fmt::Display>(result: Result<T, E>, operation: &str) {
    if let Err(e) = result {
        debug!("Ignoring error in {}: {}", operation, e);
    }
}
