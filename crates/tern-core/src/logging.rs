use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Errors from [`log_to_file`].
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// The log file could not be opened.
    #[error("failed to open log file: {0}")]
    Io(#[from] std::io::Error),
    /// A global subscriber is already installed.
    #[error("failed to install log subscriber: {0}")]
    Init(String),
}

/// Send the runtime's `tracing` output to a file.
///
/// A TUI owns the terminal, so logs can't go to stdout or stderr without
/// corrupting the screen. This installs a global `fmt` subscriber that
/// appends plain (non-ANSI) lines to `path`. The level is taken from
/// `RUST_LOG` and defaults to `info`; use `RUST_LOG=tern_core=debug` to see
/// loop phases, subscription restarts and dropped key reads.
///
/// # Example
///
/// ```no_run
/// tern_core::logging::log_to_file("debug.log").unwrap();
/// tracing::info!("started");
/// ```
pub fn log_to_file(path: impl AsRef<Path>) -> Result<(), LoggingError> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| LoggingError::Init(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_events_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tern.log");

        log_to_file(&path).unwrap();
        tracing::warn!("written to the log file");

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("written to the log file"));
        assert!(!content.contains('\u{1b}'));

        // Only one global subscriber can be installed.
        let second = log_to_file(dir.path().join("other.log"));
        assert!(matches!(second, Err(LoggingError::Init(_))));
    }

    #[test]
    fn unopenable_path_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = log_to_file(dir.path().join("missing").join("tern.log"));
        assert!(matches!(result, Err(LoggingError::Io(_))));
    }
}
