//! Tracing subscriber setup.
//!
//! The terminal UI owns stdout, so log output goes to a file instead.
//! Verbosity follows `RUST_LOG` and defaults to [`DEFAULT_FILTER`].

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::{BankviewError, Result};

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "info";

/// Installs the global subscriber, appending to `log_file`.
///
/// # Errors
///
/// Returns [`BankviewError::Io`] if the file cannot be opened or a global
/// subscriber is already installed.
pub fn init(log_file: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .map_err(|e| {
            BankviewError::Io(format!(
                "failed to open log file {}: {e}",
                log_file.display()
            ))
        })?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .with_target(true)
        .try_init()
        .map_err(|e| BankviewError::Io(format!("failed to install log subscriber: {e}")))
}
