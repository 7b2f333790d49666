mod config;
pub mod event_log;

pub use config::{Config, TimerConfig};
pub use event_log::{EventLogWriter, EventSink, JsonlEventLog, LogSnapshot, MemoryEventLog};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns the directory holding `config.toml` and the event log.
///
/// `TOMATOBAR_HOME` overrides the location outright. Otherwise this is
/// `~/.config/tomatobar[-dev]/`, with `TOMATOBAR_ENV=dev` selecting the
/// development directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("TOMATOBAR_HOME") {
        Some(home) if !home.is_empty() => PathBuf::from(home),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("TOMATOBAR_ENV").unwrap_or_else(|_| "production".to_string());

            if env == "dev" {
                base_dir.join("tomatobar-dev")
            } else {
                base_dir.join("tomatobar")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}

/// Location of the append-only event log.
pub fn log_path() -> Result<PathBuf, ConfigError> {
    Ok(data_dir()?.join("tomatobar.log"))
}
