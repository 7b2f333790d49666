//! Core error types for tomatobar-core.
//!
//! Only structural misuse is an error here. Ordinary timing variance
//! (missed ticks, overruns, an unanswered return-to-work prompt) is handled
//! inside the state machine and never surfaces as `Err`.

use std::path::PathBuf;
use thiserror::Error;

use crate::timer::{State, TimerEvent};

/// Core error type for tomatobar-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// An event arrived that has no route out of the current state.
    /// Fatal: the caller is driving the machine incorrectly.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(#[from] TransitionError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A command was well-formed but cannot be honored right now.
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// The owner task is gone; commands can no longer be delivered.
    #[error("Timer service has stopped")]
    ServiceStopped,

    /// Command URL could not be understood
    #[error("URL error: {0}")]
    Url(#[from] UrlCommandError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// No guarded route matches `event` in `state`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("no transition for event {event:?} in state {state:?}")]
pub struct TransitionError {
    pub state: State,
    pub event: TimerEvent,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown dot-path key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Errors from parsing a `tomatobar://` command URL.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UrlCommandError {
    #[error("cannot parse url: {0}")]
    Malformed(String),

    #[error("unknown scheme {0}")]
    UnknownScheme(String),

    #[error("url has no command host")]
    MissingCommand,

    #[error("unknown command {0}")]
    UnknownCommand(String),
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
