//! # TomatoBar Core Library
//!
//! This library provides the core logic for the TomatoBar Pomodoro timer.
//! Front ends (the bundled CLI, or any menu-bar shell) only send commands
//! and render state; everything else lives here.
//!
//! ## Architecture
//!
//! - **Timer Engine**: a guarded state machine over `idle`, `work`, `rest`
//!   and `paused`, driven by a wall-clock deadline and ~1 Hz ticks
//! - **Timer Service**: a single tokio task owning the engine, fed through a
//!   command channel
//! - **Storage**: TOML configuration and an append-only JSON-lines event log
//! - **Stats**: productivity statistics derived from a log snapshot
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: Core timer state machine
//! - [`TimerService`]: Owner loop and [`TimerHandle`] for front ends
//! - [`Config`]: Application configuration management
//! - [`ProductivityAnalyzer`]: Per-period time and outcome statistics

pub mod error;
pub mod events;
pub mod stats;
pub mod storage;
pub mod timer;
pub mod timestamps;
pub mod url_command;

pub use error::{ConfigError, CoreError, TransitionError, UrlCommandError};
pub use events::{LogEvent, Outcome, TransitionRecord};
pub use stats::{Period, ProductivityAnalyzer, ProductivityStats};
pub use storage::{Config, JsonlEventLog, LogSnapshot, TimerConfig};
pub use timer::{State, TimerEngine, TimerEvent, TimerHandle, TimerService};
pub use url_command::{parse_command_url, UrlCommand};
