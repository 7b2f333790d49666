//! States, events and the transition table.
//!
//! ```text
//!                  start/stop
//!        +--------------+-------------+
//!        |              |             |
//!        |  start/stop  |  timerFired |
//!        V    |         |    |        |
//!  +--------+ |  +--------+  | +--------+
//!  | idle   |--->| work   |--->| rest   |
//!  +--------+    +--------+    +--------+
//!    A                  A        |    |
//!    |                  +--------+    |
//!    |   timerFired (continue)        |
//!    |   skipRest                     |
//!    +--------------------------------+
//!       timerFired (stop after break / cycle done)
//!
//!   work <--- pause ---> paused <--- pause ---> rest
//! ```
//!
//! [`next_state`] is the whole table: a pure function of the current state,
//! the event, and a read-only view of the session and configuration.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TransitionError;
use crate::storage::TimerConfig;
use crate::timestamps::duration_seconds;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    #[default]
    Idle,
    Work,
    Rest,
    Paused,
}

impl State {
    pub const ALL: [State; 4] = [State::Idle, State::Work, State::Rest, State::Paused];

    pub fn as_str(&self) -> &'static str {
        match self {
            State::Idle => "idle",
            State::Work => "work",
            State::Rest => "rest",
            State::Paused => "paused",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimerEvent {
    StartStop,
    /// The armed interval ran out.
    TimerFired,
    SkipRest,
    /// Pause when running, resume when paused.
    Pause,
}

impl TimerEvent {
    pub const ALL: [TimerEvent; 4] = [
        TimerEvent::StartStop,
        TimerEvent::TimerFired,
        TimerEvent::SkipRest,
        TimerEvent::Pause,
    ];
}

/// Mutable bookkeeping owned by the engine for the life of the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub current_goal: String,
    /// A goal has been declared.
    pub is_in_tomato_cycle: bool,
    /// A work interval for the declared goal has actually been started.
    pub tomato_cycle_started: bool,
    pub is_dash_mode: bool,
    pub dash_duration_minutes: u32,
    /// Completed work intervals since the last long rest.
    pub consecutive_work_intervals: u32,
    pub is_long_break: bool,
    pub paused_from: Option<State>,
    #[serde(with = "duration_seconds")]
    pub remaining_when_paused: TimeDelta,
}

impl Session {
    pub fn new(config: &TimerConfig) -> Self {
        Self {
            current_goal: String::new(),
            is_in_tomato_cycle: false,
            tomato_cycle_started: false,
            is_dash_mode: false,
            dash_duration_minutes: config.work_interval_minutes,
            consecutive_work_intervals: 0,
            is_long_break: false,
            paused_from: None,
            remaining_when_paused: TimeDelta::zero(),
        }
    }

    /// Forget the declared goal and any dash.
    pub(crate) fn reset_cycle(&mut self) {
        self.current_goal.clear();
        self.is_in_tomato_cycle = false;
        self.tomato_cycle_started = false;
        self.is_dash_mode = false;
    }
}

/// Resolve `event` in `state`. Guards are evaluated in table order; the
/// first match wins. An event with no route is a [`TransitionError`].
pub fn next_state(
    state: State,
    event: TimerEvent,
    session: &Session,
    config: &TimerConfig,
) -> Result<State, TransitionError> {
    use State::*;
    use TimerEvent::*;

    let next = match (state, event) {
        (Idle, StartStop) => Some(Work),
        (Work | Rest | Paused, StartStop) => Some(Idle),
        (Work | Rest, Pause) => Some(Paused),
        (Paused, Pause) => session.paused_from.filter(|s| matches!(s, Work | Rest)),
        (Work, TimerFired) if session.is_dash_mode => Some(Idle),
        (Work, TimerFired) => Some(Rest),
        (Rest, TimerFired)
            if config.stop_after_break
                || (session.is_long_break && session.is_in_tomato_cycle) =>
        {
            Some(Idle)
        }
        (Rest, TimerFired) => Some(Work),
        (Rest, SkipRest) => Some(Work),
        _ => None,
    };

    next.ok_or(TransitionError { state, event })
}
