use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::{State, TimerEvent};
use crate::timestamps::epoch_seconds;

/// One state machine transition. Never mutated once written.
///
/// The engine always writes every field; only `timestamp` and `toState`
/// are needed to read a line back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRecord {
    #[serde(with = "epoch_seconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_state: Option<State>,
    pub to_state: State,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<TimerEvent>,
}

impl TransitionRecord {
    pub fn new(timestamp: DateTime<Utc>, from: State, to: State, event: TimerEvent) -> Self {
        Self {
            timestamp,
            from_state: Some(from),
            to_state: to,
            event: Some(event),
        }
    }
}

/// Every line of the event log is one of these, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum LogEvent {
    /// A front end booted the engine.
    AppStart {
        #[serde(with = "epoch_seconds")]
        timestamp: DateTime<Utc>,
    },
    Transition(TransitionRecord),
    /// A tomato cycle reached its long break.
    TomatoCompleted {
        #[serde(default)]
        goal: String,
        #[serde(with = "epoch_seconds")]
        timestamp: DateTime<Utc>,
    },
    /// A started tomato cycle was stopped before completing.
    TomatoFailed {
        #[serde(default)]
        goal: String,
        #[serde(with = "epoch_seconds")]
        timestamp: DateTime<Utc>,
    },
    DashCompleted {
        #[serde(default)]
        goal: String,
        #[serde(with = "epoch_seconds")]
        timestamp: DateTime<Utc>,
    },
}

/// Outcome events counted by the productivity analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Outcome {
    TomatoCompleted,
    TomatoFailed,
    DashCompleted,
}

impl LogEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            LogEvent::AppStart { timestamp }
            | LogEvent::TomatoCompleted { timestamp, .. }
            | LogEvent::TomatoFailed { timestamp, .. }
            | LogEvent::DashCompleted { timestamp, .. } => *timestamp,
            LogEvent::Transition(record) => record.timestamp,
        }
    }

    pub(crate) fn set_timestamp(&mut self, at: DateTime<Utc>) {
        match self {
            LogEvent::AppStart { timestamp }
            | LogEvent::TomatoCompleted { timestamp, .. }
            | LogEvent::TomatoFailed { timestamp, .. }
            | LogEvent::DashCompleted { timestamp, .. } => *timestamp = at,
            LogEvent::Transition(record) => record.timestamp = at,
        }
    }

    pub fn as_transition(&self) -> Option<&TransitionRecord> {
        match self {
            LogEvent::Transition(record) => Some(record),
            _ => None,
        }
    }

    pub fn outcome(&self) -> Option<Outcome> {
        match self {
            LogEvent::TomatoCompleted { .. } => Some(Outcome::TomatoCompleted),
            LogEvent::TomatoFailed { .. } => Some(Outcome::TomatoFailed),
            LogEvent::DashCompleted { .. } => Some(Outcome::DashCompleted),
            _ => None,
        }
    }

    pub fn goal(&self) -> Option<&str> {
        match self {
            LogEvent::TomatoCompleted { goal, .. }
            | LogEvent::TomatoFailed { goal, .. }
            | LogEvent::DashCompleted { goal, .. } => Some(goal),
            _ => None,
        }
    }
}
