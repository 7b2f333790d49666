//! Outbound hooks to the notification and audio collaborators.
//!
//! All calls are fire-and-forget. Implementations must not call back into
//! the engine synchronously; answers (such as a skip-rest action or a
//! return-to-work confirmation) come back as ordinary commands.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationCategory {
    WorkFinished,
    RestStarted,
    RestFinished,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub category: NotificationCategory,
}

impl Notification {
    pub fn new(
        title: impl Into<String>,
        body: impl Into<String>,
        category: NotificationCategory,
    ) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            category,
        }
    }
}

/// Action reported back by the notification collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationAction {
    SkipRest,
}

pub trait Notifier: Send {
    fn send(&self, notification: Notification);

    /// Ask the user to confirm going back to work within `countdown`.
    /// The answer arrives through the engine's return-to-work resolution.
    fn request_return_confirmation(&self, _countdown: Duration, _goal: &str) {
        // default no-op
    }
}

pub trait Player: Send {
    fn play_windup(&self);
    fn start_ticking(&self);
    fn stop_ticking(&self);
    fn play_ding(&self);
}

/// Collaborator that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;

impl Notifier for Silent {
    fn send(&self, _notification: Notification) {}
}

impl Player for Silent {
    fn play_windup(&self) {}
    fn start_ticking(&self) {}
    fn stop_ticking(&self) {}
    fn play_ding(&self) {}
}

/// Everything a [`Recorder`] has been asked to do, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackEntry {
    Windup,
    StartTicking,
    StopTicking,
    Ding,
    Notification(Notification),
    ReturnPrompt { countdown: Duration, goal: String },
}

/// Collaborator that keeps a shared transcript. Clones share it, so one
/// copy can be handed to the engine and another kept for inspection.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    entries: Arc<Mutex<Vec<FeedbackEntry>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<FeedbackEntry> {
        self.lock().clone()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.lock()
            .iter()
            .filter_map(|entry| match entry {
                FeedbackEntry::Notification(n) => Some(n.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn push(&self, entry: FeedbackEntry) {
        self.lock().push(entry);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<FeedbackEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Notifier for Recorder {
    fn send(&self, notification: Notification) {
        self.push(FeedbackEntry::Notification(notification));
    }

    fn request_return_confirmation(&self, countdown: Duration, goal: &str) {
        self.push(FeedbackEntry::ReturnPrompt {
            countdown,
            goal: goal.to_string(),
        });
    }
}

impl Player for Recorder {
    fn play_windup(&self) {
        self.push(FeedbackEntry::Windup);
    }
    fn start_ticking(&self) {
        self.push(FeedbackEntry::StartTicking);
    }
    fn stop_ticking(&self) {
        self.push(FeedbackEntry::StopTicking);
    }
    fn play_ding(&self) {
        self.push(FeedbackEntry::Ding);
    }
}
