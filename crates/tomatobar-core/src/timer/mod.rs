mod clock;
mod engine;
mod feedback;
mod service;
mod state;
mod ticker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{EngineSnapshot, PendingReturn, TickOutcome, TimerEngine};
pub use feedback::{
    FeedbackEntry, Notification, NotificationAction, NotificationCategory, Notifier, Player,
    Recorder, Silent,
};
pub use service::{Command, TimerHandle, TimerService};
pub use state::{next_state, Session, State, TimerEvent};
pub use ticker::{IntervalTicker, ManualTicker, Tick, TickSource, TICK_PERIOD};
