//! Periodic wake-ups toward a deadline.
//!
//! Ticks carry no remaining-time payload. The engine recomputes remaining
//! time from its own armed deadline on every tick, so a tick that was
//! already queued when the schedule was cancelled or re-armed can only
//! cause a redundant recompute, never a stale expiry.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::debug;

use super::clock::Clock;

/// Default wake-up period.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub at: DateTime<Utc>,
}

/// Something that wakes the engine up until a deadline passes.
pub trait TickSource: Send {
    /// Schedule ticks until `deadline`, replacing any existing schedule.
    fn arm(&mut self, deadline: DateTime<Utc>);

    /// Stop ticking. Safe to call when nothing is armed.
    fn cancel(&mut self);

    fn is_armed(&self) -> bool;
}

/// Tokio-backed ticker feeding an unbounded channel.
///
/// Must be armed from inside a tokio runtime.
pub struct IntervalTicker {
    clock: Arc<dyn Clock>,
    period: Duration,
    tx: mpsc::UnboundedSender<Tick>,
    handle: Option<JoinHandle<()>>,
}

impl IntervalTicker {
    pub fn new(clock: Arc<dyn Clock>, period: Duration) -> (Self, mpsc::UnboundedReceiver<Tick>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                clock,
                period,
                tx,
                handle: None,
            },
            rx,
        )
    }
}

impl TickSource for IntervalTicker {
    fn arm(&mut self, deadline: DateTime<Utc>) {
        self.cancel();

        let clock = self.clock.clone();
        let tx = self.tx.clone();
        let period = self.period;

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let now = clock.now();
                if tx.send(Tick { at: now }).is_err() {
                    break;
                }
                if now >= deadline {
                    break;
                }
            }
        });

        debug!(%deadline, "ticker armed");
        self.handle = Some(handle);
    }

    fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("ticker cancelled");
        }
    }

    fn is_armed(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for IntervalTicker {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Ticker that only records what it was asked to do; the test drives
/// ticks by calling the engine directly. Clones share the record.
#[derive(Debug, Clone, Default)]
pub struct ManualTicker {
    inner: Arc<Mutex<ManualTickerState>>,
}

#[derive(Debug, Default)]
struct ManualTickerState {
    deadline: Option<DateTime<Utc>>,
    arm_count: usize,
}

impl ManualTicker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.lock().deadline
    }

    pub fn arm_count(&self) -> usize {
        self.lock().arm_count
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualTickerState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TickSource for ManualTicker {
    fn arm(&mut self, deadline: DateTime<Utc>) {
        let mut state = self.lock();
        state.deadline = Some(deadline);
        state.arm_count += 1;
    }

    fn cancel(&mut self) {
        self.lock().deadline = None;
    }

    fn is_armed(&self) -> bool {
        self.lock().deadline.is_some()
    }
}
