//! Interval state machine.
//!
//! The engine owns the session, the armed deadline and the collaborators.
//! It does not spawn anything itself: ticks and commands are fed in by a
//! single owner (see [`super::service::TimerService`]), so no two calls ever
//! touch the session at the same time.
//!
//! ## Transition order
//!
//! ```text
//! guard (next_state) -> finish handlers -> end handlers -> entry handlers -> log record
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::new(config, clock, Box::new(ticker), Box::new(log));
//! engine.start_with_goal("write the report", false, None)?;
//! // on every tick:
//! engine.on_tick()?;
//! ```

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::clock::Clock;
use super::feedback::{Notification, NotificationAction, NotificationCategory, Notifier, Player, Silent};
use super::state::{next_state, Session, State, TimerEvent};
use super::ticker::TickSource;
use crate::error::{CoreError, Result};
use crate::events::{LogEvent, TransitionRecord};
use crate::storage::{EventLogWriter, EventSink, TimerConfig};

/// Rest finished and the engine is waiting for the user to confirm going
/// back to work. The state stays `Rest` meanwhile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingReturn {
    pub requested_at: DateTime<Utc>,
    pub countdown_seconds: u32,
}

impl PendingReturn {
    pub fn countdown(&self) -> Duration {
        Duration::from_secs(self.countdown_seconds as u64)
    }
}

/// What a tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing is armed (idle, paused, or awaiting return confirmation).
    Unarmed,
    Remaining(TimeDelta),
    /// The interval ran out and `event` moved the machine to `state`.
    Fired { event: TimerEvent, state: State },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSnapshot {
    pub state: State,
    /// Seconds left in the current interval, if one is armed or paused.
    pub remaining_secs: Option<i64>,
    pub session: Session,
    pub return_pending: bool,
    pub last_completed_goal: Option<String>,
    pub at: DateTime<Utc>,
}

/// Core interval state machine.
pub struct TimerEngine {
    config: TimerConfig,
    state: State,
    session: Session,
    deadline: Option<DateTime<Utc>>,
    pending_return: Option<PendingReturn>,
    last_completed_goal: Option<String>,
    clock: Arc<dyn Clock>,
    ticker: Box<dyn TickSource>,
    log: EventLogWriter,
    notifier: Box<dyn Notifier>,
    player: Box<dyn Player>,
}

impl TimerEngine {
    /// Create an idle engine with silent collaborators.
    pub fn new(
        config: TimerConfig,
        clock: Arc<dyn Clock>,
        ticker: Box<dyn TickSource>,
        log: Box<dyn EventSink>,
    ) -> Self {
        let session = Session::new(&config);
        Self {
            config,
            state: State::Idle,
            session,
            deadline: None,
            pending_return: None,
            last_completed_goal: None,
            clock,
            ticker,
            log: EventLogWriter::new(log),
            notifier: Box::new(Silent),
            player: Box::new(Silent),
        }
    }

    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_player(mut self, player: Box<dyn Player>) -> Self {
        self.player = player;
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> State {
        self.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn config(&self) -> &TimerConfig {
        &self.config
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    pub fn pending_return(&self) -> Option<&PendingReturn> {
        self.pending_return.as_ref()
    }

    /// Goal of the most recently completed tomato, offered for "continue".
    pub fn last_completed_goal(&self) -> Option<&str> {
        self.last_completed_goal.as_deref()
    }

    /// Time left in the current interval. Negative once overdue.
    pub fn remaining(&self) -> Option<TimeDelta> {
        match self.state {
            State::Paused => Some(self.session.remaining_when_paused),
            _ => self.deadline.map(|deadline| deadline - self.clock.now()),
        }
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            state: self.state,
            remaining_secs: self.remaining().map(|r| r.num_seconds()),
            session: self.session.clone(),
            return_pending: self.pending_return.is_some(),
            last_completed_goal: self.last_completed_goal.clone(),
            at: self.clock.now(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn record_app_start(&mut self) {
        let timestamp = self.clock.now();
        self.record(LogEvent::AppStart { timestamp });
    }

    pub fn start_stop(&mut self) -> Result<State> {
        self.fire(TimerEvent::StartStop)
    }

    pub fn pause(&mut self) -> Result<State> {
        self.fire(TimerEvent::Pause)
    }

    pub fn skip_rest(&mut self) -> Result<State> {
        self.fire(TimerEvent::SkipRest)
    }

    /// Declare a goal and start its first work interval. With `is_dash` the
    /// interval is a single dash of `dash_minutes` (default: the configured
    /// work length) with no rest afterwards.
    pub fn start_with_goal(
        &mut self,
        goal: &str,
        is_dash: bool,
        dash_minutes: Option<u32>,
    ) -> Result<State> {
        if self.state != State::Idle {
            return Err(CoreError::InvalidCommand(format!(
                "cannot declare a goal while {}",
                self.state
            )));
        }
        let goal = goal.trim();
        if goal.is_empty() {
            return Err(CoreError::InvalidCommand("goal must not be empty".into()));
        }

        self.session.current_goal = goal.to_string();
        self.session.is_in_tomato_cycle = true;
        self.session.tomato_cycle_started = true;
        self.session.is_dash_mode = is_dash;
        self.session.dash_duration_minutes = dash_minutes
            .filter(|m| *m > 0)
            .unwrap_or(self.config.work_interval_minutes);
        info!(goal, is_dash, "goal declared");
        self.fire(TimerEvent::StartStop)
    }

    /// Start a new cycle for the goal of the last completed tomato.
    pub fn continue_goal(&mut self) -> Result<State> {
        let goal = self
            .last_completed_goal
            .clone()
            .ok_or_else(|| CoreError::InvalidCommand("no completed goal to continue".into()))?;
        self.start_with_goal(&goal, false, None)
    }

    /// Map an action reported by the notification collaborator.
    pub fn notification_action(&mut self, action: NotificationAction) -> Result<State> {
        match action {
            NotificationAction::SkipRest
                if self.state == State::Rest && self.pending_return.is_none() =>
            {
                self.skip_rest()
            }
            NotificationAction::SkipRest => {
                debug!(state = %self.state, "ignoring skip-rest action outside of rest");
                Ok(self.state)
            }
        }
    }

    /// Answer the return-to-work prompt. Accepting enters work; declining
    /// stops the machine and fails the cycle.
    pub fn resolve_return_to_work(&mut self, accepted: bool) -> Result<State> {
        if self.pending_return.take().is_none() {
            debug!(accepted, "no return-to-work confirmation pending");
            return Ok(self.state);
        }
        if accepted {
            info!("return to work confirmed");
            self.transition(State::Rest, State::Work, TimerEvent::TimerFired);
            Ok(self.state)
        } else {
            info!("return to work declined, stopping");
            self.fire(TimerEvent::StartStop)
        }
    }

    /// The countdown ran out without an answer.
    pub fn expire_return_to_work(&mut self) -> Result<State> {
        self.resolve_return_to_work(false)
    }

    /// Recompute the remaining time and fire the interval if it ran out.
    pub fn on_tick(&mut self) -> Result<TickOutcome> {
        let Some(deadline) = self.deadline else {
            return Ok(TickOutcome::Unarmed);
        };
        let remaining = deadline - self.clock.now();
        if remaining > TimeDelta::zero() {
            return Ok(TickOutcome::Remaining(remaining));
        }

        // A work tick far past the deadline means wake-ups were missed
        // (e.g. system sleep). Stop rather than silently skip a rest.
        let event = if remaining < self.config.overrun_limit() && self.state == State::Work {
            warn!(
                overrun_secs = -remaining.num_seconds(),
                "work interval overran, forcing stop"
            );
            TimerEvent::StartStop
        } else {
            TimerEvent::TimerFired
        };
        let state = self.fire(event)?;
        Ok(TickOutcome::Fired { event, state })
    }

    /// Release the ticker and feedback before the owner goes away.
    pub fn shutdown(&mut self) {
        self.cancel_interval();
        self.player.stop_ticking();
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn fire(&mut self, event: TimerEvent) -> Result<State> {
        if self.pending_return.is_some() {
            if event != TimerEvent::StartStop {
                debug!(?event, "suppressed while return-to-work confirmation is pending");
                return Ok(self.state);
            }
            self.pending_return = None;
        }

        let from = self.state;
        let to = match next_state(from, event, &self.session, &self.config) {
            Ok(to) => to,
            Err(err) => {
                error!(%err, "state machine protocol violation");
                return Err(err.into());
            }
        };

        if from == State::Rest && to == State::Work && event == TimerEvent::TimerFired {
            self.on_rest_finish();
            if self.config.return_to_work_countdown_seconds > 0 && !self.session.is_long_break {
                self.begin_return_countdown();
                return Ok(self.state);
            }
        }

        self.transition(from, to, event);
        Ok(self.state)
    }

    fn transition(&mut self, from: State, to: State, event: TimerEvent) {
        if from == State::Work && to == State::Rest {
            self.on_work_finish();
        }
        if from == State::Work {
            self.player.stop_ticking();
        }

        self.state = to;
        match (from, to) {
            (State::Paused, State::Work | State::Rest) => self.on_resume(to),
            (_, State::Work) => self.on_work_start(),
            (_, State::Rest) => self.on_rest_start(),
            (_, State::Idle) => self.on_idle_start(event),
            (_, State::Paused) => self.on_pause_start(from),
        }

        info!(%from, %to, ?event, "transition");
        let timestamp = self.clock.now();
        self.record(LogEvent::Transition(TransitionRecord::new(timestamp, from, to, event)));
    }

    fn on_work_start(&mut self) {
        self.player.play_windup();
        self.player.start_ticking();
        let length = if self.session.is_dash_mode {
            TimeDelta::minutes(self.session.dash_duration_minutes as i64)
        } else {
            self.config.work_interval()
        };
        self.arm_interval(length);
    }

    fn on_work_finish(&mut self) {
        self.session.consecutive_work_intervals += 1;
        self.player.play_ding();
        self.notifier.send(Notification::new(
            "Work interval finished",
            "Time for a break!",
            NotificationCategory::WorkFinished,
        ));
    }

    fn on_rest_start(&mut self) {
        let (length, body) =
            if self.session.consecutive_work_intervals >= self.config.work_intervals_in_set {
                self.session.consecutive_work_intervals = 0;
                self.session.is_long_break = true;
                (self.config.long_rest(), "It's time for a long break!")
            } else {
                self.session.is_long_break = false;
                (self.config.short_rest(), "It's time for a short break!")
            };
        self.notifier.send(Notification::new(
            "Time's up",
            body,
            NotificationCategory::RestStarted,
        ));
        self.arm_interval(length);
    }

    fn on_rest_finish(&mut self) {
        if !self.session.is_long_break || !self.session.is_in_tomato_cycle {
            self.notifier.send(Notification::new(
                "Break is over",
                "Keep up the good work!",
                NotificationCategory::RestFinished,
            ));
        }
    }

    fn begin_return_countdown(&mut self) {
        self.cancel_interval();
        let pending = PendingReturn {
            requested_at: self.clock.now(),
            countdown_seconds: self.config.return_to_work_countdown_seconds,
        };
        info!(countdown_secs = pending.countdown_seconds, "awaiting return-to-work confirmation");
        self.notifier
            .request_return_confirmation(pending.countdown(), &self.session.current_goal);
        self.pending_return = Some(pending);
    }

    fn on_idle_start(&mut self, event: TimerEvent) {
        self.cancel_interval();
        self.session.consecutive_work_intervals = 0;
        self.session.paused_from = None;

        let goal = self.session.current_goal.clone();
        let timestamp = self.clock.now();

        if self.session.is_dash_mode && event == TimerEvent::TimerFired {
            info!(goal = %goal, "dash completed");
            self.record(LogEvent::DashCompleted {
                goal: goal.clone(),
                timestamp,
            });
            self.notifier.send(Notification::new(
                "Dash completed!",
                format!("You completed: {goal}"),
                NotificationCategory::RestFinished,
            ));
            self.session.reset_cycle();
            self.session.is_long_break = false;
            return;
        }

        if self.session.is_in_tomato_cycle
            && self.session.tomato_cycle_started
            && event == TimerEvent::StartStop
        {
            info!(goal = %goal, "tomato failed");
            self.record(LogEvent::TomatoFailed { goal, timestamp });
            self.session.reset_cycle();
            return;
        }

        if self.session.is_in_tomato_cycle
            && self.session.is_long_break
            && event == TimerEvent::TimerFired
        {
            info!(goal = %goal, "tomato completed");
            self.record(LogEvent::TomatoCompleted {
                goal: goal.clone(),
                timestamp,
            });
            self.last_completed_goal = Some(goal);
            self.session.reset_cycle();
        }
    }

    fn on_pause_start(&mut self, from: State) {
        let remaining = self
            .deadline
            .map(|deadline| deadline - self.clock.now())
            .unwrap_or_else(TimeDelta::zero)
            .max(TimeDelta::zero());
        self.session.paused_from = Some(from);
        self.session.remaining_when_paused = remaining;
        self.cancel_interval();
        self.player.stop_ticking();
    }

    fn on_resume(&mut self, to: State) {
        let remaining = self.session.remaining_when_paused;
        self.session.paused_from = None;
        self.session.remaining_when_paused = TimeDelta::zero();
        if to == State::Work {
            self.player.start_ticking();
        }
        self.arm_interval(remaining);
    }

    fn arm_interval(&mut self, length: TimeDelta) {
        let deadline = self.clock.now() + length;
        self.deadline = Some(deadline);
        self.ticker.arm(deadline);
    }

    fn cancel_interval(&mut self) {
        self.deadline = None;
        self.ticker.cancel();
    }

    fn record(&mut self, event: LogEvent) {
        if let Err(e) = self.log.append(event) {
            warn!(error = %e, "failed to append to event log");
        }
    }
}
