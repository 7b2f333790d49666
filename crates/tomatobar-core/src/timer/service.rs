//! Single owner task around [`TimerEngine`].
//!
//! Front ends hold a cloneable [`TimerHandle`] and send commands; the
//! service task serializes them with ticks and the return-to-work countdown
//! so the engine only ever sees one event at a time.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use super::clock::Clock;
use super::engine::{EngineSnapshot, TimerEngine};
use super::feedback::{NotificationAction, Notifier, Player};
use super::state::State;
use super::ticker::{IntervalTicker, Tick, TICK_PERIOD};
use crate::error::{CoreError, Result};
use crate::storage::{EventSink, TimerConfig};
use crate::url_command::UrlCommand;

#[derive(Debug)]
pub enum Command {
    StartStop,
    Pause,
    SkipRest,
    StartWithGoal {
        goal: String,
        dash: bool,
        dash_minutes: Option<u32>,
    },
    ContinueGoal,
    NotificationAction(NotificationAction),
    ResolveReturn(bool),
    Snapshot(oneshot::Sender<EngineSnapshot>),
    Shutdown,
}

/// Cloneable sender side of the service.
#[derive(Debug, Clone)]
pub struct TimerHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl TimerHandle {
    pub fn send(&self, command: Command) -> Result<()> {
        self.tx.send(command).map_err(|_| CoreError::ServiceStopped)
    }

    pub fn start_stop(&self) -> Result<()> {
        self.send(Command::StartStop)
    }

    pub fn pause(&self) -> Result<()> {
        self.send(Command::Pause)
    }

    pub fn skip_rest(&self) -> Result<()> {
        self.send(Command::SkipRest)
    }

    pub fn start_with_goal(&self, goal: impl Into<String>, dash: bool, dash_minutes: Option<u32>) -> Result<()> {
        self.send(Command::StartWithGoal {
            goal: goal.into(),
            dash,
            dash_minutes,
        })
    }

    pub fn continue_goal(&self) -> Result<()> {
        self.send(Command::ContinueGoal)
    }

    pub fn notification_action(&self, action: NotificationAction) -> Result<()> {
        self.send(Command::NotificationAction(action))
    }

    pub fn confirm_return_to_work(&self, accepted: bool) -> Result<()> {
        self.send(Command::ResolveReturn(accepted))
    }

    /// Dispatch a parsed `tomatobar://` command.
    pub fn url_command(&self, command: UrlCommand) -> Result<()> {
        match command {
            UrlCommand::StartStop => self.start_stop(),
        }
    }

    pub async fn snapshot(&self) -> Result<EngineSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Snapshot(tx))?;
        rx.await.map_err(|_| CoreError::ServiceStopped)
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(Command::Shutdown)
    }
}

pub struct TimerService {
    engine: TimerEngine,
    commands: mpsc::UnboundedReceiver<Command>,
    ticks: mpsc::UnboundedReceiver<Tick>,
    return_deadline: Option<Instant>,
}

impl TimerService {
    /// Build a service ticking at [`TICK_PERIOD`].
    pub fn new(
        config: TimerConfig,
        clock: Arc<dyn Clock>,
        log: Box<dyn EventSink>,
        notifier: Box<dyn Notifier>,
        player: Box<dyn Player>,
    ) -> (Self, TimerHandle) {
        Self::with_tick_period(config, clock, log, notifier, player, TICK_PERIOD)
    }

    pub fn with_tick_period(
        config: TimerConfig,
        clock: Arc<dyn Clock>,
        log: Box<dyn EventSink>,
        notifier: Box<dyn Notifier>,
        player: Box<dyn Player>,
        period: Duration,
    ) -> (Self, TimerHandle) {
        let (ticker, ticks) = IntervalTicker::new(clock.clone(), period);
        let engine = TimerEngine::new(config, clock, Box::new(ticker), log)
            .with_notifier(notifier)
            .with_player(player);
        let (tx, commands) = mpsc::unbounded_channel();
        (
            Self {
                engine,
                commands,
                ticks,
                return_deadline: None,
            },
            TimerHandle { tx },
        )
    }

    /// Drive the engine until shutdown or until every handle is dropped.
    ///
    /// # Errors
    /// Returns the first protocol violation; the engine is left as it was
    /// before the offending event.
    pub async fn run(mut self) -> Result<()> {
        self.engine.record_app_start();
        info!("timer service started");

        let result = loop {
            tokio::select! {
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        debug!("all handles dropped");
                        break Ok(());
                    };
                    match self.handle(command) {
                        Ok(true) => {}
                        Ok(false) => break Ok(()),
                        Err(e) => break Err(e),
                    }
                }
                Some(_tick) = self.ticks.recv() => {
                    if let Err(e) = self.engine.on_tick() {
                        break Err(e);
                    }
                }
                _ = sleep_until(self.return_deadline.unwrap_or_else(Instant::now)), if self.return_deadline.is_some() => {
                    info!("return-to-work countdown expired");
                    if let Err(e) = self.engine.expire_return_to_work() {
                        break Err(e);
                    }
                }
            }
            self.sync_return_deadline();
        };

        self.engine.shutdown();
        info!(state = %self.engine.state(), "timer service stopped");
        result
    }

    /// Returns `Ok(false)` when the loop should end.
    fn handle(&mut self, command: Command) -> Result<bool> {
        let result = match command {
            Command::StartStop => self.engine.start_stop(),
            Command::Pause => self.engine.pause(),
            Command::SkipRest => self.engine.skip_rest(),
            Command::StartWithGoal {
                goal,
                dash,
                dash_minutes,
            } => self.engine.start_with_goal(&goal, dash, dash_minutes),
            Command::ContinueGoal => self.engine.continue_goal(),
            Command::NotificationAction(action) => self.engine.notification_action(action),
            Command::ResolveReturn(accepted) => self.engine.resolve_return_to_work(accepted),
            Command::Snapshot(reply) => {
                let _ = reply.send(self.engine.snapshot());
                Ok(self.engine.state())
            }
            Command::Shutdown => return Ok(false),
        };

        match result {
            Ok(_) => Ok(true),
            Err(e @ CoreError::ProtocolViolation(_)) => Err(e),
            Err(e) => {
                warn!(error = %e, "command rejected");
                Ok(true)
            }
        }
    }

    fn sync_return_deadline(&mut self) {
        match (self.engine.pending_return(), self.return_deadline) {
            (Some(pending), None) => {
                self.return_deadline = Some(Instant::now() + pending.countdown());
            }
            (None, Some(_)) => self.return_deadline = None,
            _ => {}
        }
    }

    pub fn state(&self) -> State {
        self.engine.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{LogEvent, Outcome};
    use crate::storage::MemoryEventLog;
    use crate::timer::clock::SystemClock;
    use crate::timer::feedback::{FeedbackEntry, Recorder};
    use tokio::time;

    fn service(config: TimerConfig) -> (TimerService, TimerHandle, MemoryEventLog, Recorder) {
        let log = MemoryEventLog::new();
        let feedback = Recorder::new();
        let (service, handle) = TimerService::new(
            config,
            Arc::new(SystemClock),
            Box::new(log.clone()),
            Box::new(feedback.clone()),
            Box::new(feedback.clone()),
        );
        (service, handle, log, feedback)
    }

    #[tokio::test(start_paused = true)]
    async fn commands_reach_engine_in_order() {
        let (service, handle, log, _) = service(TimerConfig::default());
        let task = tokio::spawn(service.run());

        handle.start_with_goal("plan sprint", false, None).unwrap();
        handle.pause().unwrap();
        let snap = handle.snapshot().await.unwrap();
        assert_eq!(snap.state, State::Paused);
        assert_eq!(snap.session.current_goal, "plan sprint");

        handle.start_stop().unwrap();
        handle.shutdown().unwrap();
        task.await.unwrap().unwrap();

        let events = log.events();
        assert!(matches!(events[0], LogEvent::AppStart { .. }));
        assert_eq!(
            events.iter().filter_map(LogEvent::outcome).collect::<Vec<_>>(),
            vec![Outcome::TomatoFailed]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_command_keeps_service_alive() {
        let (service, handle, _, _) = service(TimerConfig::default());
        let task = tokio::spawn(service.run());

        handle.continue_goal().unwrap();
        handle.start_with_goal("   ", false, None).unwrap();
        assert_eq!(handle.snapshot().await.unwrap().state, State::Idle);

        drop(handle);
        task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn protocol_violation_ends_run() {
        let (service, handle, _, _) = service(TimerConfig::default());
        let task = tokio::spawn(service.run());

        handle.pause().unwrap();
        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, CoreError::ProtocolViolation(_)));
        assert!(matches!(handle.start_stop(), Err(CoreError::ServiceStopped)));
    }

    #[tokio::test(start_paused = true)]
    async fn return_prompt_times_out_through_service() {
        let config = TimerConfig::default();
        let log = MemoryEventLog::new();
        let feedback = Recorder::new();
        let clock = crate::timer::clock::ManualClock::new(chrono::Utc::now());
        let (service, handle) = TimerService::new(
            config,
            Arc::new(clock.clone()),
            Box::new(log.clone()),
            Box::new(feedback.clone()),
            Box::new(feedback.clone()),
        );
        let task = tokio::spawn(service.run());

        handle.start_with_goal("review", false, None).unwrap();
        handle.snapshot().await.unwrap();

        // Finish work, then the short rest.
        clock.advance(chrono::TimeDelta::minutes(25));
        time::sleep(Duration::from_secs(2)).await;
        assert_eq!(handle.snapshot().await.unwrap().state, State::Rest);

        clock.advance(chrono::TimeDelta::minutes(5));
        time::sleep(Duration::from_secs(2)).await;
        let snap = handle.snapshot().await.unwrap();
        assert_eq!(snap.state, State::Rest);
        assert!(snap.return_pending);
        assert!(feedback
            .entries()
            .iter()
            .any(|e| matches!(e, FeedbackEntry::ReturnPrompt { .. })));

        // Nobody answers.
        time::sleep(Duration::from_secs(11)).await;
        let snap = handle.snapshot().await.unwrap();
        assert_eq!(snap.state, State::Idle);
        assert!(!snap.return_pending);

        handle.shutdown().unwrap();
        task.await.unwrap().unwrap();
        assert_eq!(
            log.events().iter().filter_map(LogEvent::outcome).collect::<Vec<_>>(),
            vec![Outcome::TomatoFailed]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn confirmed_return_resumes_work() {
        let log = MemoryEventLog::new();
        let clock = crate::timer::clock::ManualClock::new(chrono::Utc::now());
        let (service, handle) = TimerService::new(
            TimerConfig::default(),
            Arc::new(clock.clone()),
            Box::new(log.clone()),
            Box::new(crate::timer::feedback::Silent),
            Box::new(crate::timer::feedback::Silent),
        );
        let task = tokio::spawn(service.run());

        handle.start_stop().unwrap();
        handle.snapshot().await.unwrap();
        clock.advance(chrono::TimeDelta::minutes(25));
        time::sleep(Duration::from_secs(2)).await;
        clock.advance(chrono::TimeDelta::minutes(5));
        time::sleep(Duration::from_secs(2)).await;
        assert!(handle.snapshot().await.unwrap().return_pending);

        handle.confirm_return_to_work(true).unwrap();
        let snap = handle.snapshot().await.unwrap();
        assert_eq!(snap.state, State::Work);
        assert_eq!(snap.remaining_secs, Some(25 * 60));

        // The countdown no longer applies.
        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(handle.snapshot().await.unwrap().state, State::Work);

        handle.shutdown().unwrap();
        task.await.unwrap().unwrap();
    }
}
