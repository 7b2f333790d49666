//! Integration tests for the engine -> event log -> analyzer pipeline.
//!
//! Drives a full day through a file-backed log, reloads it as a snapshot and
//! checks the statistics account for every second.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use tomatobar_core::storage::JsonlEventLog;
use tomatobar_core::timer::{Clock, ManualClock, ManualTicker};
use tomatobar_core::{
    LogSnapshot, Outcome, Period, ProductivityAnalyzer, State, TimerConfig, TimerEngine,
};

fn morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 12, 8, 0, 0).unwrap()
}

struct Day {
    engine: TimerEngine,
    clock: ManualClock,
    ticker: ManualTicker,
}

impl Day {
    fn start(path: &std::path::Path, config: TimerConfig) -> Self {
        let clock = ManualClock::new(morning());
        let ticker = ManualTicker::new();
        let log = JsonlEventLog::open(path).unwrap();
        let mut engine = TimerEngine::new(
            config,
            Arc::new(clock.clone()),
            Box::new(ticker.clone()),
            Box::new(log),
        );
        engine.record_app_start();
        Self {
            engine,
            clock,
            ticker,
        }
    }

    fn expire(&mut self) -> State {
        let deadline = self.ticker.deadline().unwrap();
        self.clock.set(deadline);
        self.engine.on_tick().unwrap();
        self.engine.state()
    }
}

#[test]
fn test_full_day_replays_into_stats() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("tomatobar.log");
    let mut day = Day::start(
        &path,
        TimerConfig {
            return_to_work_countdown_seconds: 0,
            ..TimerConfig::default()
        },
    );

    // One full tomato: four work intervals, three short rests, one long rest.
    day.engine.start_with_goal("write chapter 3", false, None).unwrap();
    for _ in 0..3 {
        assert_eq!(day.expire(), State::Rest);
        assert_eq!(day.expire(), State::Work);
    }
    assert_eq!(day.expire(), State::Rest);
    assert!(day.engine.session().is_long_break);
    assert_eq!(day.expire(), State::Idle);

    // Idle for ten minutes, then a dash.
    day.clock.advance(TimeDelta::minutes(10));
    day.engine.start_with_goal("inbox zero", true, Some(15)).unwrap();
    assert_eq!(day.expire(), State::Idle);

    // A tomato abandoned after a pause.
    day.engine.start_with_goal("tax forms", false, None).unwrap();
    day.clock.advance(TimeDelta::minutes(5));
    day.engine.pause().unwrap();
    day.clock.advance(TimeDelta::minutes(20));
    day.engine.start_stop().unwrap();
    let end = day.clock.now();
    drop(day);

    let snapshot = LogSnapshot::load(&path);
    assert_eq!(snapshot.skipped_lines(), 0);

    let outcomes: Vec<Outcome> = snapshot.outcomes().map(|(_, o)| o).collect();
    assert_eq!(
        outcomes,
        vec![Outcome::TomatoCompleted, Outcome::DashCompleted, Outcome::TomatoFailed]
    );

    let first = snapshot.transitions().next().unwrap().timestamp;
    let stats = ProductivityAnalyzer::new().analyze(&snapshot, Period::AllTime, &end);

    assert_eq!(stats.work_time, TimeDelta::minutes(4 * 25 + 15 + 5));
    assert_eq!(stats.rest_time, TimeDelta::minutes(3 * 5 + 15));
    assert_eq!(stats.idle_time, TimeDelta::minutes(10));
    assert_eq!(stats.paused_time, TimeDelta::minutes(20));
    assert_eq!(stats.total_time(), end - first);
    assert_eq!(stats.completed_tomatoes, 1);
    assert_eq!(stats.failed_tomatoes, 1);
    assert_eq!(stats.completed_dashes, 1);
}

#[test]
fn test_every_transition_is_one_line() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("tomatobar.log");
    let mut day = Day::start(&path, TimerConfig::default());

    day.engine.start_stop().unwrap();
    day.engine.pause().unwrap();
    day.engine.pause().unwrap();
    day.engine.start_stop().unwrap();
    drop(day);

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<serde_json::Value> = content
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    assert_eq!(lines.len(), 5);
    assert_eq!(lines[0]["type"], "appStart");
    for line in &lines[1..] {
        assert_eq!(line["type"], "transition");
        assert!(line["timestamp"].is_f64());
        assert!(line["fromState"].is_string());
        assert!(line["toState"].is_string());
        assert!(line["event"].is_string());
    }
    assert_eq!(lines[2]["toState"], "paused");
    assert_eq!(lines[3]["event"], "pause");
}

#[test]
fn test_corrupt_lines_do_not_hide_the_rest() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("tomatobar.log");
    let mut day = Day::start(&path, TimerConfig::default());
    day.engine.start_stop().unwrap();
    day.clock.advance(TimeDelta::minutes(12));
    day.engine.start_stop().unwrap();
    let end = day.clock.now();
    drop(day);

    let mut content = std::fs::read_to_string(&path).unwrap();
    content.insert_str(0, "{\"type\":\"transition\",\"timestamp\":\n");
    content.push_str("garbage\n");
    std::fs::write(&path, content).unwrap();

    let snapshot = LogSnapshot::load(&path);
    assert_eq!(snapshot.skipped_lines(), 2);
    let stats = ProductivityAnalyzer::new().analyze(&snapshot, Period::AllTime, &end);
    assert_eq!(stats.work_time, TimeDelta::minutes(12));
}

#[test]
fn test_missing_log_gives_empty_stats() {
    let dir = tempfile::TempDir::new().unwrap();
    let snapshot = LogSnapshot::load(&dir.path().join("never-written.log"));
    let stats = ProductivityAnalyzer::new().analyze(&snapshot, Period::Today, &morning());
    assert_eq!(stats.total_time(), TimeDelta::zero());
    assert_eq!(stats.total_tomatoes(), 0);
}
