//! Productivity statistics over the event log
//!
//! Time accounting walks the transition records in timestamp order. Each
//! record's `to_state` is considered active until the next record, and the
//! last one until "now". Nothing is attributed to the span before the first
//! record in the period.

use chrono::{DateTime, Datelike, Days, NaiveTime, TimeDelta, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::events::{Outcome, TransitionRecord};
use crate::storage::LogSnapshot;
use crate::timer::State;
use crate::timestamps::duration_seconds;

/// Calendar window a report covers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Period {
    #[default]
    Today,
    ThisWeek,
    ThisMonth,
    ThisYear,
    AllTime,
}

impl Period {
    pub const ALL: [Period; 5] = [
        Period::Today,
        Period::ThisWeek,
        Period::ThisMonth,
        Period::ThisYear,
        Period::AllTime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Today => "today",
            Period::ThisWeek => "week",
            Period::ThisMonth => "month",
            Period::ThisYear => "year",
            Period::AllTime => "all",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "today" | "day" => Ok(Period::Today),
            "week" | "this-week" => Ok(Period::ThisWeek),
            "month" | "this-month" => Ok(Period::ThisMonth),
            "year" | "this-year" => Ok(Period::ThisYear),
            "all" | "all-time" => Ok(Period::AllTime),
            other => Err(format!(
                "unknown period '{other}' (expected today, week, month, year or all)"
            )),
        }
    }
}

/// First instant of `period` in `now`'s calendar, as UTC.
///
/// Weeks start on Monday. `AllTime` has no lower bound. When local midnight
/// does not exist (a DST gap) the wall-clock midnight is read as UTC.
pub fn period_start<Tz: TimeZone>(period: Period, now: &DateTime<Tz>) -> Option<DateTime<Utc>> {
    let today = now.date_naive();
    let first_day = match period {
        Period::Today => today,
        Period::ThisWeek => today - Days::new(today.weekday().num_days_from_monday() as u64),
        Period::ThisMonth => today - Days::new(today.day0() as u64),
        Period::ThisYear => today - Days::new(today.ordinal0() as u64),
        Period::AllTime => return None,
    };

    let midnight = first_day.and_time(NaiveTime::MIN);
    let tz = now.timezone();
    let start = tz
        .from_local_datetime(&midnight)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or_else(|| midnight.and_utc());
    Some(start)
}

/// Aggregated time and outcome counts for one period
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductivityStats {
    #[serde(with = "duration_seconds")]
    pub work_time: TimeDelta,
    #[serde(with = "duration_seconds")]
    pub rest_time: TimeDelta,
    #[serde(with = "duration_seconds")]
    pub idle_time: TimeDelta,
    #[serde(with = "duration_seconds")]
    pub paused_time: TimeDelta,
    pub completed_tomatoes: u32,
    pub failed_tomatoes: u32,
    pub completed_dashes: u32,
}

impl ProductivityStats {
    /// Completed plus failed tomatoes.
    pub fn total_tomatoes(&self) -> u32 {
        self.completed_tomatoes + self.failed_tomatoes
    }

    /// All accounted time, whatever the state.
    pub fn total_time(&self) -> TimeDelta {
        self.work_time + self.rest_time + self.idle_time + self.paused_time
    }

    fn add(&mut self, state: State, span: TimeDelta) {
        if span <= TimeDelta::zero() {
            return;
        }
        match state {
            State::Work => self.work_time += span,
            State::Rest => self.rest_time += span,
            State::Idle => self.idle_time += span,
            State::Paused => self.paused_time += span,
        }
    }

    fn count(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::TomatoCompleted => self.completed_tomatoes += 1,
            Outcome::TomatoFailed => self.failed_tomatoes += 1,
            Outcome::DashCompleted => self.completed_dashes += 1,
        }
    }
}

/// Derives [`ProductivityStats`] from a [`LogSnapshot`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ProductivityAnalyzer;

impl ProductivityAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Stats for `period` in the local time zone.
    pub fn analyze_local(&self, snapshot: &LogSnapshot, period: Period, now: DateTime<Utc>) -> ProductivityStats {
        let local_now = now.with_timezone(&chrono::Local);
        self.analyze(snapshot, period, &local_now)
    }

    /// Stats for `period`, with calendar boundaries taken in `now`'s zone.
    ///
    /// Deterministic: the same snapshot, period and `now` always produce the
    /// same result.
    pub fn analyze<Tz: TimeZone>(
        &self,
        snapshot: &LogSnapshot,
        period: Period,
        now: &DateTime<Tz>,
    ) -> ProductivityStats {
        let start = period_start(period, now);
        let now = now.with_timezone(&Utc);
        let in_period = |at: &DateTime<Utc>| start.map_or(true, |start| *at >= start);

        let mut transitions: Vec<&TransitionRecord> = snapshot
            .transitions()
            .filter(|record| in_period(&record.timestamp))
            .collect();
        transitions.sort_by_key(|record| record.timestamp);

        let mut stats = ProductivityStats::default();
        for pair in transitions.windows(2) {
            stats.add(pair[0].to_state, pair[1].timestamp - pair[0].timestamp);
        }
        if let Some(last) = transitions.last() {
            stats.add(last.to_state, now - last.timestamp);
        }

        for (at, outcome) in snapshot.outcomes() {
            if in_period(&at) {
                stats.count(outcome);
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::LogEvent;
    use crate::timer::TimerEvent;
    use chrono::FixedOffset;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 17, 10, 0, 0).unwrap()
    }

    fn transition(at: DateTime<Utc>, from: State, to: State) -> LogEvent {
        LogEvent::Transition(TransitionRecord::new(at, from, to, TimerEvent::StartStop))
    }

    fn secs(n: i64) -> TimeDelta {
        TimeDelta::seconds(n)
    }

    #[test]
    fn test_work_rest_idle_accounting() {
        let snapshot = LogSnapshot::from_events(vec![
            transition(t0(), State::Idle, State::Work),
            transition(t0() + secs(600), State::Work, State::Rest),
            transition(t0() + secs(900), State::Rest, State::Idle),
        ]);
        let stats = ProductivityAnalyzer::new().analyze(&snapshot, Period::Today, &(t0() + secs(900)));

        assert_eq!(stats.work_time, secs(600));
        assert_eq!(stats.rest_time, secs(300));
        assert_eq!(stats.idle_time, TimeDelta::zero());
        assert_eq!(stats.paused_time, TimeDelta::zero());
    }

    #[test]
    fn test_last_state_runs_until_now() {
        let snapshot = LogSnapshot::from_events(vec![
            transition(t0(), State::Idle, State::Work),
            transition(t0() + secs(120), State::Work, State::Paused),
        ]);
        let stats = ProductivityAnalyzer::new().analyze(&snapshot, Period::AllTime, &(t0() + secs(420)));
        assert_eq!(stats.work_time, secs(120));
        assert_eq!(stats.paused_time, secs(300));
        assert_eq!(stats.total_time(), secs(420));
    }

    #[test]
    fn test_unsorted_records_are_ordered_first() {
        let snapshot = LogSnapshot::from_events(vec![
            transition(t0() + secs(600), State::Work, State::Idle),
            transition(t0(), State::Idle, State::Work),
        ]);
        let stats = ProductivityAnalyzer::new().analyze(&snapshot, Period::AllTime, &(t0() + secs(600)));
        assert_eq!(stats.work_time, secs(600));
        assert_eq!(stats.idle_time, TimeDelta::zero());
    }

    #[test]
    fn test_period_filter_drops_earlier_records() {
        let yesterday = t0() - TimeDelta::days(1);
        let snapshot = LogSnapshot::from_events(vec![
            transition(yesterday, State::Idle, State::Work),
            LogEvent::TomatoFailed {
                goal: "old".into(),
                timestamp: yesterday + secs(60),
            },
            transition(yesterday + secs(60), State::Work, State::Idle),
            transition(t0(), State::Idle, State::Work),
            LogEvent::DashCompleted {
                goal: "new".into(),
                timestamp: t0() + secs(300),
            },
            transition(t0() + secs(300), State::Work, State::Idle),
        ]);
        let analyzer = ProductivityAnalyzer::new();
        let now = t0() + secs(300);

        let today = analyzer.analyze(&snapshot, Period::Today, &now);
        assert_eq!(today.work_time, secs(300));
        assert_eq!(today.failed_tomatoes, 0);
        assert_eq!(today.completed_dashes, 1);

        let all = analyzer.analyze(&snapshot, Period::AllTime, &now);
        assert_eq!(all.work_time, secs(360));
        assert_eq!(all.failed_tomatoes, 1);
        assert_eq!(all.total_tomatoes(), 1);
        assert_eq!(all.idle_time, TimeDelta::days(1) - secs(60));
    }

    #[test]
    fn test_outcomes_are_tallied() {
        let snapshot = LogSnapshot::from_events(vec![
            LogEvent::TomatoCompleted { goal: "a".into(), timestamp: t0() },
            LogEvent::TomatoCompleted { goal: "b".into(), timestamp: t0() },
            LogEvent::TomatoFailed { goal: "c".into(), timestamp: t0() },
            LogEvent::AppStart { timestamp: t0() },
        ]);
        let stats = ProductivityAnalyzer::new().analyze(&snapshot, Period::Today, &t0());
        assert_eq!(stats.completed_tomatoes, 2);
        assert_eq!(stats.failed_tomatoes, 1);
        assert_eq!(stats.total_tomatoes(), 3);
        assert_eq!(stats.total_time(), TimeDelta::zero());
    }

    #[test]
    fn test_empty_snapshot_gives_zero_stats() {
        let stats = ProductivityAnalyzer::new().analyze_local(&LogSnapshot::default(), Period::ThisYear, t0());
        assert_eq!(stats, ProductivityStats::default());
    }

    #[test]
    fn test_analysis_is_deterministic() {
        let snapshot = LogSnapshot::from_events(vec![
            transition(t0(), State::Idle, State::Work),
            transition(t0() + secs(1500), State::Work, State::Rest),
        ]);
        let analyzer = ProductivityAnalyzer::new();
        let now = t0() + secs(1700);
        assert_eq!(
            analyzer.analyze(&snapshot, Period::ThisWeek, &now),
            analyzer.analyze(&snapshot, Period::ThisWeek, &now)
        );
    }

    #[test]
    fn test_period_boundaries() {
        // Wednesday afternoon.
        let now = Utc.with_ymd_and_hms(2024, 5, 15, 15, 30, 0).unwrap();
        assert_eq!(
            period_start(Period::Today, &now),
            Some(Utc.with_ymd_and_hms(2024, 5, 15, 0, 0, 0).unwrap())
        );
        assert_eq!(
            period_start(Period::ThisWeek, &now),
            Some(Utc.with_ymd_and_hms(2024, 5, 13, 0, 0, 0).unwrap())
        );
        assert_eq!(
            period_start(Period::ThisMonth, &now),
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(
            period_start(Period::ThisYear, &now),
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(period_start(Period::AllTime, &now), None);
    }

    #[test]
    fn test_period_boundaries_follow_local_zone() {
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        // 2024-05-13 01:00 in Tokyo is still Sunday in UTC.
        let now = tokyo.with_ymd_and_hms(2024, 5, 13, 1, 0, 0).unwrap();
        assert_eq!(
            period_start(Period::Today, &now),
            Some(Utc.with_ymd_and_hms(2024, 5, 12, 15, 0, 0).unwrap())
        );
        assert_eq!(period_start(Period::ThisWeek, &now), period_start(Period::Today, &now));
    }

    #[test]
    fn test_period_parsing() {
        assert_eq!("today".parse::<Period>(), Ok(Period::Today));
        assert_eq!("Week".parse::<Period>(), Ok(Period::ThisWeek));
        assert_eq!("all".parse::<Period>(), Ok(Period::AllTime));
        assert!("fortnight".parse::<Period>().is_err());
        for period in Period::ALL {
            assert_eq!(period.as_str().parse::<Period>(), Ok(period));
        }
    }
}
