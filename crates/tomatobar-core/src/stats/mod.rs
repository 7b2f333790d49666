//! Statistics module for TomatoBar
//!
//! Aggregates the event log into time spent per state and tomato outcomes
//! for a calendar period.

mod productivity;

pub use productivity::{period_start, Period, ProductivityAnalyzer, ProductivityStats};
