use chrono::{DateTime, Local, Utc};
use clap::Args;
use serde::Serialize;
use tomatobar_core::stats::period_start;
use tomatobar_core::storage::log_path;
use tomatobar_core::{LogSnapshot, Period, ProductivityAnalyzer, ProductivityStats};

#[derive(Args)]
pub struct StatsArgs {
    /// today, week, month, year or all
    #[arg(default_value = "today")]
    period: Period,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsReport {
    period: Period,
    since: Option<DateTime<Utc>>,
    #[serde(flatten)]
    stats: ProductivityStats,
    total_tomatoes: u32,
    skipped_lines: usize,
}

pub fn run(args: StatsArgs) -> Result<(), Box<dyn std::error::Error>> {
    let snapshot = LogSnapshot::load(&log_path()?);
    let now = Local::now();
    let stats = ProductivityAnalyzer::new().analyze(&snapshot, args.period, &now);

    let report = StatsReport {
        period: args.period,
        since: period_start(args.period, &now),
        total_tomatoes: stats.total_tomatoes(),
        stats,
        skipped_lines: snapshot.skipped_lines(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
