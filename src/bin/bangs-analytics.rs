use anyhow::Result;
use clap::Parser;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use bangs::analytics::aggregator::DATE_FORMAT;
use bangs::analytics::{CommandCount, DayStats, StatsAggregator, UsageLogger};

#[derive(Parser)]
#[command(name = "bangs-analytics")]
#[command(about = "Display command usage analytics in the terminal", long_about = None)]
struct Cli {
    /// Show stats for a specific date (YYYY-MM-DD, default: today)
    #[arg(long)]
    date: Option<String>,
    /// Start date for a range (YYYY-MM-DD), requires --end
    #[arg(long, requires = "end")]
    start: Option<String>,
    /// End date for a range (YYYY-MM-DD), requires --start
    #[arg(long, requires = "start")]
    end: Option<String>,
    /// Path to the usage log file
    #[arg(long, default_value = "usage.log")]
    log: PathBuf,
    /// Number of top commands to show
    #[arg(long, default_value_t = 10)]
    top: usize,
    /// Show all-time statistics
    #[arg(long, conflicts_with_all = ["date", "start", "end"])]
    overall: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    if !cli.log.exists() {
        println!("❌ No analytics data found");
        println!("   Log file '{}' does not exist.", cli.log.display());
        println!("   Start searching to generate analytics data!");
        return Ok(());
    }

    let aggregator = StatsAggregator::new(Arc::new(UsageLogger::new(cli.log)));

    let (title, stats) = if cli.overall {
        (
            "🌟 Overall Statistics (All Time)".to_string(),
            aggregator.overall_stats()?,
        )
    } else if let (Some(start), Some(end)) = (&cli.start, &cli.end) {
        let stats = aggregator.summarize_range(start, end)?;
        (format!("📊 Statistics for {}", stats.date), stats)
    } else {
        let date = cli
            .date
            .unwrap_or_else(|| chrono::Local::now().format(DATE_FORMAT).to_string());
        (
            format!("📅 Statistics for {date}"),
            aggregator.day_stats(&date)?,
        )
    };

    println!("{title}\n");
    if stats.total_usage == 0 {
        println!("📭 No command usage data for this period");
        return Ok(());
    }

    print_overview(&stats);
    print_top_commands(&stats.top_commands, &stats.avg_duration, cli.top);

    Ok(())
}

fn print_overview(stats: &DayStats) {
    let total_hours = stats.total_time_ms as f64 / (1000.0 * 60.0 * 60.0);

    println!("Overview");
    println!("{}", "-".repeat(48));
    println!("{:<16} {}", "Total usage", stats.total_usage);
    println!("{:<16} {}", "Unique users", stats.unique_users);
    println!("{:<16} {:.1}h", "Total time", total_hours);
    if let Some(top) = stats.top_commands.first() {
        println!("{:<16} {} ({} uses)", "Top command", top.command, top.count);
    }
    println!();
}

fn print_top_commands(commands: &[CommandCount], avg_durations: &BTreeMap<String, f64>, limit: usize) {
    let commands = &commands[..commands.len().min(limit)];
    if commands.is_empty() {
        return;
    }

    let shown_total: usize = commands.iter().map(|c| c.count).sum();

    println!("Top commands");
    println!("{:<20} {:>8} {:>12} {:>14}", "Command", "Count", "Percentage", "Avg duration");
    println!("{}", "-".repeat(57));
    for cmd in commands {
        let percentage = cmd.count as f64 / shown_total as f64 * 100.0;
        println!(
            "{:<20} {:>8} {:>11.1}% {:>14}",
            cmd.command,
            cmd.count,
            percentage,
            format_duration(avg_durations.get(&cmd.command).copied())
        );
    }
}

fn format_duration(avg_ms: Option<f64>) -> String {
    match avg_ms {
        Some(ms) if ms > 0.0 && ms < 1000.0 => format!("{ms:.0}ms"),
        Some(ms) if ms >= 1000.0 => format!("{:.1}s", ms / 1000.0),
        _ => "-".to_string(),
    }
}
