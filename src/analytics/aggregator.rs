//! Usage statistics computed from the append-only log
//!
//! Nothing here is cached: every query re-reads the log and recomputes.

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use super::error::{AnalyticsError, AnalyticsResult};
use super::logger::UsageLogger;
use super::models::{CommandCount, DayStats, UsageEvent};

/// Length of the ranked command list computed for every stats query
pub const TOP_COMMANDS_LIMIT: usize = 10;

/// Label used for stats computed over the whole log
pub const ALL_TIME_LABEL: &str = "all-time";

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn parse_date(input: &str) -> AnalyticsResult<NaiveDate> {
    NaiveDate::parse_from_str(input, DATE_FORMAT).map_err(|source| AnalyticsError::DateParse {
        input: input.to_string(),
        source,
    })
}

pub struct StatsAggregator {
    log: Arc<UsageLogger>,
}

impl StatsAggregator {
    pub fn new(log: Arc<UsageLogger>) -> Self {
        Self { log }
    }

    /// Stats for a single calendar day (`YYYY-MM-DD`)
    pub fn day_stats(&self, date: &str) -> AnalyticsResult<DayStats> {
        let day = parse_date(date)?;
        let events = self.log.read_events()?;
        Ok(stats_for_day(day, &events))
    }

    /// Stats for every day from `start` to `end`, both inclusive
    pub fn date_range(&self, start: &str, end: &str) -> AnalyticsResult<Vec<DayStats>> {
        let start = parse_date(start)?;
        let end = parse_date(end)?;
        let events = self.log.read_events()?;

        let mut by_day: HashMap<NaiveDate, Vec<&UsageEvent>> = HashMap::new();
        for event in &events {
            let day = event.timestamp.date_naive();
            if (start..=end).contains(&day) {
                by_day.entry(day).or_default().push(event);
            }
        }

        Ok(start
            .iter_days()
            .take_while(|day| *day <= end)
            .map(|day| {
                let events = by_day.get(&day).map(Vec::as_slice).unwrap_or_default();
                aggregate(day.format(DATE_FORMAT).to_string(), events.iter().copied())
            })
            .collect())
    }

    /// Stats over every event in the log
    pub fn overall_stats(&self) -> AnalyticsResult<DayStats> {
        let events = self.log.read_events()?;
        Ok(aggregate(ALL_TIME_LABEL, events.iter()))
    }

    /// A date range folded into a single `DayStats` labelled `"<start> to <end>"`
    pub fn summarize_range(&self, start: &str, end: &str) -> AnalyticsResult<DayStats> {
        let days = self.date_range(start, end)?;
        Ok(combine_days(format!("{start} to {end}"), &days))
    }
}

fn stats_for_day(day: NaiveDate, events: &[UsageEvent]) -> DayStats {
    aggregate(
        day.format(DATE_FORMAT).to_string(),
        events.iter().filter(|e| e.timestamp.date_naive() == day),
    )
}

/// Aggregate a set of events under the given label
pub fn aggregate<'a>(label: impl Into<String>, events: impl Iterator<Item = &'a UsageEvent>) -> DayStats {
    let mut stats = DayStats::empty(label);
    let mut clients = HashSet::new();
    let mut durations: BTreeMap<&str, (u64, u64)> = BTreeMap::new();

    for event in events {
        stats.total_usage += 1;
        *stats.commands.entry(event.command.clone()).or_insert(0) += 1;
        clients.insert(event.client_key());

        if let Some(ms) = event.duration_ms.filter(|ms| *ms > 0) {
            stats.total_time_ms += ms;
            let entry = durations.entry(event.command.as_str()).or_insert((0, 0));
            entry.0 += ms;
            entry.1 += 1;
        }
    }

    stats.unique_users = clients.len();
    stats.avg_duration = durations
        .into_iter()
        .map(|(command, (total, n))| (command.to_string(), total as f64 / n as f64))
        .collect();
    stats.top_commands = top_commands(&stats.commands, TOP_COMMANDS_LIMIT);

    stats
}

/// Rank commands by count, descending; equal counts are ordered by name
pub fn top_commands(counts: &BTreeMap<String, usize>, limit: usize) -> Vec<CommandCount> {
    let mut ranked: Vec<CommandCount> = counts
        .iter()
        .map(|(command, count)| CommandCount {
            command: command.clone(),
            count: *count,
        })
        .collect();

    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.command.cmp(&b.command)));
    ranked.truncate(limit);
    ranked
}

/// Fold per-day stats into one summary.
///
/// Unique users is the busiest day's count (clients are not tracked across
/// days) and average durations are the mean of the daily averages.
pub fn combine_days(label: impl Into<String>, days: &[DayStats]) -> DayStats {
    let mut stats = DayStats::empty(label);
    let mut daily_averages: BTreeMap<&str, Vec<f64>> = BTreeMap::new();

    for day in days {
        stats.total_usage += day.total_usage;
        stats.total_time_ms += day.total_time_ms;
        stats.unique_users = stats.unique_users.max(day.unique_users);

        for (command, count) in &day.commands {
            *stats.commands.entry(command.clone()).or_insert(0) += count;
        }
        for (command, avg) in &day.avg_duration {
            if *avg > 0.0 {
                daily_averages.entry(command.as_str()).or_default().push(*avg);
            }
        }
    }

    stats.avg_duration = daily_averages
        .into_iter()
        .map(|(command, avgs)| (command.to_string(), avgs.iter().sum::<f64>() / avgs.len() as f64))
        .collect();
    stats.top_commands = top_commands(&stats.commands, TOP_COMMANDS_LIMIT);

    stats
}
