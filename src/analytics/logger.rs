//! Append-only usage log
//!
//! Every usage event becomes one JSON line in the log file. The write lock
//! covers the whole "stamp time, read last seen, compute duration, update
//! last seen, append" sequence so concurrent requests from the same client
//! cannot race and lines are never interleaved. Readers take the shared side
//! of the same lock to get a consistent view of the file.

use chrono::{DateTime, FixedOffset, Local};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error};

use super::error::AnalyticsResult;
use super::models::UsageEvent;
use super::UsageSink;

/// Gaps of an hour or more start a new session and carry no duration
const SESSION_GAP_MS: i64 = 60 * 60 * 1000;

pub struct UsageLogger {
    path: PathBuf,
    /// Last event time per client key
    last_seen: RwLock<HashMap<String, DateTime<FixedOffset>>>,
}

impl UsageLogger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_seen: RwLock::new(HashMap::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stamp the current time and the per-client duration onto `event` and
    /// append it to the log.
    ///
    /// Persistence failures are logged, never returned.
    pub fn log(&self, event: UsageEvent) {
        self.write_event(event, true);
    }

    /// Like [`log`](Self::log) but keeps the timestamp already on `event`.
    ///
    /// An event older than the client's last one gets no duration and leaves
    /// the last-seen time where it was.
    pub fn log_at(&self, event: UsageEvent) {
        self.write_event(event, false);
    }

    fn write_event(&self, mut event: UsageEvent, stamp_now: bool) {
        let mut last_seen = self.last_seen.write();

        if stamp_now {
            event.timestamp = Local::now().fixed_offset();
        }

        let key = event.client_key();
        let prev = last_seen.get(&key).copied();
        event.duration_ms = prev.and_then(|prev| session_duration_ms(prev, event.timestamp));
        if prev.map_or(true, |prev| event.timestamp > prev) {
            last_seen.insert(key, event.timestamp);
        }

        if let Err(err) = self.append(&event) {
            error!(command = %event.command, path = %self.path.display(), error = %err, "failed to write usage event");
        }
    }

    fn append(&self, event: &UsageEvent) -> AnalyticsResult<()> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&line)?;
        Ok(())
    }

    /// Read every decodable event from the log.
    ///
    /// A missing file yields no events. Lines that fail to decode (including
    /// a torn trailing write) are skipped.
    pub fn read_events(&self) -> AnalyticsResult<Vec<UsageEvent>> {
        let _guard = self.last_seen.read();

        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut skipped = 0usize;
        let events: Vec<UsageEvent> = data
            .split(|b| *b == b'\n')
            .filter(|line| !line.iter().all(u8::is_ascii_whitespace))
            .filter_map(|line| match serde_json::from_slice(line) {
                Ok(event) => Some(event),
                Err(_) => {
                    skipped += 1;
                    None
                }
            })
            .collect();

        if skipped > 0 {
            debug!(skipped, "skipped undecodable usage log lines");
        }

        Ok(events)
    }
}

impl UsageSink for UsageLogger {
    fn record(&self, event: UsageEvent) {
        self.log(event);
    }
}

fn session_duration_ms(prev: DateTime<FixedOffset>, now: DateTime<FixedOffset>) -> Option<u64> {
    let elapsed = now.signed_duration_since(prev).num_milliseconds();
    if (1..SESSION_GAP_MS).contains(&elapsed) {
        Some(elapsed as u64)
    } else {
        None
    }
}
