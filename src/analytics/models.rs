//! Data models for analytics

use chrono::{DateTime, FixedOffset, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Coarse client identity attached to every usage event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub user_agent: String,
    pub address: String,
}

impl ClientInfo {
    pub fn new(user_agent: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            address: address.into(),
        }
    }

    /// Key used for per-client duration tracking and unique-user counts
    pub fn key(&self) -> String {
        client_key(&self.address, &self.user_agent)
    }
}

pub(crate) fn client_key(address: &str, user_agent: &str) -> String {
    format!("{address}|{user_agent}")
}

/// A single persisted command usage, one JSON object per log line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageEvent {
    /// Command name (or `help` / `google-fallback`)
    pub command: String,

    /// Raw query text as received
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub query: String,

    pub timestamp: DateTime<FixedOffset>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user_agent: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub remote_addr: String,

    /// Time since this client's previous event, set only within a session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,

    /// Whether the request fell back to the default command or search engine
    #[serde(default)]
    pub is_default: bool,

    #[serde(default)]
    pub is_subcommand: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcommand: Option<String>,
}

impl UsageEvent {
    /// New event stamped with the current local time.
    ///
    /// `UsageLogger::log` restamps the event when it is written, so the
    /// recorded time always follows log order.
    pub fn new(command: impl Into<String>, query: impl Into<String>, client: &ClientInfo) -> Self {
        Self::at(Local::now().fixed_offset(), command, query, client)
    }

    pub fn at(
        timestamp: DateTime<FixedOffset>,
        command: impl Into<String>,
        query: impl Into<String>,
        client: &ClientInfo,
    ) -> Self {
        Self {
            command: command.into(),
            query: query.into(),
            timestamp,
            user_agent: client.user_agent.clone(),
            remote_addr: client.address.clone(),
            duration_ms: None,
            is_default: false,
            is_subcommand: false,
            subcommand: None,
        }
    }

    pub fn fallback(mut self) -> Self {
        self.is_default = true;
        self
    }

    pub fn with_subcommand(mut self, subcommand: impl Into<String>) -> Self {
        self.is_subcommand = true;
        self.subcommand = Some(subcommand.into());
        self
    }

    pub fn client_key(&self) -> String {
        client_key(&self.remote_addr, &self.user_agent)
    }
}

/// Usage count for a single command, used for rankings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandCount {
    pub command: String,
    pub count: usize,
}

/// Aggregated statistics for a day, a date range, or all time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DayStats {
    pub date: String,
    pub total_usage: usize,
    pub commands: BTreeMap<String, usize>,
    /// Mean recorded duration per command; commands without durations are absent
    pub avg_duration: BTreeMap<String, f64>,
    pub total_time_ms: u64,
    pub unique_users: usize,
    pub top_commands: Vec<CommandCount>,
}

impl DayStats {
    pub fn empty(date: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            ..Default::default()
        }
    }
}
