//! Command usage analytics
//!
//! Usage events are appended to a flat JSON-lines log by the `UsageLogger`
//! and aggregated on demand by the `StatsAggregator`. There is no other
//! persistence: the log is the source of truth and every stats query
//! re-reads it.

pub mod aggregator;
pub mod error;
pub mod ip_extractor;
pub mod logger;
pub mod models;
pub mod recorder;

pub use aggregator::{StatsAggregator, ALL_TIME_LABEL, TOP_COMMANDS_LIMIT};
pub use error::{AnalyticsError, AnalyticsResult};
pub use ip_extractor::extract_client_ip;
pub use logger::UsageLogger;
pub use models::{ClientInfo, CommandCount, DayStats, UsageEvent};
pub use recorder::AnalyticsRecorder;

/// Destination for usage events. Implementations must not fail or block
/// the caller for long; persistence errors are handled internally.
pub trait UsageSink: Send + Sync {
    fn record(&self, event: UsageEvent);
}
