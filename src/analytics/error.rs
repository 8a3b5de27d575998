use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("usage log I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode usage event: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("invalid date '{input}', expected YYYY-MM-DD: {source}")]
    DateParse {
        input: String,
        #[source]
        source: chrono::ParseError,
    },
}

pub type AnalyticsResult<T> = Result<T, AnalyticsError>;
