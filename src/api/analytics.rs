//! Analytics API handlers

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::analytics::aggregator::{parse_date, DATE_FORMAT};
use crate::analytics::{AnalyticsError, StatsAggregator};

/// Longest range `/api/stats` answers, in days
pub const MAX_RANGE_DAYS: i64 = 3660;

pub struct ApiState {
    pub aggregator: Arc<StatsAggregator>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatsQueryParams {
    /// Single day (YYYY-MM-DD), defaults to today
    pub date: Option<String>,

    /// Range start (YYYY-MM-DD), used together with `end`
    pub start: Option<String>,

    /// Range end (YYYY-MM-DD), inclusive
    pub end: Option<String>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Day stats, or one entry per day when `start` and `end` are given
pub async fn get_stats(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<StatsQueryParams>,
) -> Response {
    let aggregator = Arc::clone(&state.aggregator);
    let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());

    match (non_empty(params.start), non_empty(params.end)) {
        (Some(start), Some(end)) => {
            if let (Ok(first), Ok(last)) = (parse_date(&start), parse_date(&end)) {
                let days = (last - first).num_days() + 1;
                if days > MAX_RANGE_DAYS {
                    return error_response(
                        StatusCode::BAD_REQUEST,
                        format!("range spans {days} days, at most {MAX_RANGE_DAYS} allowed"),
                    );
                }
            }
            run_blocking(move || aggregator.date_range(&start, &end)).await
        }
        _ => {
            let date = non_empty(params.date)
                .unwrap_or_else(|| chrono::Local::now().format(DATE_FORMAT).to_string());
            run_blocking(move || aggregator.day_stats(&date)).await
        }
    }
}

/// All-time stats
pub async fn get_overall_stats(State(state): State<Arc<ApiState>>) -> Response {
    let aggregator = Arc::clone(&state.aggregator);
    run_blocking(move || aggregator.overall_stats()).await
}

/// Aggregation reads the whole log from disk, so keep it off the async workers
async fn run_blocking<T, F>(f: F) -> Response
where
    T: Serialize + Send + 'static,
    F: FnOnce() -> Result<T, AnalyticsError> + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(Ok(value)) => Json(value).into_response(),
        Ok(Err(err)) => {
            let status = match err {
                AnalyticsError::DateParse { .. } => StatusCode::BAD_REQUEST,
                _ => {
                    tracing::error!("Failed to compute usage stats: {}", err);
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            };
            error_response(status, err.to_string())
        }
        Err(err) => {
            tracing::error!("Usage stats task failed: {}", err);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to retrieve usage stats".to_string(),
            )
        }
    }
}

fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorResponse { error })).into_response()
}
