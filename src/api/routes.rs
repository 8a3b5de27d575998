use axum::{extract::Path, routing::get, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::analytics::StatsAggregator;
use crate::config::DashboardConfig;

use super::analytics::{get_overall_stats, get_stats, ApiState};
use super::static_files::serve_dashboard;

pub fn create_api_router(aggregator: Arc<StatsAggregator>, dashboard: DashboardConfig) -> Router {
    let state = Arc::new(ApiState { aggregator });

    let api_routes = Router::new()
        .route("/stats", get(get_stats))
        .route("/stats/overall", get(get_overall_stats))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let index_dir = dashboard.static_dir.clone();
    let files_dir = dashboard.static_dir;

    Router::new()
        .nest("/api", api_routes)
        .route(
            "/dashboard",
            get(move || {
                let dir = index_dir.clone();
                async move { serve_dashboard("", dir.as_deref()).await }
            }),
        )
        .route(
            "/dashboard/{*path}",
            get(move |Path(path): Path<String>| {
                let dir = files_dir.clone();
                async move { serve_dashboard(&path, dir.as_deref()).await }
            }),
        )
}
