use axum::{routing::get, Router};
use std::sync::Arc;

use crate::config::ProxyConfig;
use crate::resolver::Resolver;

use super::handlers::{health_check, resolve_query, RedirectState};
use super::help::HelpPage;

/// Router for `/?q=` and `/health`.
///
/// `resolve_query` needs `ConnectInfo<SocketAddr>`; serve with
/// `into_make_service_with_connect_info`.
pub fn create_redirect_router(resolver: Resolver, proxy: ProxyConfig) -> Router {
    let state = Arc::new(RedirectState {
        resolver,
        proxy,
        help: HelpPage::new(),
    });

    Router::new()
        .route("/", get(resolve_query))
        .route("/health", get(health_check))
        .with_state(state)
}
