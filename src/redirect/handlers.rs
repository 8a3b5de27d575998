use axum::{
    extract::{ConnectInfo, Query, State},
    http::{
        header::{HeaderMap, HeaderValue, LOCATION, USER_AGENT},
        StatusCode,
    },
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::error;

use super::help::HelpPage;
use crate::analytics::{extract_client_ip, ClientInfo};
use crate::config::ProxyConfig;
use crate::resolver::{Resolution, Resolver};

pub struct RedirectState {
    pub resolver: Resolver,
    pub proxy: ProxyConfig,
    pub help: HelpPage,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

/// Resolve `?q=` and redirect, or show the command list
pub async fn resolve_query(
    State(state): State<Arc<RedirectState>>,
    Query(params): Query<SearchParams>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let client_ip = extract_client_ip(&headers, addr.ip(), &state.proxy);
    let client = ClientInfo::new(user_agent, client_ip.to_string());

    match state.resolver.resolve(&params.q, &client) {
        Ok(Resolution::Redirect(url)) => see_other(&url),
        Ok(Resolution::Help) => match state.help.render(state.resolver.registry()) {
            Ok(page) => Html(page).into_response(),
            Err(err) => {
                error!(error = %err, "failed to render help page");
                internal_error()
            }
        },
        Err(err) => {
            error!(query = %params.q, error = %err, "failed to resolve query");
            internal_error()
        }
    }
}

fn see_other(url: &str) -> Response {
    match HeaderValue::from_str(url) {
        Ok(location) => (StatusCode::SEE_OTHER, [(LOCATION, location)]).into_response(),
        Err(err) => {
            error!(url = %url, error = %err, "rendered URL is not a valid Location header");
            internal_error()
        }
    }
}

fn internal_error() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    #[derive(Serialize)]
    struct HealthResponse {
        status: String,
    }

    Json(HealthResponse {
        status: "OK".to_string(),
    })
}
