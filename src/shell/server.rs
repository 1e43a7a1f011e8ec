use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::trace::TraceLayer;

use super::cache::CacheStorage;
use super::network::{Network, Upstream};
use super::worker::{FetchOutcome, ShellWorker};
use super::{RequestMode, ShellRequest, ShellResponse};
use crate::settings::ShellConfig;

/// Largest request body forwarded to the origin.
const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

#[derive(Clone)]
struct AppState {
    worker: Arc<ShellWorker>,
    network: Arc<dyn Network>,
}

pub fn router(worker: Arc<ShellWorker>, network: Arc<dyn Network>) -> Router {
    let app_state = AppState { worker, network };

    Router::new()
        .route("/__shell/health", get(health))
        .fallback(intercept)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let entries = state.worker.storage().open(state.worker.cache_name()).len();

    Json(json!({
        "state": state.worker.state().await,
        "cache": state.worker.cache_name(),
        "entries": entries,
    }))
}

async fn intercept(State(state): State<AppState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let body = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(body) => body,
        Err(e) => {
            return (
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(json!({"description": format!("Failed to read request body: {}", e)})),
            )
                .into_response()
        }
    };

    let url = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());
    let shell_request = ShellRequest {
        mode: request_mode(&parts.method, &parts.headers),
        method: parts.method,
        url,
        headers: parts.headers,
        body,
    };

    let result = match state.worker.handle_fetch(&shell_request).await {
        Ok(FetchOutcome::Respond(response)) => Ok(response),
        Ok(FetchOutcome::Ignored) => state.network.fetch(&shell_request).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(response) => into_response(response),
        Err(e) => {
            log::warn!("Could not serve {} {}: {}", shell_request.method, shell_request.url, e);
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({"description": e.to_string()})),
            )
                .into_response()
        }
    }
}

/// `Sec-Fetch-Mode: navigate` marks a page load. Clients that do not send
/// fetch metadata are treated as navigating when a GET asks for HTML.
fn request_mode(method: &Method, headers: &HeaderMap) -> RequestMode {
    if let Some(mode) = headers.get("sec-fetch-mode") {
        return if mode.as_bytes().eq_ignore_ascii_case(b"navigate") {
            RequestMode::Navigate
        } else {
            RequestMode::Other
        };
    }

    let wants_html = headers
        .get(header::ACCEPT)
        .and_then(|accept| accept.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html"));

    if method == Method::GET && wants_html {
        RequestMode::Navigate
    } else {
        RequestMode::Other
    }
}

fn into_response(shell_response: ShellResponse) -> Response {
    let mut response = Response::new(Body::from(shell_response.body));
    *response.status_mut() = shell_response.status;
    *response.headers_mut() = shell_response.headers;
    response
}

/// Installs the shell, then serves it. An install failure is logged and
/// the proxy keeps running, passing every request straight to the origin.
pub async fn start_shell_server(config: &ShellConfig) -> Result<(), anyhow::Error> {
    let network: Arc<dyn Network> = Arc::new(Upstream::new(
        &config.origin,
        Duration::from_secs(config.timeout_secs),
    )?);
    let storage = Arc::new(CacheStorage::new());
    let worker = Arc::new(ShellWorker::from_config(config, storage, network.clone()));

    match worker.start().await {
        Ok(()) => log::info!("Shell worker activated with cache {}.", worker.cache_name()),
        Err(e) => log::error!("Shell worker failed to start, serving network only: {}", e),
    }

    let app = router(worker, network);
    let listener = tokio::net::TcpListener::bind(&config.listen).await?;
    log::info!("Shell listening on {}, origin {}", listener.local_addr()?, config.origin);

    axum::serve(listener, app).await?;

    Ok(())
}
