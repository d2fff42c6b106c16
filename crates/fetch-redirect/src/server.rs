//! Axum HTTP server: router, listener, graceful shutdown.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tracing::Instrument;

use crate::address::Address;
use crate::error::ProxyError;
use crate::fetch::Fetch;
use crate::proxy::{correlation, forward};
use crate::stats::ProxyStats;

/// Shared application state.
pub struct AppState<F> {
    /// The installed fetch capability every proxied request goes through.
    pub fetcher: F,
    pub stats: ProxyStats,
    pub max_body_bytes: usize,
}

impl<F: Fetch> AppState<F> {
    pub fn new(fetcher: F, max_body_bytes: usize) -> Self {
        Self {
            fetcher,
            stats: ProxyStats::new(),
            max_body_bytes,
        }
    }
}

/// Build the router. Anything that is not an admin route is proxied.
pub fn router<F: Fetch + 'static>(state: AppState<F>) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/api/stats", get(handle_get_stats::<F>))
        .fallback(handle_forward::<F>)
        .with_state(Arc::new(state))
}

/// Bind `listen_addr` and serve until Ctrl+C.
pub async fn run<F: Fetch + 'static>(listen_addr: &str, state: AppState<F>) -> anyhow::Result<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!(address = %listen_addr, "fetch-redirect listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("fetch-redirect shut down gracefully");
    Ok(())
}

/// Catch-all proxy handler.
///
/// 1. Refuse requests that already passed through this proxy, then resolve
///    the absolute address the client asked for
/// 2. Buffer the request body (bounded by `max_body_bytes`)
/// 3. Hand address and options to the installed fetcher
/// 4. Stream the response back
async fn handle_forward<F: Fetch + 'static>(
    State(state): State<Arc<AppState<F>>>,
    request: Request,
) -> Response {
    let correlation_id = correlation::generate_id();
    state.stats.inc_requests();

    let (parts, body) = request.into_parts();

    let resolved = forward::check_loop(&parts.headers)
        .and_then(|()| forward::resolve_address(&parts.method, &parts.uri, &parts.headers));
    let address = match resolved {
        Ok(address) => address,
        Err(e) => {
            state.stats.inc_failures();
            tracing::warn!(
                correlation_id = %correlation_id,
                method = %parts.method,
                uri = %parts.uri,
                error = %e,
                "Rejecting proxy request"
            );
            return forward::with_correlation(e.into_response(), &correlation_id);
        }
    };

    let span = redirect_tracing::proxy_request_span!(&correlation_id, &parts.method, &address);

    async {
        let body = match axum::body::to_bytes(body, state.max_body_bytes).await {
            Ok(b) => b,
            Err(e) => {
                state.stats.inc_failures();
                tracing::error!(error = %e, "Failed to read request body");
                let response = ProxyError::ReadBody(e.to_string()).into_response();
                return forward::with_correlation(response, &correlation_id);
            }
        };

        let options = forward::request_options(&parts.method, &parts.headers, body);
        let start = Instant::now();
        let result = state
            .fetcher
            .fetch(Address::Text(address), Some(options))
            .await;

        forward::build_response(result, start, &correlation_id, &state.stats)
    }
    .instrument(span)
    .await
}

/// GET /api/stats: current proxy statistics.
async fn handle_get_stats<F: Fetch + 'static>(State(state): State<Arc<AppState<F>>>) -> Response {
    axum::Json(state.stats.snapshot()).into_response()
}

/// Health check endpoint.
async fn handle_health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Wait for SIGINT (Ctrl+C) for graceful shutdown.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install CTRL+C signal handler");
    tracing::info!("Shutdown signal received, draining connections...");
}
