//! HTTP API for house energy balances.
//!
//! - `GET  /api/house/{house_number}/energy`: current balance
//! - `POST /api/house/{house_number}/energy/update`: device-reported balance (replace)
//! - `POST /api/house/{house_number}/energy/recharge`: operator recharge (add + audit)
//! - `GET  /` and `/health`: liveness and endpoint listing

mod error;
mod handlers;
mod types;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::application::BalanceService;
use crate::config::ServerConfig;

pub use error::{ApiError, INTERNAL_ERROR_MESSAGE, NOT_FOUND_MESSAGE};
pub use types::*;

/// State shared by every request handler.
pub struct AppState {
    pub service: BalanceService,
}

impl AppState {
    pub fn new(service: BalanceService) -> Self {
        Self { service }
    }
}

/// Builds the router with all API routes, CORS open to any origin, and request tracing.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::health))
        .route("/health", get(handlers::health))
        .route("/api/house/{house_number}/energy", get(handlers::get_energy))
        .route(
            "/api/house/{house_number}/energy/update",
            post(handlers::update_energy),
        )
        .route(
            "/api/house/{house_number}/energy/recharge",
            post(handlers::recharge_energy),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Router with a per-request timeout. A timed-out handler is dropped, which rolls back
/// any transaction it still holds, and the caller gets the generic 500 body.
pub fn app(state: Arc<AppState>, request_timeout: Duration) -> Router {
    router(state).layer(middleware::from_fn_with_state(
        request_timeout,
        enforce_timeout,
    ))
}

async fn enforce_timeout(State(limit): State<Duration>, req: Request, next: Next) -> Response {
    match tokio::time::timeout(limit, next.run(req)).await {
        Ok(response) => response,
        Err(_) => ApiError::Timeout(limit).into_response(),
    }
}

/// Binds the listener and serves until SIGINT/SIGTERM, then drains in-flight
/// requests and closes the store pool.
pub async fn serve(service: BalanceService, config: &ServerConfig) -> anyhow::Result<()> {
    let addr = config.socket_addr();
    let state = Arc::new(AppState::new(service.clone()));
    let app = app(state, config.request_timeout());

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;
    info!("HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    service.close().await;
    info!("Server has shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received, draining in-flight requests");
}
