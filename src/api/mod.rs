//! REST adapter over the job manager.
//!
//! Endpoints:
//! - `POST /simulations?mode=sync|async`: run a request inline or queue it
//! - `GET /simulations/{id}`: job status
//! - `GET /simulations/{id}/result`: result once succeeded, status otherwise
//! - `POST /simulations/{id}/cancel`: cancel a queued or running job
//! - `GET /nodes`: the template's node registry
//! - `GET /nodes/{id}`: one registered node

mod handlers;
mod types;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tracing::info;

use crate::jobs::JobManager;
use crate::sim::Solver;

pub use types::{ErrorResponse, RunMode, StatusResponse, SubmitResponse};

/// Application state shared across all request handlers.
pub struct AppState<S: Solver> {
    /// Job manager every request goes through.
    pub manager: Arc<JobManager<S>>,
}

/// Builds the axum router with all API routes.
pub fn router<S: Solver>(state: Arc<AppState<S>>) -> Router {
    Router::new()
        .route("/simulations", post(handlers::submit::<S>))
        .route("/simulations/{id}", get(handlers::get_status::<S>))
        .route("/simulations/{id}/result", get(handlers::get_result::<S>))
        .route("/simulations/{id}/cancel", post(handlers::cancel::<S>))
        .route("/nodes", get(handlers::list_nodes::<S>))
        .route("/nodes/{id}", get(handlers::get_node::<S>))
        .with_state(state)
}

/// Binds to the given address and serves the API until the server stops.
///
/// # Errors
///
/// Returns an `io::Error` if the listener cannot bind or the server fails.
pub async fn serve<S: Solver>(state: Arc<AppState<S>>, addr: SocketAddr) -> std::io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "API server listening");
    axum::serve(listener, app).await
}
