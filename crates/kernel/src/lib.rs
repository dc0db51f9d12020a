//! DevCamper API library.
//!
//! This library exposes the server internals for integration testing and
//! the `devcamper` binary.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod query;
pub mod routes;
pub mod seed;
pub mod services;
pub mod state;
pub mod store;

use axum::Router;
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use state::AppState;

/// The application router with authentication and request tracing.
///
/// CORS is left to the caller.
pub fn app(state: AppState) -> Router {
    routes::api_router(&state.config().files_url)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::authenticate,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
