//! Re.Power backend HTTP API.
//!
//! Serves a greeting on `/` and a health check on `/health`, behind a
//! permissive CORS policy and a JSON body parser.

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::normalize_path::NormalizePathLayer;
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use error::{ApiError, ServerError};
pub use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
///
/// Paths match case-insensitively and ignore trailing slashes, so the route
/// table sits behind an outer router that normalizes the URI first.
pub fn create_app(state: Arc<AppState>) -> Router {
    let routes = Router::new()
        .route(
            "/",
            get(routes::root::greet).fallback(routes::fallback::not_found),
        )
        .route(
            "/health",
            get(routes::health::check).fallback(routes::fallback::not_found),
        )
        .fallback(routes::fallback::not_found)
        .with_state(state);

    Router::new()
        .fallback_service(routes)
        .layer(axum::middleware::from_fn(middleware::parse_json_body))
        .layer(NormalizePathLayer::trim_trailing_slash())
        .layer(axum::middleware::map_request(middleware::lowercase_path))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Builds the router from process configuration.
pub fn create_app_from_config(config: &Config) -> Router {
    create_app(Arc::new(AppState::from_config(config)))
}
