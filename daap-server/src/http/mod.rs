//! The axum route table and everything that wraps it: query decoding,
//! Basic auth, the WSGI-style path rewrite, the response cache and the
//! standard DAAP response headers.

pub mod cache;
pub mod error;
pub mod middleware;
pub mod query;
pub mod range;
pub mod routes;

pub use error::{AppError, AppResult};

use std::sync::Arc;

use axum::middleware as axum_middleware;
use axum::routing::{get, post};
use axum::Router;
use daap_core::{Config, Provider};
use tower_http::trace::TraceLayer;

use cache::ResponseCache;

/// Shared application state every handler extracts via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub provider: Provider,
    pub config: Arc<Config>,
    pub cache: ResponseCache,
}

impl AppState {
    pub fn new(provider: Provider, config: Arc<Config>) -> Self {
        let cache = ResponseCache::new(&config.cache);
        Self {
            provider,
            config,
            cache,
        }
    }
}

/// Assembles the full route table and layers (trace, header stamping,
/// Basic auth, path rewrite) around it.
pub fn build_router(state: AppState) -> Router {
    let authenticated = Router::new()
        .route("/login", get(routes::login))
        .route("/logout", get(routes::logout))
        .route("/activity", get(routes::activity))
        .route("/update", get(routes::update))
        .route("/fp-setup", post(routes::fp_setup))
        .route("/databases", get(routes::databases))
        .route("/databases/{database}/items", get(routes::items))
        .route("/databases/{database}/containers", get(routes::containers))
        .route(
            "/databases/{database}/containers/{container}/items",
            get(routes::container_items),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::basic_auth,
        ));

    let unauthenticated = Router::new()
        .route("/server-info", get(routes::server_info))
        .route("/content-codes", get(routes::content_codes))
        // `{item}.{ext}` is one path segment (e.g. `42.mp3`); axum has no
        // dotted-suffix matcher, so the handler splits it itself.
        .route(
            "/databases/{database}/items/{item_and_suffix}",
            get(routes::item_stream),
        )
        .route(
            "/databases/{database}/items/{item}/extra_data/artwork",
            get(routes::artwork),
        );

    authenticated
        .merge(unauthenticated)
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::stamp_daap_headers,
        ))
        .layer(axum_middleware::from_fn(middleware::rewrite_wsgi_style_path))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
