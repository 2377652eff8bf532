use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use http::header::{ACCEPT, AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE, ORIGIN, REFERER};
use http::{HeaderName, Method};
use tower_http::cors::{Any, CorsLayer};

use crate::handlers::{self, AppState};

/// Browser callers preflight every POST, so the permissive CORS policy the
/// hosted function used is part of the contract here.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::POST,
            Method::GET,
            Method::OPTIONS,
            Method::PUT,
            Method::DELETE,
        ])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            ACCEPT,
            ORIGIN,
            REFERER,
            CACHE_CONTROL,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
        ])
        .max_age(Duration::from_secs(86400))
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "CareCall role function is running!" }))
        .route("/fetch-role", post(handlers::fetch_role))
        .layer(cors_layer())
        .with_state(state)
}
