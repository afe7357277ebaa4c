//! Axum router configuration

use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::convert::SourceFormat;
use crate::state::AppState;

use super::handlers::{convert_handler, health_check, root, version_check};
use super::middleware::{options_no_content, request_logger};

/// Create the Axum router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let mut router = Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/version", get(version_check));

    // One endpoint per accepted source format, all sharing the same pipeline
    for format in SourceFormat::ALL {
        router = router.route(&format.route(), post(convert_handler(format)));
    }

    router
        // Transport-level ceiling; larger than the file limit to leave room
        // for base64 expansion
        .layer(DefaultBodyLimit::max(state.config.limits.max_body_size_bytes()))
        .layer(middleware::from_fn(request_logger))
        // Spans only; `request_logger` writes the access-log line
        .layer(
            TraceLayer::new_for_http()
                .on_request(())
                .on_response(())
                .on_failure(()),
        )
        .layer(cors)
        .layer(middleware::from_fn(options_no_content))
        .with_state(state)
}
