//! Router assembly.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    routing::{get, post, put},
};
use tower_http::{
    cors::CorsLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::app::AppState;

use super::handlers::{
    ApiDoc, acknowledge_handler, cancel_handler, classify_error_handler, close_call_site_handler,
    decode_identifier_handler, encode_identifier_handler, get_call_site_handler,
    health_check_handler, list_call_sites_handler, list_notifications_handler, liveness_handler,
    open_call_site_handler, readiness_handler, run_action_handler,
};

/// Request bodies above this size are refused
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Handlers never wait on confirmation, so this only bounds wedged requests
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/call-sites", get(list_call_sites_handler))
        .route(
            "/call-sites/{id}",
            put(open_call_site_handler)
                .get(get_call_site_handler)
                .delete(close_call_site_handler),
        )
        .route("/call-sites/{id}/run", post(run_action_handler))
        .route("/call-sites/{id}/cancel", post(cancel_handler))
        .route("/call-sites/{id}/acknowledge", post(acknowledge_handler))
        .route("/notifications", get(list_notifications_handler))
        .route("/identifiers/encode", post(encode_identifier_handler))
        .route("/identifiers/decode", post(decode_identifier_handler))
        .route("/errors/classify", post(classify_error_handler))
        .route("/health", get(health_check_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .with_state(state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
