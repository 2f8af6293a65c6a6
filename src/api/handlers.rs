//! HTTP request handlers with OpenAPI documentation.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::error;
use utoipa::OpenApi;

use crate::app::AppState;
use crate::domain::{
    AppError, Bytes32, CallSiteOptions, ClassifyResponse, DecodeIdentifierRequest,
    DecodeIdentifierResponse, EncodeIdentifierRequest, EncodeIdentifierResponse, ErrorDetail,
    ErrorResponse, HealthResponse, HealthStatus, LedgerError, LifecycleError, LifecycleRecord,
    Notification, RawFailure, RunActionRequest, WalletError,
};

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Transaction Lifecycle Coordinator API",
        version = "0.1.0",
        description = "Drive ledger actions through a supervised submit/confirm lifecycle per call site",
        license(
            name = "MIT"
        )
    ),
    paths(
        list_call_sites_handler,
        open_call_site_handler,
        get_call_site_handler,
        close_call_site_handler,
        run_action_handler,
        cancel_handler,
        acknowledge_handler,
        list_notifications_handler,
        encode_identifier_handler,
        decode_identifier_handler,
        classify_error_handler,
        health_check_handler,
        liveness_handler,
        readiness_handler,
    ),
    components(
        schemas(
            LifecycleRecord,
            crate::domain::LifecycleState,
            crate::domain::ErrorKind,
            crate::domain::ReentryPolicy,
            crate::domain::TransactionHandle,
            crate::domain::ArgumentInput,
            crate::domain::NotificationKind,
            crate::domain::NotificationMessage,
            crate::domain::NotificationId,
            RunActionRequest,
            CallSiteOptions,
            Notification,
            Bytes32,
            EncodeIdentifierRequest,
            EncodeIdentifierResponse,
            DecodeIdentifierRequest,
            DecodeIdentifierResponse,
            RawFailure,
            ClassifyResponse,
            HealthResponse,
            HealthStatus,
            ErrorResponse,
            ErrorDetail,
        )
    ),
    tags(
        (name = "call-sites", description = "Lifecycle coordination per call site"),
        (name = "notifications", description = "Visible notifications"),
        (name = "tools", description = "Identifier codec and error classifier"),
        (name = "health", description = "Health check endpoints")
    )
)]
pub struct ApiDoc;

/// List every registered call site with its current record
#[utoipa::path(
    get,
    path = "/call-sites",
    tag = "call-sites",
    responses(
        (status = 200, description = "Records ordered by call-site id", body = Vec<LifecycleRecord>)
    )
)]
pub async fn list_call_sites_handler(
    State(state): State<Arc<AppState>>,
) -> Json<Vec<LifecycleRecord>> {
    Json(state.service.call_sites())
}

/// Register a call site
///
/// Send `{}` to use the server defaults. Overrides apply to every attempt
/// made at this call site.
#[utoipa::path(
    put,
    path = "/call-sites/{id}",
    tag = "call-sites",
    params(
        ("id" = String, Path, description = "Call-site id")
    ),
    request_body = CallSiteOptions,
    responses(
        (status = 201, description = "Call site registered", body = LifecycleRecord),
        (status = 400, description = "Invalid id or options", body = ErrorResponse),
        (status = 409, description = "Call site already registered", body = ErrorResponse),
        (status = 429, description = "Call-site limit reached", body = ErrorResponse)
    )
)]
pub async fn open_call_site_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(options): Json<CallSiteOptions>,
) -> Result<(StatusCode, Json<LifecycleRecord>), AppError> {
    let record = state.service.open_call_site(&id, &options)?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// Current lifecycle record of a call site
#[utoipa::path(
    get,
    path = "/call-sites/{id}",
    tag = "call-sites",
    params(
        ("id" = String, Path, description = "Call-site id")
    ),
    responses(
        (status = 200, description = "Current record", body = LifecycleRecord),
        (status = 404, description = "Call site not found", body = ErrorResponse)
    )
)]
pub async fn get_call_site_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<LifecycleRecord>, AppError> {
    Ok(Json(state.service.record(&id)?))
}

/// Tear a call site down
///
/// Cancels any attempt in flight and releases its notification.
#[utoipa::path(
    delete,
    path = "/call-sites/{id}",
    tag = "call-sites",
    params(
        ("id" = String, Path, description = "Call-site id")
    ),
    responses(
        (status = 200, description = "Final record", body = LifecycleRecord),
        (status = 404, description = "Call site not found", body = ErrorResponse)
    )
)]
pub async fn close_call_site_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<LifecycleRecord>, AppError> {
    Ok(Json(state.service.close_call_site(&id).await?))
}

/// Run an action
///
/// Starts a new attempt and returns immediately with the `submitting` record.
/// **Acceptance is not confirmation.** Poll `GET /call-sites/{id}` to follow
/// the attempt through `awaiting_confirmation` to `confirmed`, `failed` or
/// `timed_out`. The call site is registered with defaults on first use.
#[utoipa::path(
    post,
    path = "/call-sites/{id}/run",
    tag = "call-sites",
    params(
        ("id" = String, Path, description = "Call-site id")
    ),
    request_body = RunActionRequest,
    responses(
        (status = 202, description = "Attempt started", body = LifecycleRecord),
        (status = 400, description = "Validation or codec error", body = ErrorResponse),
        (status = 409, description = "Attempt in flight and the call site rejects re-entry", body = ErrorResponse),
        (status = 429, description = "Unregistered call site and the limit is reached", body = ErrorResponse)
    )
)]
pub async fn run_action_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<RunActionRequest>,
) -> Result<(StatusCode, Json<LifecycleRecord>), AppError> {
    let record = state.service.run_action(&id, &payload).await?;
    Ok((StatusCode::ACCEPTED, Json(record)))
}

/// Cancel the current attempt
///
/// Results that arrive later for the cancelled attempt are discarded.
#[utoipa::path(
    post,
    path = "/call-sites/{id}/cancel",
    tag = "call-sites",
    params(
        ("id" = String, Path, description = "Call-site id")
    ),
    responses(
        (status = 200, description = "Idle record", body = LifecycleRecord),
        (status = 404, description = "Call site not found", body = ErrorResponse)
    )
)]
pub async fn cancel_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<LifecycleRecord>, AppError> {
    Ok(Json(state.service.cancel(&id).await?))
}

/// Acknowledge a terminal attempt and return to idle
#[utoipa::path(
    post,
    path = "/call-sites/{id}/acknowledge",
    tag = "call-sites",
    params(
        ("id" = String, Path, description = "Call-site id")
    ),
    responses(
        (status = 200, description = "Idle record", body = LifecycleRecord),
        (status = 404, description = "Call site not found", body = ErrorResponse),
        (status = 409, description = "Attempt is not terminal", body = ErrorResponse)
    )
)]
pub async fn acknowledge_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<LifecycleRecord>, AppError> {
    Ok(Json(state.service.acknowledge(&id).await?))
}

/// Currently visible notifications, oldest first
#[utoipa::path(
    get,
    path = "/notifications",
    tag = "notifications",
    responses(
        (status = 200, description = "Visible notifications", body = Vec<Notification>),
        (status = 501, description = "Surface cannot list notifications", body = ErrorResponse)
    )
)]
pub async fn list_notifications_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Notification>>, AppError> {
    Ok(Json(state.service.notifications()?))
}

/// Encode a human identifier into its 32-byte form
#[utoipa::path(
    post,
    path = "/identifiers/encode",
    tag = "tools",
    request_body = EncodeIdentifierRequest,
    responses(
        (status = 200, description = "Encoded value", body = EncodeIdentifierResponse),
        (status = 400, description = "Identifier longer than 32 bytes", body = ErrorResponse)
    )
)]
pub async fn encode_identifier_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<EncodeIdentifierRequest>,
) -> Result<Json<EncodeIdentifierResponse>, AppError> {
    let bytes32 = state.service.encode_identifier(&payload.identifier)?;
    Ok(Json(EncodeIdentifierResponse { bytes32 }))
}

/// Decode a 32-byte value back into an identifier
#[utoipa::path(
    post,
    path = "/identifiers/decode",
    tag = "tools",
    request_body = DecodeIdentifierRequest,
    responses(
        (status = 200, description = "Decoded identifier", body = DecodeIdentifierResponse),
        (status = 400, description = "Not 32 bytes of hex", body = ErrorResponse)
    )
)]
pub async fn decode_identifier_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<DecodeIdentifierRequest>,
) -> Result<Json<DecodeIdentifierResponse>, AppError> {
    let bytes = Bytes32::from_hex(&payload.bytes32)?;
    Ok(Json(DecodeIdentifierResponse {
        identifier: state.service.decode_identifier(&bytes),
    }))
}

/// Classify a raw failure
#[utoipa::path(
    post,
    path = "/errors/classify",
    tag = "tools",
    request_body = RawFailure,
    responses(
        (status = 200, description = "Classification", body = ClassifyResponse)
    )
)]
pub async fn classify_error_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RawFailure>,
) -> Json<ClassifyResponse> {
    Json(state.service.classify(&payload).into())
}

/// Detailed health check
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Health status", body = HealthResponse)
    )
)]
pub async fn health_check_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let health = state.service.health_check().await;
    Json(health)
}

/// Kubernetes liveness probe
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "health",
    responses(
        (status = 200, description = "Application is alive")
    )
)]
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// Kubernetes readiness probe
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "health",
    responses(
        (status = 200, description = "Application is ready to serve traffic"),
        (status = 503, description = "Ledger unreachable")
    )
)]
pub async fn readiness_handler(State(state): State<Arc<AppState>>) -> StatusCode {
    let health = state.service.health_check().await;
    match health.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_type) = match &self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            AppError::Codec(_) => (StatusCode::BAD_REQUEST, "codec_error"),
            AppError::Lifecycle(lc_err) => match lc_err {
                LifecycleError::CallSiteNotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
                LifecycleError::CallSiteExists(_) => (StatusCode::CONFLICT, "duplicate"),
                LifecycleError::AttemptInFlight { .. } => {
                    (StatusCode::CONFLICT, "attempt_in_flight")
                }
                LifecycleError::NotTerminal(_) => (StatusCode::CONFLICT, "not_terminal"),
                LifecycleError::CoordinatorStopped(_) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "coordinator_stopped")
                }
                LifecycleError::RegistryFull(_) => {
                    (StatusCode::TOO_MANY_REQUESTS, "registry_full")
                }
            },
            AppError::Ledger(ledger_err) => match ledger_err {
                LedgerError::Connection(_) => (StatusCode::SERVICE_UNAVAILABLE, "ledger_error"),
                LedgerError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
                _ => (StatusCode::BAD_GATEWAY, "ledger_error"),
            },
            AppError::Wallet(wallet_err) => match wallet_err {
                WalletError::UserRejected(_) => (StatusCode::FORBIDDEN, "wallet_rejected"),
                WalletError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "wallet_error"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "wallet_error"),
            },
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "configuration_error"),
            AppError::Serialization(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "serialization_error")
            }
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            AppError::NotSupported(_) => (StatusCode::NOT_IMPLEMENTED, "not_supported"),
        };
        let message = self.to_string();

        if status.is_server_error() {
            error!(error_type = %error_type, message = %message, "Server error");
        }

        let body = Json(ErrorResponse {
            error: ErrorDetail {
                r#type: error_type.to_string(),
                message,
            },
        });

        (status, body).into_response()
    }
}
