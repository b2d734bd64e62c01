//! Axum route handlers for the texd gateway API.

use std::any::Any;

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use texd_compiler::CompiledArtifact;
use texd_core::{CompileRequest, Engine};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowHeaders, AllowOrigin, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::{
    error::GatewayError,
    middleware::{check_origin, rate_limit, require_api_key},
    state::AppState,
};

/// Response header carrying the job id.
pub const JOB_ID_HEADER: HeaderName = HeaderName::from_static("x-job-id");
/// Response header carrying the hex SHA-256 of the PDF body.
pub const CONTENT_SHA256_HEADER: HeaderName = HeaderName::from_static("x-content-sha256");

const CROSS_ORIGIN_RESOURCE_POLICY: HeaderName =
    HeaderName::from_static("cross-origin-resource-policy");

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: String,
    pub timestamp: String,
    pub engine: Engine,
}

// ── Router ────────────────────────────────────────────────────────────────────

/// Build the application router.
///
/// `/health` skips the API key and the rate limit. Everything else,
/// unknown paths included, passes the API key, then the rate limit, then
/// the body cap. Every route goes through the origin check, CORS and the
/// security headers.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.settings.allowed_origins);

    let gated = Router::new()
        .route("/compile", post(compile))
        .fallback(not_found)
        .method_not_allowed_fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit))
        .layer(middleware::from_fn_with_state(state.clone(), require_api_key))
        .layer(DefaultBodyLimit::max(state.settings.body_limit));

    Router::new()
        .route("/health", get(health))
        .method_not_allowed_fallback(not_found)
        .merge(gated)
        .with_state(state.clone())
        .layer(cors)
        .layer(middleware::from_fn_with_state(state, check_origin))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            CROSS_ORIGIN_RESOURCE_POLICY,
            HeaderValue::from_static("same-origin"),
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(panic_response))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> =
        origins.iter().filter_map(|o| HeaderValue::from_str(o).ok()).collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(AllowHeaders::mirror_request())
        .expose_headers([header::CONTENT_DISPOSITION, JOB_ID_HEADER, CONTENT_SHA256_HEADER])
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| err.downcast_ref::<&str>().map(|s| (*s).to_owned()))
        .unwrap_or_else(|| "unknown panic payload".to_owned());
    GatewayError::Internal(format!("handler panicked: {detail}")).into_response()
}

// ── Handlers ──────────────────────────────────────────────────────────────────

/// `GET /health`: liveness check.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let engine = state.runner.engine();
    Json(HealthResponse {
        status: "healthy",
        service: format!("{}-pdf-service", engine.slug()),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        engine,
    })
}

/// `POST /compile`: typeset the submitted LaTeX and return the PDF.
///
/// # Errors
/// - 400 when the body is not a JSON object or `latex` is missing/invalid.
/// - 413 when the body exceeds the configured limit.
/// - 500 when compilation fails, times out, or produces no PDF.
pub async fn compile(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Response, GatewayError> {
    let Json(payload) = payload?;
    let request = CompileRequest::from_json(&payload)?;
    let artifact = state.runner.execute(&request).await?;
    pdf_response(artifact)
}

/// Fallback for unknown paths and unsupported methods.
pub async fn not_found() -> GatewayError {
    GatewayError::NotFound
}

fn pdf_response(artifact: CompiledArtifact) -> Result<Response, GatewayError> {
    let disposition = format!("attachment; filename=\"{}\"", artifact.file_name);
    let disposition = HeaderValue::from_str(&disposition)
        .map_err(|e| GatewayError::Internal(format!("invalid Content-Disposition: {e}")))?;
    let job_id = HeaderValue::from_str(&artifact.job_id.to_string())
        .map_err(|e| GatewayError::Internal(format!("invalid job id header: {e}")))?;
    let digest = HeaderValue::from_str(&artifact.content_hash.to_string())
        .map_err(|e| GatewayError::Internal(format!("invalid digest header: {e}")))?;

    let length = artifact.bytes.len();
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/pdf")),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CONTENT_LENGTH, HeaderValue::from(length)),
            (JOB_ID_HEADER, job_id),
            (CONTENT_SHA256_HEADER, digest),
        ],
        Body::from(artifact.bytes),
    )
        .into_response())
}
