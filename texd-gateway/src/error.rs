//! Error types for the gateway crate.

use axum::{
    extract::rejection::JsonRejection,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use texd_compiler::{clip_tail, CompilerError, MAX_DIAGNOSTIC_BYTES};
use texd_core::{CoreError, SOURCE_FIELD};

/// Errors that can occur during gateway request handling.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum GatewayError {
    /// A required body field was absent, `null`, or empty.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// The `latex` field was present but not a string.
    #[error("invalid LaTeX content")]
    InvalidSource,

    /// Some other field had the wrong shape.
    #[error("invalid field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// The body could not be read as a JSON object.
    #[error("invalid request body: {0}")]
    InvalidBody(String),

    /// The body exceeded the configured size limit.
    #[error("request body too large")]
    PayloadTooLarge,

    /// Missing or wrong `x-api-key`.
    #[error("forbidden")]
    Forbidden,

    /// The `Origin` header is not on the allow-list.
    #[error("origin not allowed: {0}")]
    OriginNotAllowed(String),

    /// The client exhausted its request budget for the current window.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// An error propagated from the compiler layer.
    #[error("compiler error: {0}")]
    Compiler(#[from] CompilerError),

    /// No route matches the request.
    #[error("not found")]
    NotFound,

    /// Anything else; the detail is logged, never returned.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Cap on `details` in a compile-failure body.
pub const MAX_DETAILS_BYTES: usize = MAX_DIAGNOSTIC_BYTES + 64;

/// JSON error body shared by every failure response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorBody {
    fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self { error: error.into(), message: message.into(), details: None }
    }
}

impl GatewayError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingField(_)
            | Self::InvalidSource
            | Self::InvalidField { .. }
            | Self::InvalidBody(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Forbidden | Self::OriginNotAllowed(_) => StatusCode::FORBIDDEN,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Compiler(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> ErrorBody {
        match self {
            Self::MissingField(field) if *field == SOURCE_FIELD => ErrorBody::new(
                format!("Missing required field: {SOURCE_FIELD}"),
                "Please provide a LaTeX string in the request body",
            ),
            Self::MissingField(field) => ErrorBody::new(
                format!("Missing required field: {field}"),
                format!("Please provide '{field}' in the request body"),
            ),
            Self::InvalidSource => ErrorBody::new(
                "Invalid LaTeX content",
                "LaTeX content must be a non-empty string",
            ),
            Self::InvalidField { field, reason } => {
                ErrorBody::new(format!("Invalid field: {field}"), reason.clone())
            }
            Self::InvalidBody(reason) => ErrorBody::new("Invalid request body", reason.clone()),
            Self::PayloadTooLarge => {
                ErrorBody::new("Payload too large", "Request body exceeds the size limit")
            }
            Self::Forbidden => ErrorBody::new("Forbidden", "A valid API key is required"),
            Self::OriginNotAllowed(_) => ErrorBody::new("Forbidden", "Origin not allowed"),
            Self::RateLimited { .. } => ErrorBody::new(
                "Too many requests",
                "Rate limit exceeded. Please try again later.",
            ),
            Self::Compiler(CompilerError::ArtifactMissing { .. }) => ErrorBody::new(
                "No PDF generated",
                "Compilation succeeded but no PDF was produced",
            ),
            Self::Compiler(e) if e.is_compile_failure() => ErrorBody {
                details: Some(clip_tail(&e.to_string(), MAX_DETAILS_BYTES)),
                ..ErrorBody::new(
                    "LaTeX compilation failed",
                    "The provided LaTeX code could not be compiled",
                )
            },
            Self::NotFound => {
                ErrorBody::new("Not found", "The requested endpoint does not exist")
            }
            Self::Compiler(_) | Self::Internal(_) => {
                ErrorBody::new("Internal server error", "An unexpected error occurred")
            }
        }
    }
}

impl From<CoreError> for GatewayError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::MissingField { field } => Self::MissingField(field),
            CoreError::InvalidField { field, .. } if field == SOURCE_FIELD => Self::InvalidSource,
            CoreError::InvalidField { field, reason } => Self::InvalidField { field, reason },
            CoreError::InvalidBody { reason } => Self::InvalidBody(reason),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for GatewayError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge
        } else {
            Self::InvalidBody(rejection.body_text())
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let mut response = (status, Json(self.body())).into_response();
        if let Self::RateLimited { retry_after_secs } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    use axum::body::to_bytes;
    use texd_core::Engine;

    async fn body_json(err: GatewayError) -> (StatusCode, serde_json::Value) {
        let resp = err.into_response();
        let status = resp.status();
        let bytes = match to_bytes(resp.into_body(), usize::MAX).await {
            Ok(b) => b,
            Err(e) => panic!("failed to read body: {e}"),
        };
        match serde_json::from_slice(&bytes) {
            Ok(v) => (status, v),
            Err(e) => panic!("error body is not JSON: {e}"),
        }
    }

    #[tokio::test]
    async fn missing_latex_maps_to_reference_body() {
        let (status, json) = body_json(CoreError::MissingField { field: "latex" }.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Missing required field: latex");
        assert_eq!(json["message"], "Please provide a LaTeX string in the request body");
        assert!(json.get("details").is_none());
    }

    #[tokio::test]
    async fn non_string_latex_is_invalid_content() {
        let err: GatewayError =
            CoreError::InvalidField { field: "latex", reason: "expected a string".into() }.into();
        let (status, json) = body_json(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Invalid LaTeX content");
    }

    #[tokio::test]
    async fn compile_failure_carries_diagnostic_details() {
        let err = GatewayError::Compiler(CompilerError::Failed {
            engine: Engine::XeLaTeX,
            exit_code: Some(1),
            diagnostic: "! Undefined control sequence.".into(),
        });
        let (status, json) = body_json(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "LaTeX compilation failed");
        assert_eq!(json["message"], "The provided LaTeX code could not be compiled");
        let details = json["details"].as_str().unwrap_or_default();
        assert!(details.contains("Undefined control sequence"), "details: {details}");
    }

    #[tokio::test]
    async fn oversized_diagnostic_is_clipped_in_details() {
        let err = GatewayError::Compiler(CompilerError::Failed {
            engine: Engine::XeLaTeX,
            exit_code: Some(1),
            diagnostic: format!("{}\n! Emergency stop.", "x".repeat(1_000_000)),
        });
        let (_, json) = body_json(err).await;
        let details = json["details"].as_str().unwrap_or_default();
        assert!(details.len() <= MAX_DETAILS_BYTES + 16, "details is {} bytes", details.len());
        assert!(details.ends_with("! Emergency stop."));
    }

    #[tokio::test]
    async fn timeout_is_reported_as_compile_failure() {
        let err = GatewayError::Compiler(CompilerError::TimedOut {
            engine: Engine::Tectonic,
            timeout: Duration::from_secs(30),
        });
        let (status, json) = body_json(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "LaTeX compilation failed");
        assert!(json["details"].as_str().is_some_and(|d| d.contains("timed out")));
    }

    #[tokio::test]
    async fn missing_artifact_maps_to_no_pdf_generated() {
        let err = GatewayError::Compiler(CompilerError::ArtifactMissing {
            dir: PathBuf::from("/tmp/xelatex-00/output"),
        });
        let (status, json) = body_json(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "No PDF generated");
        assert!(json.get("details").is_none());
    }

    #[tokio::test]
    async fn sandbox_io_failure_does_not_leak_paths() {
        let err = GatewayError::Compiler(CompilerError::Sandbox {
            path: PathBuf::from("/var/tmp/secret"),
            source: std::io::Error::other("disk full"),
        });
        let (status, json) = body_json(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "Internal server error");
        assert!(!json.to_string().contains("/var/tmp/secret"));
    }

    #[test]
    fn rate_limited_sets_retry_after() {
        let resp = GatewayError::RateLimited { retry_after_secs: 42 }.into_response();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            resp.headers().get(header::RETRY_AFTER).and_then(|v| v.to_str().ok()),
            Some("42")
        );
    }

    #[test]
    fn gate_errors_map_to_forbidden_and_not_found() {
        assert_eq!(GatewayError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            GatewayError::OriginNotAllowed("https://evil.example".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(GatewayError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(GatewayError::PayloadTooLarge.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
