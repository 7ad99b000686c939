use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// The core error taxonomy. Every fallible component operation returns one of
/// these kinds; no component uses exceptions-as-control-flow or panics for
/// conditions a caller can reasonably trigger.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("invalid request: {0}")]
    Invalid(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate of existing memory {existing_id} (similarity {similarity:.3})")]
    Duplicate {
        existing_id: String,
        similarity: f32,
    },

    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("database error: {0}")]
    Database(#[from] libsql::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl CoreError {
    /// The stable, wire-safe kind token carried alongside the human message
    /// (§7: "every error carries a stable kind token and a human message").
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Invalid(_) => "invalid",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Duplicate { .. } => "duplicate",
            Self::QuotaExceeded(_) => "quota_exceeded",
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
            Self::Transient(_) => "transient",
            Self::Database(_) | Self::Http(_) | Self::Json(_) | Self::Io(_) | Self::UrlParse(_) => {
                "internal"
            }
            Self::Internal(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Invalid(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Duplicate { .. } => StatusCode::CONFLICT,
            Self::QuotaExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Database(e) => {
                tracing::error!(error = %e, "store error surfaced to request surface");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Http(_) | Self::Json(_) | Self::Io(_) | Self::UrlParse(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "internal invariant violation");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Human-readable message safe to show a caller. Internal details never
    /// leak for Internal/Database/Io kinds — those are logged instead.
    fn public_message(&self) -> String {
        match self {
            Self::Database(_) | Self::Http(_) | Self::Io(_) => {
                "an internal error occurred".to_string()
            }
            Self::Internal(_) => "an internal error occurred".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();
        let message = self.public_message();
        let body = Json(json!({
            "error": {
                "kind": kind,
                "message": message,
            }
        }));
        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
