//! # V1 API Response Envelope
//!
//! Defines the canonical wire format for v1 API *success* responses. Every
//! endpoint returns an [`ApiResponse<T>`] envelope on success:
//!
//! ```json
//! {
//!   "data": { ... },
//!   "meta": { "nextCursor": "...", "total": 42 }
//! }
//! ```
//!
//! Errors never flow through this envelope — every handler returns
//! `Result<ApiResponse<T>, CoreError>`, and [`CoreError`]'s own
//! [`IntoResponse`](axum::response::IntoResponse) impl (§7) renders the
//! `{"error": {"kind": ..., "message": ...}}` shape directly. This keeps one
//! error wire contract for the whole process instead of a second one
//! duplicated at the API layer.
//!
//! ## Cursor Pagination
//!
//! Cursors are opaque base64-encoded strings. Clients must not parse or
//! construct them. An invalid cursor returns `CoreError::Invalid`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Pagination metadata included in list responses.
///
/// Field names serialize as camelCase on the wire (`nextCursor`, `total`).
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMeta {
    /// Opaque cursor to pass as `cursor` in the next request. `None` means
    /// there are no more results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
    /// Total number of matching items (when cheaply available).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

/// Offset-based pagination parameters accepted by list endpoints (§4.5:
/// `limit ∈ [1,100]`, `offset ≥ 0`).
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema, utoipa::IntoParams)]
pub struct OffsetPagination {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    20
}

impl Default for OffsetPagination {
    fn default() -> Self {
        Self { limit: default_limit(), offset: 0 }
    }
}

impl OffsetPagination {
    pub fn normalize(mut self) -> Self {
        self.limit = self.limit.clamp(1, 100);
        self
    }
}

/// Canonical v1 API success envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,

    #[serde(skip)]
    status: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self { data, meta: None, status: StatusCode::OK }
    }

    pub fn success_with_meta(data: T, meta: ResponseMeta) -> Self {
        Self { data, meta: Some(meta), status: StatusCode::OK }
    }

    pub fn created(data: T) -> Self {
        Self { data, meta: None, status: StatusCode::CREATED }
    }

    pub fn accepted(data: T) -> Self {
        Self { data, meta: None, status: StatusCode::ACCEPTED }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status;
        (status, Json(self)).into_response()
    }
}
