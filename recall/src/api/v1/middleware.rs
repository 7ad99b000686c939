//! # V1 Request Surface Middleware (§4.11)
//!
//! The Request Surface never issues or validates credentials — authentication
//! and session issuance are out of scope for the core (§1) and are the
//! responsibility of an upstream authenticator/gateway. This middleware only
//! trusts the `(tenant, user, permissions)` triple once it arrives via
//! headers set by that upstream, builds a [`RequestContext`], and enforces
//! the per-(tenant, user, path) fixed-window rate limit.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::api::state::AppState;
use crate::error::CoreError;
use crate::models::RequestContext;

const TENANT_HEADER: &str = "x-tenant-id";
const USER_HEADER: &str = "x-user-id";
const PERMISSIONS_HEADER: &str = "x-permissions";

/// Fixed-window counter keyed by `(tenant, user, path)` (§4.11: default
/// 100/min). The window resets lazily on first request past its deadline
/// rather than on a background timer.
pub struct RateLimiter {
    limit_per_minute: u32,
    windows: Mutex<HashMap<String, (u32, Instant)>>,
}

impl RateLimiter {
    pub fn new(limit_per_minute: u32) -> Self {
        Self { limit_per_minute, windows: Mutex::new(HashMap::new()) }
    }

    fn check(&self, key: &str) -> bool {
        let mut windows = self.windows.lock().expect("rate limiter mutex poisoned");
        let now = Instant::now();
        let entry = windows.entry(key.to_string()).or_insert((0, now));

        if now.duration_since(entry.1) >= Duration::from_secs(60) {
            *entry = (0, now);
        }

        if entry.0 >= self.limit_per_minute {
            return false;
        }

        entry.0 += 1;
        true
    }
}

/// Extracts `(tenant, user, permissions)` from trusted upstream headers,
/// enforces the rate limit, and injects a [`RequestContext`] extension for
/// downstream handlers.
pub async fn v1_request_context_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let tenant_id = match request.headers().get(TENANT_HEADER).and_then(|h| h.to_str().ok()) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => return CoreError::Unauthorized.into_response(),
    };

    let user_id = request
        .headers()
        .get(USER_HEADER)
        .and_then(|h| h.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let permissions = request
        .headers()
        .get(PERMISSIONS_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.split(',').map(str::trim).filter(|p| !p.is_empty()).map(str::to_string).collect())
        .unwrap_or_default();

    let rate_key = format!("{tenant_id}:{}:{}", user_id.as_deref().unwrap_or("-"), request.uri().path());
    if !state.rate_limiter.check(&rate_key) {
        return CoreError::QuotaExceeded("rate limit exceeded".to_string()).into_response();
    }

    request.extensions_mut().insert(RequestContext { tenant_id, user_id, permissions });

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachments::storage::LocalStorageBackend;
    use crate::attachments::AttachmentService;
    use crate::cache::Cache;
    use crate::config::{AttachmentsConfig, CacheConfig, Config, DatabaseConfig, QueueConfig};
    use crate::db::{Database, LibSqlBackend};
    use crate::events::EventBus;
    use crate::llm::LlmProvider;
    use crate::queue::TaskQueue;
    use axum::http::StatusCode;
    use axum::{middleware, routing::get, Router};
    use std::sync::Arc;
    use std::time::{SystemTime, UNIX_EPOCH};
    use tower::ServiceExt;

    fn test_db_config() -> DatabaseConfig {
        let timestamp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        let thread_id = std::thread::current().id();
        DatabaseConfig {
            url: format!("file:/tmp/recall_mw_test_{thread_id:?}_{timestamp}?mode=memory&cache=shared"),
            auth_token: None,
            local_path: None,
            busy_timeout_ms: 5000,
            journal_mode: "WAL".into(),
            synchronous: "NORMAL".into(),
            pool_min: 1,
            pool_max: 4,
            acquire_retries: 3,
        }
    }

    async fn build_test_app() -> Router {
        let mut config = Config::from_env();
        config.database = test_db_config();
        config.server.rate_limit_per_minute = 2;
        let config = Arc::new(config);

        let db = Database::new(&config.database).await.expect("db init");
        let backend: Arc<dyn crate::db::DatabaseBackend> = Arc::new(LibSqlBackend::new(db));

        let cache = Arc::new(Cache::new(CacheConfig {
            enabled: true,
            key_prefix: "recall-test".into(),
            capacity: 100,
            embedding_ttl_secs: 60,
            entity_graph_ttl_secs: 60,
            memory_ttl_secs: 60,
            metadata_ttl_secs: 60,
            search_result_ttl_secs: 60,
            list_ttl_secs: 60,
        }));
        let storage: Arc<dyn crate::attachments::storage::StorageBackend> =
            Arc::new(LocalStorageBackend::new("/tmp/recall_mw_test_attachments".into()));
        let attachments = AttachmentService::new(
            backend.clone(),
            storage,
            None,
            None,
            AttachmentsConfig { storage_root: "/tmp/recall_mw_test_attachments".into(), max_file_size_bytes: 1024, download_timeout_secs: 5 },
        );
        let (queue, _rx) = TaskQueue::new(QueueConfig { workers: 1, max_attempts: 1, shutdown_drain_secs: 1 });

        let state = AppState::new(
            config,
            backend,
            cache,
            None,
            None,
            attachments,
            Arc::new(queue),
            EventBus::new(),
            LlmProvider::unavailable("test"),
        );

        async fn protected_handler(ctx: axum::extract::Extension<RequestContext>) -> String {
            ctx.0.tenant_id
        }

        Router::new()
            .route("/protected", get(protected_handler))
            .route_layer(middleware::from_fn_with_state(state.clone(), v1_request_context_middleware))
            .with_state(state)
    }

    #[tokio::test]
    async fn rejects_missing_tenant_header() {
        let app = build_test_app().await;

        let response = app
            .oneshot(Request::builder().uri("/protected").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn trusts_tenant_header_and_injects_context() {
        let app = build_test_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/protected")
                    .header(TENANT_HEADER, "acme")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"acme");
    }

    #[tokio::test]
    async fn enforces_fixed_window_rate_limit() {
        let app = build_test_app().await;

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .uri("/protected")
                        .header(TENANT_HEADER, "acme")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/protected")
                    .header(TENANT_HEADER, "acme")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_ne!(response.status(), StatusCode::OK);
    }
}
