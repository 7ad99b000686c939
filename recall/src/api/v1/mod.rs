pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod response;
pub mod router;

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use std::time::{SystemTime, UNIX_EPOCH};
    use tower::ServiceExt;

    use crate::api::routes::create_router;
    use crate::api::state::AppState;
    use crate::attachments::storage::LocalStorageBackend;
    use crate::attachments::AttachmentService;
    use crate::cache::Cache;
    use crate::config::{AttachmentsConfig, CacheConfig, Config, DatabaseConfig, QueueConfig};
    use crate::db::{Database, LibSqlBackend};
    use crate::events::EventBus;
    use crate::llm::LlmProvider;
    use crate::queue::TaskQueue;

    fn test_db_config() -> DatabaseConfig {
        let timestamp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        let thread_id = std::thread::current().id();
        DatabaseConfig {
            url: format!("file:/tmp/recall_v1mod_test_{thread_id:?}_{timestamp}?mode=memory&cache=shared"),
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

    async fn test_state() -> AppState {
        let mut config = Config::from_env();
        config.database = test_db_config();
        let config = Arc::new(config);

        let db = Database::new(&config.database).await.unwrap();
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
            Arc::new(LocalStorageBackend::new("/tmp/recall_v1mod_test_attachments".into()));
        let attachments = AttachmentService::new(
            backend.clone(),
            storage,
            None,
            None,
            AttachmentsConfig { storage_root: "/tmp/recall_v1mod_test_attachments".into(), max_file_size_bytes: 1024, download_timeout_secs: 5 },
        );
        let (queue, _rx) = TaskQueue::new(QueueConfig { workers: 1, max_attempts: 1, shutdown_drain_secs: 1 });

        AppState::new(
            config,
            backend,
            cache,
            None,
            None,
            attachments,
            Arc::new(queue),
            EventBus::new(),
            LlmProvider::unavailable("test"),
        )
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn protected_route_requires_tenant_header() {
        let app = create_router(test_state().await);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/search")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"query":"hello"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = create_router(test_state().await);

        let response = app
            .oneshot(Request::builder().uri("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn openapi_json_is_public_and_valid() {
        let app = create_router(test_state().await);

        let response = app
            .oneshot(Request::builder().uri("/api/v1/openapi.json").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let version = json["openapi"].as_str().expect("openapi field should be a string");
        assert!(version.starts_with("3"), "OpenAPI version should start with 3, got: {version}");
    }

    #[tokio::test]
    async fn success_envelope_has_data_no_error() {
        let app = create_router(test_state().await);

        let response = app
            .oneshot(Request::builder().uri("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert!(json.get("data").is_some(), "success should have 'data' key");
        assert!(json.get("error").is_none(), "success should NOT have 'error' key");
    }

    #[tokio::test]
    async fn error_envelope_has_error_no_data() {
        let app = create_router(test_state().await);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/search")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"query":"hello"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert!(json.get("error").is_some(), "error response should have 'error' key");
        assert!(json.get("data").is_none(), "error response should NOT have 'data' key");
        assert!(json["error"]["kind"].is_string(), "error.kind should be a string");
        assert!(json["error"]["message"].is_string(), "error.message should be a string");
    }
}
