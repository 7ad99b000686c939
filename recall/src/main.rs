use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use recall::api::{create_router, AppState};
use recall::attachments::{AttachmentService, LocalStorageBackend, StorageBackend};
use recall::config::Config;
use recall::db::{Database, DatabaseBackend, LibSqlBackend};
use recall::embeddings::EmbeddingProvider;
use recall::events::EventBus;
use recall::extraction::Extractor;
use recall::llm::LlmProvider;
use recall::queue::{Task, TaskPriority, TaskQueue};
use recall::services::MemoryService;

#[derive(Parser)]
#[command(name = "recall")]
#[command(about = "Multi-tenant memory store with hybrid retrieval, a knowledge graph, and versioning")]
struct Args {
    /// Runtime mode: all, api, or worker
    #[arg(long)]
    mode: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuntimeMode {
    All,
    Api,
    Worker,
}

impl RuntimeMode {
    fn parse(raw: Option<&str>) -> Self {
        let value = raw
            .map(std::string::ToString::to_string)
            .or_else(|| std::env::var("RECALL_RUNTIME_MODE").ok())
            .map(|v| v.trim().to_lowercase());

        match value.as_deref() {
            Some("api") => Self::Api,
            Some("worker") => Self::Worker,
            Some("all") | None => Self::All,
            Some(other) => {
                tracing::warn!(value = %other, "Invalid RECALL_RUNTIME_MODE/--mode; falling back to 'all'");
                Self::All
            }
        }
    }

    fn runs_api(self) -> bool {
        matches!(self, Self::All | Self::Api)
    }

    fn runs_worker(self) -> bool {
        matches!(self, Self::All | Self::Worker)
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Api => "api",
            Self::Worker => "worker",
        }
    }
}

/// Logs a warning when the embedding model's dimension drifts from what the
/// database was last configured with (§ embedding dimension is fixed once
/// per deployment, not auto-migrated).
async fn check_embedding_dimensions(db: &dyn DatabaseBackend, model_dimensions: usize) -> recall::error::Result<()> {
    match db.get_embedding_dimensions().await? {
        None => {
            tracing::info!(dimensions = model_dimensions, "recording embedding dimensions for fresh database");
            db.set_embedding_dimensions(model_dimensions).await?;
        }
        Some(stored) if stored == model_dimensions => {
            tracing::debug!(dimensions = model_dimensions, "embedding dimensions match stored value");
        }
        Some(stored) => {
            tracing::warn!(
                stored,
                configured = model_dimensions,
                "embedding dimension mismatch: existing embeddings were produced by a different model"
            );
        }
    }
    Ok(())
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "recall=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let runtime_mode = RuntimeMode::parse(args.mode.as_deref());
    tracing::info!(mode = runtime_mode.as_str(), "Runtime mode selected");

    let config = Arc::new(Config::from_env());

    tracing::info!("Initializing database...");
    let raw_db = Database::new(&config.database).await?;
    let db: Arc<dyn DatabaseBackend> = Arc::new(LibSqlBackend::new(raw_db));

    tracing::info!(model = %config.embeddings.model, "Loading embedding model...");
    let embeddings = match EmbeddingProvider::new(&config.embeddings) {
        Ok(provider) => {
            check_embedding_dimensions(db.as_ref(), provider.dimensions()).await?;
            Some(provider)
        }
        Err(error) => {
            tracing::warn!(%error, "Embedder unavailable - memories will be created without embeddings");
            None
        }
    };

    let llm = LlmProvider::new(config.llm.as_ref());
    if !llm.is_available() {
        tracing::warn!("LLM unavailable - entity extraction will be skipped");
    }
    let extractor = config.extraction.enabled.then(|| Extractor::new(llm.clone()));

    let cache = Arc::new(recall::cache::Cache::new(config.cache.clone()));

    let storage: Arc<dyn StorageBackend> = Arc::new(LocalStorageBackend::new(config.attachments.storage_root.clone()));
    let attachments = AttachmentService::new(db.clone(), storage, embeddings.clone(), None, config.attachments.clone());

    let (queue, receivers) = TaskQueue::new(config.queue.clone());
    let queue = Arc::new(queue);
    let events = EventBus::new();

    let state = AppState::new(
        config.clone(),
        db.clone(),
        cache,
        embeddings,
        extractor,
        attachments,
        queue.clone(),
        events,
        llm,
    );

    let cancel_token = CancellationToken::new();

    if runtime_mode.runs_worker() {
        let memory = state.memory.clone();
        register_task_handlers(&queue, memory).await;

        tracing::info!(workers = config.queue.workers, "Starting task queue workers...");
        let shutdown = queue.spawn_workers(receivers);
        let token = cancel_token.child_token();
        tokio::spawn(async move {
            token.cancelled().await;
            tracing::info!("Draining task queue...");
            shutdown.shutdown().await;
        });
    } else {
        tracing::info!("Task queue workers disabled in API-only mode");
        drop(receivers);
    }

    if runtime_mode.runs_api() {
        let app = create_router(state);
        let addr = format!("{}:{}", config.server.host, config.server.port);

        tracing::info!("recall starting on http://{}", addr);
        tracing::info!("  Health check: http://{}/api/v1/health", addr);
        tracing::info!("  API docs:     http://{}/docs", addr);
        tracing::info!("  OpenAPI spec: http://{}/api/v1/openapi.json", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(cancel_token))
            .await?;

        return Ok(());
    }

    tracing::info!("Worker mode active; HTTP server disabled");
    shutdown_signal(cancel_token).await;
    Ok(())
}

/// Registers the Task Queue (§4.7) handlers that back the async paths of
/// memory creation: embedding generation, entity extraction, and attachment
/// processing. Each closure borrows a clone of `MemoryService`.
async fn register_task_handlers(queue: &Arc<TaskQueue>, memory: MemoryService) {
    let m = memory.clone();
    queue
        .register(
            "generate_embedding",
            Arc::new(move |task: Task| {
                let memory = m.clone();
                Box::pin(async move {
                    let tenant_id = task.payload["tenant_id"].as_str().unwrap_or_default();
                    let memory_id = task.payload["memory_id"].as_str().unwrap_or_default();
                    memory.handle_generate_embedding(tenant_id, memory_id).await
                })
            }),
        )
        .await;

    let m = memory.clone();
    queue
        .register(
            "extract_entities",
            Arc::new(move |task: Task| {
                let memory = m.clone();
                Box::pin(async move {
                    let tenant_id = task.payload["tenant_id"].as_str().unwrap_or_default();
                    let memory_id = task.payload["memory_id"].as_str().unwrap_or_default();
                    memory.handle_extract_entities(tenant_id, memory_id).await
                })
            }),
        )
        .await;

    let m = memory.clone();
    queue
        .register(
            "process_attachment",
            Arc::new(move |task: Task| {
                let memory = m.clone();
                Box::pin(async move {
                    let attachment_id = task.payload["attachment_id"].as_str().unwrap_or_default();
                    memory.handle_process_attachment(attachment_id).await
                })
            }),
        )
        .await;
}

async fn shutdown_signal(cancel_token: CancellationToken) {
    wait_for_shutdown_signal().await;
    tracing::info!("Shutdown signal received, cancelling background tasks...");
    cancel_token.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_mode_parse_values() {
        assert_eq!(RuntimeMode::parse(Some("all")), RuntimeMode::All);
        assert_eq!(RuntimeMode::parse(Some("api")), RuntimeMode::Api);
        assert_eq!(RuntimeMode::parse(Some("worker")), RuntimeMode::Worker);
        assert_eq!(RuntimeMode::parse(Some("unknown")), RuntimeMode::All);
    }
}
