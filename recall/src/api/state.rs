use std::sync::Arc;

use crate::attachments::AttachmentService;
use crate::cache::Cache;
use crate::config::Config;
use crate::db::DatabaseBackend;
use crate::embeddings::EmbeddingProvider;
use crate::events::EventBus;
use crate::extraction::Extractor;
use crate::llm::LlmProvider;
use crate::queue::TaskQueue;
use crate::services::{MemoryService, SearchService, VersioningService};

use super::v1::middleware::RateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Arc<dyn DatabaseBackend>,
    pub cache: Arc<Cache>,
    pub embeddings: Option<EmbeddingProvider>,
    pub llm: LlmProvider,
    pub memory: MemoryService,
    pub search: SearchService,
    pub versioning: VersioningService,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<Config>,
        db: Arc<dyn DatabaseBackend>,
        cache: Arc<Cache>,
        embeddings: Option<EmbeddingProvider>,
        extractor: Option<Extractor>,
        attachments: AttachmentService,
        queue: Arc<TaskQueue>,
        events: EventBus,
        llm: LlmProvider,
    ) -> Self {
        let memory = MemoryService::new(
            db.clone(),
            cache.clone(),
            embeddings.clone(),
            extractor,
            attachments,
            queue,
            events,
            config.clone(),
        );
        let search = SearchService::new(db.clone(), embeddings.clone(), config.clone());
        let versioning = VersioningService::new(db.clone(), config.clone());
        let rate_limiter = Arc::new(RateLimiter::new(config.server.rate_limit_per_minute));

        Self { config, db, cache, embeddings, llm, memory, search, versioning, rate_limiter }
    }
}
