use serde::Deserialize;
use std::env;

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        Err(_) => default,
    }
}

fn parse_env_opt<T: std::str::FromStr>(var: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Ignoring.", val, var, e);
                None
            }
        },
        Err(_) => None,
    }
}

/// A single immutable configuration tree, built once at process startup and
/// threaded through every component as `Arc<Config>`. No component re-reads
/// the environment after construction.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub queue: QueueConfig,
    pub embeddings: EmbeddingsConfig,
    pub extraction: ExtractionConfig,
    pub attachments: AttachmentsConfig,
    pub search: SearchConfig,
    pub tenancy: TenancyConfig,
    pub versioning: VersioningConfig,
    pub llm: Option<LlmConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Per-(tenant, user, path) fixed-window rate limit (§4.11), requests/min.
    pub rate_limit_per_minute: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub auth_token: Option<String>,
    pub local_path: Option<String>,
    pub busy_timeout_ms: u64,
    pub journal_mode: String,
    pub synchronous: String,
    pub pool_min: u32,
    pub pool_max: u32,
    pub acquire_retries: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub key_prefix: String,
    pub capacity: usize,
    pub embedding_ttl_secs: u64,
    pub entity_graph_ttl_secs: u64,
    pub memory_ttl_secs: u64,
    pub metadata_ttl_secs: u64,
    pub search_result_ttl_secs: u64,
    pub list_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    pub workers: usize,
    pub max_attempts: u32,
    pub shutdown_drain_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingsConfig {
    pub model: String,
    pub dimensions: usize,
    pub batch_size: usize,
    pub failure_threshold: u32,
    pub breaker_timeout_secs: u64,
    pub call_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionConfig {
    pub enabled: bool,
    pub failure_threshold: u32,
    pub breaker_timeout_secs: u64,
    pub call_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttachmentsConfig {
    pub storage_root: String,
    pub max_file_size_bytes: u64,
    pub download_timeout_secs: u64,
}

/// Search planner tunables (§4.5).
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    pub semantic_similarity_threshold: f32,
    pub hybrid_keyword_weight: f32,
    pub hybrid_semantic_weight: f32,
    pub near_duplicate_threshold: f32,
    pub default_limit: u32,
    pub max_limit: u32,
}

/// Multi-tenancy defaults applied to newly created tenants (§3).
#[derive(Debug, Clone, Deserialize)]
pub struct TenancyConfig {
    pub default_max_memories: u64,
    pub default_max_file_size_bytes: u64,
    pub dedup_window_secs: u64,
}

/// Version history pruning (§4.10): keep the most recent N versions per
/// memory, never the current one.
#[derive(Debug, Clone, Deserialize)]
pub struct VersioningConfig {
    pub max_versions_retained: u32,
}

/// LLM configuration backing the Extractor (§4.6) and any structured-output
/// calls made on top of it.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: parse_env_or("SERVER_HOST", "0.0.0.0".to_string()),
                port: parse_env_or("SERVER_PORT", 8080),
                rate_limit_per_minute: parse_env_or("RATE_LIMIT_PER_MINUTE", 100),
            },
            database: DatabaseConfig {
                url: parse_env_or("DATABASE_URL", "file:recall.db".to_string()),
                auth_token: env::var("DATABASE_AUTH_TOKEN").ok(),
                local_path: env::var("DATABASE_LOCAL_PATH").ok(),
                busy_timeout_ms: parse_env_or("DATABASE_BUSY_TIMEOUT_MS", 5000),
                journal_mode: parse_env_or("DATABASE_JOURNAL_MODE", "WAL".to_string()),
                synchronous: parse_env_or("DATABASE_SYNCHRONOUS", "NORMAL".to_string()),
                pool_min: parse_env_or("DATABASE_POOL_MIN", 5),
                pool_max: parse_env_or("DATABASE_POOL_MAX", 20),
                acquire_retries: parse_env_or("DATABASE_ACQUIRE_RETRIES", 3),
            },
            cache: CacheConfig {
                enabled: parse_env_or("CACHE_ENABLED", true),
                key_prefix: parse_env_or("CACHE_KEY_PREFIX", "recall".to_string()),
                capacity: parse_env_or("CACHE_CAPACITY", 10_000),
                embedding_ttl_secs: parse_env_or("CACHE_EMBEDDING_TTL_SECS", 30 * 24 * 3600),
                entity_graph_ttl_secs: parse_env_or("CACHE_ENTITY_GRAPH_TTL_SECS", 24 * 3600),
                memory_ttl_secs: parse_env_or("CACHE_MEMORY_TTL_SECS", 12 * 3600),
                metadata_ttl_secs: parse_env_or("CACHE_METADATA_TTL_SECS", 6 * 3600),
                search_result_ttl_secs: parse_env_or("CACHE_SEARCH_RESULT_TTL_SECS", 3600),
                list_ttl_secs: parse_env_or("CACHE_LIST_TTL_SECS", 300),
            },
            queue: QueueConfig {
                workers: parse_env_or("QUEUE_WORKERS", 4),
                max_attempts: parse_env_or("QUEUE_MAX_ATTEMPTS", 5),
                shutdown_drain_secs: parse_env_or("QUEUE_SHUTDOWN_DRAIN_SECS", 30),
            },
            embeddings: EmbeddingsConfig {
                model: parse_env_or("EMBEDDING_MODEL", "local/bge-small-en-v1.5".to_string()),
                dimensions: parse_env_or("EMBEDDING_DIMENSIONS", 384),
                batch_size: parse_env_or("EMBEDDING_BATCH_SIZE", 32),
                failure_threshold: parse_env_or("EMBEDDER_BREAKER_FAILURES", 3),
                breaker_timeout_secs: parse_env_or("EMBEDDER_BREAKER_TIMEOUT_SECS", 60),
                call_timeout_secs: parse_env_or("EMBEDDER_CALL_TIMEOUT_SECS", 60),
            },
            extraction: ExtractionConfig {
                enabled: parse_env_or("EXTRACTION_ENABLED", false),
                failure_threshold: parse_env_or("EXTRACTOR_BREAKER_FAILURES", 5),
                breaker_timeout_secs: parse_env_or("EXTRACTOR_BREAKER_TIMEOUT_SECS", 30),
                call_timeout_secs: parse_env_or("EXTRACTOR_CALL_TIMEOUT_SECS", 30),
            },
            attachments: AttachmentsConfig {
                storage_root: parse_env_or("ATTACHMENTS_STORAGE_ROOT", "./attachments".to_string()),
                max_file_size_bytes: parse_env_or("ATTACHMENTS_MAX_FILE_SIZE_BYTES", 50 * 1024 * 1024),
                download_timeout_secs: parse_env_or("ATTACHMENTS_DOWNLOAD_TIMEOUT_SECS", 30),
            },
            search: SearchConfig {
                semantic_similarity_threshold: parse_env_or("SEARCH_SEMANTIC_THRESHOLD", 0.5),
                hybrid_keyword_weight: parse_env_or("SEARCH_HYBRID_KEYWORD_WEIGHT", 0.5),
                hybrid_semantic_weight: parse_env_or("SEARCH_HYBRID_SEMANTIC_WEIGHT", 0.5),
                near_duplicate_threshold: parse_env_or("SEARCH_NEAR_DUPLICATE_THRESHOLD", 0.9),
                default_limit: parse_env_or("SEARCH_DEFAULT_LIMIT", 20),
                max_limit: parse_env_or("SEARCH_MAX_LIMIT", 100),
            },
            tenancy: TenancyConfig {
                default_max_memories: parse_env_or("TENANCY_DEFAULT_MAX_MEMORIES", 1_000_000),
                default_max_file_size_bytes: parse_env_or(
                    "TENANCY_DEFAULT_MAX_FILE_SIZE_BYTES",
                    50 * 1024 * 1024,
                ),
                dedup_window_secs: parse_env_or("TENANCY_DEDUP_WINDOW_SECS", 300),
            },
            versioning: VersioningConfig {
                max_versions_retained: parse_env_or("VERSIONING_MAX_VERSIONS_RETAINED", 50),
            },
            llm: env::var("LLM_MODEL").ok().map(|model| LlmConfig {
                model,
                api_key: env::var("LLM_API_KEY").ok(),
                base_url: env::var("LLM_BASE_URL").ok(),
                timeout_secs: parse_env_or("LLM_TIMEOUT_SECS", 30),
                max_retries: parse_env_or("LLM_MAX_RETRIES", 3),
            }),
        }
    }
}

impl Config {
    /// Construct the process-wide configuration from the environment. Called
    /// exactly once, in `main`, before any component is constructed.
    pub fn from_env() -> Self {
        Self::default()
    }
}

/// Known embedding/LLM providers that use OpenAI-compatible APIs.
pub const KNOWN_PROVIDERS: &[&str] = &["openai", "openrouter", "ollama", "lmstudio", "local"];

/// Parse a model name of the form `provider/model` into its parts, defaulting
/// to the `local` provider when no known prefix is present.
pub fn parse_provider_model(model: &str) -> (&str, &str) {
    if let Some((prefix, rest)) = model.split_once('/') {
        let prefix_lower = prefix.to_lowercase();
        if KNOWN_PROVIDERS.contains(&prefix_lower.as_str()) {
            return (prefix, rest);
        }
    }
    ("local", model)
}
