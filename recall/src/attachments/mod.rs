//! Attachments (§4.9): file ingestion, dedup by content hash, MIME-family
//! processing, and storage, grounded on the teacher's
//! `processing/extractor.rs` dispatch-by-MIME pattern but reworked around
//! the spec's `Attachment` row instead of a RAG chunking pipeline. Local
//! files and URL downloads both funnel through `ingest_bytes` once their
//! bytes are in hand; `process` is the async step the Task Queue (§4.7)
//! invokes after `ingest_*` returns.

pub mod image;
pub mod language;
pub mod pdf;
pub mod storage;
pub mod text;
pub mod vision;

use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::AttachmentsConfig;
use crate::db::DatabaseBackend;
use crate::embeddings::EmbeddingProvider;
use crate::error::{CoreError, Result};
use crate::models::{Attachment, LifecycleStatus, Metadata};

pub use storage::{LocalStorageBackend, StorageBackend};
pub use vision::VisionAnalyzer;

/// Allowed MIME families for URL downloads (§4.9). Attachments ingested
/// directly from local bytes are not MIME-restricted — the caller already
/// has the file in hand — but downloads from an arbitrary URL are.
const ALLOWED_DOWNLOAD_MIME_PREFIXES: &[&str] = &["text/"];
const ALLOWED_DOWNLOAD_MIME_EXACT: &[&str] = &[
    "application/pdf",
    "application/json",
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
];

pub struct IngestOutcome {
    pub attachment: Attachment,
    pub duplicate: bool,
}

#[derive(Clone)]
pub struct AttachmentService {
    db: Arc<dyn DatabaseBackend>,
    storage: Arc<dyn StorageBackend>,
    embeddings: Option<EmbeddingProvider>,
    vision: Option<Arc<dyn VisionAnalyzer>>,
    http_client: reqwest::Client,
    config: AttachmentsConfig,
}

impl AttachmentService {
    pub fn new(
        db: Arc<dyn DatabaseBackend>,
        storage: Arc<dyn StorageBackend>,
        embeddings: Option<EmbeddingProvider>,
        vision: Option<Arc<dyn VisionAnalyzer>>,
        config: AttachmentsConfig,
    ) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.download_timeout_secs))
            .build()
            .unwrap_or_default();

        Self { db, storage, embeddings, vision, http_client, config }
    }

    /// Ingests bytes already in hand (a local upload). Computes the SHA-256
    /// hash, returns the existing row with `duplicate=true` if this exact
    /// `(memory_id, file_hash)` pair was already ingested, otherwise persists
    /// the bytes and inserts a new `pending`-processing attachment row.
    pub async fn ingest_bytes(
        &self,
        memory_id: &str,
        filename: &str,
        mime_type: &str,
        bytes: &[u8],
    ) -> Result<IngestOutcome> {
        if bytes.len() as u64 > self.config.max_file_size_bytes {
            return Err(CoreError::Invalid(format!(
                "attachment exceeds max size of {} bytes",
                self.config.max_file_size_bytes
            )));
        }

        let file_hash = hash_bytes(bytes);

        if let Some(existing) = self.db.get_attachment_by_hash(memory_id, &file_hash).await? {
            return Ok(IngestOutcome { attachment: existing, duplicate: true });
        }

        let mime_type = resolve_mime_type(mime_type, bytes);

        let attachment_id = Uuid::new_v4().to_string();
        let filename = storage::sanitize_filename(filename);
        let relative_path = storage::attachment_relative_path(memory_id, &attachment_id, &filename);

        self.storage.put(&relative_path, bytes).await?;

        let mut attachment = Attachment::new(
            attachment_id,
            memory_id.to_string(),
            filename,
            mime_type,
            bytes.len() as i64,
            file_hash,
            relative_path,
        );
        attachment.upload_status = LifecycleStatus::Completed;

        self.db.create_attachment(&attachment).await?;

        Ok(IngestOutcome { attachment, duplicate: false })
    }

    /// Downloads a URL, enforcing scheme/MIME/size constraints before a
    /// single byte reaches storage (§4.9, testable property 13).
    pub async fn ingest_url(&self, memory_id: &str, url_str: &str) -> Result<IngestOutcome> {
        let parsed = url::Url::parse(url_str)?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(CoreError::Invalid(format!("unsupported URL scheme: {}", parsed.scheme())));
        }

        let response = self.http_client.get(parsed.clone()).send().await?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .split(';')
            .next()
            .unwrap_or("application/octet-stream")
            .trim()
            .to_string();

        if !is_allowed_download_mime(&content_type) {
            return Err(CoreError::Invalid(format!("disallowed content type for download: {content_type}")));
        }

        let bytes = self.collect_with_size_limit(response).await?;

        let filename = parsed
            .path()
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("download")
            .to_string();

        self.ingest_bytes(memory_id, &filename, &content_type, &bytes).await
    }

    async fn collect_with_size_limit(&self, response: reqwest::Response) -> Result<Vec<u8>> {
        use futures::StreamExt;

        let max = self.config.max_file_size_bytes as usize;
        let mut buffer = Vec::new();
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            buffer.extend_from_slice(&chunk);
            if buffer.len() > max {
                return Err(CoreError::Invalid(format!("download exceeds max size of {max} bytes")));
            }
        }

        Ok(buffer)
    }

    /// Runs the MIME-family processor, writing extracted content and
    /// `processing_status`. Never returns `Err` for a processing failure —
    /// failures are recorded on the row itself (`processing_status=failed`
    /// plus an `error` key in `extracted_metadata`) so a failed attachment
    /// doesn't retry forever in the task queue.
    pub async fn process(&self, attachment_id: &str) -> Result<()> {
        let Some(mut attachment) = self.db.get_attachment_by_id(attachment_id).await? else {
            return Err(CoreError::NotFound(format!("attachment {attachment_id}")));
        };

        attachment.processing_status = LifecycleStatus::Processing;
        self.db.update_attachment(&attachment).await?;

        let bytes = match self.storage.get(&attachment.storage_path).await {
            Ok(bytes) => bytes,
            Err(e) => return self.fail(attachment, &e.to_string()).await,
        };

        let outcome = match mime_family(&attachment.mime_type) {
            MimeFamily::Image => self.process_image_bytes(&bytes).await,
            MimeFamily::Pdf => self.process_pdf_bytes(&bytes).await,
            MimeFamily::Text => Ok(self.process_text_bytes(&bytes, &attachment)),
            MimeFamily::Other => Err(CoreError::Invalid(format!("unsupported attachment MIME type: {}", attachment.mime_type))),
        };

        match outcome {
            Ok(processed) => {
                attachment.extracted_text = processed.extracted_text;
                attachment.extracted_metadata = processed.metadata;
                attachment.content_description = processed.description;

                if let Some(thumbnail_bytes) = processed.thumbnail_bytes {
                    let thumbnail_path = format!("{}.thumbnail.png", attachment.storage_path);
                    match self.storage.put(&thumbnail_path, &thumbnail_bytes).await {
                        Ok(()) => attachment.thumbnail_path = Some(thumbnail_path),
                        Err(e) => tracing::debug!(attachment_id, error = %e, "failed to persist thumbnail"),
                    }
                }

                if let Some(excerpt) = processed.embed_excerpt {
                    if let Some(embeddings) = &self.embeddings {
                        match embeddings.embed_passage(&excerpt).await {
                            Ok(embedding) => {
                                attachment.embedding_model = Some(embeddings.model_name().to_string());
                                attachment.content_embedding = Some(embedding);
                            }
                            Err(e) => {
                                tracing::debug!(attachment_id, error = %e, "attachment content embedding unavailable");
                            }
                        }
                    }
                }

                attachment.processing_status = LifecycleStatus::Completed;
                self.db.update_attachment(&attachment).await?;
                Ok(())
            }
            Err(e) => self.fail(attachment, &e.to_string()).await,
        }
    }

    async fn fail(&self, mut attachment: Attachment, error_message: &str) -> Result<()> {
        attachment.processing_status = LifecycleStatus::Failed;
        attachment.extracted_metadata.insert("error".to_string(), error_message.into());
        self.db.update_attachment(&attachment).await?;
        tracing::warn!(attachment_id = %attachment.id, error = error_message, "attachment processing failed");
        Ok(())
    }

    async fn process_image_bytes(&self, bytes: &[u8]) -> Result<ProcessedContent> {
        let result = image::process_image(bytes)?;
        let mut metadata = result.metadata;
        let mut description = None;
        let mut text = String::new();

        if let Some(vision) = &self.vision {
            match vision.analyze_image(bytes).await {
                Ok(analysis) => {
                    description = Some(analysis.description);
                    text = analysis.extracted_text;
                    metadata.insert("image_type".to_string(), analysis.image_type.into());
                    metadata.insert("vision_entities".to_string(), analysis.entities.into());
                    for (key, value) in analysis.technical_details {
                        metadata.insert(key, value);
                    }
                }
                Err(e) => tracing::debug!(error = %e, "vision analysis unavailable"),
            }
        }

        let embed_excerpt = if text.is_empty() && description.is_none() {
            None
        } else {
            Some(format!("{} {text}", description.clone().unwrap_or_default()).trim().to_string())
        };

        Ok(ProcessedContent {
            extracted_text: if text.is_empty() { None } else { Some(text) },
            metadata,
            description,
            thumbnail_bytes: result.thumbnail,
            embed_excerpt,
        })
    }

    async fn process_pdf_bytes(&self, bytes: &[u8]) -> Result<ProcessedContent> {
        let result = pdf::process_pdf(bytes)?;
        let mut metadata = Metadata::new();
        metadata.insert("page_count".to_string(), result.page_count.into());
        metadata.insert("complex_pages".to_string(), result.complex_pages.clone().into());

        let mut text = result.text;

        if !result.complex_pages.is_empty() {
            if let Some(vision) = &self.vision {
                match vision.analyze_pdf(bytes, &result.complex_pages).await {
                    Ok(analysis) => {
                        for page in analysis.page_analyses {
                            text.push_str(&format!("\n\n[Page {} vision] {}", page.page_number, page.extracted_text));
                        }
                        metadata.insert("vision_entities".to_string(), analysis.entities.into());
                    }
                    Err(e) => tracing::debug!(error = %e, "PDF vision analysis unavailable"),
                }
            }
        }

        let embed_excerpt = Some(text.chars().take(5 * 1024).collect());

        Ok(ProcessedContent {
            extracted_text: Some(text),
            metadata,
            description: None,
            thumbnail_bytes: None,
            embed_excerpt,
        })
    }

    fn process_text_bytes(&self, bytes: &[u8], attachment: &Attachment) -> ProcessedContent {
        let result = text::process_text(bytes, &attachment.mime_type, &attachment.filename);
        let mut metadata = Metadata::new();
        metadata.insert("line_count".to_string(), result.line_count.into());
        metadata.insert("char_count".to_string(), result.char_count.into());
        if let Some(language) = &result.language {
            metadata.insert("language".to_string(), language.clone().into());
        }

        ProcessedContent {
            extracted_text: Some(result.text),
            metadata,
            description: None,
            thumbnail_bytes: None,
            embed_excerpt: Some(result.embed_excerpt),
        }
    }

    pub async fn list_for_memory(&self, memory_id: &str) -> Result<Vec<Attachment>> {
        self.db.get_attachments_by_memory(memory_id).await
    }
}

struct ProcessedContent {
    extracted_text: Option<String>,
    metadata: Metadata,
    description: Option<String>,
    thumbnail_bytes: Option<Vec<u8>>,
    embed_excerpt: Option<String>,
}

enum MimeFamily {
    Image,
    Pdf,
    Text,
    Other,
}

fn mime_family(mime_type: &str) -> MimeFamily {
    if mime_type.starts_with("image/") {
        MimeFamily::Image
    } else if mime_type == "application/pdf" {
        MimeFamily::Pdf
    } else if mime_type.starts_with("text/") || mime_type == "application/json" {
        MimeFamily::Text
    } else {
        MimeFamily::Other
    }
}

/// A caller-supplied MIME type is trusted as-is; a missing or generic one
/// (e.g. a raw multipart upload with no declared content type) falls back to
/// magic-byte sniffing, same precedence the teacher's
/// `detect_type_from_upload` uses for its own MIME fallback chain.
fn resolve_mime_type(declared: &str, bytes: &[u8]) -> String {
    let declared = declared.trim();
    if !declared.is_empty() && declared != "application/octet-stream" {
        return declared.to_string();
    }
    infer::get(bytes)
        .map(|kind| kind.mime_type().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

fn is_allowed_download_mime(mime_type: &str) -> bool {
    ALLOWED_DOWNLOAD_MIME_EXACT.contains(&mime_type)
        || ALLOWED_DOWNLOAD_MIME_PREFIXES.iter().any(|prefix| mime_type.starts_with(prefix))
}

fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;
    use crate::config::DatabaseConfig;
    use crate::db::{Database, LibSqlBackend};

    fn test_config() -> DatabaseConfig {
        let timestamp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        let thread_id = std::thread::current().id();
        DatabaseConfig {
            url: format!("file:/tmp/recall_attachments_test_{thread_id:?}_{timestamp}?mode=memory&cache=shared"),
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

    fn test_attachments_config(storage_root: &std::path::Path) -> AttachmentsConfig {
        AttachmentsConfig {
            storage_root: storage_root.to_string_lossy().to_string(),
            max_file_size_bytes: 50 * 1024 * 1024,
            download_timeout_secs: 30,
        }
    }

    async fn test_service(storage_root: &std::path::Path) -> AttachmentService {
        let db = Database::new(&test_config()).await.expect("failed to create database");
        let backend: Arc<dyn DatabaseBackend> = Arc::new(LibSqlBackend::new(db));
        let storage: Arc<dyn StorageBackend> = Arc::new(LocalStorageBackend::new(storage_root));
        AttachmentService::new(backend, storage, None, None, test_attachments_config(storage_root))
    }

    #[tokio::test]
    async fn ingest_bytes_persists_and_returns_non_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let service = test_service(dir.path()).await;

        let outcome = service
            .ingest_bytes("m1", "notes.txt", "text/plain", b"hello world")
            .await
            .expect("ingest should succeed");

        assert!(!outcome.duplicate);
        assert_eq!(outcome.attachment.upload_status, LifecycleStatus::Completed);
        assert_eq!(outcome.attachment.processing_status, LifecycleStatus::Pending);
    }

    #[tokio::test]
    async fn ingest_bytes_detects_duplicate_by_hash() {
        let dir = tempfile::tempdir().unwrap();
        let service = test_service(dir.path()).await;

        let first = service.ingest_bytes("m1", "notes.txt", "text/plain", b"same bytes").await.unwrap();
        let second = service.ingest_bytes("m1", "notes-copy.txt", "text/plain", b"same bytes").await.unwrap();

        assert!(!first.duplicate);
        assert!(second.duplicate);
        assert_eq!(first.attachment.id, second.attachment.id);
    }

    #[tokio::test]
    async fn ingest_bytes_rejects_oversized_file() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(&test_config()).await.unwrap();
        let backend: Arc<dyn DatabaseBackend> = Arc::new(LibSqlBackend::new(db));
        let storage: Arc<dyn StorageBackend> = Arc::new(LocalStorageBackend::new(dir.path()));
        let mut config = test_attachments_config(dir.path());
        config.max_file_size_bytes = 4;
        let service = AttachmentService::new(backend, storage, None, None, config);

        let result = service.ingest_bytes("m1", "big.txt", "text/plain", b"too many bytes").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn process_text_attachment_marks_completed() {
        let dir = tempfile::tempdir().unwrap();
        let service = test_service(dir.path()).await;

        let outcome = service.ingest_bytes("m1", "notes.txt", "text/plain", b"line one\nline two").await.unwrap();
        service.process(&outcome.attachment.id).await.expect("processing should succeed");

        let processed = service.db.get_attachment_by_id(&outcome.attachment.id).await.unwrap().unwrap();
        assert_eq!(processed.processing_status, LifecycleStatus::Completed);
        assert!(processed.extracted_text.is_some());
    }

    #[tokio::test]
    async fn process_unsupported_mime_marks_failed() {
        let dir = tempfile::tempdir().unwrap();
        let service = test_service(dir.path()).await;

        let outcome = service.ingest_bytes("m1", "archive.zip", "application/zip", b"PK\x03\x04").await.unwrap();
        service.process(&outcome.attachment.id).await.expect("process() itself should not error");

        let processed = service.db.get_attachment_by_id(&outcome.attachment.id).await.unwrap().unwrap();
        assert_eq!(processed.processing_status, LifecycleStatus::Failed);
        assert!(processed.extracted_metadata.contains_key("error"));
    }

    #[test]
    fn is_allowed_download_mime_matches_whitelist() {
        assert!(is_allowed_download_mime("text/plain"));
        assert!(is_allowed_download_mime("application/pdf"));
        assert!(is_allowed_download_mime("image/png"));
        assert!(!is_allowed_download_mime("application/zip"));
    }
}
