//! `VisionAnalyzer` (§6): the vision/OCR model is an out-of-scope external
//! collaborator (§1), so this crate models only the capability interface.
//! A deployment wires a concrete implementation in; `AttachmentService`
//! treats `None` as "no vision provider configured" and skips the
//! vision-specific enrichment step, same as the Embedder/Extractor
//! unavailable paths (§4.8).

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Metadata;

#[derive(Debug, Clone, Default)]
pub struct VisionImageAnalysis {
    pub description: String,
    pub extracted_text: String,
    pub image_type: String,
    pub entities: Vec<String>,
    pub technical_details: Metadata,
}

#[derive(Debug, Clone, Default)]
pub struct VisionPageAnalysis {
    pub page_number: u32,
    pub description: String,
    pub extracted_text: String,
}

#[derive(Debug, Clone, Default)]
pub struct VisionPdfAnalysis {
    pub full_text: String,
    pub page_analyses: Vec<VisionPageAnalysis>,
    pub entities: Vec<String>,
}

#[async_trait]
pub trait VisionAnalyzer: Send + Sync {
    async fn analyze_image(&self, bytes: &[u8]) -> Result<VisionImageAnalysis>;
    async fn analyze_pdf(&self, bytes: &[u8], hints: &[u32]) -> Result<VisionPdfAnalysis>;
}
