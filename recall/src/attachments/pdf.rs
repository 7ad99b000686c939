//! PDF attachment processing (§4.9). `pdf-extract` gives whole-document
//! text only, not a per-page API, so pages are split on its form-feed page
//! breaks; a page is flagged "complex" (sparse text, diagram-ish keywords)
//! so the caller can route it through the vision provider when configured.

use crate::error::{CoreError, Result};

const SPARSE_PAGE_CHAR_THRESHOLD: usize = 40;
const DIAGRAM_KEYWORDS: &[&str] = &["figure", "diagram", "chart", "table", "fig."];

pub struct PdfProcessingResult {
    pub text: String,
    pub page_count: u32,
    pub complex_pages: Vec<u32>,
}

pub fn process_pdf(bytes: &[u8]) -> Result<PdfProcessingResult> {
    let raw_text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| CoreError::Invalid(format!("PDF extraction failed: {e}")))?;

    let pages: Vec<&str> = raw_text.split('\x0c').collect();
    let page_count = pages.len() as u32;

    let mut complex_pages = Vec::new();
    let mut blocks = Vec::with_capacity(pages.len());
    for (index, page_text) in pages.iter().enumerate() {
        let page_number = index as u32 + 1;
        let trimmed = page_text.trim();
        if is_complex_page(trimmed) {
            complex_pages.push(page_number);
        }
        blocks.push(format!("[Page {page_number}] {trimmed}"));
    }

    Ok(PdfProcessingResult {
        text: blocks.join("\n\n"),
        page_count,
        complex_pages,
    })
}

fn is_complex_page(page_text: &str) -> bool {
    if page_text.chars().filter(|c| !c.is_whitespace()).count() < SPARSE_PAGE_CHAR_THRESHOLD {
        return true;
    }
    let lower = page_text.to_lowercase();
    DIAGRAM_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
}
