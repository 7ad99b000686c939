//! Image attachment processing (§4.9), grounded on the teacher's
//! `processing/extractors/image.rs` shape but producing dimension/format
//! metadata and a thumbnail instead of running OCR directly — OCR/vision is
//! delegated to an optional `VisionAnalyzer` (§6) rather than baked in here.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};

use crate::error::{CoreError, Result};
use crate::models::Metadata;

const THUMBNAIL_MAX_DIMENSION: u32 = 200;

pub struct ImageProcessingResult {
    pub metadata: Metadata,
    pub thumbnail: Option<Vec<u8>>,
}

/// Decodes `bytes`, records `{width, height, format}` metadata, and renders
/// a thumbnail no larger than 200x200 preserving aspect ratio.
pub fn process_image(bytes: &[u8]) -> Result<ImageProcessingResult> {
    let reader = ImageReader::new(std::io::Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| CoreError::Invalid(format!("unreadable image: {e}")))?;
    let format = reader.format();
    let img = reader
        .decode()
        .map_err(|e| CoreError::Invalid(format!("could not decode image: {e}")))?;

    let (width, height) = img.dimensions();

    let mut metadata = Metadata::new();
    metadata.insert("width".to_string(), width.into());
    metadata.insert("height".to_string(), height.into());
    metadata.insert(
        "format".to_string(),
        format_name(format).into(),
    );

    let thumbnail = render_thumbnail(&img).ok();

    Ok(ImageProcessingResult { metadata, thumbnail })
}

fn render_thumbnail(img: &DynamicImage) -> Result<Vec<u8>> {
    let thumbnail = img.resize(
        THUMBNAIL_MAX_DIMENSION,
        THUMBNAIL_MAX_DIMENSION,
        FilterType::Lanczos3,
    );
    let mut output = Vec::new();
    thumbnail
        .write_to(&mut std::io::Cursor::new(&mut output), ImageFormat::Png)
        .map_err(|e| CoreError::Internal(format!("thumbnail encode failed: {e}")))?;
    Ok(output)
}

fn format_name(format: Option<ImageFormat>) -> String {
    match format {
        Some(ImageFormat::Png) => "png",
        Some(ImageFormat::Jpeg) => "jpeg",
        Some(ImageFormat::Gif) => "gif",
        Some(ImageFormat::WebP) => "webp",
        Some(ImageFormat::Bmp) => "bmp",
        Some(ImageFormat::Tiff) => "tiff",
        Some(other) => return format!("{other:?}").to_lowercase(),
        None => "unknown",
    }
    .to_string()
}
