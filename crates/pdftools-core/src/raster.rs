//! Page rasterization seam and image encoding
//!
//! Rendering is delegated to a [`PageRasterizer`] (in the browser, a JS
//! renderer). This module only encodes the returned RGBA bitmaps.

use std::io::Cursor;

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ImageEncoder, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::registry::{DocumentId, LoadedDocument};

/// Renders one page of a loaded document to an RGBA bitmap
#[async_trait(?Send)]
pub trait PageRasterizer {
    async fn render_page(
        &self,
        document: &LoadedDocument,
        page: u32,
        scale: f32,
    ) -> Result<RgbaImage, EngineError>;

    /// Drop any renderer-side state held for `document` (parsed copies,
    /// page caches). Called once the document leaves the registry.
    fn release(&self, _document: DocumentId) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
        }
    }
}

/// Encode a bitmap. `quality` is in `[0, 1]` and only affects JPEG.
pub fn encode_image(
    bitmap: &RgbaImage,
    format: ImageFormat,
    quality: f32,
) -> Result<Vec<u8>, EngineError> {
    let (width, height) = bitmap.dimensions();
    let mut out = Cursor::new(Vec::new());

    match format {
        ImageFormat::Png => {
            PngEncoder::new(&mut out)
                .write_image(
                    bitmap.as_raw(),
                    width,
                    height,
                    image::ExtendedColorType::Rgba8,
                )
                .map_err(|e| EngineError::Encode(e.to_string()))?;
        }
        ImageFormat::Jpeg => {
            let rgb = flatten_on_white(bitmap);
            JpegEncoder::new_with_quality(&mut out, jpeg_quality(quality))
                .write_image(&rgb, width, height, image::ExtendedColorType::Rgb8)
                .map_err(|e| EngineError::Encode(e.to_string()))?;
        }
    }

    Ok(out.into_inner())
}

fn jpeg_quality(quality: f32) -> u8 {
    let quality = if quality.is_finite() {
        quality.clamp(0.0, 1.0)
    } else {
        1.0
    };
    ((quality * 100.0).round() as u8).max(1)
}

// JPEG has no alpha channel; composite over white like a browser canvas export
fn flatten_on_white(bitmap: &RgbaImage) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(bitmap.as_raw().len() / 4 * 3);
    for pixel in bitmap.pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = u16::from(a);
        for channel in [r, g, b] {
            let blended = (u16::from(channel) * alpha + 255 * (255 - alpha) + 127) / 255;
            rgb.push(blended as u8);
        }
    }
    rgb
}
