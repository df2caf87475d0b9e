//! Image decoding service.
//! The container stores opaque compressed images (JPEG in practice); turning
//! them into pixels happens behind [`FrameDecoder`].

use std::path::Path;

use clipstage_core::frame::FrameBuffer;
use clipstage_core::{ClipstageError, ClipstageResult};

use crate::clip::Clip;

/// Turns one compressed still image into RGBA pixels.
pub trait FrameDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> ClipstageResult<FrameBuffer>;
}

/// Decoder backed by the `image` crate (JPEG, PNG and friends).
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageFrameDecoder;

impl FrameDecoder for ImageFrameDecoder {
    fn decode(&self, bytes: &[u8]) -> ClipstageResult<FrameBuffer> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| ClipstageError::Decode(format!("failed to decode image: {}", e)))?;

        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        FrameBuffer::from_rgba(width, height, rgba.into_raw())
    }
}

/// Fetch and decode frame `index` of `clip`.
pub fn decode_frame(
    clip: &Clip,
    index: usize,
    decoder: &dyn FrameDecoder,
) -> ClipstageResult<FrameBuffer> {
    decoder.decode(clip.frame_bytes(index)?)
}

/// Decode the clip's compositing mask, if it has one.
pub fn decode_mask(clip: &Clip, decoder: &dyn FrameDecoder) -> ClipstageResult<Option<FrameBuffer>> {
    if clip.mask().is_empty() {
        return Ok(None);
    }
    decoder.decode(clip.mask()).map(Some)
}

/// Read just the pixel dimensions of an encoded image.
pub fn image_dimensions(bytes: &[u8]) -> ClipstageResult<(u32, u32)> {
    let reader = image::ImageReader::new(std::io::Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ClipstageError::Decode(e.to_string()))?;
    reader
        .into_dimensions()
        .map_err(|e| ClipstageError::Decode(format!("failed to read image header: {}", e)))
}

/// Write a frame buffer out as PNG.
pub fn save_png(fb: &FrameBuffer, path: &Path) -> ClipstageResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    image::save_buffer_with_format(
        path,
        &fb.data,
        fb.width,
        fb.height,
        image::ExtendedColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .map_err(|e| ClipstageError::asset(format!("failed to write PNG: {}", e), path))
}

/// Encode a frame buffer to in-memory PNG bytes.
pub fn encode_png(fb: &FrameBuffer) -> ClipstageResult<Vec<u8>> {
    let mut out = std::io::Cursor::new(Vec::new());
    image::write_buffer_with_format(
        &mut out,
        &fb.data,
        fb.width,
        fb.height,
        image::ExtendedColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .map_err(|e| ClipstageError::Decode(format!("failed to encode PNG: {}", e)))?;
    Ok(out.into_inner())
}
