use crate::error::{ClipstageError, ClipstageResult};
use crate::Color;

/// Depth value of a pixel no entity has drawn over.
pub const DEPTH_CLEAR: f32 = 1.0;

/// A decoded image or composed output frame as raw RGBA8 pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBuffer {
    /// Raw pixel data, 4 bytes per pixel, row-major from the top-left.
    pub data: Vec<u8>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl FrameBuffer {
    /// Create a new frame buffer filled with zeros (transparent black).
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            data: vec![0u8; (width as usize) * (height as usize) * 4],
            width,
            height,
        }
    }

    /// Create a frame buffer filled with a solid color.
    pub fn solid(width: u32, height: u32, color: &Color) -> Self {
        let mut fb = Self::new(width, height);
        fb.fill(color);
        fb
    }

    /// Wrap existing RGBA8 bytes, checking the length.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> ClipstageResult<Self> {
        let expected = (width as usize) * (height as usize) * 4;
        if data.len() != expected {
            return Err(ClipstageError::InvalidArgument(format!(
                "RGBA buffer for {}x{} needs {} bytes, got {}",
                width,
                height,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    pub fn fill(&mut self, color: &Color) {
        let pixel = color.to_rgba8();
        for px in self.data.chunks_exact_mut(4) {
            px.copy_from_slice(&pixel);
        }
    }

    /// Total number of pixels.
    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(((y as usize) * (self.width as usize) + (x as usize)) * 4)
    }

    /// Get the RGBA value at a pixel coordinate. Returns None if out of bounds.
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let o = self.offset(x, y)?;
        Some([
            self.data[o],
            self.data[o + 1],
            self.data[o + 2],
            self.data[o + 3],
        ])
    }

    /// Set the RGBA value at a pixel coordinate. No-op if out of bounds.
    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        if let Some(o) = self.offset(x, y) {
            self.data[o..o + 4].copy_from_slice(&rgba);
        }
    }

    /// Alpha-composite one source pixel over the pixel at (x, y).
    pub fn blend_pixel(&mut self, x: u32, y: u32, src: [u8; 4]) {
        let Some(o) = self.offset(x, y) else {
            return;
        };
        let sa = src[3] as u32;
        if sa == 0 {
            return;
        }
        let d = &mut self.data[o..o + 4];
        if sa == 255 {
            d.copy_from_slice(&src);
            return;
        }

        let da = d[3] as u32;
        let inv_sa = 255 - sa;
        let out_a = sa + ((da * inv_sa) / 255);
        if out_a == 0 {
            return;
        }
        for i in 0..3 {
            let s = src[i] as u32;
            let dc = d[i] as u32;
            d[i] = ((s * sa * 255 + dc * da * inv_sa) / (out_a * 255)) as u8;
        }
        d[3] = out_a as u8;
    }

    /// Multiply each pixel's alpha by the luminance of the same pixel in `mask`.
    ///
    /// Masks are stored as opaque compressed images, so white keeps a pixel
    /// and black cuts it out.
    pub fn apply_luma_mask(&mut self, mask: &FrameBuffer) -> ClipstageResult<()> {
        if mask.width != self.width || mask.height != self.height {
            return Err(ClipstageError::InvalidArgument(format!(
                "mask is {}x{}, frame is {}x{}",
                mask.width, mask.height, self.width, self.height
            )));
        }
        for (px, m) in self.data.chunks_exact_mut(4).zip(mask.data.chunks_exact(4)) {
            let luma = Color::from_rgba8([m[0], m[1], m[2], 255]).luminance();
            px[3] = (px[3] as f32 * luma).round().clamp(0.0, 255.0) as u8;
        }
        Ok(())
    }
}

/// Per-pixel depth written alongside a composed frame. Smaller is nearer.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthBuffer {
    pub data: Vec<f32>,
    pub width: u32,
    pub height: u32,
}

impl DepthBuffer {
    /// A buffer where every pixel holds [`DEPTH_CLEAR`].
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            data: vec![DEPTH_CLEAR; (width as usize) * (height as usize)],
            width,
            height,
        }
    }

    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.data[(y as usize) * (self.width as usize) + (x as usize)])
    }

    pub fn set(&mut self, x: u32, y: u32, depth: f32) {
        if x < self.width && y < self.height {
            self.data[(y as usize) * (self.width as usize) + (x as usize)] = depth;
        }
    }

    pub fn clear(&mut self) {
        self.data.fill(DEPTH_CLEAR);
    }
}

impl Default for DepthBuffer {
    fn default() -> Self {
        Self::new(0, 0)
    }
}
