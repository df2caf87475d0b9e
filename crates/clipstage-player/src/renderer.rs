//! Render backends.
//!
//! The scheduler submits one [`RenderFrame`] per entity, concurrently and
//! in any order, each tagged with its depth slot. `flush` then composes the
//! submissions back to front into a color frame plus the depth buffer used
//! for hit-testing.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use clipstage_clip::{FrameDecoder, ImageFrameDecoder};
use clipstage_core::frame::{DepthBuffer, FrameBuffer};
use clipstage_core::{Affine2D, ClipstageError, ClipstageResult, Color, Point2D, RenderConfig};

use crate::effects::apply_effects;
use crate::hit_test::depth_for_slot;
use crate::render_frame::RenderFrame;
use crate::vm::EntityId;

/// One tick's output: colors for display, depth for hit-testing.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedFrame {
    pub color: FrameBuffer,
    pub depth: DepthBuffer,
}

/// Draws entities for a tick. `submit` is called from worker threads.
pub trait RenderBackend: Send + Sync {
    fn submit(&self, slot: usize, frame: RenderFrame) -> ClipstageResult<()>;

    /// Compose slots `0..count` and reset for the next tick. Slots whose
    /// submission failed are left out.
    fn flush(&self, count: usize) -> ClipstageResult<ComposedFrame>;
}

/// Receives each composed frame.
pub trait DisplaySink: Send {
    fn present_frame(&mut self, frame: &ComposedFrame);
}

/// A decoded, masked and effect-applied sprite waiting for composition.
#[derive(Debug, Clone)]
struct Sprite {
    pixels: FrameBuffer,
    transform: Affine2D,
}

/// CPU rasterizer over the `image` crate decoder.
pub struct SoftwareRenderer {
    width: u32,
    height: u32,
    background: Color,
    decoder: Arc<dyn FrameDecoder>,
    cache_limit: usize,
    frames: DashMap<(EntityId, usize), Arc<FrameBuffer>>,
    masks: DashMap<EntityId, Option<Arc<FrameBuffer>>>,
    slots: Mutex<Vec<Option<Sprite>>>,
}

impl SoftwareRenderer {
    pub fn new(config: &RenderConfig) -> ClipstageResult<Self> {
        Self::with_decoder(config, Arc::new(ImageFrameDecoder))
    }

    pub fn with_decoder(config: &RenderConfig, decoder: Arc<dyn FrameDecoder>) -> ClipstageResult<Self> {
        let background = Color::from_hex(&config.background)
            .map_err(|e| ClipstageError::Config(format!("render.background: {}", e)))?;
        Ok(Self {
            width: config.width,
            height: config.height,
            background,
            decoder,
            cache_limit: config.frame_cache,
            frames: DashMap::new(),
            masks: DashMap::new(),
            slots: Mutex::new(Vec::new()),
        })
    }

    pub fn cached_frames(&self) -> usize {
        self.frames.len()
    }

    fn decoded_frame(&self, frame: &RenderFrame) -> ClipstageResult<Arc<FrameBuffer>> {
        let key = (frame.entity.clone(), frame.frame_index);
        if let Some(hit) = self.frames.get(&key) {
            return Ok(hit.clone());
        }
        let pixels = Arc::new(self.decoder.decode(frame.clip.frame_bytes(frame.frame_index)?)?);
        if self.cache_limit > 0 {
            if self.frames.len() >= self.cache_limit {
                tracing::debug!("Frame cache full ({} entries), clearing", self.frames.len());
                self.frames.clear();
            }
            self.frames.insert(key, pixels.clone());
        }
        Ok(pixels)
    }

    fn decoded_mask(&self, frame: &RenderFrame) -> ClipstageResult<Option<Arc<FrameBuffer>>> {
        if let Some(hit) = self.masks.get(&frame.entity) {
            return Ok(hit.clone());
        }
        let mask = match frame.clip.mask() {
            [] => None,
            bytes => Some(Arc::new(self.decoder.decode(bytes)?)),
        };
        self.masks.insert(frame.entity.clone(), mask.clone());
        Ok(mask)
    }

    fn prepare(&self, frame: &RenderFrame) -> ClipstageResult<Sprite> {
        let mut pixels = (*self.decoded_frame(frame)?).clone();
        if let Some(mask) = self.decoded_mask(frame)? {
            if let Err(e) = pixels.apply_luma_mask(&mask) {
                tracing::warn!("Ignoring mask of '{}': {}", frame.entity, e);
            }
        }
        apply_effects(&mut pixels, &frame.effects);
        Ok(Sprite {
            pixels,
            transform: frame.transform,
        })
    }

    fn stage_to_pixel(&self, p: Point2D) -> (f64, f64) {
        (p.x + self.width as f64 / 2.0, self.height as f64 / 2.0 - p.y)
    }

    fn rasterize(&self, sprite: &Sprite, depth_value: f32, out: &mut ComposedFrame) {
        let Some(inverse) = sprite.transform.inverse() else {
            return;
        };
        let (w, h) = (sprite.pixels.width as f64, sprite.pixels.height as f64);
        let corners = [
            Point2D::new(-w / 2.0, -h / 2.0),
            Point2D::new(w / 2.0, -h / 2.0),
            Point2D::new(w / 2.0, h / 2.0),
            Point2D::new(-w / 2.0, h / 2.0),
        ];
        let (mut min_x, mut min_y) = (f64::MAX, f64::MAX);
        let (mut max_x, mut max_y) = (f64::MIN, f64::MIN);
        for corner in corners {
            let (x, y) = self.stage_to_pixel(sprite.transform.apply(corner));
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        let x0 = min_x.floor().max(0.0) as u32;
        let y0 = min_y.floor().max(0.0) as u32;
        let x1 = (max_x.ceil().max(0.0) as u32).min(self.width);
        let y1 = (max_y.ceil().max(0.0) as u32).min(self.height);

        let half_w = self.width as f64 / 2.0;
        let half_h = self.height as f64 / 2.0;
        for py in y0..y1 {
            for px in x0..x1 {
                let stage = Point2D::new(px as f64 + 0.5 - half_w, half_h - (py as f64 + 0.5));
                let local = inverse.apply(stage);
                let u = local.x + w / 2.0;
                let v = h / 2.0 - local.y;
                if u < 0.0 || v < 0.0 || u >= w || v >= h {
                    continue;
                }
                let Some(src) = sprite.pixels.get_pixel(u as u32, v as u32) else {
                    continue;
                };
                if src[3] == 0 {
                    continue;
                }
                out.color.blend_pixel(px, py, src);
                out.depth.set(px, py, depth_value);
            }
        }
    }
}

impl RenderBackend for SoftwareRenderer {
    fn submit(&self, slot: usize, frame: RenderFrame) -> ClipstageResult<()> {
        let sprite = self
            .prepare(&frame)
            .map_err(|e| ClipstageError::Render(format!("'{}' frame {}: {}", frame.entity, frame.frame_index, e)))?;
        let mut slots = self.slots.lock();
        if slots.len() <= slot {
            slots.resize(slot + 1, None);
        }
        slots[slot] = Some(sprite);
        Ok(())
    }

    fn flush(&self, count: usize) -> ClipstageResult<ComposedFrame> {
        let sprites = std::mem::take(&mut *self.slots.lock());
        let mut out = ComposedFrame {
            color: FrameBuffer::solid(self.width, self.height, &self.background),
            depth: DepthBuffer::new(self.width, self.height),
        };
        for (slot, sprite) in sprites.iter().take(count).enumerate() {
            if let Some(sprite) = sprite {
                self.rasterize(sprite, depth_for_slot(slot), &mut out);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hit_test::slot_for_depth;
    use crate::render_frame::{entity_transform, VideoEffects};
    use clipstage_clip::decode::encode_png;
    use clipstage_clip::Clip;

    fn config() -> RenderConfig {
        RenderConfig {
            width: 20,
            height: 10,
            background: "#000000".into(),
            ..RenderConfig::default()
        }
    }

    fn solid_clip(w: u32, h: u32, color: Color) -> Arc<Clip> {
        let mut clip = Clip::new(w, h);
        clip.append_frame(&encode_png(&FrameBuffer::solid(w, h, &color)).unwrap())
            .unwrap();
        Arc::new(clip)
    }

    fn frame(id: &str, clip: Arc<Clip>, x: f64, y: f64) -> RenderFrame {
        RenderFrame {
            entity: id.into(),
            clip,
            frame_index: 0,
            transform: entity_transform(100.0, 90.0, x, y),
            effects: VideoEffects::NONE,
        }
    }

    #[test]
    fn test_sprite_lands_centered() {
        let r = SoftwareRenderer::new(&config()).unwrap();
        r.submit(0, frame("a", solid_clip(4, 2, Color::RED), 0.0, 0.0)).unwrap();
        let out = r.flush(1).unwrap();
        // pixels 8..12 x 4..6 are covered
        assert_eq!(out.color.get_pixel(8, 4), Some([255, 0, 0, 255]));
        assert_eq!(out.color.get_pixel(11, 5), Some([255, 0, 0, 255]));
        assert_eq!(out.color.get_pixel(7, 4), Some([0, 0, 0, 255]));
        assert_eq!(out.color.get_pixel(12, 5), Some([0, 0, 0, 255]));
        assert_eq!(slot_for_depth(out.depth.get(9, 5).unwrap()), Some(0));
        assert_eq!(slot_for_depth(out.depth.get(0, 0).unwrap()), None);
    }

    #[test]
    fn test_later_slot_draws_on_top() {
        let r = SoftwareRenderer::new(&config()).unwrap();
        // submitted out of order, composed by slot
        r.submit(1, frame("top", solid_clip(4, 4, Color::BLUE), 2.0, 0.0)).unwrap();
        r.submit(0, frame("bottom", solid_clip(4, 4, Color::RED), 0.0, 0.0)).unwrap();
        let out = r.flush(2).unwrap();
        assert_eq!(out.color.get_pixel(11, 5), Some([0, 0, 255, 255]));
        assert_eq!(slot_for_depth(out.depth.get(11, 5).unwrap()), Some(1));
        assert_eq!(out.color.get_pixel(8, 5), Some([255, 0, 0, 255]));
        assert_eq!(slot_for_depth(out.depth.get(8, 5).unwrap()), Some(0));
    }

    #[test]
    fn test_flush_resets_slots() {
        let r = SoftwareRenderer::new(&config()).unwrap();
        r.submit(0, frame("a", solid_clip(2, 2, Color::RED), 0.0, 0.0)).unwrap();
        r.flush(1).unwrap();
        let out = r.flush(1).unwrap();
        assert!(out.depth.data.iter().all(|&d| slot_for_depth(d).is_none()));
        assert_eq!(r.cached_frames(), 1);
    }

    #[test]
    fn test_bad_frame_fails_submit() {
        let r = SoftwareRenderer::new(&config()).unwrap();
        let mut clip = Clip::new(2, 2);
        clip.append_frame(b"garbage").unwrap();
        let err = r.submit(0, frame("a", Arc::new(clip), 0.0, 0.0)).unwrap_err();
        assert!(matches!(err, ClipstageError::Render(_)));
    }

    #[test]
    fn test_mask_cuts_out_pixels() {
        let r = SoftwareRenderer::new(&config()).unwrap();
        let mut mask = FrameBuffer::solid(2, 1, &Color::WHITE);
        mask.set_pixel(0, 0, [0, 0, 0, 255]);
        let mut clip = Clip::new(2, 1).with_mask(encode_png(&mask).unwrap());
        clip.append_frame(&encode_png(&FrameBuffer::solid(2, 1, &Color::RED)).unwrap())
            .unwrap();
        r.submit(0, frame("a", Arc::new(clip), 0.0, 0.0)).unwrap();
        let out = r.flush(1).unwrap();
        assert_eq!(out.color.get_pixel(9, 4), Some([0, 0, 0, 255]));
        assert_eq!(out.color.get_pixel(10, 4), Some([255, 0, 0, 255]));
        assert_eq!(slot_for_depth(out.depth.get(9, 4).unwrap()), None);
    }

    #[test]
    fn test_invalid_background() {
        let cfg = RenderConfig {
            background: "teal".into(),
            ..config()
        };
        assert!(matches!(SoftwareRenderer::new(&cfg), Err(ClipstageError::Config(_))));
    }
}
