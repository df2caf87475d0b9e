//! CPU graphic effects applied to a decoded sprite before it is rasterized.

use clipstage_core::frame::FrameBuffer;
use clipstage_core::Color;

use crate::render_frame::VideoEffects;

/// Apply every non-neutral effect in `effects` to `fb`.
pub fn apply_effects(fb: &mut FrameBuffer, effects: &VideoEffects) {
    if effects.is_identity() {
        return;
    }
    if effects.whirl != 0.0 {
        *fb = whirl(fb, effects.whirl);
    }
    if effects.color != 0.0 || effects.brightness != 0.0 || effects.ghost < 1.0 {
        recolor(fb, effects);
    }
}

/// Per-pixel hue shift, brightness offset and opacity.
fn recolor(fb: &mut FrameBuffer, effects: &VideoEffects) {
    let ghost = effects.ghost.clamp(0.0, 1.0);
    for px in fb.data.chunks_exact_mut(4) {
        if px[3] == 0 {
            continue;
        }
        let mut c = Color::from_rgba8([px[0], px[1], px[2], px[3]]);
        if effects.color != 0.0 {
            c = c.shift_hue(effects.color);
        }
        if effects.brightness != 0.0 {
            c.r = (c.r + effects.brightness).clamp(0.0, 1.0);
            c.g = (c.g + effects.brightness).clamp(0.0, 1.0);
            c.b = (c.b + effects.brightness).clamp(0.0, 1.0);
        }
        c.a *= ghost;
        px.copy_from_slice(&c.to_rgba8());
    }
}

/// Swirl pixels around the center. The twist is `turns` full rotations at
/// the center, falling off quadratically to none at the inscribed circle.
fn whirl(src: &FrameBuffer, turns: f32) -> FrameBuffer {
    let mut out = FrameBuffer::new(src.width, src.height);
    let cx = src.width as f32 / 2.0;
    let cy = src.height as f32 / 2.0;
    let radius = cx.min(cy);
    if radius <= 0.0 {
        return src.clone();
    }
    let max_angle = turns * std::f32::consts::TAU;

    for y in 0..src.height {
        for x in 0..src.width {
            let dx = x as f32 + 0.5 - cx;
            let dy = y as f32 + 0.5 - cy;
            let r = (dx * dx + dy * dy).sqrt() / radius;
            let (sx, sy) = if r < 1.0 {
                let falloff = 1.0 - r;
                let (sin, cos) = (max_angle * falloff * falloff).sin_cos();
                (cx + dx * cos - dy * sin, cy + dx * sin + dy * cos)
            } else {
                (x as f32 + 0.5, y as f32 + 0.5)
            };
            if sx < 0.0 || sy < 0.0 {
                continue;
            }
            if let Some(px) = src.get_pixel(sx as u32, sy as u32) {
                out.set_pixel(x, y, px);
            }
        }
    }
    out
}
