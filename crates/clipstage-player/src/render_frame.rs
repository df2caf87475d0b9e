use std::sync::Arc;

use clipstage_clip::Clip;
use clipstage_core::Affine2D;

use crate::vm::{EffectValues, EntityId, VideoTarget};

/// Normalized graphic effects for one sprite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoEffects {
    /// Hue rotation in turns.
    pub color: f32,
    /// Swirl in turns at the sprite's center.
    pub whirl: f32,
    /// Additive brightness, -1.0..1.0.
    pub brightness: f32,
    /// Opacity multiplier, 1.0 = opaque.
    pub ghost: f32,
}

impl VideoEffects {
    pub const NONE: VideoEffects = VideoEffects {
        color: 0.0,
        whirl: 0.0,
        brightness: 0.0,
        ghost: 1.0,
    };

    pub fn from_values(values: &EffectValues) -> Self {
        Self {
            color: (values.color / 360.0) as f32,
            whirl: (values.whirl / 360.0) as f32,
            brightness: (values.brightness / 100.0).clamp(-1.0, 1.0) as f32,
            ghost: (1.0 - values.ghost / 100.0).clamp(0.0, 1.0) as f32,
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::NONE
    }
}

impl Default for VideoEffects {
    fn default() -> Self {
        Self::NONE
    }
}

/// Model transform of an entity in stage space (origin at center, y up).
///
/// `size` is a percentage and `direction` uses 90 as upright with angles
/// growing clockwise.
pub fn entity_transform(size: f64, direction: f64, x: f64, y: f64) -> Affine2D {
    let scale = size / 100.0;
    let theta = (direction - 90.0).to_radians();
    Affine2D::scale_rotate_translate(scale, -theta, x, y)
}

/// Everything needed to draw one entity for one tick.
#[derive(Debug, Clone)]
pub struct RenderFrame {
    pub entity: EntityId,
    pub clip: Arc<Clip>,
    pub frame_index: usize,
    pub transform: Affine2D,
    pub effects: VideoEffects,
}

impl RenderFrame {
    /// Build the frame for a visible target, resolving its frame number
    /// against the clip. `None` for an empty clip.
    pub fn from_target(target: &VideoTarget, clip: Arc<Clip>) -> Option<Self> {
        let frame_index = clip.clamp_frame_number(target.current_frame)?;
        Some(Self {
            entity: target.id.clone(),
            clip,
            frame_index,
            transform: entity_transform(target.size, target.direction, target.x, target.y),
            effects: VideoEffects::from_values(&target.effects),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipstage_core::Point2D;

    #[test]
    fn test_effect_normalization() {
        let fx = VideoEffects::from_values(&EffectValues {
            color: 180.0,
            whirl: 90.0,
            brightness: 50.0,
            ghost: 25.0,
        });
        assert_eq!(fx.color, 0.5);
        assert_eq!(fx.whirl, 0.25);
        assert_eq!(fx.brightness, 0.5);
        assert_eq!(fx.ghost, 0.75);
        assert!(VideoEffects::from_values(&EffectValues::default()).is_identity());
    }

    #[test]
    fn test_upright_transform_is_scale_translate() {
        let t = entity_transform(200.0, 90.0, 10.0, -5.0);
        let p = t.apply(Point2D::new(1.0, 1.0));
        assert!((p.x - 12.0).abs() < 1e-9);
        assert!((p.y + 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_direction_rotates_clockwise() {
        // facing down (180) turns the sprite's +x axis to -y
        let t = entity_transform(100.0, 180.0, 0.0, 0.0);
        let p = t.apply(Point2D::new(1.0, 0.0));
        assert!(p.x.abs() < 1e-9);
        assert!((p.y + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_from_target_clamps_frame() {
        let mut clip = Clip::new(1, 1);
        clip.append_frame(b"a").unwrap();
        clip.append_frame(b"b").unwrap();
        let mut target = VideoTarget::new("cat");
        target.current_frame = 9.7;

        let frame = RenderFrame::from_target(&target, Arc::new(clip)).unwrap();
        assert_eq!(frame.frame_index, 1);
        assert_eq!(frame.entity, "cat");
        assert!(RenderFrame::from_target(&target, Arc::new(Clip::new(1, 1))).is_none());
    }
}
