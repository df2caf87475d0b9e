//! Pointer gestures: hit-test on press, drag while held, tap on a short press.

use clipstage_core::{ClipstageResult, Point2D, Size2D, Timestamp};

use crate::hit_test::HitTester;
use crate::vm::{EntityId, ScriptVm};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerPhase {
    Began,
    Moved,
    Ended,
}

/// A pointer sample in output-surface coordinates (origin top-left, y down).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub phase: PointerPhase,
    pub location: Point2D,
    pub time: Timestamp,
}

impl PointerEvent {
    pub fn new(phase: PointerPhase, location: impl Into<Point2D>, time: Timestamp) -> Self {
        Self {
            phase,
            location: location.into(),
            time,
        }
    }
}

/// Maps the output surface onto the drawable and onto stage space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceMapping {
    pub surface: Size2D,
    pub width: u32,
    pub height: u32,
}

impl SurfaceMapping {
    pub fn new(surface: Size2D, width: u32, height: u32) -> Self {
        Self {
            surface,
            width,
            height,
        }
    }

    /// Surface the same size as the drawable.
    pub fn identity(width: u32, height: u32) -> Self {
        Self::new(Size2D::new(width as f64, height as f64), width, height)
    }

    fn scaled(&self, location: Point2D) -> Point2D {
        if self.surface.is_empty() {
            return Point2D::zero();
        }
        Point2D::new(
            location.x / self.surface.width * self.width as f64,
            location.y / self.surface.height * self.height as f64,
        )
    }

    /// Drawable pixel under `location`, `None` outside the drawable.
    pub fn to_pixel(&self, location: Point2D) -> Option<(u32, u32)> {
        let p = self.scaled(location);
        if p.x < 0.0 || p.y < 0.0 || p.x >= self.width as f64 || p.y >= self.height as f64 {
            return None;
        }
        Some((p.x as u32, p.y as u32))
    }

    /// Stage coordinates: origin at center, y up.
    pub fn to_stage(&self, location: Point2D) -> Point2D {
        let p = self.scaled(location);
        Point2D::new(
            p.x - self.width as f64 / 2.0,
            self.height as f64 / 2.0 - p.y,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
struct ActiveDrag {
    id: EntityId,
    started: Timestamp,
}

/// Single-pointer gesture state.
#[derive(Debug, Clone)]
pub struct PointerController {
    mapping: SurfaceMapping,
    tap_threshold_secs: f64,
    active: Option<ActiveDrag>,
}

impl PointerController {
    pub fn new(mapping: SurfaceMapping, tap_threshold_secs: f64) -> Self {
        Self {
            mapping,
            tap_threshold_secs,
            active: None,
        }
    }

    pub fn mapping(&self) -> &SurfaceMapping {
        &self.mapping
    }

    pub fn set_mapping(&mut self, mapping: SurfaceMapping) {
        self.mapping = mapping;
    }

    /// Entity currently held by the pointer.
    pub fn dragging(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.id.as_str())
    }

    pub fn handle(
        &mut self,
        event: &PointerEvent,
        hits: &HitTester,
        vm: &mut dyn ScriptVm,
    ) -> ClipstageResult<()> {
        let stage = self.mapping.to_stage(event.location);
        match event.phase {
            PointerPhase::Began => {
                if let Some(active) = &self.active {
                    tracing::debug!("Ignoring press while '{}' is held", active.id);
                    return Ok(());
                }
                let Some((x, y)) = self.mapping.to_pixel(event.location) else {
                    return Ok(());
                };
                let Some(id) = hits.resolve(x, y) else {
                    return Ok(());
                };
                tracing::debug!("Pointer picked '{}' at ({}, {})", id, x, y);
                vm.begin_drag(&id, stage)?;
                self.active = Some(ActiveDrag {
                    id,
                    started: event.time,
                });
            }
            PointerPhase::Moved => {
                if let Some(active) = &self.active {
                    vm.update_drag(&active.id, stage)?;
                }
            }
            PointerPhase::Ended => {
                let Some(active) = self.active.take() else {
                    return Ok(());
                };
                let held = event.time.since(active.started).as_seconds();
                if held < self.tap_threshold_secs {
                    vm.tap(&active.id)?;
                    vm.end_drag(&active.id, false)?;
                } else {
                    vm.end_drag(&active.id, true)?;
                }
            }
        }
        Ok(())
    }
}
