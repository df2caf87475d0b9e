//! Script VM boundary.
//!
//! The block-programming runtime lives outside this crate. Once per tick the
//! player asks it to advance and reads back a [`VmSnapshot`]; pointer drags
//! and taps are forwarded to it as calls on [`ScriptVm`].

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use clipstage_core::{ClipstageError, ClipstageResult, Point2D};

/// Identifier of a video entity. Entities are named after the clip they play.
pub type EntityId = String;

fn default_size() -> f64 {
    100.0
}

fn default_direction() -> f64 {
    90.0
}

fn default_volume() -> f64 {
    100.0
}

/// Raw graphic effect values as the VM reports them.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectValues {
    /// Hue shift, degrees.
    pub color: f64,
    /// Swirl, degrees.
    pub whirl: f64,
    /// -100..100.
    pub brightness: f64,
    /// 0 = opaque, 100 = invisible.
    pub ghost: f64,
}

/// One video entity in the VM's draw list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoTarget {
    pub id: EntityId,
    #[serde(default)]
    pub visible: bool,
    #[serde(default)]
    pub current_frame: f64,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    /// Percent of native size.
    #[serde(default = "default_size")]
    pub size: f64,
    /// Degrees, 90 = upright.
    #[serde(default = "default_direction")]
    pub direction: f64,
    #[serde(default)]
    pub effects: EffectValues,
}

impl VideoTarget {
    pub fn new(id: impl Into<EntityId>) -> Self {
        Self {
            id: id.into(),
            visible: true,
            current_frame: 0.0,
            x: 0.0,
            y: 0.0,
            size: default_size(),
            direction: default_direction(),
            effects: EffectValues::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioTarget {
    /// Percent, 0..100.
    #[serde(default = "default_volume")]
    pub volume: f64,
}

impl Default for AudioTarget {
    fn default() -> Self {
        Self {
            volume: default_volume(),
        }
    }
}

/// A sound currently playing, with the sample window it advanced over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayingSound {
    pub audio_target_id: String,
    pub prev_playhead: f64,
    pub playhead: f64,
}

/// Rendering state reported by the VM after a tick.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VmSnapshot {
    pub video_targets: Vec<VideoTarget>,
    pub audio_targets: BTreeMap<String, AudioTarget>,
    pub playing_sounds: BTreeMap<String, PlayingSound>,
}

impl VmSnapshot {
    /// Volume percent for a sound source, full volume when the VM omits it.
    pub fn volume_for(&self, audio_target_id: &str) -> f64 {
        self.audio_targets
            .get(audio_target_id)
            .map(|t| t.volume)
            .unwrap_or_else(default_volume)
    }
}

/// The script runtime as seen by the player.
pub trait ScriptVm: Send {
    /// Advance by `dt_ms` and report what to draw and play. `None` when the
    /// VM has nothing to show yet.
    fn tick(&mut self, dt_ms: f64) -> ClipstageResult<Option<VmSnapshot>>;

    fn begin_drag(&mut self, id: &str, at: Point2D) -> ClipstageResult<()>;

    fn update_drag(&mut self, id: &str, at: Point2D) -> ClipstageResult<()>;

    fn tap(&mut self, id: &str) -> ClipstageResult<()>;

    /// Finish a drag; `update_target` is false when the press was a tap.
    fn end_drag(&mut self, id: &str, update_target: bool) -> ClipstageResult<()>;
}

/// Pointer interactions forwarded to the VM.
#[derive(Debug, Clone, PartialEq)]
pub enum VmEvent {
    BeginDrag { id: EntityId, at: Point2D },
    UpdateDrag { id: EntityId, at: Point2D },
    Tap { id: EntityId },
    EndDrag { id: EntityId, update_target: bool },
}

/// Replays recorded snapshots, one per tick.
///
/// Drags move the dragged target to the pointer; a drag that ends without
/// `update_target` snaps the target back to its recorded position.
#[derive(Debug, Clone, Default)]
pub struct RecordedVm {
    snapshots: Vec<VmSnapshot>,
    cursor: usize,
    looping: bool,
    elapsed_ms: f64,
    drag_positions: HashMap<EntityId, Point2D>,
    pinned: HashMap<EntityId, Point2D>,
    events: Vec<VmEvent>,
}

impl RecordedVm {
    pub fn new(snapshots: Vec<VmSnapshot>) -> Self {
        Self {
            snapshots,
            ..Self::default()
        }
    }

    /// Parse one JSON snapshot per non-blank line.
    pub fn from_json_lines(source: &str) -> ClipstageResult<Self> {
        let snapshots = source
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| {
                serde_json::from_str::<VmSnapshot>(line).map_err(|e| {
                    ClipstageError::Vm(format!("snapshot on line {}: {}", n + 1, e))
                })
            })
            .collect::<ClipstageResult<Vec<_>>>()?;
        Ok(Self::new(snapshots))
    }

    /// Restart from the first snapshot after the last one.
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Total time the VM has been advanced by.
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed_ms
    }

    pub fn events(&self) -> &[VmEvent] {
        &self.events
    }

    fn apply_positions(&self, snapshot: &mut VmSnapshot) {
        for target in &mut snapshot.video_targets {
            let pos = self
                .drag_positions
                .get(&target.id)
                .or_else(|| self.pinned.get(&target.id));
            if let Some(pos) = pos {
                target.x = pos.x;
                target.y = pos.y;
            }
        }
    }
}

impl ScriptVm for RecordedVm {
    fn tick(&mut self, dt_ms: f64) -> ClipstageResult<Option<VmSnapshot>> {
        self.elapsed_ms += dt_ms;
        if self.cursor >= self.snapshots.len() {
            if !self.looping || self.snapshots.is_empty() {
                return Ok(None);
            }
            self.cursor = 0;
        }
        let mut snapshot = self.snapshots[self.cursor].clone();
        self.cursor += 1;
        self.apply_positions(&mut snapshot);
        Ok(Some(snapshot))
    }

    fn begin_drag(&mut self, id: &str, at: Point2D) -> ClipstageResult<()> {
        self.drag_positions.insert(id.to_string(), at);
        self.events.push(VmEvent::BeginDrag {
            id: id.to_string(),
            at,
        });
        Ok(())
    }

    fn update_drag(&mut self, id: &str, at: Point2D) -> ClipstageResult<()> {
        self.drag_positions.insert(id.to_string(), at);
        self.events.push(VmEvent::UpdateDrag {
            id: id.to_string(),
            at,
        });
        Ok(())
    }

    fn tap(&mut self, id: &str) -> ClipstageResult<()> {
        self.events.push(VmEvent::Tap { id: id.to_string() });
        Ok(())
    }

    fn end_drag(&mut self, id: &str, update_target: bool) -> ClipstageResult<()> {
        if let Some(pos) = self.drag_positions.remove(id) {
            if update_target {
                self.pinned.insert(id.to_string(), pos);
            }
        }
        self.events.push(VmEvent::EndDrag {
            id: id.to_string(),
            update_target,
        });
        Ok(())
    }
}
