//! The per-tick render scheduler.
//!
//! A [`Player`] advances the script VM, mixes the tick's audio, fans the
//! visible entities out to the render worker pool, waits for all of them,
//! and publishes the composed frame and its depth layer. Ticks never
//! overlap: the next one starts only after the previous returned.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use clipstage_core::{
    ClipstageConfig, ClipstageError, ClipstageResult, Duration, HostTime, Timestamp,
};

use crate::assets::ClipLibrary;
use crate::hit_test::{DepthLayer, HitTester, MAX_DEPTH_SLOTS};
use crate::mixer::{AudioMixer, AudioSink, MixRequest, SampleStore};
use crate::pointer::{PointerController, PointerEvent, SurfaceMapping};
use crate::render_frame::RenderFrame;
use crate::renderer::{DisplaySink, RenderBackend};
use crate::vm::{EntityId, ScriptVm, VmSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TickPhase {
    #[default]
    Idle,
    Dispatching,
    Draining,
}

/// Summary of one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub index: u64,
    pub target: Timestamp,
    pub dt: Duration,
    /// The tick came too late and the audio clock was resynced.
    pub stalled: bool,
    /// False when the VM had nothing to show.
    pub rendered: bool,
    pub audio_samples: usize,
    pub audio_at: Option<HostTime>,
    /// Entities in draw order, back to front.
    pub drawn: Vec<EntityId>,
    pub failed: usize,
    pub drain_time: std::time::Duration,
}

/// External collaborators a player drives.
pub struct PlayerParts {
    pub vm: Box<dyn ScriptVm>,
    pub clips: ClipLibrary,
    pub samples: Arc<dyn SampleStore>,
    pub backend: Arc<dyn RenderBackend>,
    pub display: Box<dyn DisplaySink>,
    pub audio: Box<dyn AudioSink>,
}

pub struct Player {
    config: ClipstageConfig,
    vm: Box<dyn ScriptVm>,
    clips: ClipLibrary,
    samples: Arc<dyn SampleStore>,
    backend: Arc<dyn RenderBackend>,
    display: Box<dyn DisplaySink>,
    audio: Box<dyn AudioSink>,
    mixer: AudioMixer,
    pool: rayon::ThreadPool,
    hits: HitTester,
    pointer: PointerController,
    phase: TickPhase,
    last_target: Option<Timestamp>,
    next_audio_time: Timestamp,
    ticks: u64,
}

impl Player {
    pub fn new(config: ClipstageConfig, parts: PlayerParts) -> ClipstageResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.render.worker_threads)
            .thread_name(|i| format!("clipstage-render-{}", i))
            .build()
            .map_err(|e| ClipstageError::Render(format!("failed to start render workers: {}", e)))?;
        let mapping = SurfaceMapping::identity(config.render.width, config.render.height);
        let pointer = PointerController::new(mapping, config.timing.tap_threshold_secs());

        tracing::info!(
            "Player ready: {}x{} stage, {} clips, {} render workers",
            config.render.width,
            config.render.height,
            parts.clips.len(),
            pool.current_num_threads()
        );

        Ok(Self {
            mixer: AudioMixer::new(config.audio.mix_capacity),
            config,
            vm: parts.vm,
            clips: parts.clips,
            samples: parts.samples,
            backend: parts.backend,
            display: parts.display,
            audio: parts.audio,
            pool,
            hits: HitTester::new(),
            pointer,
            phase: TickPhase::Idle,
            last_target: None,
            next_audio_time: Timestamp::zero(),
            ticks: 0,
        })
    }

    pub fn config(&self) -> &ClipstageConfig {
        &self.config
    }

    pub fn phase(&self) -> TickPhase {
        self.phase
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Shared handle for resolving pixels to entities.
    pub fn hit_tester(&self) -> HitTester {
        self.hits.clone()
    }

    pub fn dragging(&self) -> Option<&str> {
        self.pointer.dragging()
    }

    /// Replace how output-surface pointer locations map onto the stage.
    pub fn set_surface(&mut self, mapping: SurfaceMapping) {
        self.pointer.set_mapping(mapping);
    }

    /// Route a pointer event through hit-testing to the VM.
    pub fn pointer_event(&mut self, event: &PointerEvent) -> ClipstageResult<()> {
        self.pointer.handle(event, &self.hits, self.vm.as_mut())
    }

    /// Run one tick for the frame due at `target`.
    pub fn tick(&mut self, target: Timestamp) -> ClipstageResult<TickReport> {
        let index = self.ticks;
        self.ticks += 1;

        let (dt, stalled) = match self.last_target {
            None => {
                self.next_audio_time = target;
                (Duration::zero(), false)
            }
            Some(last) => {
                let dt = target.since(last);
                let stalled = dt.as_seconds() > self.config.timing.stall_threshold_secs();
                if stalled {
                    tracing::warn!("Tick {} late by {:.1} ms, resyncing audio", index, dt.as_millis());
                    self.next_audio_time = target;
                }
                (dt, stalled)
            }
        };
        self.last_target = Some(target);

        self.hits.begin_tick();

        let mut report = TickReport {
            index,
            target,
            dt,
            stalled,
            rendered: false,
            audio_samples: 0,
            audio_at: None,
            drawn: Vec::new(),
            failed: 0,
            drain_time: std::time::Duration::ZERO,
        };

        let Some(snapshot) = self.vm.tick(dt.as_millis())? else {
            tracing::debug!("Tick {}: no snapshot", index);
            return Ok(report);
        };

        self.mix_audio(&snapshot, dt, &mut report);

        self.phase = TickPhase::Dispatching;
        let frames = self.collect_frames(&snapshot);
        report.drawn = frames.iter().map(|f| f.entity.clone()).collect();

        self.phase = TickPhase::Draining;
        let started = Instant::now();
        report.failed = self.dispatch(frames);
        report.drain_time = started.elapsed();
        if report.drain_time.as_secs_f64() * 1000.0 > self.config.timing.drain_budget_ms {
            tracing::warn!(
                "Tick {}: drain took {:.1} ms for {} entities",
                index,
                report.drain_time.as_secs_f64() * 1000.0,
                report.drawn.len()
            );
        }

        let composed = self.backend.flush(report.drawn.len());
        self.phase = TickPhase::Idle;
        let composed = composed?;
        self.display.present_frame(&composed);
        self.hits.complete_tick(DepthLayer {
            order: report.drawn.clone(),
            depth: composed.depth,
        });
        report.rendered = true;

        tracing::debug!(
            "Tick {} at {}: {} drawn, {} failed, {} samples",
            index,
            target,
            report.drawn.len(),
            report.failed,
            report.audio_samples
        );
        Ok(report)
    }

    fn mix_audio(&mut self, snapshot: &VmSnapshot, dt: Duration, report: &mut TickReport) {
        let requests: Vec<MixRequest> = snapshot
            .playing_sounds
            .values()
            .map(|sound| MixRequest::from_playing(sound, snapshot.volume_for(&sound.audio_target_id)))
            .collect();
        let at = HostTime::from_timestamp(self.next_audio_time);
        let mixed = self.mixer.mix(&requests, self.samples.as_ref());
        if !mixed.is_empty() {
            self.audio.present_audio(mixed, at);
            report.audio_samples = mixed.len();
            report.audio_at = Some(at);
        }
        self.next_audio_time += dt;
    }

    /// Visible entities with a playable clip, back to front. The entity
    /// under the pointer is drawn last. Only the nearest
    /// [`MAX_DEPTH_SLOTS`] entities are kept so every drawn entity has its
    /// own depth slot.
    fn collect_frames(&self, snapshot: &VmSnapshot) -> Vec<RenderFrame> {
        let dragging = self.pointer.dragging();
        let mut frames = Vec::with_capacity(snapshot.video_targets.len());
        let mut deferred = None;
        for target in snapshot.video_targets.iter().filter(|t| t.visible) {
            let Some(clip) = self.clips.get(&target.id) else {
                tracing::debug!("No clip for entity '{}'", target.id);
                continue;
            };
            let Some(frame) = RenderFrame::from_target(target, clip) else {
                continue;
            };
            if dragging == Some(target.id.as_str()) {
                deferred = Some(frame);
            } else {
                frames.push(frame);
            }
        }
        frames.extend(deferred);
        if frames.len() > MAX_DEPTH_SLOTS {
            let excess = frames.len() - MAX_DEPTH_SLOTS;
            tracing::warn!(
                "{} visible entities exceed {} depth slots, dropping the {} farthest",
                frames.len(),
                MAX_DEPTH_SLOTS,
                excess
            );
            frames.drain(..excess);
        }
        frames
    }

    /// Submit every frame on the worker pool and wait for all of them.
    /// Returns the number of failed submissions.
    fn dispatch(&self, frames: Vec<RenderFrame>) -> usize {
        let failed = AtomicUsize::new(0);
        let backend = &self.backend;
        self.pool.scope(|s| {
            for (slot, frame) in frames.into_iter().enumerate() {
                let failed = &failed;
                s.spawn(move |_| {
                    let entity = frame.entity.clone();
                    if let Err(e) = backend.submit(slot, frame) {
                        tracing::warn!("Failed to render '{}': {}", entity, e);
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                });
            }
        });
        failed.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemorySampleStore;
    use crate::renderer::ComposedFrame;
    use crate::sinks::{CollectingAudioSink, NullDisplaySink};
    use crate::vm::{PlayingSound, RecordedVm, VideoTarget};
    use clipstage_clip::Clip;
    use clipstage_core::{DepthBuffer, FrameBuffer};
    use parking_lot::Mutex;

    /// Records submissions without drawing.
    #[derive(Default)]
    struct RecordingBackend {
        submitted: Mutex<Vec<(usize, EntityId)>>,
        fail: Option<EntityId>,
    }

    impl RenderBackend for RecordingBackend {
        fn submit(&self, slot: usize, frame: RenderFrame) -> ClipstageResult<()> {
            if self.fail.as_deref() == Some(frame.entity.as_str()) {
                return Err(ClipstageError::Render("boom".into()));
            }
            self.submitted.lock().push((slot, frame.entity));
            Ok(())
        }

        fn flush(&self, _count: usize) -> ClipstageResult<ComposedFrame> {
            Ok(ComposedFrame {
                color: FrameBuffer::new(1, 1),
                depth: DepthBuffer::new(1, 1),
            })
        }
    }

    fn clip() -> Clip {
        let mut clip = Clip::new(2, 2);
        clip.append_frame(b"frame").unwrap();
        clip
    }

    fn snapshot(ids: &[&str]) -> VmSnapshot {
        VmSnapshot {
            video_targets: ids.iter().map(|id| VideoTarget::new(*id)).collect(),
            ..VmSnapshot::default()
        }
    }

    fn player(snapshots: Vec<VmSnapshot>, backend: Arc<RecordingBackend>, audio: CollectingAudioSink) -> Player {
        let mut clips = ClipLibrary::new();
        clips.insert("a", clip());
        clips.insert("b", clip());
        clips.insert("empty", Clip::new(2, 2));
        let mut samples = MemorySampleStore::new();
        samples.insert("beep", vec![100; 1000]);
        let mut config = ClipstageConfig::default();
        config.render.worker_threads = 2;
        Player::new(
            config,
            PlayerParts {
                vm: Box::new(RecordedVm::new(snapshots).looping(true)),
                clips,
                samples: Arc::new(samples),
                backend,
                display: Box::new(NullDisplaySink),
                audio: Box::new(audio),
            },
        )
        .unwrap()
    }

    #[test]
    fn test_draw_list_skips_hidden_unknown_and_empty() {
        let mut snap = snapshot(&["a", "missing", "empty", "b"]);
        snap.video_targets[3].visible = false;
        let backend = Arc::new(RecordingBackend::default());
        let mut p = player(vec![snap], backend.clone(), CollectingAudioSink::new());
        let report = p.tick(Timestamp::from_seconds(1.0)).unwrap();
        assert_eq!(report.drawn, vec!["a".to_string()]);
        assert_eq!(*backend.submitted.lock(), vec![(0, "a".to_string())]);
        assert_eq!(p.phase(), TickPhase::Idle);
    }

    #[test]
    fn test_failed_submission_does_not_abort_tick() {
        let backend = Arc::new(RecordingBackend {
            fail: Some("a".into()),
            ..RecordingBackend::default()
        });
        let mut p = player(vec![snapshot(&["a", "b"])], backend.clone(), CollectingAudioSink::new());
        let report = p.tick(Timestamp::from_seconds(1.0)).unwrap();
        assert!(report.rendered);
        assert_eq!(report.failed, 1);
        assert_eq!(*backend.submitted.lock(), vec![(1, "b".to_string())]);
    }

    #[test]
    fn test_audio_clock_advances_and_resyncs() {
        let mut snap = snapshot(&[]);
        snap.playing_sounds.insert(
            "s".into(),
            PlayingSound {
                audio_target_id: "beep".into(),
                prev_playhead: 0.0,
                playhead: 800.0,
            },
        );
        let audio = CollectingAudioSink::new();
        let mut p = player(vec![snap], Arc::new(RecordingBackend::default()), audio.clone());

        let t0 = 10.0;
        let dt = 1.0 / 60.0;
        p.tick(Timestamp::from_seconds(t0)).unwrap();
        p.tick(Timestamp::from_seconds(t0 + dt)).unwrap();
        p.tick(Timestamp::from_seconds(t0 + 2.0 * dt)).unwrap();
        let late = p.tick(Timestamp::from_seconds(t0 + 1.0)).unwrap();
        assert!(late.stalled);

        let at: Vec<f64> = audio
            .presented()
            .iter()
            .map(|a| a.at.to_timestamp().as_seconds())
            .collect();
        assert!((at[0] - t0).abs() < 1e-6);
        assert!((at[1] - t0).abs() < 1e-6);
        assert!((at[2] - (t0 + dt)).abs() < 1e-6);
        assert!((at[3] - (t0 + 1.0)).abs() < 1e-6);
        assert_eq!(audio.presented()[0].samples.len(), 800);
        assert_eq!(audio.presented()[0].samples[0], 100.0);
    }

    #[test]
    fn test_draw_list_capped_at_depth_slots() {
        let mut ids = vec!["a"; MAX_DEPTH_SLOTS + 3];
        ids.push("b");
        let backend = Arc::new(RecordingBackend::default());
        let mut p = player(vec![snapshot(&ids)], backend.clone(), CollectingAudioSink::new());
        let report = p.tick(Timestamp::from_seconds(1.0)).unwrap();
        assert_eq!(report.drawn.len(), MAX_DEPTH_SLOTS);
        assert_eq!(report.drawn.last().map(String::as_str), Some("b"));
        let submitted = backend.submitted.lock();
        assert_eq!(submitted.len(), MAX_DEPTH_SLOTS);
        assert!(submitted.iter().all(|(slot, _)| *slot < MAX_DEPTH_SLOTS));
        assert!(submitted.contains(&(MAX_DEPTH_SLOTS - 1, "b".to_string())));
    }

    /// Fills slots as submissions land; the first slot is slow.
    #[derive(Default)]
    struct SlowSlotBackend {
        slots: Mutex<Vec<Option<EntityId>>>,
        flushed: Mutex<Vec<Option<EntityId>>>,
    }

    impl RenderBackend for SlowSlotBackend {
        fn submit(&self, slot: usize, frame: RenderFrame) -> ClipstageResult<()> {
            if slot == 0 {
                std::thread::sleep(std::time::Duration::from_millis(50));
            }
            let mut slots = self.slots.lock();
            if slots.len() <= slot {
                slots.resize(slot + 1, None);
            }
            slots[slot] = Some(frame.entity);
            Ok(())
        }

        fn flush(&self, count: usize) -> ClipstageResult<ComposedFrame> {
            let mut slots = std::mem::take(&mut *self.slots.lock());
            slots.resize(count, None);
            *self.flushed.lock() = slots;
            Ok(ComposedFrame {
                color: FrameBuffer::new(1, 1),
                depth: DepthBuffer::new(1, 1),
            })
        }
    }

    #[test]
    fn test_flush_waits_for_slow_submission() {
        let backend = Arc::new(SlowSlotBackend::default());
        let mut clips = ClipLibrary::new();
        clips.insert("a", clip());
        clips.insert("b", clip());
        clips.insert("c", clip());
        let mut config = ClipstageConfig::default();
        config.render.worker_threads = 3;
        let mut p = Player::new(
            config,
            PlayerParts {
                vm: Box::new(RecordedVm::new(vec![snapshot(&["a", "b", "c"])])),
                clips,
                samples: Arc::new(MemorySampleStore::new()),
                backend: backend.clone(),
                display: Box::new(NullDisplaySink),
                audio: Box::new(CollectingAudioSink::new()),
            },
        )
        .unwrap();

        let report = p.tick(Timestamp::from_seconds(1.0)).unwrap();
        assert!(report.rendered);
        assert!(report.drain_time >= std::time::Duration::from_millis(50));
        assert_eq!(
            *backend.flushed.lock(),
            vec![Some("a".to_string()), Some("b".to_string()), Some("c".to_string())]
        );
    }

    #[test]
    fn test_no_snapshot_skips_render() {
        let backend = Arc::new(RecordingBackend::default());
        let mut p = player(vec![], backend.clone(), CollectingAudioSink::new());
        let report = p.tick(Timestamp::from_seconds(1.0)).unwrap();
        assert!(!report.rendered);
        assert!(backend.submitted.lock().is_empty());
    }
}
