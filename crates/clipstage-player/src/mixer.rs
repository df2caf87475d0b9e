//! Per-tick audio mixing.
//!
//! Every playing sound contributes the sample window its playhead advanced
//! over during the tick. Windows are scaled by their source's volume and
//! summed into one mono float buffer that is handed to the [`AudioSink`].

use std::borrow::Cow;

use clipstage_core::{ClipstageResult, HostTime};

use crate::vm::PlayingSound;

/// Supplies raw 16-bit PCM for a sound.
pub trait SampleStore: Send + Sync {
    /// Samples `start..end` of `sound_id`. Windows past the end of the
    /// sound are returned short.
    fn fetch_samples(&self, sound_id: &str, start: usize, end: usize) -> ClipstageResult<Cow<'_, [i16]>>;
}

/// Receives the mixed buffer for each tick, stamped with its presentation time.
pub trait AudioSink: Send {
    fn present_audio(&mut self, samples: &[f32], at: HostTime);
}

/// One sound's contribution to a tick.
#[derive(Debug, Clone, PartialEq)]
pub struct MixRequest {
    pub sound_id: String,
    pub start: usize,
    pub end: usize,
    /// Linear gain, 1.0 = unity.
    pub volume: f32,
}

impl MixRequest {
    /// The window `[floor(prev_playhead), ceil(playhead))` of the sound's
    /// source at `volume_percent`.
    pub fn from_playing(sound: &PlayingSound, volume_percent: f64) -> Self {
        let start = sound.prev_playhead.max(0.0).floor() as usize;
        let end = (sound.playhead.max(0.0).ceil() as usize).max(start);
        Self {
            sound_id: sound.audio_target_id.clone(),
            start,
            end,
            volume: (volume_percent / 100.0) as f32,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Fixed-capacity accumulation buffer reused across ticks.
#[derive(Debug, Clone)]
pub struct AudioMixer {
    buffer: Vec<f32>,
    filled: usize,
}

impl AudioMixer {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0.0; capacity],
            filled: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Mix `requests` and return the filled prefix of the buffer.
    ///
    /// Each window is truncated to the buffer capacity. A sound the store
    /// cannot supply is skipped; the rest of the tick still plays.
    pub fn mix(&mut self, requests: &[MixRequest], store: &dyn SampleStore) -> &[f32] {
        self.buffer.fill(0.0);
        self.filled = 0;
        let capacity = self.buffer.len();

        for req in requests {
            if req.is_empty() {
                continue;
            }
            let wanted = req.len();
            if wanted > capacity {
                tracing::debug!(
                    "Truncating window of '{}' from {} to {} samples",
                    req.sound_id,
                    wanted,
                    capacity
                );
            }
            let end = req.start + wanted.min(capacity);
            let samples = match store.fetch_samples(&req.sound_id, req.start, end) {
                Ok(samples) => samples,
                Err(e) => {
                    tracing::warn!("Skipping sound '{}': {}", req.sound_id, e);
                    continue;
                }
            };

            let n = samples.len().min(capacity);
            for (acc, &s) in self.buffer[..n].iter_mut().zip(samples.iter()) {
                *acc += s as f32 * req.volume;
            }
            self.filled = self.filled.max(n);
        }

        &self.buffer[..self.filled]
    }
}
