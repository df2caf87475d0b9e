//! Ready-made audio and display sinks for headless playback and tests.

use std::sync::Arc;

use parking_lot::Mutex;

use clipstage_core::HostTime;

use crate::mixer::AudioSink;
use crate::renderer::{ComposedFrame, DisplaySink};

/// Discards audio.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAudioSink;

impl AudioSink for NullAudioSink {
    fn present_audio(&mut self, _samples: &[f32], _at: HostTime) {}
}

/// A buffer handed to an audio sink along with its presentation time.
#[derive(Debug, Clone, PartialEq)]
pub struct PresentedAudio {
    pub at: HostTime,
    pub samples: Vec<f32>,
}

/// Records every presented buffer. Clones share the same record.
#[derive(Debug, Default, Clone)]
pub struct CollectingAudioSink {
    presented: Arc<Mutex<Vec<PresentedAudio>>>,
}

impl CollectingAudioSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn presented(&self) -> Vec<PresentedAudio> {
        self.presented.lock().clone()
    }
}

impl AudioSink for CollectingAudioSink {
    fn present_audio(&mut self, samples: &[f32], at: HostTime) {
        self.presented.lock().push(PresentedAudio {
            at,
            samples: samples.to_vec(),
        });
    }
}

/// Discards frames.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDisplaySink;

impl DisplaySink for NullDisplaySink {
    fn present_frame(&mut self, _frame: &ComposedFrame) {}
}

/// Keeps the most recent frame. Clones share the same slot.
#[derive(Debug, Default, Clone)]
pub struct LatestFrameSink {
    inner: Arc<Mutex<(u64, Option<ComposedFrame>)>>,
}

impl LatestFrameSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<ComposedFrame> {
        self.inner.lock().1.clone()
    }

    /// Number of frames presented so far.
    pub fn presented(&self) -> u64 {
        self.inner.lock().0
    }
}

impl DisplaySink for LatestFrameSink {
    fn present_frame(&mut self, frame: &ComposedFrame) {
        let mut inner = self.inner.lock();
        inner.0 += 1;
        inner.1 = Some(frame.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipstage_core::{DepthBuffer, FrameBuffer};

    #[test]
    fn test_collecting_sink_shares_record() {
        let sink = CollectingAudioSink::new();
        let mut boxed: Box<dyn AudioSink> = Box::new(sink.clone());
        boxed.present_audio(&[1.0, 2.0], HostTime(5));
        assert_eq!(
            sink.presented(),
            vec![PresentedAudio {
                at: HostTime(5),
                samples: vec![1.0, 2.0]
            }]
        );
    }

    #[test]
    fn test_latest_frame_sink() {
        let sink = LatestFrameSink::new();
        let mut boxed: Box<dyn DisplaySink> = Box::new(sink.clone());
        assert!(sink.latest().is_none());
        let frame = ComposedFrame {
            color: FrameBuffer::new(1, 1),
            depth: DepthBuffer::new(1, 1),
        };
        boxed.present_frame(&frame);
        boxed.present_frame(&frame);
        assert_eq!(sink.presented(), 2);
        assert_eq!(sink.latest(), Some(frame));
    }
}
