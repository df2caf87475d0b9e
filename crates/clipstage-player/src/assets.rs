use std::borrow::Cow;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use clipstage_clip::{load_clip, Clip};
use clipstage_core::{ClipstageError, ClipstageResult};

use crate::mixer::SampleStore;

/// Loaded clips keyed by entity id.
#[derive(Debug, Clone, Default)]
pub struct ClipLibrary {
    clips: HashMap<String, Arc<Clip>>,
}

impl ClipLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, clip: Clip) {
        self.clips.insert(id.into(), Arc::new(clip));
    }

    pub fn get(&self, id: &str) -> Option<Arc<Clip>> {
        self.clips.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.clips.keys().map(String::as_str)
    }

    /// Load every `*.clip` file in `dir`, keyed by file stem.
    pub fn load_dir(dir: &Path) -> ClipstageResult<Self> {
        let mut library = Self::new();
        let entries = std::fs::read_dir(dir)
            .map_err(|e| ClipstageError::asset(format!("failed to list clips: {}", e), dir))?;
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("clip") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                tracing::warn!("Skipping clip with non UTF-8 name: {}", path.display());
                continue;
            };
            let clip = load_clip(&path)?;
            library.insert(id, clip);
        }
        tracing::info!("Loaded {} clips from {}", library.len(), dir.display());
        Ok(library)
    }
}

/// In-memory PCM for every sound source.
#[derive(Debug, Clone, Default)]
pub struct MemorySampleStore {
    sounds: HashMap<String, Vec<i16>>,
}

impl MemorySampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, samples: Vec<i16>) {
        self.sounds.insert(id.into(), samples);
    }

    pub fn len(&self) -> usize {
        self.sounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sounds.is_empty()
    }

    /// Load headerless mono signed 16-bit little-endian PCM.
    pub fn load_raw_pcm(&mut self, id: impl Into<String>, path: &Path) -> ClipstageResult<usize> {
        let bytes = std::fs::read(path)
            .map_err(|e| ClipstageError::asset(format!("failed to read samples: {}", e), path))?;
        if bytes.len() % 2 != 0 {
            tracing::warn!("{} has a trailing odd byte, ignoring it", path.display());
        }
        let samples: Vec<i16> = bytes
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        let count = samples.len();
        self.insert(id, samples);
        Ok(count)
    }
}

impl SampleStore for MemorySampleStore {
    fn fetch_samples(&self, sound_id: &str, start: usize, end: usize) -> ClipstageResult<Cow<'_, [i16]>> {
        let samples = self
            .sounds
            .get(sound_id)
            .ok_or_else(|| ClipstageError::Audio(format!("unknown sound '{}'", sound_id)))?;
        let end = end.min(samples.len());
        let start = start.min(end);
        Ok(Cow::Borrowed(&samples[start..end]))
    }
}
