//! Session files describe a recorded playback: where the clips live, which
//! raw PCM file backs each sound, and the VM snapshots to replay.
//!
//! ```json
//! { "clips": "clips", "sounds": { "meow": "sounds/meow.raw" },
//!   "snapshots": "run.jsonl", "looping": false }
//! ```
//! Relative paths resolve against the session file's directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use clipstage_player::{ClipLibrary, MemorySampleStore, RecordedVm};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub clips: PathBuf,
    #[serde(default)]
    pub sounds: BTreeMap<String, PathBuf>,
    pub snapshots: PathBuf,
    #[serde(default)]
    pub looping: bool,
}

pub struct LoadedSession {
    pub clips: ClipLibrary,
    pub samples: MemorySampleStore,
    pub vm: RecordedVm,
}

impl Session {
    pub fn load(path: &Path) -> Result<(Self, PathBuf)> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read session: {}", path.display()))?;
        let session: Session = serde_json::from_str(&source)
            .with_context(|| format!("failed to parse session: {}", path.display()))?;
        let base = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok((session, base))
    }

    pub fn open(&self, base: &Path) -> Result<LoadedSession> {
        let clips = ClipLibrary::load_dir(&base.join(&self.clips))?;

        let mut samples = MemorySampleStore::new();
        for (id, file) in &self.sounds {
            let count = samples.load_raw_pcm(id.clone(), &base.join(file))?;
            tracing::info!("Loaded sound '{}' ({} samples)", id, count);
        }

        let snapshots_path = base.join(&self.snapshots);
        let lines = std::fs::read_to_string(&snapshots_path)
            .with_context(|| format!("failed to read snapshots: {}", snapshots_path.display()))?;
        let vm = RecordedVm::from_json_lines(&lines)?.looping(self.looping);
        tracing::info!("Loaded {} snapshots from {}", vm.len(), snapshots_path.display());

        Ok(LoadedSession { clips, samples, vm })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_defaults() {
        let s: Session = serde_json::from_str(r#"{"clips":"c","snapshots":"s.jsonl"}"#).unwrap();
        assert!(s.sounds.is_empty());
        assert!(!s.looping);
    }
}
