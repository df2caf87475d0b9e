use std::path::Path;

use clipstage_core::{ClipstageError, ClipstageResult};

use crate::clip::Clip;
use crate::codec;

/// Serialize `clip` and write it to `path`, creating parent directories.
pub fn save_clip(clip: &Clip, path: &Path) -> ClipstageResult<()> {
    let bytes = codec::encode(clip)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, &bytes)
        .map_err(|e| ClipstageError::asset(format!("failed to write clip: {}", e), path))?;

    tracing::info!(
        "Saved clip {} ({} frames, {}x{}, {} bytes)",
        path.display(),
        clip.frame_count(),
        clip.width(),
        clip.height(),
        bytes.len()
    );
    Ok(())
}

/// Read and decode a clip file. A malformed file fails the whole load.
pub fn load_clip(path: &Path) -> ClipstageResult<Clip> {
    let bytes = std::fs::read(path)
        .map_err(|e| ClipstageError::asset(format!("failed to read clip: {}", e), path))?;
    let clip = codec::decode(&bytes)
        .inspect_err(|e| tracing::warn!("Rejected clip {}: {}", path.display(), e))?;
    tracing::info!(
        "Loaded clip {} ({} frames, {}x{})",
        path.display(),
        clip.frame_count(),
        clip.width(),
        clip.height()
    );
    Ok(clip)
}
