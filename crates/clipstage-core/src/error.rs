/// Core error types for Clipstage.
use std::path::PathBuf;

/// A specialized Result type for Clipstage operations.
pub type ClipstageResult<T> = Result<T, ClipstageError>;

/// Top-level error type encompassing the codec, the player and its collaborators.
#[derive(Debug, thiserror::Error)]
pub enum ClipstageError {
    /// Corrupt, truncated or foreign clip container.
    #[error("clip format error: {0}")]
    Format(String),

    #[error("frame index {index} out of range for clip with {count} frames")]
    FrameIndex { index: usize, count: u32 },

    #[error("image decode error: {0}")]
    Decode(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("audio error: {0}")]
    Audio(String),

    #[error("script VM error: {0}")]
    Vm(String),

    #[error("asset error: {message} ({path:?})")]
    Asset { message: String, path: PathBuf },

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl ClipstageError {
    /// Create a format error.
    pub fn format(message: impl Into<String>) -> Self {
        ClipstageError::Format(message.into())
    }

    /// Create an asset error.
    pub fn asset(message: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        ClipstageError::Asset {
            message: message.into(),
            path: path.into(),
        }
    }

    /// True for container format failures.
    pub fn is_format(&self) -> bool {
        matches!(self, ClipstageError::Format(_))
    }
}
