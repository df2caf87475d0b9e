use serde::{Deserialize, Serialize};

use crate::error::{ClipstageError, ClipstageResult};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Drawable width in pixels; the stage spans `-width/2..width/2`.
    pub width: u32,
    pub height: u32,
    pub background: String, // "#RRGGBB" or "#RRGGBBAA"
    /// Render worker threads, 0 = one per core.
    pub worker_threads: usize,
    /// Upper bound on decoded frames kept by the software renderer.
    pub frame_cache: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            background: "#FFFFFF".to_string(),
            worker_threads: 0,
            frame_cache: 256,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    /// Hard cap on the per-tick mix buffer, in samples.
    pub mix_capacity: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            mix_capacity: 4800,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimingConfig {
    pub fps: f64,
    /// Ticks further apart than this resync the audio clock.
    pub stall_threshold_ms: f64,
    /// Presses shorter than this are taps, not drags.
    pub tap_threshold_ms: f64,
    /// Render drains slower than this are logged.
    pub drain_budget_ms: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            fps: 60.0,
            stall_threshold_ms: 100.0,
            tap_threshold_ms: 250.0,
            drain_budget_ms: 16.0,
        }
    }
}

impl TimingConfig {
    pub fn stall_threshold_secs(&self) -> f64 {
        self.stall_threshold_ms / 1000.0
    }

    pub fn tap_threshold_secs(&self) -> f64 {
        self.tap_threshold_ms / 1000.0
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ClipstageConfig {
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub timing: TimingConfig,
}

impl ClipstageConfig {
    pub fn from_toml_str(contents: &str) -> ClipstageResult<Self> {
        let config: ClipstageConfig =
            toml::from_str(contents).map_err(|e| ClipstageError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file(path: &std::path::Path) -> ClipstageResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn save_to_file(&self, path: &std::path::Path) -> ClipstageResult<()> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| ClipstageError::Config(e.to_string()))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn validate(&self) -> ClipstageResult<()> {
        if self.render.width == 0 || self.render.height == 0 {
            return Err(ClipstageError::Config(
                "render width and height must be non-zero".into(),
            ));
        }
        if self.audio.mix_capacity == 0 {
            return Err(ClipstageError::Config("mix_capacity must be non-zero".into()));
        }
        if !(self.timing.fps > 0.0) {
            return Err(ClipstageError::Config("fps must be positive".into()));
        }
        crate::Color::from_hex(&self.render.background)
            .map_err(|e| ClipstageError::Config(format!("background: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_player_surface() {
        let config = ClipstageConfig::default();
        assert_eq!(config.render.width, 640);
        assert_eq!(config.render.height, 480);
        assert_eq!(config.audio.mix_capacity, 4800);
        assert!((config.timing.stall_threshold_secs() - 0.1).abs() < 1e-9);
        assert!((config.timing.tap_threshold_secs() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ClipstageConfig::from_toml_str(
            r#"
            [audio]
            sample_rate = 44100
            mix_capacity = 2048
            "#,
        )
        .unwrap();
        assert_eq!(config.audio.mix_capacity, 2048);
        assert_eq!(config.render.width, 640);
        assert_eq!(config.timing.fps, 60.0);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = ClipstageConfig::from_toml_str(
            r#"
            [audio]
            sample_rate = 48000
            mix_capacity = 0
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ClipstageError::Config(_)));

        let err = ClipstageConfig::from_toml_str("render = 3").unwrap_err();
        assert!(matches!(err, ClipstageError::Config(_)));
    }

    #[test]
    fn test_missing_keys_fall_back_per_field() {
        let config = ClipstageConfig::from_toml_str(
            r##"
            [timing]
            fps = 30.0

            [render]
            background = "#000000"
            "##,
        )
        .unwrap();
        assert_eq!(config.timing.fps, 30.0);
        assert_eq!(config.timing.stall_threshold_ms, 100.0);
        assert_eq!(config.timing.tap_threshold_ms, 250.0);
        assert_eq!(config.render.width, 640);
        assert_eq!(config.render.frame_cache, 256);
    }

    #[test]
    fn test_non_ascii_background_rejected() {
        let err = ClipstageConfig::from_toml_str(
            r#"
            [render]
            background = "aé000"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ClipstageError::Config(_)));
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join("clipstage_test_config.toml");
        let mut config = ClipstageConfig::default();
        config.timing.fps = 30.0;
        config.save_to_file(&path).unwrap();

        let loaded = ClipstageConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.timing.fps, 30.0);

        let _ = std::fs::remove_file(&path);
    }
}
