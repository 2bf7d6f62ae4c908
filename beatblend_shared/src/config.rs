//! Engine settings. Every field has a default so partial JSON files load.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::blend::DEFAULT_BLEND_THRESHOLD;
use crate::error::ConfigError;
use crate::pattern::{Corner, CornerSet};
use crate::presets;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub audio: AudioConfig,
    pub blend: BlendConfig,
    pub render: RenderConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    /// Frames per offline render block and headless callback
    pub block_frames: usize,
    pub master_gain_db: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: crate::DEFAULT_SAMPLE_RATE,
            channels: crate::CHANNEL_COUNT,
            block_frames: 512,
            master_gain_db: -6.0,
        }
    }
}

impl AudioConfig {
    pub fn master_gain(&self) -> f32 {
        10f32.powf(self.master_gain_db / 20.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlendConfig {
    pub threshold: f64,
    pub debounce_ms: u64,
    /// Decode temperature handed to the model
    pub stochasticity: f32,
    pub model_assisted: bool,
}

impl Default for BlendConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_BLEND_THRESHOLD,
            debounce_ms: 120,
            stochasticity: 0.85,
            model_assisted: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WavBitDepth {
    Int16,
    Int24,
    Float32,
}

impl WavBitDepth {
    pub fn bits(self) -> u16 {
        match self {
            WavBitDepth::Int16 => 16,
            WavBitDepth::Int24 => 24,
            WavBitDepth::Float32 => 32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub silence_threshold: f32,
    /// Upper bound on frames probed by the silence guard
    pub max_probes: usize,
    pub settle_ms: u64,
    pub start_delay_ms: u64,
    pub bit_depth: WavBitDepth,
    pub dither: bool,
    pub normalize: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            silence_threshold: 1e-4,
            max_probes: 5000,
            settle_ms: 200,
            start_delay_ms: 30,
            bit_depth: WavBitDepth::Int16,
            dither: false,
            normalize: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub bpm: f64,
    pub bars: u32,
    /// Preset names for corners A, B, C, D
    pub corners: [String; 4],
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            bpm: 96.0,
            bars: 2,
            corners: [
                "Four on the floor".to_string(),
                "Busy Hats".to_string(),
                "Minimal".to_string(),
                "Funk".to_string(),
            ],
        }
    }
}

impl SessionConfig {
    /// Resolves the preset names into a corner set.
    pub fn corner_set(&self) -> Result<CornerSet, ConfigError> {
        let mut set = presets::default_corners();
        for (corner, name) in Corner::ALL.into_iter().zip(self.corners.iter()) {
            let pattern = presets::preset(name)
                .ok_or_else(|| ConfigError::Invalid(format!("unknown preset '{name}' for corner {corner}")))?;
            set.replace(corner, pattern);
        }
        Ok(set)
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));
        if self.audio.sample_rate == 0 {
            return invalid("audio.sample_rate must be positive");
        }
        if self.audio.channels == 0 {
            return invalid("audio.channels must be positive");
        }
        if self.audio.block_frames == 0 {
            return invalid("audio.block_frames must be positive");
        }
        if !(0.0..=1.0).contains(&self.blend.threshold) {
            return invalid("blend.threshold must lie in [0, 1]");
        }
        if !self.blend.stochasticity.is_finite() || self.blend.stochasticity < 0.0 {
            return invalid("blend.stochasticity must be non-negative");
        }
        if !(self.render.silence_threshold > 0.0) {
            return invalid("render.silence_threshold must be positive");
        }
        if self.render.max_probes == 0 {
            return invalid("render.max_probes must be positive");
        }
        if !(self.session.bpm.is_finite() && self.session.bpm > 0.0) {
            return invalid("session.bpm must be positive");
        }
        if self.session.bars == 0 {
            return invalid("session.bars must be positive");
        }
        self.session.corner_set()?;
        Ok(())
    }
}
