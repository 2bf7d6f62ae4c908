pub mod blend;
pub mod config;
pub mod error;
pub mod pattern;
pub mod presets;

pub use blend::{local_blend, BlendPosition, CornerWeights};
pub use config::{AudioConfig, BlendConfig, EngineConfig, RenderConfig, SessionConfig, WavBitDepth};
pub use error::{AudioError, ConfigError, ModelError, RenderError};
pub use pattern::{Corner, CornerSet, DrumTrack, Pattern};

/// Steps in one bar (sixteenth-note resolution)
pub const STEPS_PER_PATTERN: usize = 16;
/// Steps per quarter note
pub const STEPS_PER_BEAT: usize = 4;
/// Beats per bar (4/4 only)
pub const BEATS_PER_BAR: usize = 4;
pub const TRACK_COUNT: usize = 3;
pub const CORNER_COUNT: usize = 4;

pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;
pub const CHANNEL_COUNT: u16 = 2;

/// Duration in seconds of `bars` bars at `bpm`.
pub fn pattern_duration_secs(bpm: f64, bars: u32) -> f64 {
    bars as f64 * BEATS_PER_BAR as f64 * (60.0 / bpm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_of_two_bars_at_120() {
        assert!((pattern_duration_secs(120.0, 2) - 4.0).abs() < 1e-12);
        assert!((pattern_duration_secs(96.0, 1) - 2.5).abs() < 1e-12);
    }
}
