//! Faster-than-real-time render of a pattern through the drum kit.

use beatblend_shared::{AudioConfig, Pattern, RenderError};
use tracing::{debug, instrument};

use crate::export::AudioBuffer;
use crate::mixer::DrumKit;
use crate::renderer::{RenderPath, RenderRequest};
use crate::sequencer::StepSequencer;

#[derive(Debug, Clone)]
pub struct OfflineRenderer {
    sample_rate: u32,
    channels: u16,
    block_frames: usize,
    master_gain: f32,
}

impl OfflineRenderer {
    pub fn new(sample_rate: u32, channels: u16, block_frames: usize, master_gain: f32) -> Self {
        Self {
            sample_rate,
            channels: channels.max(1),
            block_frames: block_frames.max(1),
            master_gain,
        }
    }

    pub fn from_config(audio: &AudioConfig) -> Self {
        Self::new(audio.sample_rate, audio.channels, audio.block_frames, audio.master_gain())
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Renders exactly `bars` bars. Hits near the end are cut at the bar line.
    #[instrument(skip(self, pattern), fields(hits = pattern.hit_count()))]
    pub fn render_pattern(&self, pattern: &Pattern, bpm: f64, bars: u32) -> Result<AudioBuffer, RenderError> {
        if !(bpm.is_finite() && bpm > 0.0) || bars == 0 {
            return Err(RenderError::InvalidRequest(format!("bpm {bpm}, bars {bars}")));
        }
        let seconds = beatblend_shared::pattern_duration_secs(bpm, bars);
        let total_frames = (seconds * self.sample_rate as f64).round() as usize;
        let channels = self.channels as usize;

        let mut kit = DrumKit::new(self.sample_rate, self.master_gain);
        let mut sequencer = StepSequencer::new(bpm);
        sequencer.start(0.0, Some(bars));

        let mut samples = vec![0.0f32; total_frames * channels];
        let mut triggered = 0usize;
        for (block_index, block) in samples.chunks_mut(self.block_frames * channels).enumerate() {
            let block_start = (block_index * self.block_frames) as u64;
            let frames = block.len() / channels;
            let horizon = (block_start + frames as u64) as f64 / self.sample_rate as f64;
            sequencer.poll_until(horizon, |event| {
                for track in pattern.hits_at(event.step) {
                    kit.trigger(track, event.time);
                    triggered += 1;
                }
            });
            kit.render_block(block_start, block, channels);
        }
        debug!(frames = total_frames, triggered, "offline render done");
        Ok(AudioBuffer::new(samples, self.channels, self.sample_rate))
    }
}

impl RenderPath for OfflineRenderer {
    fn name(&self) -> &'static str {
        "offline"
    }

    fn render(&mut self, request: &RenderRequest) -> Result<AudioBuffer, RenderError> {
        self.render_pattern(request.pattern(), request.bpm(), request.bars())
    }
}
