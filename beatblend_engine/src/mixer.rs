use beatblend_shared::DrumTrack;

use crate::nodes::DrumVoice;

/// Upper bound on simultaneously sounding one-shots
pub const MAX_VOICES: usize = 32;

struct ScheduledVoice {
    start_frame: u64,
    voice: DrumVoice,
}

/// The drum synth: schedules one-shots at exact frames and mixes them down.
///
/// The same kit runs in the audio callback and in the offline renderer, so
/// both paths produce the same signal for the same triggers.
pub struct DrumKit {
    sample_rate: u32,
    master_gain: f32,
    voices: Vec<ScheduledVoice>,
    mono: Vec<f32>,
}

impl DrumKit {
    pub fn new(sample_rate: u32, master_gain: f32) -> Self {
        Self {
            sample_rate,
            master_gain,
            voices: Vec::with_capacity(MAX_VOICES),
            mono: Vec::with_capacity(4096),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    /// Schedules a hit at `time` seconds on the kit's frame clock.
    pub fn trigger(&mut self, track: DrumTrack, time: f64) {
        let start_frame = (time.max(0.0) * self.sample_rate as f64).round() as u64;
        if self.voices.len() >= MAX_VOICES {
            // steal the oldest
            self.voices.remove(0);
        }
        let seed = start_frame.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ track.index() as u64;
        self.voices.push(ScheduledVoice {
            start_frame,
            voice: DrumVoice::for_track(track, self.sample_rate as f32, seed),
        });
    }

    /// Renders `output.len() / channels` frames starting at `block_start` into
    /// interleaved `output`, overwriting it.
    pub fn render_block(&mut self, block_start: u64, output: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        let frames = output.len() / channels;
        self.mono.clear();
        self.mono.resize(frames, 0.0);

        let block_end = block_start + frames as u64;
        for scheduled in self.voices.iter_mut() {
            if scheduled.start_frame >= block_end {
                continue;
            }
            // a hit scheduled in the past starts at the top of the block
            let offset = scheduled.start_frame.saturating_sub(block_start) as usize;
            scheduled.voice.process(&mut self.mono[offset..]);
        }
        self.voices.retain(|v| !v.voice.is_finished());

        for (frame, sample) in output.chunks_mut(channels).zip(self.mono.iter()) {
            let s = sample * self.master_gain;
            frame.fill(s);
        }
    }

    /// Drops every scheduled and sounding voice.
    pub fn reset(&mut self) {
        self.voices.clear();
    }
}
