//! Pattern to WAV: offline render first, live capture when that fails or is silent.

use std::time::Duration;

use beatblend_shared::{EngineConfig, Pattern, RenderConfig, RenderError};
use tracing::{info, instrument, warn};

use crate::engine::LiveEngine;
use crate::export::{self, AudioBuffer, WavOptions};
use crate::offline::OfflineRenderer;
use crate::resampler::resample_interleaved;

/// Owned snapshot of what to render.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pattern: Pattern,
    bpm: f64,
    bars: u32,
}

impl RenderRequest {
    pub fn new(pattern: Pattern, bpm: f64, bars: u32) -> Result<Self, RenderError> {
        if !(bpm.is_finite() && bpm > 0.0) {
            return Err(RenderError::InvalidRequest(format!("tempo must be positive, got {bpm}")));
        }
        if bars == 0 {
            return Err(RenderError::InvalidRequest("bar count must be positive".to_string()));
        }
        Ok(Self { pattern, bpm, bars })
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn bars(&self) -> u32 {
        self.bars
    }

    pub fn duration_secs(&self) -> f64 {
        beatblend_shared::pattern_duration_secs(self.bpm, self.bars)
    }

    pub fn filename(&self) -> String {
        export::export_filename(self.bpm, self.bars)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Offline,
    LiveCaptured,
}

impl Provenance {
    pub fn as_str(self) -> &'static str {
        match self {
            Provenance::Offline => "offline",
            Provenance::LiveCaptured => "live-captured",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderResult {
    pub buffer: AudioBuffer,
    pub provenance: Provenance,
    pub wav: Vec<u8>,
}

impl RenderResult {
    pub fn data_url(&self) -> String {
        export::wav_data_url(&self.wav)
    }
}

/// Peak check over a strided subset of frames.
#[derive(Debug, Clone, Copy)]
pub struct SilenceGuard {
    threshold: f32,
    max_probes: usize,
}

impl SilenceGuard {
    pub fn new(threshold: f32, max_probes: usize) -> Self {
        Self { threshold, max_probes: max_probes.max(1) }
    }

    pub fn from_config(config: &RenderConfig) -> Self {
        Self::new(config.silence_threshold, config.max_probes)
    }

    /// Largest |sample| over every `ceil(frames / max_probes)`-th frame, all channels.
    pub fn probed_peak(&self, buffer: &AudioBuffer) -> f32 {
        let frames = buffer.frames();
        let stride = frames.div_ceil(self.max_probes).max(1);
        (0..frames)
            .step_by(stride)
            .flat_map(|i| buffer.frame(i).iter())
            .fold(0.0f32, |max, s| max.max(s.abs()))
    }

    pub fn is_silent(&self, buffer: &AudioBuffer) -> bool {
        self.probed_peak(buffer) < self.threshold
    }

    fn check(&self, path: &'static str, buffer: AudioBuffer) -> Result<AudioBuffer, RenderError> {
        let peak = self.probed_peak(&buffer);
        if peak < self.threshold {
            Err(RenderError::Silent { path, peak })
        } else {
            Ok(buffer)
        }
    }
}

impl Default for SilenceGuard {
    fn default() -> Self {
        Self::from_config(&RenderConfig::default())
    }
}

/// A way of turning a request into audio without a device.
pub trait RenderPath: Send {
    fn name(&self) -> &'static str;
    fn render(&mut self, request: &RenderRequest) -> Result<AudioBuffer, RenderError>;
}

pub struct HybridRenderer {
    offline: Box<dyn RenderPath>,
    guard: SilenceGuard,
    wav: WavOptions,
    sample_rate: u32,
    settle: Duration,
}

impl HybridRenderer {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            offline: Box::new(OfflineRenderer::from_config(&config.audio)),
            guard: SilenceGuard::from_config(&config.render),
            wav: WavOptions::from(&config.render),
            sample_rate: config.audio.sample_rate,
            settle: Duration::from_millis(config.render.settle_ms),
        }
    }

    pub fn with_offline(mut self, path: Box<dyn RenderPath>) -> Self {
        self.offline = path;
        self
    }

    /// Stops live playback, then tries the offline path and falls back to a
    /// live capture. Never runs both paths at once.
    #[instrument(skip_all, fields(bpm = request.bpm(), bars = request.bars()))]
    pub fn render(&mut self, request: &RenderRequest, live: &mut LiveEngine) -> Result<RenderResult, RenderError> {
        live.stop();

        let offline_failure = match self.offline.render(request) {
            Ok(buffer) => match self.guard.check(self.offline.name(), buffer) {
                Ok(buffer) => return self.finish(buffer, Provenance::Offline),
                Err(e) => e,
            },
            Err(e) => e,
        };
        warn!(error = %offline_failure, "offline render unusable, capturing live playback");

        let failed = |capture: String| RenderError::Failed { offline: offline_failure.to_string(), capture };
        let captured = live
            .capture(*request.pattern(), request.bpm(), request.bars(), self.settle)
            .and_then(|buffer| self.conform(buffer))
            .map_err(|e| failed(e.to_string()))?;
        let captured = self.guard.check("capture", captured).map_err(|e| failed(e.to_string()))?;
        self.finish(captured, Provenance::LiveCaptured)
    }

    /// Brings a capture to the request sample rate.
    fn conform(&self, buffer: AudioBuffer) -> Result<AudioBuffer, RenderError> {
        if buffer.sample_rate() == self.sample_rate {
            return Ok(buffer);
        }
        let channels = buffer.channels();
        let resampled = resample_interleaved(buffer.samples(), channels as usize, buffer.sample_rate(), self.sample_rate)
            .map_err(|e| RenderError::Capture(e.to_string()))?;
        Ok(AudioBuffer::new(resampled, channels, self.sample_rate))
    }

    fn finish(&self, buffer: AudioBuffer, provenance: Provenance) -> Result<RenderResult, RenderError> {
        let wav = export::encode_wav(&buffer, &self.wav).map_err(|e| RenderError::Encode(e.to_string()))?;
        info!(provenance = provenance.as_str(), frames = buffer.frames(), bytes = wav.len(), "render finished");
        Ok(RenderResult { buffer, provenance, wav })
    }
}
