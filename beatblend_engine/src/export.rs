//! WAV encoding of rendered buffers, plus the export file name and data URL.

use std::io::Cursor;
use std::path::Path;

use base64::Engine as _;
use beatblend_shared::{RenderConfig, WavBitDepth};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

/// Interleaved f32 audio. Not mutated once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    channels: u16,
    sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        Self { samples, channels: channels.max(1), sample_rate }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn frame(&self, index: usize) -> &[f32] {
        let ch = self.channels as usize;
        &self.samples[index * ch..(index + 1) * ch]
    }

    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |max, s| max.max(s.abs()))
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WavOptions {
    pub bit_depth: WavBitDepth,
    pub normalize: bool,
    /// TPDF dither when converting to integer samples
    pub dither: bool,
}

impl Default for WavOptions {
    fn default() -> Self {
        Self { bit_depth: WavBitDepth::Int16, normalize: false, dither: false }
    }
}

impl From<&RenderConfig> for WavOptions {
    fn from(config: &RenderConfig) -> Self {
        Self { bit_depth: config.bit_depth, normalize: config.normalize, dither: config.dither }
    }
}

pub fn encode_wav(buffer: &AudioBuffer, options: &WavOptions) -> Result<Vec<u8>, anyhow::Error> {
    let sample_format = match options.bit_depth {
        WavBitDepth::Float32 => SampleFormat::Float,
        WavBitDepth::Int16 | WavBitDepth::Int24 => SampleFormat::Int,
    };
    let spec = WavSpec {
        channels: buffer.channels(),
        sample_rate: buffer.sample_rate(),
        bits_per_sample: options.bit_depth.bits(),
        sample_format,
    };

    let data = buffer.samples();
    let norm_gain = if options.normalize { 1.0 / buffer.peak().max(1e-10) } else { 1.0 };
    let channels = buffer.channels() as usize;
    // one LCG per channel keeps the dither decorrelated
    let mut dither_states: Vec<u32> = (0..channels as u32).map(|c| 0xDEAD_BEEF ^ c.wrapping_mul(0x9E37_79B9)).collect();

    let mut cursor = Cursor::new(Vec::with_capacity(44 + data.len() * options.bit_depth.bits() as usize / 8));
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        match options.bit_depth {
            WavBitDepth::Float32 => {
                for &sample in data {
                    writer.write_sample(sample * norm_gain)?;
                }
            }
            WavBitDepth::Int16 => {
                let scale = i16::MAX as f32;
                for (i, &sample) in data.iter().enumerate() {
                    let mut s = sample * norm_gain;
                    if options.dither {
                        s += tpdf_dither(&mut dither_states[i % channels], 16);
                    }
                    let quantized = (s * scale).round().clamp(-(scale + 1.0), scale);
                    writer.write_sample(quantized as i16)?;
                }
            }
            WavBitDepth::Int24 => {
                let scale = ((1 << 23) - 1) as f32;
                for (i, &sample) in data.iter().enumerate() {
                    let mut s = sample * norm_gain;
                    if options.dither {
                        s += tpdf_dither(&mut dither_states[i % channels], 24);
                    }
                    let quantized = (s * scale).round().clamp(-(scale + 1.0), scale);
                    writer.write_sample(quantized as i32)?;
                }
            }
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

pub fn decode_wav(bytes: &[u8]) -> Result<AudioBuffer, anyhow::Error> {
    let mut reader = WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();
    let samples = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        SampleFormat::Int => {
            let scale = 1.0 / (1u32 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<Vec<_>, _>>()?
        }
    };
    Ok(AudioBuffer::new(samples, spec.channels, spec.sample_rate))
}

pub fn write_wav_file(path: &Path, bytes: &[u8]) -> Result<(), anyhow::Error> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, bytes)?;
    Ok(())
}

/// `my-beat-{bpm}bpm-{bars}bars.wav`
pub fn export_filename(bpm: f64, bars: u32) -> String {
    format!("my-beat-{}bpm-{}bars.wav", bpm, bars)
}

pub fn wav_data_url(bytes: &[u8]) -> String {
    format!("data:audio/wav;base64,{}", base64::engine::general_purpose::STANDARD.encode(bytes))
}

#[inline]
fn tpdf_dither(state: &mut u32, bits: u32) -> f32 {
    let r1 = lcg_next(state);
    let r2 = lcg_next(state);
    let lsb = 1.0 / (1u64 << (bits - 1)) as f32;
    (r1 - r2) * lsb * 0.5
}

#[inline]
fn lcg_next(state: &mut u32) -> f32 {
    *state = state.wrapping_mul(1103515245).wrapping_add(12345);
    (*state as f32) / (u32::MAX as f32) * 2.0 - 1.0
}
