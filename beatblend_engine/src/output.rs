//! Audio device backends.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use beatblend_shared::AudioError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{debug, info, warn};

/// Fills one interleaved block.
pub type RenderCallback = Box<dyn FnMut(&mut [f32]) + Send + 'static>;

pub trait AudioOutput {
    fn sample_rate(&self) -> u32;
    fn channels(&self) -> u16;
    fn start(&mut self, callback: RenderCallback) -> Result<(), AudioError>;
    fn stop(&mut self);
}

/// Default cpal output device, f32 streams only.
pub struct CpalOutput {
    device: cpal::Device,
    config: cpal::StreamConfig,
    stream: Option<cpal::Stream>,
}

impl CpalOutput {
    pub fn open_default() -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;
        let supported = device
            .default_output_config()
            .map_err(|e| AudioError::DeviceInit(e.to_string()))?;
        if supported.sample_format() != cpal::SampleFormat::F32 {
            return Err(AudioError::UnsupportedFormat(format!("{:?}", supported.sample_format())));
        }
        if let cpal::SupportedBufferSize::Range { min, max } = supported.buffer_size() {
            debug!(min, max, "device buffer range");
        }
        let config: cpal::StreamConfig = supported.into();
        info!(sample_rate = config.sample_rate, channels = config.channels, "output device opened");
        Ok(Self { device, config, stream: None })
    }
}

impl AudioOutput for CpalOutput {
    fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    fn channels(&self) -> u16 {
        self.config.channels
    }

    fn start(&mut self, mut callback: RenderCallback) -> Result<(), AudioError> {
        let err_fn = |err: cpal::StreamError| {
            let s = err.to_string();
            // under/overruns are routine
            if !s.contains("underrun") && !s.contains("overrun") {
                warn!(error = %s, "output stream error");
            }
        };
        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| callback(data),
                err_fn,
                None,
            )
            .map_err(|e| AudioError::StreamCreate(e.to_string()))?;
        stream.play().map_err(|e| AudioError::Playback(e.to_string()))?;
        self.stream = Some(stream);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.pause();
        }
    }
}

/// Runs the callback on a thread paced by the wall clock, for machines without
/// an output device and for tests.
pub struct HeadlessOutput {
    sample_rate: u32,
    channels: u16,
    block_frames: usize,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl HeadlessOutput {
    pub fn new(sample_rate: u32, channels: u16, block_frames: usize) -> Self {
        Self {
            sample_rate,
            channels: channels.max(1),
            block_frames: block_frames.max(1),
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }
}

impl AudioOutput for HeadlessOutput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn start(&mut self, mut callback: RenderCallback) -> Result<(), AudioError> {
        self.stop();
        self.running.store(true, Ordering::Release);
        let running = self.running.clone();
        let mut block = vec![0.0f32; self.block_frames * self.channels as usize];
        let block_time = Duration::from_secs_f64(self.block_frames as f64 / self.sample_rate as f64);
        let handle = thread::Builder::new()
            .name("beatblend-headless".to_string())
            .spawn(move || {
                let started = Instant::now();
                let mut blocks: u32 = 0;
                while running.load(Ordering::Acquire) {
                    callback(&mut block);
                    blocks += 1;
                    let due = started + block_time * blocks;
                    let now = Instant::now();
                    if due > now {
                        thread::sleep(due - now);
                    }
                }
            })
            .map_err(|e| AudioError::DeviceInit(e.to_string()))?;
        self.handle = Some(handle);
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for HeadlessOutput {
    fn drop(&mut self) {
        self.stop();
    }
}
