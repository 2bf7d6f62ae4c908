use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use arc_swap::ArcSwap;
use beatblend_shared::{AudioConfig, AudioError, Pattern, RenderError};
use crossbeam_channel::{unbounded, Receiver, Sender};
use ringbuf::traits::{Producer, Split};
use ringbuf::{HeapProd, HeapRb};
use tracing::{debug, info, warn};

use crate::commands::EngineCommand;
use crate::export::AudioBuffer;
use crate::mixer::DrumKit;
use crate::output::{AudioOutput, CpalOutput, HeadlessOutput};
use crate::recorder::{CaptureRecorder, RecorderCommand};
use crate::sequencer::StepSequencer;
use crate::transport::Transport;

/// Everything the audio callback owns. Driven one block at a time by whichever
/// output backend is active.
pub struct PlaybackCore {
    command_rx: Receiver<EngineCommand>,
    transport: Arc<Transport>,
    sample_rate: u32,
    channels: usize,
    kit: DrumKit,
    sequencer: StepSequencer,
    pattern: Option<Arc<ArcSwap<Pattern>>>,
    session: u64,
    frame_pos: u64,
    capture: Option<HeapProd<f32>>,
}

impl PlaybackCore {
    pub fn new(command_rx: Receiver<EngineCommand>, transport: Arc<Transport>, sample_rate: u32, channels: u16, master_gain: f32) -> Self {
        Self {
            command_rx,
            transport,
            sample_rate,
            channels: channels.max(1) as usize,
            kit: DrumKit::new(sample_rate, master_gain),
            sequencer: StepSequencer::new(120.0),
            pattern: None,
            session: 0,
            frame_pos: 0,
            capture: None,
        }
    }

    pub fn frame_position(&self) -> u64 {
        self.frame_pos
    }

    pub fn process(&mut self, data: &mut [f32]) {
        while let Ok(cmd) = self.command_rx.try_recv() {
            self.handle_cmd(cmd);
        }

        let frames = data.len() / self.channels;
        let block_start = self.frame_pos;

        if self.pattern.is_some() && !self.transport.is_current(self.session) {
            self.halt();
        }

        if let Some(shared) = self.pattern.as_ref() {
            let pattern: Pattern = **shared.load();
            let horizon = (block_start + frames as u64) as f64 / self.sample_rate as f64;
            let transport = &self.transport;
            let session = self.session;
            let kit = &mut self.kit;
            self.sequencer.poll_until(horizon, |event| {
                if !transport.is_current(session) {
                    return;
                }
                transport.set_current_step(event.step);
                for track in pattern.hits_at(event.step) {
                    kit.trigger(track, event.time);
                }
            });
        }

        self.kit.render_block(block_start, data, self.channels);

        if let Some(prod) = self.capture.as_mut() {
            let pushed = prod.push_slice(data);
            if pushed < data.len() {
                debug!(dropped = data.len() - pushed, "capture tap overflow");
            }
        }
        self.frame_pos += frames as u64;
    }

    fn handle_cmd(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::Play { pattern, bpm, bars, start_delay, generation } => {
                self.kit.reset();
                self.session = generation;
                self.pattern = Some(pattern);
                self.sequencer.stop();
                self.sequencer.set_bpm(bpm);
                let now = self.frame_pos as f64 / self.sample_rate as f64;
                self.sequencer.start(now + start_delay.max(0.0), bars);
            }
            EngineCommand::Stop => self.halt(),
            EngineCommand::SetBpm(bpm) => self.sequencer.set_bpm(bpm),
            EngineCommand::AttachCapture(prod) => self.capture = Some(prod),
            EngineCommand::DetachCapture => self.capture = None,
        }
    }

    fn halt(&mut self) {
        self.sequencer.stop();
        self.kit.reset();
        self.pattern = None;
    }
}

/// Real-time playback of a pattern, for monitoring and for the capture path.
pub struct LiveEngine {
    output: Box<dyn AudioOutput>,
    command_tx: Sender<EngineCommand>,
    transport: Arc<Transport>,
    recorder_tx: Sender<RecorderCommand>,
    recorder_thread: Option<JoinHandle<()>>,
    start_delay: Duration,
    sample_rate: u32,
    channels: u16,
}

impl LiveEngine {
    pub fn new(mut output: Box<dyn AudioOutput>, audio: &AudioConfig, start_delay: Duration) -> Result<Self, AudioError> {
        let (command_tx, command_rx) = unbounded();
        let transport = Arc::new(Transport::new());
        let sample_rate = output.sample_rate();
        let channels = output.channels();
        let mut core = PlaybackCore::new(command_rx, transport.clone(), sample_rate, channels, audio.master_gain());
        output.start(Box::new(move |data| core.process(data)))?;

        let (recorder_tx, recorder_thread) =
            CaptureRecorder::spawn().map_err(|e| AudioError::DeviceInit(e.to_string()))?;
        info!(sample_rate, channels, "live engine started");

        Ok(Self {
            output,
            command_tx,
            transport,
            recorder_tx,
            recorder_thread: Some(recorder_thread),
            start_delay,
            sample_rate,
            channels,
        })
    }

    pub fn with_default_device(audio: &AudioConfig, start_delay: Duration) -> Result<Self, AudioError> {
        Self::new(Box::new(CpalOutput::open_default()?), audio, start_delay)
    }

    pub fn headless(audio: &AudioConfig, start_delay: Duration) -> Result<Self, AudioError> {
        let output = HeadlessOutput::new(audio.sample_rate, audio.channels, audio.block_frames);
        Self::new(Box::new(output), audio, start_delay)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn transport(&self) -> Arc<Transport> {
        self.transport.clone()
    }

    /// Starts playing `pattern`, re-reading the shared snapshot on every block so
    /// edits are heard immediately.
    pub fn play(&self, pattern: Arc<ArcSwap<Pattern>>, bpm: f64, bars: Option<u32>) -> Result<(), AudioError> {
        let generation = self.transport.begin();
        self.command_tx
            .send(EngineCommand::Play { pattern, bpm, bars, start_delay: self.start_delay.as_secs_f64(), generation })
            .map_err(|_| AudioError::Playback("audio callback is gone".to_string()))?;
        debug!(generation, bpm, ?bars, "playback started");
        Ok(())
    }

    /// No trigger from the current session fires once this returns.
    pub fn stop(&self) {
        if self.transport.is_playing() {
            debug!("playback stopped");
        }
        self.transport.halt();
        let _ = self.command_tx.send(EngineCommand::Stop);
    }

    pub fn set_bpm(&self, bpm: f64) {
        let _ = self.command_tx.send(EngineCommand::SetBpm(bpm));
    }

    pub fn is_playing(&self) -> bool {
        self.transport.is_playing()
    }

    pub fn current_step(&self) -> Option<usize> {
        self.transport.current_step()
    }

    /// Plays `pattern` for `bars` bars in real time while tapping the mix, then
    /// returns what was heard at the device rate.
    pub fn capture(&mut self, pattern: Pattern, bpm: f64, bars: u32, settle: Duration) -> Result<AudioBuffer, RenderError> {
        self.stop();
        let duration = Duration::from_secs_f64(beatblend_shared::pattern_duration_secs(bpm, bars));
        let total = duration + self.start_delay + settle;
        // room for the whole take plus slack, so the tap never overflows
        let capacity = ((total.as_secs_f64() + 1.0) * self.sample_rate as f64) as usize * self.channels as usize;
        let (prod, cons) = HeapRb::<f32>::new(capacity.max(1)).split();

        self.recorder_tx
            .send(RecorderCommand::Start { consumer: cons })
            .map_err(|_| RenderError::Capture("capture thread is gone".to_string()))?;
        self.command_tx
            .send(EngineCommand::AttachCapture(prod))
            .map_err(|_| RenderError::Capture("audio callback is gone".to_string()))?;

        let snapshot = Arc::new(ArcSwap::from_pointee(pattern));
        self.play(snapshot, bpm, Some(bars)).map_err(|e| RenderError::Capture(e.to_string()))?;
        info!(seconds = total.as_secs_f64(), "capturing live playback");
        thread::sleep(total);

        self.stop();
        let _ = self.command_tx.send(EngineCommand::DetachCapture);
        // let the callback pick up the detach before draining
        thread::sleep(Duration::from_millis(20));

        let (response_tx, response_rx) = unbounded();
        self.recorder_tx
            .send(RecorderCommand::Stop { response_tx })
            .map_err(|_| RenderError::Capture("capture thread is gone".to_string()))?;
        let samples = response_rx
            .recv_timeout(Duration::from_secs(2))
            .map_err(|_| RenderError::Capture("capture did not finish in time".to_string()))?;
        Ok(AudioBuffer::new(samples, self.channels, self.sample_rate))
    }
}

impl Drop for LiveEngine {
    fn drop(&mut self) {
        self.stop();
        self.output.stop();
        let _ = self.recorder_tx.send(RecorderCommand::Shutdown);
        if let Some(handle) = self.recorder_thread.take() {
            if handle.join().is_err() {
                warn!("recorder thread panicked");
            }
        }
    }
}
