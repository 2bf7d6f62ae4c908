use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use ringbuf::HeapCons;
use ringbuf::traits::Consumer;
use tracing::{debug, info};

// Command messages for the capture thread
pub enum RecorderCommand {
    Start { consumer: HeapCons<f32> },
    /// Drains what is left and returns the interleaved capture.
    Stop { response_tx: Sender<Vec<f32>> },
    Shutdown,
}

/// Drains the mix tap off the audio thread into a growing buffer.
pub struct CaptureRecorder {
    command_rx: Receiver<RecorderCommand>,
    consumer: Option<HeapCons<f32>>,
    buffer: Vec<f32>,
}

impl CaptureRecorder {
    pub fn new(command_rx: Receiver<RecorderCommand>) -> Self {
        Self { command_rx, consumer: None, buffer: Vec::new() }
    }

    pub fn spawn() -> Result<(Sender<RecorderCommand>, JoinHandle<()>), std::io::Error> {
        let (tx, rx) = unbounded();
        let handle = thread::Builder::new()
            .name("beatblend-recorder".to_string())
            .spawn(move || CaptureRecorder::new(rx).run())?;
        Ok((tx, handle))
    }

    pub fn run(&mut self) {
        loop {
            while let Ok(cmd) = self.command_rx.try_recv() {
                if !self.handle_cmd(cmd) {
                    return;
                }
            }
            self.drain();
            thread::sleep(Duration::from_millis(5));
        }
    }

    /// Returns false on shutdown.
    fn handle_cmd(&mut self, cmd: RecorderCommand) -> bool {
        match cmd {
            RecorderCommand::Start { consumer } => {
                self.buffer.clear();
                self.consumer = Some(consumer);
                debug!("capture started");
            }
            RecorderCommand::Stop { response_tx } => {
                self.drain();
                self.consumer = None;
                let captured = std::mem::take(&mut self.buffer);
                let peak = captured.iter().fold(0.0f32, |m, s| m.max(s.abs()));
                info!(samples = captured.len(), peak, "capture finished");
                let _ = response_tx.send(captured);
            }
            RecorderCommand::Shutdown => return false,
        }
        true
    }

    fn drain(&mut self) {
        if let Some(consumer) = self.consumer.as_mut() {
            while let Some(sample) = consumer.try_pop() {
                self.buffer.push(sample);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringbuf::HeapRb;
    use ringbuf::traits::{Producer, Split};

    #[test]
    fn stop_returns_everything_pushed() {
        let (tx, handle) = CaptureRecorder::spawn().unwrap();
        let (mut prod, cons) = HeapRb::<f32>::new(1024).split();
        tx.send(RecorderCommand::Start { consumer: cons }).unwrap();
        for i in 0..300 {
            while prod.try_push(i as f32).is_err() {
                thread::sleep(Duration::from_millis(1));
            }
        }
        let (resp_tx, resp_rx) = unbounded();
        tx.send(RecorderCommand::Stop { response_tx: resp_tx }).unwrap();
        let captured = resp_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(captured.len(), 300);
        assert_eq!(captured[299], 299.0);
        tx.send(RecorderCommand::Shutdown).unwrap();
        handle.join().unwrap();
    }
}
