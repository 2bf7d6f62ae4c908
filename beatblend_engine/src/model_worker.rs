use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use beatblend_shared::{CornerSet, ModelError, Pattern};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::debug;

use crate::adapter::{CornerLatents, InterpolationAdapter, LatentVector};
use crate::coalesce::Coalescer;

pub enum ModelJob {
    Load,
    Encode { generation: u64, corners: CornerSet },
    /// Held in a single-slot mailbox until the debounce window passes quietly.
    Decode { seq: u64, latent: LatentVector, stochasticity: f32 },
    Shutdown,
}

pub enum ModelEvent {
    Loaded(Result<(), ModelError>),
    Encoded { generation: u64, result: Result<CornerLatents, ModelError> },
    Decoded { seq: u64, result: Result<Pattern, ModelError> },
}

/// Dedicated thread that owns every call into the model.
pub struct ModelWorker {
    job_tx: Sender<ModelJob>,
    event_rx: Receiver<ModelEvent>,
    handle: Option<JoinHandle<()>>,
}

impl ModelWorker {
    pub fn spawn(adapter: Arc<InterpolationAdapter>, debounce: Duration) -> Result<Self, anyhow::Error> {
        let (job_tx, job_rx) = unbounded();
        let (event_tx, event_rx) = unbounded();
        let handle = thread::Builder::new()
            .name("beatblend-model".to_string())
            .spawn(move || run(adapter, job_rx, event_tx, debounce))?;
        Ok(Self { job_tx, event_rx, handle: Some(handle) })
    }

    /// Returns false once the worker has gone away.
    pub fn submit(&self, job: ModelJob) -> bool {
        self.job_tx.send(job).is_ok()
    }

    pub fn try_event(&self) -> Option<ModelEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_event_timeout(&self, timeout: Duration) -> Option<ModelEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    pub fn shutdown(&mut self) {
        let _ = self.job_tx.send(ModelJob::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ModelWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(adapter: Arc<InterpolationAdapter>, job_rx: Receiver<ModelJob>, event_tx: Sender<ModelEvent>, debounce: Duration) {
    let mut mailbox: Coalescer<(u64, LatentVector, f32)> = Coalescer::new(debounce);
    loop {
        let job = match mailbox.deadline() {
            Some(due) => match job_rx.recv_timeout(due.saturating_duration_since(Instant::now())) {
                Ok(job) => Some(job),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match job_rx.recv() {
                Ok(job) => Some(job),
                Err(_) => break,
            },
        };

        let event = match job {
            Some(ModelJob::Load) => Some(ModelEvent::Loaded(adapter.ensure_ready())),
            Some(ModelJob::Encode { generation, corners }) => {
                Some(ModelEvent::Encoded { generation, result: adapter.encode(&corners) })
            }
            Some(ModelJob::Decode { seq, latent, stochasticity }) => {
                if mailbox.is_pending() {
                    debug!(seq, "decode request replaces pending one");
                }
                mailbox.offer((seq, latent, stochasticity), Instant::now());
                None
            }
            Some(ModelJob::Shutdown) => break,
            None => None,
        };
        if let Some(event) = event {
            if event_tx.send(event).is_err() {
                break;
            }
        }

        if let Some((seq, latent, stochasticity)) = mailbox.take_due(Instant::now()) {
            debug!(seq, "decoding");
            let result = adapter.decode(&latent, stochasticity);
            if event_tx.send(ModelEvent::Decoded { seq, result }).is_err() {
                break;
            }
        }
    }
    debug!("model worker stopped");
}
