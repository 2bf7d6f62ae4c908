use std::sync::Arc;

use arc_swap::ArcSwap;
use beatblend_shared::Pattern;
use ringbuf::HeapProd;

/// Messages from the control thread to the audio callback.
pub enum EngineCommand {
    Play {
        pattern: Arc<ArcSwap<Pattern>>,
        bpm: f64,
        /// `None` loops until stopped
        bars: Option<u32>,
        /// Seconds between the command being picked up and the first step
        start_delay: f64,
        generation: u64,
    },
    Stop,
    SetBpm(f64),
    AttachCapture(HeapProd<f32>),
    DetachCapture,
}
