//! Transport state shared between the control thread and the audio callback.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};

/// Every `begin` and `halt` moves the generation forward. The callback checks
/// that the generation it was started with is still current before each
/// trigger, so nothing from a halted session fires after `halt` returns.
#[derive(Debug)]
pub struct Transport {
    playing: AtomicBool,
    current_step: AtomicI32,
    generation: AtomicU64,
}

impl Transport {
    pub fn new() -> Self {
        Self {
            playing: AtomicBool::new(false),
            current_step: AtomicI32::new(-1),
            generation: AtomicU64::new(0),
        }
    }

    /// Opens a new session and returns its generation.
    pub fn begin(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.current_step.store(-1, Ordering::Relaxed);
        self.playing.store(true, Ordering::Release);
        generation
    }

    pub fn halt(&self) {
        self.playing.store(false, Ordering::Release);
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.current_step.store(-1, Ordering::Relaxed);
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.is_playing() && self.generation() == generation
    }

    /// Best-effort playhead for display.
    pub fn current_step(&self) -> Option<usize> {
        let step = self.current_step.load(Ordering::Relaxed);
        (step >= 0).then_some(step as usize)
    }

    pub fn set_current_step(&self, step: usize) {
        self.current_step.store(step as i32, Ordering::Relaxed);
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new()
    }
}
