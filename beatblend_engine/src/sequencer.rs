use beatblend_shared::{STEPS_PER_BEAT, STEPS_PER_PATTERN};

/// One scheduled sixteenth note.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepEvent {
    pub step: usize,
    pub bar: u32,
    /// Seconds on the caller's clock
    pub time: f64,
}

/// Sixteenth-note clock.
///
/// Event times are derived from an anchor rather than accumulated, so they do
/// not drift no matter how the caller slices time into blocks.
#[derive(Debug, Clone)]
pub struct StepSequencer {
    bpm: f64,
    running: bool,
    anchor_time: f64,
    anchor_index: u64,
    next_index: u64,
    /// `None` loops forever
    total_events: Option<u64>,
    position: usize,
}

impl StepSequencer {
    pub fn new(bpm: f64) -> Self {
        Self {
            bpm: sanitize_bpm(bpm, 120.0),
            running: false,
            anchor_time: 0.0,
            anchor_index: 0,
            next_index: 0,
            total_events: None,
            position: 0,
        }
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Seconds between two steps
    pub fn step_duration(&self) -> f64 {
        60.0 / self.bpm / STEPS_PER_BEAT as f64
    }

    pub fn start(&mut self, at: f64, bars: Option<u32>) {
        self.running = true;
        self.anchor_time = at;
        self.anchor_index = 0;
        self.next_index = 0;
        self.total_events = bars.map(|b| b as u64 * STEPS_PER_PATTERN as u64);
        self.position = 0;
    }

    /// Cancels every pending event. Safe to call repeatedly.
    pub fn stop(&mut self) {
        self.running = false;
        self.next_index = 0;
        self.anchor_index = 0;
        self.total_events = None;
        self.position = 0;
    }

    /// The next event keeps its time; spacing after it uses the new tempo.
    pub fn set_bpm(&mut self, bpm: f64) {
        let bpm = sanitize_bpm(bpm, self.bpm);
        if self.running {
            self.anchor_time = self.event_time(self.next_index);
            self.anchor_index = self.next_index;
        }
        self.bpm = bpm;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Step of the most recently emitted event, in [0, 16).
    pub fn position(&self) -> usize {
        self.position
    }

    /// Time of the next pending event, if any.
    pub fn next_event_time(&self) -> Option<f64> {
        if !self.running || self.is_exhausted() {
            return None;
        }
        Some(self.event_time(self.next_index))
    }

    /// Emits every pending event scheduled strictly before `horizon`.
    pub fn poll_until(&mut self, horizon: f64, mut on_event: impl FnMut(StepEvent)) -> usize {
        let mut emitted = 0;
        while self.running && !self.is_exhausted() {
            let time = self.event_time(self.next_index);
            if time >= horizon {
                break;
            }
            let step = (self.next_index % STEPS_PER_PATTERN as u64) as usize;
            let bar = (self.next_index / STEPS_PER_PATTERN as u64) as u32;
            self.position = step;
            self.next_index += 1;
            on_event(StepEvent { step, bar, time });
            emitted += 1;
        }
        emitted
    }

    fn is_exhausted(&self) -> bool {
        self.total_events.is_some_and(|total| self.next_index >= total)
    }

    fn event_time(&self, index: u64) -> f64 {
        self.anchor_time + (index - self.anchor_index) as f64 * self.step_duration()
    }
}

fn sanitize_bpm(bpm: f64, fallback: f64) -> f64 {
    if bpm.is_finite() && bpm > 0.0 { bpm } else { fallback }
}
