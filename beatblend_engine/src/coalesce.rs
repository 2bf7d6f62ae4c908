use std::time::{Duration, Instant};

/// Single-slot mailbox that only releases its item after a quiet period.
///
/// Each `offer` replaces the held item and restarts the timer, so a burst of
/// requests collapses into one release carrying the last item.
pub struct Coalescer<T> {
    window: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Coalescer<T> {
    pub fn new(window: Duration) -> Self {
        Self { window, pending: None }
    }

    pub fn offer(&mut self, item: T, now: Instant) {
        self.pending = Some((item, now + self.window));
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, due)| *due)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Takes the item once its deadline has passed.
    pub fn take_due(&mut self, now: Instant) -> Option<T> {
        match self.pending {
            Some((_, due)) if now >= due => self.pending.take().map(|(item, _)| item),
            _ => None,
        }
    }

    pub fn clear(&mut self) {
        self.pending = None;
    }
}
