use std::sync::Arc;

use arc_swap::ArcSwap;
use beatblend_shared::{Corner, CornerSet, DrumTrack, Pattern};

/// Owns the four corners and the blended pattern.
///
/// Every change to the blended pattern is also published into a lock-free
/// snapshot that the audio thread reads while playing.
pub struct PatternStore {
    corners: CornerSet,
    blended: Pattern,
    corner_generation: u64,
    published: Arc<ArcSwap<Pattern>>,
}

impl PatternStore {
    pub fn new(corners: CornerSet, blended: Pattern) -> Self {
        Self {
            corners,
            blended,
            corner_generation: 0,
            published: Arc::new(ArcSwap::from_pointee(blended)),
        }
    }

    pub fn corner(&self, corner: Corner) -> &Pattern {
        self.corners.get(corner)
    }

    pub fn corners(&self) -> &CornerSet {
        &self.corners
    }

    /// Replaces a slot and returns the new corner generation.
    pub fn set_corner(&mut self, corner: Corner, pattern: Pattern) -> u64 {
        self.corners.replace(corner, pattern);
        self.corner_generation += 1;
        self.corner_generation
    }

    /// Bumped on every corner replacement. Latents computed for an older
    /// generation are invalid.
    pub fn corner_generation(&self) -> u64 {
        self.corner_generation
    }

    pub fn blended(&self) -> &Pattern {
        &self.blended
    }

    pub fn set_blended(&mut self, pattern: Pattern) {
        self.blended = pattern;
        self.published.store(Arc::new(pattern));
    }

    pub fn toggle_step(&mut self, track: DrumTrack, step: usize) {
        let mut next = self.blended;
        next.toggle(track, step);
        self.set_blended(next);
    }

    /// Handle read by the live transport.
    pub fn shared_blended(&self) -> Arc<ArcSwap<Pattern>> {
        self.published.clone()
    }
}

impl Default for PatternStore {
    fn default() -> Self {
        Self::new(CornerSet::default(), beatblend_shared::presets::default_pattern())
    }
}
