//! Bilinear weighting over the four corners and the threshold blend built on it.

use serde::{Deserialize, Serialize};

use crate::pattern::{Corner, CornerSet, DrumTrack, Pattern};
use crate::{CORNER_COUNT, STEPS_PER_PATTERN};

/// Step is active when its weighted vote reaches this.
pub const DEFAULT_BLEND_THRESHOLD: f64 = 0.5;

/// Pointer location over the pad. Always inside the unit square.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlendPosition {
    x: f64,
    y: f64,
}

impl BlendPosition {
    /// Clamps both axes to [0, 1]. NaN maps to 0.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x: clamp_unit(x), y: clamp_unit(y) }
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn weights(&self) -> CornerWeights {
        CornerWeights::at(*self)
    }

    pub fn corner(corner: Corner) -> Self {
        match corner {
            Corner::A => Self::new(0.0, 0.0),
            Corner::B => Self::new(1.0, 0.0),
            Corner::C => Self::new(0.0, 1.0),
            Corner::D => Self::new(1.0, 1.0),
        }
    }
}

impl Default for BlendPosition {
    fn default() -> Self {
        Self::new(0.2, 0.3)
    }
}

fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CornerWeights([f64; CORNER_COUNT]);

impl CornerWeights {
    pub fn at(pos: BlendPosition) -> Self {
        let (x, y) = (pos.x, pos.y);
        Self([(1.0 - x) * (1.0 - y), x * (1.0 - y), (1.0 - x) * y, x * y])
    }

    pub fn get(&self, corner: Corner) -> f64 {
        self.0[corner.index()]
    }

    pub fn as_array(&self) -> &[f64; CORNER_COUNT] {
        &self.0
    }

    pub fn sum(&self) -> f64 {
        self.0.iter().sum()
    }
}

/// Weighted vote of the corners per track and step.
pub fn local_blend(corners: &CornerSet, weights: &CornerWeights, threshold: f64) -> Pattern {
    let mut out = Pattern::empty();
    for track in DrumTrack::ALL {
        for step in 0..STEPS_PER_PATTERN {
            let vote: f64 = corners
                .iter()
                .filter(|(_, p)| p.is_active(track, step))
                .map(|(c, _)| weights.get(c))
                .sum();
            out.set(track, step, vote >= threshold);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets;

    #[test]
    fn weights_sum_to_one_across_the_square() {
        for i in 0..=50 {
            for j in 0..=50 {
                let pos = BlendPosition::new(i as f64 / 50.0, j as f64 / 50.0);
                let w = pos.weights();
                assert!((w.sum() - 1.0).abs() < 1e-9, "at {:?}", pos);
                assert!(w.as_array().iter().all(|v| *v >= 0.0));
            }
        }
    }

    #[test]
    fn position_clamps_out_of_range_input() {
        let p = BlendPosition::new(-0.5, 3.0);
        assert_eq!((p.x(), p.y()), (0.0, 1.0));
        let n = BlendPosition::new(f64::NAN, 0.5);
        assert_eq!(n.x(), 0.0);
    }

    #[test]
    fn corners_reproduce_their_pattern() {
        let corners = presets::default_corners();
        for corner in Corner::ALL {
            let w = BlendPosition::corner(corner).weights();
            let out = local_blend(&corners, &w, DEFAULT_BLEND_THRESHOLD);
            assert_eq!(&out, corners.get(corner), "corner {corner}");
        }
    }

    #[test]
    fn blend_is_deterministic() {
        let corners = presets::default_corners();
        let w = BlendPosition::new(0.37, 0.61).weights();
        let a = local_blend(&corners, &w, DEFAULT_BLEND_THRESHOLD);
        let b = local_blend(&corners, &w, DEFAULT_BLEND_THRESHOLD);
        assert_eq!(a, b);
    }

    #[test]
    fn midpoint_keeps_steps_shared_by_half_the_corners() {
        let on = Pattern::from_rows(b"x...............", b"................", b"................");
        let off = Pattern::empty();
        let corners = CornerSet::new(on, on, off, off);
        // the top row carries exactly half the weight at y = 0.5
        let w = BlendPosition::new(0.5, 0.5).weights();
        let out = local_blend(&corners, &w, DEFAULT_BLEND_THRESHOLD);
        assert!(out.is_active(DrumTrack::Kick, 0));
        let w = BlendPosition::new(0.5, 0.51).weights();
        assert!(local_blend(&corners, &w, DEFAULT_BLEND_THRESHOLD).is_empty());
    }
}
