use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{CORNER_COUNT, STEPS_PER_PATTERN, TRACK_COUNT};

/// One row of the grid
pub type Steps = [bool; STEPS_PER_PATTERN];

/// The three percussive voices. The set is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrumTrack {
    Kick,
    Snare,
    Hat,
}

impl DrumTrack {
    pub const ALL: [DrumTrack; TRACK_COUNT] = [DrumTrack::Kick, DrumTrack::Snare, DrumTrack::Hat];

    pub fn index(self) -> usize {
        match self {
            DrumTrack::Kick => 0,
            DrumTrack::Snare => 1,
            DrumTrack::Hat => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DrumTrack::Kick => "kick",
            DrumTrack::Snare => "snare",
            DrumTrack::Hat => "hat",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DrumTrack::Kick => "Kick",
            DrumTrack::Snare => "Snare",
            DrumTrack::Hat => "Hi-Hat",
        }
    }
}

/// 16-step grid for kick, snare and hat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Pattern {
    tracks: [Steps; TRACK_COUNT],
}

impl Pattern {
    pub const fn empty() -> Self {
        Self { tracks: [[false; STEPS_PER_PATTERN]; TRACK_COUNT] }
    }

    pub const fn from_tracks(kick: Steps, snare: Steps, hat: Steps) -> Self {
        Self { tracks: [kick, snare, hat] }
    }

    /// Builds a pattern from three 16-char rows; `x`/`X` marks an active step.
    pub const fn from_rows(kick: &[u8; STEPS_PER_PATTERN], snare: &[u8; STEPS_PER_PATTERN], hat: &[u8; STEPS_PER_PATTERN]) -> Self {
        Self::from_tracks(row(kick), row(snare), row(hat))
    }

    pub fn steps(&self, track: DrumTrack) -> &Steps {
        &self.tracks[track.index()]
    }

    /// Panics when `step >= 16`.
    pub fn is_active(&self, track: DrumTrack, step: usize) -> bool {
        self.tracks[track.index()][step]
    }

    pub fn set(&mut self, track: DrumTrack, step: usize, active: bool) {
        self.tracks[track.index()][step] = active;
    }

    pub fn toggle(&mut self, track: DrumTrack, step: usize) {
        let cell = &mut self.tracks[track.index()][step];
        *cell = !*cell;
    }

    /// Tracks that hit on `step`.
    pub fn hits_at(&self, step: usize) -> impl Iterator<Item = DrumTrack> + '_ {
        DrumTrack::ALL.into_iter().filter(move |t| self.is_active(*t, step))
    }

    pub fn active_steps(&self, track: DrumTrack) -> impl Iterator<Item = usize> + '_ {
        self.steps(track).iter().enumerate().filter(|(_, on)| **on).map(|(i, _)| i)
    }

    pub fn hit_count(&self) -> usize {
        self.tracks.iter().flatten().filter(|on| **on).count()
    }

    pub fn is_empty(&self) -> bool {
        self.hit_count() == 0
    }
}

const fn row(s: &[u8; STEPS_PER_PATTERN]) -> Steps {
    let mut out = [false; STEPS_PER_PATTERN];
    let mut i = 0;
    while i < STEPS_PER_PATTERN {
        out[i] = s[i] == b'x' || s[i] == b'X';
        i += 1;
    }
    out
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for track in DrumTrack::ALL {
            write!(f, "{:<7}", track.label())?;
            for (i, on) in self.steps(track).iter().enumerate() {
                if i > 0 && i % 4 == 0 {
                    f.write_str(" ")?;
                }
                f.write_str(if *on { "x" } else { "." })?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Named anchors of the blend surface. A top-left, B top-right, C bottom-left, D bottom-right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Corner {
    A,
    B,
    C,
    D,
}

impl Corner {
    pub const ALL: [Corner; CORNER_COUNT] = [Corner::A, Corner::B, Corner::C, Corner::D];

    pub fn index(self) -> usize {
        match self {
            Corner::A => 0,
            Corner::B => 1,
            Corner::C => 2,
            Corner::D => 3,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "A" | "a" => Some(Corner::A),
            "B" | "b" => Some(Corner::B),
            "C" | "c" => Some(Corner::C),
            "D" | "d" => Some(Corner::D),
            _ => None,
        }
    }
}

impl fmt::Display for Corner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Corner::A => "A",
            Corner::B => "B",
            Corner::C => "C",
            Corner::D => "D",
        };
        f.write_str(s)
    }
}

/// Four slots, each always holding a full pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CornerSet {
    slots: [Pattern; CORNER_COUNT],
}

impl CornerSet {
    pub fn new(a: Pattern, b: Pattern, c: Pattern, d: Pattern) -> Self {
        Self { slots: [a, b, c, d] }
    }

    pub fn get(&self, corner: Corner) -> &Pattern {
        &self.slots[corner.index()]
    }

    pub fn replace(&mut self, corner: Corner, pattern: Pattern) {
        self.slots[corner.index()] = pattern;
    }

    pub fn as_array(&self) -> &[Pattern; CORNER_COUNT] {
        &self.slots
    }

    pub fn iter(&self) -> impl Iterator<Item = (Corner, &Pattern)> {
        Corner::ALL.into_iter().zip(self.slots.iter())
    }
}

impl Default for CornerSet {
    fn default() -> Self {
        crate::presets::default_corners()
    }
}
