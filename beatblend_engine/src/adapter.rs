//! Boundary to the generative drum model.
//!
//! Patterns cross the boundary as quantized drum note sequences; the model
//! answers with latent vectors on encode and note sequences on decode.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use beatblend_shared::{
    Corner, CornerSet, CornerWeights, DrumTrack, ModelError, Pattern, CORNER_COUNT, STEPS_PER_BEAT,
    STEPS_PER_PATTERN, TRACK_COUNT,
};

pub const KICK_PITCH: u8 = 36;
pub const SNARE_PITCH: u8 = 38;
pub const HAT_PITCH: u8 = 42;

const NOTE_VELOCITY: u8 = 100;
const SEQUENCE_QPM: f64 = 120.0;
/// Bars per sequence handed to the model
const ENCODE_BARS: u32 = 2;

pub fn pitch_for(track: DrumTrack) -> u8 {
    match track {
        DrumTrack::Kick => KICK_PITCH,
        DrumTrack::Snare => SNARE_PITCH,
        DrumTrack::Hat => HAT_PITCH,
    }
}

pub fn track_for(pitch: u8) -> Option<DrumTrack> {
    match pitch {
        KICK_PITCH => Some(DrumTrack::Kick),
        SNARE_PITCH => Some(DrumTrack::Snare),
        HAT_PITCH => Some(DrumTrack::Hat),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrumNote {
    pub pitch: u8,
    pub velocity: u8,
    pub start_step: u32,
    pub end_step: u32,
    pub is_drum: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NoteSequence {
    pub notes: Vec<DrumNote>,
    pub steps_per_quarter: u32,
    pub qpm: f64,
    pub total_steps: u32,
}

impl NoteSequence {
    /// Two bars, the pattern repeated in each.
    pub fn from_pattern(pattern: &Pattern) -> Self {
        let mut notes = Vec::with_capacity(pattern.hit_count() * ENCODE_BARS as usize);
        for bar in 0..ENCODE_BARS {
            let offset = bar * STEPS_PER_PATTERN as u32;
            for step in 0..STEPS_PER_PATTERN {
                for track in pattern.hits_at(step) {
                    let start_step = offset + step as u32;
                    notes.push(DrumNote {
                        pitch: pitch_for(track),
                        velocity: NOTE_VELOCITY,
                        start_step,
                        end_step: start_step + 1,
                        is_drum: true,
                    });
                }
            }
        }
        Self {
            notes,
            steps_per_quarter: STEPS_PER_BEAT as u32,
            qpm: SEQUENCE_QPM,
            total_steps: ENCODE_BARS * STEPS_PER_PATTERN as u32,
        }
    }

    /// Reads back the first bar. Non-drum notes and unknown pitches are ignored.
    pub fn to_pattern(&self) -> Pattern {
        let mut pattern = Pattern::empty();
        for note in &self.notes {
            if !note.is_drum || note.start_step as usize >= STEPS_PER_PATTERN {
                continue;
            }
            if let Some(track) = track_for(note.pitch) {
                pattern.set(track, note.start_step as usize, true);
            }
        }
        pattern
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LatentVector(Vec<f32>);

impl LatentVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Weighted sum of the four corner latents.
    pub fn combine(latents: &CornerLatents, weights: &CornerWeights) -> Self {
        let mut out = vec![0.0f32; latents.dim()];
        for corner in Corner::ALL {
            let w = weights.get(corner) as f32;
            for (o, v) in out.iter_mut().zip(latents.get(corner).as_slice()) {
                *o += w * v;
            }
        }
        Self(out)
    }
}

/// One latent per corner, all of the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct CornerLatents {
    vectors: [LatentVector; CORNER_COUNT],
}

impl CornerLatents {
    pub fn from_batch(batch: Vec<Vec<f32>>) -> Result<Self, ModelError> {
        if batch.len() != CORNER_COUNT {
            return Err(ModelError::Malformed(format!("expected {} latents, got {}", CORNER_COUNT, batch.len())));
        }
        let dim = batch[0].len();
        if dim == 0 {
            return Err(ModelError::Malformed("empty latent vector".to_string()));
        }
        if batch.iter().any(|v| v.len() != dim) {
            return Err(ModelError::Malformed("latent vectors differ in length".to_string()));
        }
        if batch.iter().flatten().any(|v| !v.is_finite()) {
            return Err(ModelError::Malformed("non-finite latent value".to_string()));
        }
        let mut it = batch.into_iter().map(LatentVector);
        match (it.next(), it.next(), it.next(), it.next()) {
            (Some(a), Some(b), Some(c), Some(d)) => Ok(Self { vectors: [a, b, c, d] }),
            _ => Err(ModelError::Malformed("latent batch truncated".to_string())),
        }
    }

    pub fn get(&self, corner: Corner) -> &LatentVector {
        &self.vectors[corner.index()]
    }

    pub fn dim(&self) -> usize {
        self.vectors[0].len()
    }
}

/// The external generative model. Implementations must tolerate calls from the worker thread.
pub trait DrumModel: Send + Sync {
    fn initialize(&self) -> Result<(), ModelError>;
    fn encode(&self, sequences: &[NoteSequence]) -> Result<Vec<Vec<f32>>, ModelError>;
    fn decode(&self, latent: &[f32], temperature: f32) -> Result<NoteSequence, ModelError>;
}

pub struct InterpolationAdapter {
    model: Arc<dyn DrumModel>,
    ready: AtomicBool,
}

impl InterpolationAdapter {
    pub fn new(model: Arc<dyn DrumModel>) -> Self {
        Self { model, ready: AtomicBool::new(false) }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn ensure_ready(&self) -> Result<(), ModelError> {
        if self.is_ready() {
            return Ok(());
        }
        self.model.initialize()?;
        self.ready.store(true, Ordering::Release);
        Ok(())
    }

    pub fn encode(&self, corners: &CornerSet) -> Result<CornerLatents, ModelError> {
        if !self.is_ready() {
            return Err(ModelError::NotReady);
        }
        let sequences: Vec<NoteSequence> = corners.as_array().iter().map(NoteSequence::from_pattern).collect();
        let batch = self.model.encode(&sequences)?;
        CornerLatents::from_batch(batch)
    }

    pub fn decode(&self, latent: &LatentVector, stochasticity: f32) -> Result<Pattern, ModelError> {
        if !self.is_ready() {
            return Err(ModelError::NotReady);
        }
        if latent.is_empty() {
            return Err(ModelError::Malformed("empty latent vector".to_string()));
        }
        let sequence = self.model.decode(latent.as_slice(), stochasticity)?;
        Ok(sequence.to_pattern())
    }
}

const GRID_LATENT_DIM: usize = TRACK_COUNT * STEPS_PER_PATTERN;
/// Noise amplitude at temperature 1.0
const GRID_NOISE_SCALE: f32 = 0.25;

/// Reference model: one latent value per track-step of the first bar, +1 for
/// a hit and -1 for a rest. Decoding thresholds at zero after adding seeded
/// noise scaled by the temperature.
pub struct GridModel {
    rng: Mutex<fastrand::Rng>,
}

impl GridModel {
    pub fn new(seed: u64) -> Self {
        Self { rng: Mutex::new(fastrand::Rng::with_seed(seed)) }
    }
}

impl Default for GridModel {
    fn default() -> Self {
        Self::new(0x5eed)
    }
}

impl DrumModel for GridModel {
    fn initialize(&self) -> Result<(), ModelError> {
        Ok(())
    }

    fn encode(&self, sequences: &[NoteSequence]) -> Result<Vec<Vec<f32>>, ModelError> {
        Ok(sequences
            .iter()
            .map(|seq| {
                let pattern = seq.to_pattern();
                let mut latent = Vec::with_capacity(GRID_LATENT_DIM);
                for track in DrumTrack::ALL {
                    latent.extend(pattern.steps(track).iter().map(|on| if *on { 1.0 } else { -1.0 }));
                }
                latent
            })
            .collect())
    }

    fn decode(&self, latent: &[f32], temperature: f32) -> Result<NoteSequence, ModelError> {
        if latent.len() != GRID_LATENT_DIM {
            return Err(ModelError::Malformed(format!("grid latent must have {} values, got {}", GRID_LATENT_DIM, latent.len())));
        }
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| ModelError::Inference("rng lock poisoned".to_string()))?;
        let mut pattern = Pattern::empty();
        for (i, value) in latent.iter().enumerate() {
            let noise = (rng.f32() * 2.0 - 1.0) * GRID_NOISE_SCALE * temperature;
            if value + noise >= 0.0 {
                pattern.set(DrumTrack::ALL[i / STEPS_PER_PATTERN], i % STEPS_PER_PATTERN, true);
            }
        }
        let mut sequence = NoteSequence::from_pattern(&pattern);
        sequence.notes.retain(|n| (n.start_step as usize) < STEPS_PER_PATTERN);
        sequence.total_steps = STEPS_PER_PATTERN as u32;
        Ok(sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beatblend_shared::{local_blend, presets, BlendPosition};

    #[test]
    fn sequence_repeats_pattern_over_two_bars() {
        let seq = NoteSequence::from_pattern(&presets::FOUR_ON_THE_FLOOR);
        assert_eq!(seq.total_steps, 32);
        assert_eq!(seq.steps_per_quarter, 4);
        assert_eq!(seq.notes.len(), presets::FOUR_ON_THE_FLOOR.hit_count() * 2);
        let kicks: Vec<u32> = seq.notes.iter().filter(|n| n.pitch == KICK_PITCH).map(|n| n.start_step).collect();
        assert_eq!(kicks, vec![0, 4, 8, 12, 16, 20, 24, 28]);
        assert!(seq.notes.iter().all(|n| n.is_drum && n.velocity == 100));
    }

    #[test]
    fn only_first_bar_is_read_back() {
        let mut seq = NoteSequence::from_pattern(&Pattern::empty());
        let note = |pitch, start_step, is_drum| DrumNote { pitch, velocity: 100, start_step, end_step: start_step + 1, is_drum };
        seq.notes.push(note(KICK_PITCH, 3, true));
        seq.notes.push(note(SNARE_PITCH, 20, true));
        seq.notes.push(note(49, 5, true));
        seq.notes.push(note(HAT_PITCH, 7, false));
        let p = seq.to_pattern();
        assert!(p.is_active(DrumTrack::Kick, 3));
        assert_eq!(p.hit_count(), 1);
    }

    #[test]
    fn round_trip_through_sequence() {
        for name in presets::preset_names() {
            let p = presets::preset(name).unwrap();
            assert_eq!(NoteSequence::from_pattern(&p).to_pattern(), p, "{name}");
        }
    }

    #[test]
    fn adapter_refuses_work_before_ready() {
        let adapter = InterpolationAdapter::new(Arc::new(GridModel::default()));
        assert_eq!(adapter.encode(&presets::default_corners()), Err(ModelError::NotReady));
        adapter.ensure_ready().unwrap();
        assert!(adapter.encode(&presets::default_corners()).is_ok());
    }

    #[test]
    fn batch_validation_rejects_ragged_latents() {
        let ragged = vec![vec![0.0; 4], vec![0.0; 4], vec![0.0; 3], vec![0.0; 4]];
        assert!(matches!(CornerLatents::from_batch(ragged), Err(ModelError::Malformed(_))));
        assert!(CornerLatents::from_batch(vec![vec![1.0]; 3]).is_err());
        assert!(CornerLatents::from_batch(vec![Vec::new(); 4]).is_err());
    }

    #[test]
    fn grid_model_without_noise_matches_local_blend() {
        let adapter = InterpolationAdapter::new(Arc::new(GridModel::default()));
        adapter.ensure_ready().unwrap();
        let corners = presets::default_corners();
        let latents = adapter.encode(&corners).unwrap();
        let weights = BlendPosition::new(0.9, 0.1).weights();
        let latent = LatentVector::combine(&latents, &weights);
        let decoded = adapter.decode(&latent, 0.0).unwrap();
        assert_eq!(decoded, local_blend(&corners, &weights, 0.5));
    }
}
