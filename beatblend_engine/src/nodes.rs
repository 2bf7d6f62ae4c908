//! One-shot drum voices.
//!
//! Envelopes follow exponential ramps: up from a floor to the peak over the
//! attack, then down to the floor by the decay time, silent from the stop time.

use std::f32::consts::PI;

use beatblend_shared::DrumTrack;

const ENV_FLOOR: f32 = 1e-4;

#[derive(Debug, Clone, Copy)]
struct Envelope {
    start: f32,
    peak: f32,
    attack: f32,
    decay: f32,
    stop: f32,
}

impl Envelope {
    fn level(&self, t: f32) -> f32 {
        if t >= self.stop {
            0.0
        } else if t < self.attack {
            exp_ramp(self.start, self.peak, t / self.attack)
        } else if t < self.decay {
            exp_ramp(self.peak, ENV_FLOOR, (t - self.attack) / (self.decay - self.attack))
        } else {
            ENV_FLOOR
        }
    }
}

fn exp_ramp(from: f32, to: f32, progress: f32) -> f32 {
    from * (to / from).powf(progress)
}

/// RBJ biquad, direct form I.
#[derive(Debug, Clone, Copy)]
pub struct Biquad {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl Biquad {
    const Q: f32 = std::f32::consts::FRAC_1_SQRT_2;

    pub fn highpass(cutoff: f32, sample_rate: f32) -> Self {
        let (cos, alpha) = Self::prewarp(cutoff, sample_rate);
        let a0 = 1.0 + alpha;
        Self::normalized((1.0 + cos) / 2.0, -(1.0 + cos), (1.0 + cos) / 2.0, a0, -2.0 * cos, 1.0 - alpha)
    }

    pub fn lowpass(cutoff: f32, sample_rate: f32) -> Self {
        let (cos, alpha) = Self::prewarp(cutoff, sample_rate);
        let a0 = 1.0 + alpha;
        Self::normalized((1.0 - cos) / 2.0, 1.0 - cos, (1.0 - cos) / 2.0, a0, -2.0 * cos, 1.0 - alpha)
    }

    fn prewarp(cutoff: f32, sample_rate: f32) -> (f32, f32) {
        // keep the cutoff below Nyquist for low device rates
        let f = cutoff.min(sample_rate * 0.45);
        let w0 = 2.0 * PI * f / sample_rate;
        (w0.cos(), w0.sin() / (2.0 * Self::Q))
    }

    fn normalized(b0: f32, b1: f32, b2: f32, a0: f32, a1: f32, a2: f32) -> Self {
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    pub fn process(&mut self, x: f32) -> f32 {
        let y = self.b0 * x + self.b1 * self.x1 + self.b2 * self.x2 - self.a1 * self.y1 - self.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;
        y
    }
}

/// Sine with an exponential pitch drop.
#[derive(Debug, Clone)]
pub struct KickVoice {
    env: Envelope,
    phase: f32,
    age: u32,
    sample_rate: f32,
}

impl KickVoice {
    const START_HZ: f32 = 120.0;
    const END_HZ: f32 = 55.0;
    const SWEEP: f32 = 0.16;

    pub fn new(sample_rate: f32) -> Self {
        Self {
            env: Envelope { start: 0.001, peak: 0.9, attack: 0.004, decay: 0.16, stop: 0.2 },
            phase: 0.0,
            age: 0,
            sample_rate,
        }
    }

    fn next_sample(&mut self) -> f32 {
        let t = self.age as f32 / self.sample_rate;
        let freq = exp_ramp(Self::START_HZ, Self::END_HZ, (t / Self::SWEEP).min(1.0));
        let s = (2.0 * PI * self.phase).sin() * self.env.level(t);
        self.phase = (self.phase + freq / self.sample_rate) % 1.0;
        self.age += 1;
        s
    }
}

/// Filtered white noise, used for snare and hat.
#[derive(Debug, Clone)]
pub struct NoiseVoice {
    env: Envelope,
    highpass: Biquad,
    lowpass: Option<Biquad>,
    rng: fastrand::Rng,
    age: u32,
    sample_rate: f32,
}

impl NoiseVoice {
    pub fn snare(sample_rate: f32, seed: u64) -> Self {
        Self {
            env: Envelope { start: ENV_FLOOR, peak: 0.8, attack: 0.003, decay: 0.09, stop: 0.1 },
            highpass: Biquad::highpass(1000.0, sample_rate),
            lowpass: Some(Biquad::lowpass(6500.0, sample_rate)),
            rng: fastrand::Rng::with_seed(seed),
            age: 0,
            sample_rate,
        }
    }

    pub fn hat(sample_rate: f32, seed: u64) -> Self {
        Self {
            env: Envelope { start: ENV_FLOOR, peak: 0.5, attack: 0.0015, decay: 0.03, stop: 0.035 },
            highpass: Biquad::highpass(9000.0, sample_rate),
            lowpass: None,
            rng: fastrand::Rng::with_seed(seed),
            age: 0,
            sample_rate,
        }
    }

    fn next_sample(&mut self) -> f32 {
        let t = self.age as f32 / self.sample_rate;
        let white = self.rng.f32() * 2.0 - 1.0;
        let mut s = self.highpass.process(white);
        if let Some(lp) = self.lowpass.as_mut() {
            s = lp.process(s);
        }
        self.age += 1;
        s * self.env.level(t)
    }
}

#[derive(Debug, Clone)]
pub enum DrumVoice {
    Kick(KickVoice),
    Noise(NoiseVoice),
}

impl DrumVoice {
    /// Noise voices are seeded so repeated renders are identical.
    pub fn for_track(track: DrumTrack, sample_rate: f32, seed: u64) -> Self {
        match track {
            DrumTrack::Kick => DrumVoice::Kick(KickVoice::new(sample_rate)),
            DrumTrack::Snare => DrumVoice::Noise(NoiseVoice::snare(sample_rate, seed)),
            DrumTrack::Hat => DrumVoice::Noise(NoiseVoice::hat(sample_rate, seed)),
        }
    }

    /// Adds the voice into a mono buffer.
    pub fn process(&mut self, output: &mut [f32]) {
        for out in output.iter_mut() {
            if self.is_finished() {
                break;
            }
            *out += match self {
                DrumVoice::Kick(v) => v.next_sample(),
                DrumVoice::Noise(v) => v.next_sample(),
            };
        }
    }

    pub fn is_finished(&self) -> bool {
        let (age, sample_rate, stop) = match self {
            DrumVoice::Kick(v) => (v.age, v.sample_rate, v.env.stop),
            DrumVoice::Noise(v) => (v.age, v.sample_rate, v.env.stop),
        };
        age as f32 / sample_rate >= stop
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(mut voice: DrumVoice, frames: usize) -> Vec<f32> {
        let mut buf = vec![0.0; frames];
        voice.process(&mut buf);
        buf
    }

    fn peak(buf: &[f32]) -> f32 {
        buf.iter().fold(0.0f32, |m, s| m.max(s.abs()))
    }

    #[test]
    fn envelope_shape() {
        let env = Envelope { start: 0.001, peak: 0.9, attack: 0.004, decay: 0.16, stop: 0.2 };
        assert!((env.level(0.0) - 0.001).abs() < 1e-6);
        assert!((env.level(0.004) - 0.9).abs() < 1e-4);
        assert!(env.level(0.17) <= ENV_FLOOR + 1e-7);
        assert_eq!(env.level(0.2), 0.0);
    }

    #[test]
    fn kick_is_loud_then_silent_after_stop() {
        let sr = 44_100.0;
        let buf = render(DrumVoice::for_track(DrumTrack::Kick, sr, 0), 44_100);
        let stop = (0.2 * sr) as usize;
        assert!(peak(&buf[..stop]) > 0.5);
        assert_eq!(peak(&buf[stop + 1..]), 0.0);
    }

    #[test]
    fn hat_is_shorter_than_snare() {
        let sr = 44_100.0;
        let snare = render(DrumVoice::for_track(DrumTrack::Snare, sr, 7), 8_820);
        let hat = render(DrumVoice::for_track(DrumTrack::Hat, sr, 7), 8_820);
        let last_nonzero = |b: &[f32]| b.iter().rposition(|s| *s != 0.0).unwrap_or(0);
        assert!(last_nonzero(&hat) < last_nonzero(&snare));
        assert!(peak(&snare) > 0.05 && peak(&hat) > 0.01);
    }

    #[test]
    fn same_seed_same_noise() {
        let a = render(DrumVoice::for_track(DrumTrack::Snare, 48_000.0, 42), 2_000);
        let b = render(DrumVoice::for_track(DrumTrack::Snare, 48_000.0, 42), 2_000);
        assert_eq!(a, b);
    }
}
