use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};

const CHUNK_FRAMES: usize = 1024;

/// Converts interleaved audio from `from_rate` to `to_rate` with sinc
/// interpolation. The output is trimmed to the exact converted length.
pub fn resample_interleaved(input: &[f32], channels: usize, from_rate: u32, to_rate: u32) -> Result<Vec<f32>, anyhow::Error> {
    if channels == 0 {
        return Err(anyhow::anyhow!("channel count must be positive"));
    }
    if from_rate == 0 || to_rate == 0 {
        return Err(anyhow::anyhow!("sample rates must be positive"));
    }
    if input.is_empty() || from_rate == to_rate {
        return Ok(input.to_vec());
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let frames = input.len() / channels;
    let expected = (frames as f64 * ratio).round() as usize;

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 128,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, CHUNK_FRAMES, channels)?;
    let delay = resampler.output_delay();

    let mut planar: Vec<Vec<f32>> = (0..channels)
        .map(|c| input.iter().skip(c).step_by(channels).copied().collect())
        .collect();
    let mut out_planar: Vec<Vec<f32>> = vec![Vec::with_capacity(expected + delay + CHUNK_FRAMES); channels];

    // feed zero chunks past the end until the delayed tail is flushed
    let mut pos = 0;
    while out_planar[0].len() < expected + delay {
        let chunk: Vec<Vec<f32>> = planar
            .iter_mut()
            .map(|ch| {
                let end = (pos + CHUNK_FRAMES).min(ch.len());
                let mut c = if pos < ch.len() { ch[pos..end].to_vec() } else { Vec::new() };
                c.resize(CHUNK_FRAMES, 0.0);
                c
            })
            .collect();
        let waves = resampler.process(&chunk, None)?;
        for (dst, src) in out_planar.iter_mut().zip(waves.iter()) {
            dst.extend_from_slice(src);
        }
        pos += CHUNK_FRAMES;
    }

    let mut output = Vec::with_capacity(expected * channels);
    for frame in delay..delay + expected {
        for ch in &out_planar {
            output.push(ch[frame]);
        }
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_rate_is_passthrough() {
        let input = vec![0.1, -0.1, 0.2, -0.2];
        assert_eq!(resample_interleaved(&input, 2, 44_100, 44_100).unwrap(), input);
    }

    #[test]
    fn length_follows_rate_ratio() {
        let frames = 4_800;
        let input: Vec<f32> = (0..frames * 2).map(|i| ((i / 2) as f32 * 0.05).sin() * 0.5).collect();
        let out = resample_interleaved(&input, 2, 48_000, 44_100).unwrap();
        assert_eq!(out.len(), 4_410 * 2);
        let peak = out.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(peak > 0.4 && peak < 0.6);
    }

    #[test]
    fn zero_channels_is_an_error() {
        assert!(resample_interleaved(&[0.0], 0, 48_000, 44_100).is_err());
    }
}
