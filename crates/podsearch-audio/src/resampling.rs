//! Audio resampling using rubato
//!
//! Podcast episodes run for an hour or more, so the input is fed through the
//! resampler in fixed-size chunks instead of one episode-sized block.

use anyhow::Result;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

const CHUNK_FRAMES: usize = 4096;

/// Resample mono audio from source_rate to target_rate
pub fn resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Result<Vec<f32>> {
    if source_rate == target_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = target_rate as f64 / source_rate as f64;
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, CHUNK_FRAMES, 1)?;

    let expected_len = (samples.len() as f64 * ratio).round() as usize;
    let delay = resampler.output_delay();
    let mut output = Vec::with_capacity(expected_len + delay + CHUNK_FRAMES);

    let mut pos = 0;
    while samples.len() - pos >= resampler.input_frames_next() {
        let frames = resampler.input_frames_next();
        let chunk = resampler.process(&[&samples[pos..pos + frames]], None)?;
        output.extend_from_slice(&chunk[0]);
        pos += frames;
    }

    if pos < samples.len() {
        let chunk = resampler.process_partial(Some(&[&samples[pos..]]), None)?;
        output.extend_from_slice(&chunk[0]);
    }

    // Drain the filter so the tail of the input is not lost
    while output.len() < expected_len + delay {
        let chunk = resampler.process_partial(None::<&[&[f32]]>, None)?;
        if chunk[0].is_empty() {
            break;
        }
        output.extend_from_slice(&chunk[0]);
    }

    Ok(output.into_iter().skip(delay).take(expected_len).collect())
}
