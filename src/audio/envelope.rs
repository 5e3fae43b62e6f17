use crate::error::{Result, SilenceCutError};

use super::AudioFrame;

/// Default analysis frame size.
pub const DEFAULT_FRAME_SIZE_MS: f64 = 20.0;

/// Calculate RMS (Root Mean Square) energy of a sample window.
fn calculate_rms(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&s| {
            let s = s as f64;
            s * s
        })
        .sum();

    (sum_squares / samples.len() as f64).sqrt()
}

/// Number of samples in one analysis frame, never less than one.
pub fn frame_size_samples(sample_rate: u32, frame_size_ms: f64) -> usize {
    ((frame_size_ms / 1000.0) * sample_rate as f64).floor().max(1.0) as usize
}

/// Compute the RMS envelope of the whole input, one frame per window.
///
/// Frames tile the input without gaps; the last one may be shorter than
/// `frame_size_ms`.
pub fn compute_rms_envelope(
    samples: &[f32],
    sample_rate: u32,
    frame_size_ms: f64,
) -> Result<Vec<AudioFrame>> {
    if samples.is_empty() {
        return Err(SilenceCutError::InvalidInput(
            "No audio samples to analyze".to_string(),
        ));
    }
    if sample_rate == 0 {
        return Err(SilenceCutError::InvalidInput(
            "Sample rate must be greater than 0".to_string(),
        ));
    }
    if !frame_size_ms.is_finite() || frame_size_ms <= 0.0 {
        return Err(SilenceCutError::InvalidInput(format!(
            "Invalid frame size: {frame_size_ms}ms"
        )));
    }

    let frame_len = frame_size_samples(sample_rate, frame_size_ms);

    let frames = samples
        .chunks(frame_len)
        .enumerate()
        .map(|(i, window)| AudioFrame {
            start_seconds: (i * frame_len) as f64 / sample_rate as f64,
            rms: calculate_rms(window),
        })
        .collect();

    Ok(frames)
}
