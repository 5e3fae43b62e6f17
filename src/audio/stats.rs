use crate::error::{Result, SilenceCutError};

use super::{AudioFrame, AudioStats};

/// Value at `floor(p/100 * n)` of an ascending slice, clamped to the last index.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let index = ((p / 100.0) * sorted.len() as f64).floor() as usize;
    sorted[index.min(sorted.len() - 1)]
}

/// Derive the noise floor and RMS percentiles from an envelope.
///
/// The noise floor is the median of the quietest 10% of frames (at least one
/// frame), which tracks ambient background rather than absolute silence.
pub fn calculate_audio_stats(
    frames: &[AudioFrame],
    sample_rate: u32,
    total_duration_seconds: f64,
    frame_size_ms: f64,
) -> Result<AudioStats> {
    if frames.is_empty() {
        return Err(SilenceCutError::InvalidInput(
            "Cannot compute statistics without frames".to_string(),
        ));
    }

    let mut sorted: Vec<f64> = frames.iter().map(|f| f.rms).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let lowest_count = ((sorted.len() as f64 * 0.1).floor() as usize).max(1);
    let lowest = &sorted[..lowest_count];
    let noise_floor_rms = lowest[lowest.len() / 2];

    Ok(AudioStats {
        noise_floor_rms,
        rms_p10: percentile(&sorted, 10.0),
        rms_p50: percentile(&sorted, 50.0),
        rms_p90: percentile(&sorted, 90.0),
        total_duration_seconds,
        frame_size_ms,
        sample_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames_from(values: &[f64]) -> Vec<AudioFrame> {
        values
            .iter()
            .enumerate()
            .map(|(i, &rms)| AudioFrame {
                start_seconds: i as f64 * 0.02,
                rms,
            })
            .collect()
    }

    #[test]
    fn test_percentiles() {
        // 0.00, 0.01, ..., 0.99 shuffled by reversing
        let values: Vec<f64> = (0..100).rev().map(|i| i as f64 / 100.0).collect();
        let stats = calculate_audio_stats(&frames_from(&values), 16000, 2.0, 20.0).unwrap();

        assert!((stats.rms_p10 - 0.10).abs() < 1e-9);
        assert!((stats.rms_p50 - 0.50).abs() < 1e-9);
        assert!((stats.rms_p90 - 0.90).abs() < 1e-9);
        // lowest 10 values are 0.00..0.09, median index 5
        assert!((stats.noise_floor_rms - 0.05).abs() < 1e-9);
        assert_eq!(stats.sample_rate, 16000);
        assert_eq!(stats.frame_size_ms, 20.0);
    }

    #[test]
    fn test_tiny_envelope_uses_single_frame_floor() {
        let stats = calculate_audio_stats(&frames_from(&[0.3, 0.1, 0.2]), 16000, 0.06, 20.0)
            .unwrap();
        assert_eq!(stats.noise_floor_rms, 0.1);
        assert_eq!(stats.rms_p90, 0.3);
    }

    #[test]
    fn test_noise_floor_ignores_isolated_zero_frames() {
        let mut values = vec![0.01; 100];
        values[3] = 0.0;
        values[40] = 0.0;
        values.extend(vec![0.3; 100]);
        let stats = calculate_audio_stats(&frames_from(&values), 16000, 4.0, 20.0).unwrap();
        assert_eq!(stats.noise_floor_rms, 0.01);
    }

    #[test]
    fn test_empty_frames_rejected() {
        assert!(calculate_audio_stats(&[], 16000, 0.0, 20.0).is_err());
    }
}
