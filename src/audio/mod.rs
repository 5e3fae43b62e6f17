pub mod envelope;
pub mod extract;
pub mod stats;
pub mod vad;

pub use envelope::{compute_rms_envelope, DEFAULT_FRAME_SIZE_MS};
pub use extract::{
    check_ffmpeg, check_ffprobe, decode_wav, extract_audio, get_audio_duration, has_video_stream,
    ANALYSIS_SAMPLE_RATE,
};
pub use stats::calculate_audio_stats;
pub use vad::{
    detect_segments, detect_speech_frames, frames_to_segments, run_initial_detection,
    DetectionResult,
};

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Metadata about an extracted audio file.
#[derive(Debug, Clone)]
pub struct AudioMetadata {
    pub duration: Duration,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Mono PCM samples in [-1, 1] ready for analysis.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub duration: Duration,
}

impl DecodedAudio {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        let duration = if sample_rate == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(samples.len() as f64 / sample_rate as f64)
        };
        Self {
            samples,
            sample_rate,
            duration,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration.as_secs_f64()
    }
}

/// RMS energy of one fixed-size slice of audio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioFrame {
    pub start_seconds: f64,
    pub rms: f64,
}

/// Summary of the whole energy envelope.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioStats {
    /// Median of the quietest 10% of frames.
    pub noise_floor_rms: f64,
    pub rms_p10: f64,
    pub rms_p50: f64,
    pub rms_p90: f64,
    pub total_duration_seconds: f64,
    pub frame_size_ms: f64,
    pub sample_rate: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoded_audio_duration() {
        let audio = DecodedAudio::new(vec![0.0; 8000], 16000);
        assert!((audio.duration_secs() - 0.5).abs() < 1e-9);

        let audio = DecodedAudio::new(vec![0.0; 10], 0);
        assert_eq!(audio.duration, Duration::ZERO);
    }
}
