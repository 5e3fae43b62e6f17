use tracing::{debug, info};

use crate::cut::{
    filter_short_segments, merge_close_segments, to_speech_segments, Segment, SpeechSegment,
};
use crate::error::Result;
use crate::params::DetectionParams;

use super::{calculate_audio_stats, compute_rms_envelope, AudioFrame, AudioStats};

/// Output of the first energy-based pass.
#[derive(Debug, Clone)]
pub struct DetectionResult {
    /// Ids `seg-N`, all enabled.
    pub initial_segments: Vec<SpeechSegment>,
    pub stats: AudioStats,
    /// The clamped parameters actually used.
    pub params: DetectionParams,
}

/// Classify frames as speech (true) or silence (false).
pub fn detect_speech_frames(
    frames: &[AudioFrame],
    noise_floor: f64,
    energy_multiplier: f64,
) -> Vec<bool> {
    let threshold = noise_floor * energy_multiplier;
    frames.iter().map(|f| f.rms > threshold).collect()
}

/// Convert a speech mask into time segments.
///
/// A run of speech frames ends where the next silent frame starts. A run that
/// reaches the end of the input ends one frame after its last frame starts,
/// clipped to `total_duration`. The frame step is taken from the frame starts;
/// `frame_size_ms` is only used for a single-frame envelope.
pub fn frames_to_segments(
    speech_frames: &[bool],
    frames: &[AudioFrame],
    frame_size_ms: f64,
    total_duration: f64,
) -> Vec<Segment> {
    let frame_duration = match frames {
        [first, second, ..] => second.start_seconds - first.start_seconds,
        _ => frame_size_ms / 1000.0,
    };
    let mut segments = Vec::new();
    let mut run_start: Option<f64> = None;

    for (frame, &is_speech) in frames.iter().zip(speech_frames) {
        match (is_speech, run_start) {
            (true, None) => run_start = Some(frame.start_seconds),
            (false, Some(start)) => {
                segments.push(Segment::new(start, frame.start_seconds));
                run_start = None;
            }
            _ => {}
        }
    }

    if let (Some(start), Some(last)) = (run_start, frames.last()) {
        let end = (last.start_seconds + frame_duration).min(total_duration);
        if end > start {
            segments.push(Segment::new(start, end));
        }
    }

    segments
}

/// Threshold an envelope against its noise floor, then merge and filter.
pub fn detect_segments(
    frames: &[AudioFrame],
    stats: &AudioStats,
    params: &DetectionParams,
    total_duration: f64,
) -> Vec<Segment> {
    let params = params.clamped();

    let mask = detect_speech_frames(frames, stats.noise_floor_rms, params.energy_multiplier);
    let raw = frames_to_segments(&mask, frames, stats.frame_size_ms, total_duration);
    let merged = merge_close_segments(&raw, params.merge_gap_ms);
    let filtered = filter_short_segments(&merged, params.minimum_speech_ms);

    debug!(
        "Speech frames: {}/{}, raw segments: {}, after merge: {}, after filter: {}",
        mask.iter().filter(|&&s| s).count(),
        mask.len(),
        raw.len(),
        merged.len(),
        filtered.len()
    );

    filtered
}

/// Run envelope, statistics and raw detection over decoded samples.
pub fn run_initial_detection(
    samples: &[f32],
    sample_rate: u32,
    total_duration: f64,
    frame_size_ms: f64,
    params: &DetectionParams,
) -> Result<DetectionResult> {
    let params = params.clamped();

    let frames = compute_rms_envelope(samples, sample_rate, frame_size_ms)?;
    let stats = calculate_audio_stats(&frames, sample_rate, total_duration, frame_size_ms)?;

    info!(
        "Analyzed {} frames: noise floor {:.5}, P50 {:.5}, P90 {:.5}",
        frames.len(),
        stats.noise_floor_rms,
        stats.rms_p50,
        stats.rms_p90
    );

    let segments = detect_segments(&frames, &stats, &params, total_duration);

    info!(
        "Detected {} speech segments in {:.2}s of audio",
        segments.len(),
        total_duration
    );

    Ok(DetectionResult {
        initial_segments: to_speech_segments(&segments, "seg-"),
        stats,
        params,
    })
}
