//! Segment lists and the operations that rewrite them.
//!
//! Every function here takes one ordered, non-overlapping list and returns a
//! new one. Nothing is mutated in place.

pub mod refine;
pub mod transcript;

pub use refine::{add_padding, enforce_pacing, limit_cut_rate, max_cuts_for, refine_segments};
pub use transcript::{
    calculate_pause_stats, collect_words, segments_from_transcription, segments_from_words,
    PauseDistribution, PauseStats,
};

use serde::{Deserialize, Serialize};

/// A time interval of source media, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub start_seconds: f64,
    pub end_seconds: f64,
}

impl Segment {
    pub fn new(start_seconds: f64, end_seconds: f64) -> Self {
        Self {
            start_seconds,
            end_seconds,
        }
    }

    pub fn duration(&self) -> f64 {
        (self.end_seconds - self.start_seconds).max(0.0)
    }
}

/// A segment as shown to the user and exported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechSegment {
    pub id: String,
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub duration_seconds: f64,
    /// Disabled segments are excluded from exports without re-running detection.
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl SpeechSegment {
    pub fn new(id: impl Into<String>, segment: Segment) -> Self {
        Self {
            id: id.into(),
            start_seconds: segment.start_seconds,
            end_seconds: segment.end_seconds,
            duration_seconds: segment.duration(),
            enabled: true,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn segment(&self) -> Segment {
        Segment::new(self.start_seconds, self.end_seconds)
    }

    /// Flip the enabled flag. Boundaries are untouched.
    pub fn toggle(&mut self) {
        self.enabled = !self.enabled;
    }
}

/// Build display segments with ids `"{prefix}{i}"`.
pub fn to_speech_segments(segments: &[Segment], prefix: &str) -> Vec<SpeechSegment> {
    segments
        .iter()
        .enumerate()
        .map(|(i, s)| SpeechSegment::new(format!("{prefix}{i}"), *s))
        .collect()
}

/// Enabled segments as plain intervals.
pub fn enabled_segments(segments: &[SpeechSegment]) -> Vec<Segment> {
    segments
        .iter()
        .filter(|s| s.enabled)
        .map(SpeechSegment::segment)
        .collect()
}

/// Merge neighbours whose gap is strictly below `merge_gap_ms`.
pub fn merge_close_segments(segments: &[Segment], merge_gap_ms: f64) -> Vec<Segment> {
    merge_gaps(segments, merge_gap_ms / 1000.0, |gap, limit| gap < limit)
}

/// Merge neighbours whose pause is at or below `keep_short_pauses_under_ms`,
/// so natural breathing pauses never become cuts.
pub fn keep_short_pauses(segments: &[Segment], keep_short_pauses_under_ms: f64) -> Vec<Segment> {
    merge_gaps(segments, keep_short_pauses_under_ms / 1000.0, |gap, limit| {
        gap <= limit
    })
}

fn merge_gaps(
    segments: &[Segment],
    limit_seconds: f64,
    should_merge: impl Fn(f64, f64) -> bool,
) -> Vec<Segment> {
    let mut result: Vec<Segment> = Vec::with_capacity(segments.len());

    for segment in segments {
        if let Some(last) = result.last_mut() {
            let gap = segment.start_seconds - last.end_seconds;
            if should_merge(gap, limit_seconds) {
                last.end_seconds = last.end_seconds.max(segment.end_seconds);
                continue;
            }
        }
        result.push(*segment);
    }

    result
}

/// Drop segments shorter than `minimum_speech_ms`.
pub fn filter_short_segments(segments: &[Segment], minimum_speech_ms: f64) -> Vec<Segment> {
    let min_duration = minimum_speech_ms / 1000.0;
    segments
        .iter()
        .filter(|s| s.end_seconds - s.start_seconds >= min_duration)
        .copied()
        .collect()
}

/// Sort by start and merge anything that touches or overlaps.
pub fn merge_overlapping(segments: &[Segment]) -> Vec<Segment> {
    let mut sorted = segments.to_vec();
    sorted.sort_by(|a, b| a.start_seconds.total_cmp(&b.start_seconds));

    let mut result: Vec<Segment> = Vec::with_capacity(sorted.len());
    for segment in sorted {
        if let Some(last) = result.last_mut() {
            if segment.start_seconds <= last.end_seconds {
                last.end_seconds = last.end_seconds.max(segment.end_seconds);
                continue;
            }
        }
        result.push(segment);
    }

    result
}

/// True when every segment is non-empty and ends at or before the next starts.
pub fn is_ordered_non_overlapping(segments: &[Segment]) -> bool {
    segments.iter().all(|s| s.start_seconds < s.end_seconds)
        && segments
            .windows(2)
            .all(|pair| pair[0].end_seconds <= pair[1].start_seconds)
}

/// Total duration of enabled segments.
pub fn kept_duration(segments: &[SpeechSegment]) -> f64 {
    segments
        .iter()
        .filter(|s| s.enabled)
        .map(|s| s.duration_seconds)
        .sum()
}

/// Transitions between enabled segments.
pub fn number_of_cuts(segments: &[SpeechSegment]) -> usize {
    segments.iter().filter(|s| s.enabled).count().saturating_sub(1)
}

/// Derived statistics over the enabled subset of a final segment list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CutSummary {
    pub original_duration: f64,
    pub kept_duration: f64,
    pub time_removed: f64,
    pub number_of_cuts: usize,
    pub segment_count: usize,
}

impl CutSummary {
    pub fn from_segments(segments: &[SpeechSegment], original_duration: f64) -> Self {
        let kept = kept_duration(segments);
        Self {
            original_duration,
            kept_duration: kept,
            time_removed: original_duration - kept,
            number_of_cuts: number_of_cuts(segments),
            segment_count: segments.iter().filter(|s| s.enabled).count(),
        }
    }

    /// Fraction of the original that is removed, 0.0 for empty media.
    pub fn removed_ratio(&self) -> f64 {
        if self.original_duration > 0.0 {
            self.time_removed / self.original_duration
        } else {
            0.0
        }
    }
}
