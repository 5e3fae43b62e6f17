use tracing::debug;

use crate::params::DetectionParams;

use super::{
    enabled_segments, keep_short_pauses, merge_overlapping, to_speech_segments, Segment,
    SpeechSegment,
};

/// Widen each segment by the padding, staying inside `[0, total_duration]`.
///
/// Segments that start at or past the end of the clip are dropped.
pub fn add_padding(
    segments: &[Segment],
    pre_pad_ms: f64,
    post_pad_ms: f64,
    total_duration: f64,
) -> Vec<Segment> {
    let pre = pre_pad_ms / 1000.0;
    let post = post_pad_ms / 1000.0;

    segments
        .iter()
        .map(|s| {
            Segment::new(
                (s.start_seconds - pre).max(0.0),
                (s.end_seconds + post).min(total_duration),
            )
        })
        .filter(|s| s.end_seconds > s.start_seconds)
        .collect()
}

/// Cut budget for a clip: `ceil(rate * minutes)`.
pub fn max_cuts_for(max_jump_cut_rate_per_minute: f64, total_duration: f64) -> usize {
    (max_jump_cut_rate_per_minute * total_duration.max(0.0) / 60.0)
        .ceil()
        .max(0.0) as usize
}

/// Merge across the smallest gaps until the number of cuts fits the budget.
///
/// Ties go to the earliest gap. Input must be sorted and non-overlapping.
pub fn limit_cut_rate(
    segments: &[Segment],
    max_jump_cut_rate_per_minute: f64,
    total_duration: f64,
) -> Vec<Segment> {
    let max_cuts = max_cuts_for(max_jump_cut_rate_per_minute, total_duration);
    let mut result = segments.to_vec();

    while result.len() > 1 && result.len() - 1 > max_cuts {
        let mut smallest = 0;
        let mut smallest_gap = f64::INFINITY;
        for (i, pair) in result.windows(2).enumerate() {
            let gap = pair[1].start_seconds - pair[0].end_seconds;
            if gap < smallest_gap {
                smallest_gap = gap;
                smallest = i;
            }
        }

        let next = result.remove(smallest + 1);
        let current = &mut result[smallest];
        current.end_seconds = current.end_seconds.max(next.end_seconds);
    }

    if result.len() < segments.len() {
        debug!(
            "Cut rate limit merged {} segments (max {} cuts)",
            segments.len() - result.len(),
            max_cuts
        );
    }

    result
}

/// Turn detected speech into the final keep list.
///
/// Short pauses are kept, each segment is padded, overlaps are merged and the
/// cut density is capped. Disabled input segments are ignored.
pub fn refine_segments(
    initial: &[SpeechSegment],
    params: &DetectionParams,
    total_duration: f64,
) -> Vec<SpeechSegment> {
    let params = params.clamped();
    let segments = enabled_segments(initial);

    let kept = keep_short_pauses(&segments, params.keep_short_pauses_under_ms);
    let padded = add_padding(&kept, params.pre_pad_ms, params.post_pad_ms, total_duration);
    let merged = merge_overlapping(&padded);
    let limited = limit_cut_rate(&merged, params.max_jump_cut_rate_per_minute, total_duration);
    let refined = merge_overlapping(&limited);

    debug!(
        "Refined {} segments: {} after pause merge, {} after padding, {} final",
        segments.len(),
        kept.len(),
        merged.len(),
        refined.len()
    );

    to_speech_segments(&refined, "refined-")
}

/// Apply only the cut-rate cap and overlap merge to already padded segments.
///
/// Labels survive; a segment that absorbed others keeps the first label's
/// prefix followed by `...`.
pub fn enforce_pacing(
    segments: &[SpeechSegment],
    params: &DetectionParams,
    total_duration: f64,
) -> Vec<SpeechSegment> {
    let params = params.clamped();
    let enabled: Vec<&SpeechSegment> = segments.iter().filter(|s| s.enabled).collect();
    let plain: Vec<Segment> = enabled.iter().map(|s| s.segment()).collect();

    let limited = limit_cut_rate(
        &merge_overlapping(&plain),
        params.max_jump_cut_rate_per_minute,
        total_duration,
    );
    let paced = merge_overlapping(&limited);

    paced
        .iter()
        .enumerate()
        .map(|(i, segment)| {
            let sources: Vec<&&SpeechSegment> = enabled
                .iter()
                .filter(|s| {
                    s.start_seconds >= segment.start_seconds
                        && s.start_seconds <= segment.end_seconds
                })
                .collect();

            let label = match sources.as_slice() {
                [] => None,
                [only] => only.label.clone(),
                [first, ..] => first.label.as_deref().map(merged_label),
            };

            let mut out = SpeechSegment::new(i.to_string(), *segment);
            out.label = label;
            out
        })
        .collect()
}

/// Label for a segment built from several: the first label's text before any
/// `...`, then `...`.
pub(crate) fn merged_label(first: &str) -> String {
    let prefix = first.split("...").next().unwrap_or(first);
    format!("{prefix}...")
}
