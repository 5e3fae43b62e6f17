//! Speech segments derived from word timestamps instead of audio energy.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::params::DetectionParams;
use crate::transcribe::{TranscriptionResult, Word};

use super::refine::merged_label;
use super::{Segment, SpeechSegment};

/// Words shown in a segment label before it is elided.
const LABEL_WORDS: usize = 5;

/// Inter-word gaps at or below this are treated as continuous speech.
const MIN_PAUSE_MS: f64 = 50.0;

/// Summary of the pauses between words, given to the advisor as context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PauseStats {
    pub total_pauses: usize,
    pub avg_pause_ms: f64,
    pub max_pause_ms: f64,
    pub min_pause_ms: f64,
    pub distribution: PauseDistribution,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PauseDistribution {
    /// Under 300ms.
    pub short: usize,
    /// 300ms up to 800ms.
    pub medium: usize,
    /// 800ms and over.
    pub long: usize,
}

/// Flatten a transcription into words sorted by start time.
///
/// A segment without word timestamps counts as one word spanning the segment.
pub fn collect_words(transcription: &TranscriptionResult) -> Vec<Word> {
    let mut words: Vec<Word> = Vec::new();

    for segment in &transcription.segments {
        match &segment.words {
            Some(segment_words) if !segment_words.is_empty() => {
                words.extend(segment_words.iter().cloned())
            }
            _ => words.push(Word {
                word: segment.text.clone(),
                start: segment.start,
                end: segment.end,
            }),
        }
    }

    words.sort_by(|a, b| a.start.total_cmp(&b.start));
    words
}

struct WordGroup {
    start: f64,
    last_word_end: f64,
    words: Vec<String>,
}

impl WordGroup {
    fn starting_with(word: &Word) -> Self {
        Self {
            start: word.start,
            last_word_end: word.end,
            words: vec![word.word.clone()],
        }
    }

    fn label(&self) -> String {
        let mut label = self
            .words
            .iter()
            .take(LABEL_WORDS)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ");
        if self.words.len() > LABEL_WORDS {
            label.push_str("...");
        }
        label
    }
}

/// Group words into padded speech segments.
///
/// A new segment starts when the gap from the previous word's end reaches both
/// the minimum silence and the merge gap. Ends are clipped to
/// `video_duration`, then segments separated by a pause no longer than
/// `keep_short_pauses_under_ms` are joined.
pub fn segments_from_words(
    words: &[Word],
    params: &DetectionParams,
    video_duration: f64,
) -> Vec<SpeechSegment> {
    let params = params.clamped();
    let minimum_silence = params.minimum_silence_ms / 1000.0;
    let merge_gap = params.merge_gap_ms / 1000.0;
    let pre = params.pre_pad_ms / 1000.0;
    let post = params.post_pad_ms / 1000.0;

    let mut groups: Vec<WordGroup> = Vec::new();
    for word in words {
        match groups.last_mut() {
            Some(current) => {
                let gap = word.start - current.last_word_end;
                if gap < minimum_silence || gap < merge_gap {
                    current.last_word_end = current.last_word_end.max(word.end);
                    current.words.push(word.word.clone());
                } else {
                    groups.push(WordGroup::starting_with(word));
                }
            }
            None => groups.push(WordGroup::starting_with(word)),
        }
    }

    let segments: Vec<SpeechSegment> = groups
        .iter()
        .filter_map(|group| {
            let start = (group.start - pre).max(0.0);
            let end = (group.last_word_end + post).min(video_duration);
            (end > start).then(|| {
                SpeechSegment::new("", Segment::new(start, end)).with_label(group.label())
            })
        })
        .collect();

    debug!(
        "Grouped {} words into {} segments",
        words.len(),
        segments.len()
    );

    merge_short_pauses(&segments, params.keep_short_pauses_under_ms)
}

/// Join neighbours separated by a pause at or under the threshold and
/// renumber ids from `"0"`.
fn merge_short_pauses(
    segments: &[SpeechSegment],
    keep_short_pauses_under_ms: f64,
) -> Vec<SpeechSegment> {
    let keep = keep_short_pauses_under_ms / 1000.0;
    let mut merged: Vec<SpeechSegment> = Vec::with_capacity(segments.len());

    for segment in segments {
        if let Some(current) = merged.last_mut() {
            if segment.start_seconds - current.end_seconds <= keep {
                current.end_seconds = current.end_seconds.max(segment.end_seconds);
                current.duration_seconds = current.end_seconds - current.start_seconds;
                current.label = current.label.as_deref().map(merged_label);
                continue;
            }
        }
        merged.push(segment.clone());
    }

    for (i, segment) in merged.iter_mut().enumerate() {
        segment.id = i.to_string();
    }

    merged
}

/// Speech segments for a whole transcription.
pub fn segments_from_transcription(
    transcription: &TranscriptionResult,
    params: &DetectionParams,
    video_duration: f64,
) -> Vec<SpeechSegment> {
    segments_from_words(&collect_words(transcription), params, video_duration)
}

/// Pause statistics over real word timestamps; segments without words are
/// ignored.
pub fn calculate_pause_stats(transcription: &TranscriptionResult) -> PauseStats {
    let mut words: Vec<&Word> = transcription
        .segments
        .iter()
        .filter_map(|s| s.words.as_ref())
        .flatten()
        .collect();
    words.sort_by(|a, b| a.start.total_cmp(&b.start));

    let pauses: Vec<f64> = words
        .windows(2)
        .map(|pair| (pair[1].start - pair[0].end) * 1000.0)
        .filter(|&gap| gap > MIN_PAUSE_MS)
        .collect();

    if pauses.is_empty() {
        return PauseStats::default();
    }

    let total: f64 = pauses.iter().sum();
    let max = pauses.iter().copied().fold(f64::MIN, f64::max);
    let min = pauses.iter().copied().fold(f64::MAX, f64::min);

    PauseStats {
        total_pauses: pauses.len(),
        avg_pause_ms: (total / pauses.len() as f64).round(),
        max_pause_ms: max.round(),
        min_pause_ms: min.round(),
        distribution: PauseDistribution {
            short: pauses.iter().filter(|&&p| p < 300.0).count(),
            medium: pauses.iter().filter(|&&p| (300.0..800.0).contains(&p)).count(),
            long: pauses.iter().filter(|&&p| p >= 800.0).count(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcribe::TranscriptionSegment;

    fn word(text: &str, start: f64, end: f64) -> Word {
        Word {
            word: text.to_string(),
            start,
            end,
        }
    }

    fn transcription(segments: Vec<TranscriptionSegment>) -> TranscriptionResult {
        TranscriptionResult {
            text: String::new(),
            segments,
            language: "en".to_string(),
            duration: 10.0,
        }
    }

    fn segment(id: u32, start: f64, end: f64, words: Option<Vec<Word>>) -> TranscriptionSegment {
        TranscriptionSegment {
            id,
            start,
            end,
            text: format!("segment {id}"),
            words,
        }
    }

    #[test]
    fn test_two_words_far_apart() {
        let words = vec![word("hi", 0.0, 0.3), word("there", 5.0, 5.4)];
        let params = DetectionParams {
            minimum_silence_ms: 500.0,
            ..DetectionParams::default()
        };
        let segments = segments_from_words(&words, &params, 10.0);

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].id, "0");
        assert_eq!(segments[0].start_seconds, 0.0);
        assert!((segments[0].end_seconds - 0.48).abs() < 1e-9);
        assert!((segments[1].start_seconds - 4.85).abs() < 1e-9);
        assert!((segments[1].end_seconds - 5.58).abs() < 1e-9);
        assert_eq!(segments[1].label.as_deref(), Some("there"));
    }

    #[test]
    fn test_gap_is_measured_from_unpadded_end() {
        // 400ms gap: below 500ms minimum silence, so one segment
        let words = vec![word("a", 0.0, 1.0), word("b", 1.4, 2.0)];
        let segments = segments_from_words(&words, &DetectionParams::default(), 10.0);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].label.as_deref(), Some("a b"));
    }

    #[test]
    fn test_label_elides_after_five_words() {
        let words: Vec<Word> = ["one", "two", "three", "four", "five", "six"]
            .iter()
            .enumerate()
            .map(|(i, w)| word(w, i as f64 * 0.3, i as f64 * 0.3 + 0.2))
            .collect();
        let segments = segments_from_words(&words, &DetectionParams::default(), 10.0);
        assert_eq!(
            segments[0].label.as_deref(),
            Some("one two three four five...")
        );
    }

    #[test]
    fn test_short_pause_merge_keeps_label_prefix() {
        // 700ms gap splits groups, padded gap of 370ms is under the 400ms keep threshold
        let words = vec![word("first", 1.0, 1.5), word("second", 2.2, 2.6)];
        let params = DetectionParams {
            keep_short_pauses_under_ms: 400.0,
            ..DetectionParams::default()
        };
        let segments = segments_from_words(&words, &params, 10.0);

        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].label.as_deref(), Some("first..."));
        assert!((segments[0].end_seconds - 2.78).abs() < 1e-9);
        assert!((segments[0].duration_seconds - 1.93).abs() < 1e-9);
    }

    #[test]
    fn test_ends_clip_to_duration_and_empty_segments_drop() {
        let words = vec![word("a", 1.0, 1.5), word("late", 12.0, 12.5)];
        let segments = segments_from_words(&words, &DetectionParams::default(), 5.0);
        assert_eq!(segments.len(), 1);
        assert!(segments[0].end_seconds <= 5.0);
    }

    #[test]
    fn test_no_words_no_segments() {
        assert!(segments_from_words(&[], &DetectionParams::default(), 10.0).is_empty());
        assert!(segments_from_transcription(&transcription(vec![]), &DetectionParams::default(), 10.0)
            .is_empty());
    }

    #[test]
    fn test_collect_words_uses_segment_fallback() {
        let t = transcription(vec![
            segment(1, 4.0, 5.0, Some(vec![word("later", 4.2, 4.8)])),
            segment(0, 0.0, 2.0, None),
            segment(2, 6.0, 7.0, Some(vec![])),
        ]);
        let words = collect_words(&t);

        assert_eq!(words.len(), 3);
        assert_eq!(words[0].word, "segment 0");
        assert_eq!(words[0].end, 2.0);
        assert_eq!(words[1].word, "later");
        assert_eq!(words[2].word, "segment 2");
    }

    #[test]
    fn test_transcript_segments_are_ordered() {
        let t = transcription(vec![segment(
            0,
            0.0,
            10.0,
            Some(vec![
                word("a", 0.5, 0.9),
                word("b", 2.0, 2.4),
                word("c", 2.5, 2.9),
                word("d", 6.0, 6.5),
                word("e", 9.5, 9.9),
            ]),
        )]);
        let segments = segments_from_transcription(&t, &DetectionParams::default(), 10.0);
        let plain: Vec<Segment> = segments.iter().map(|s| s.segment()).collect();

        assert!(crate::cut::is_ordered_non_overlapping(&plain));
        assert!(plain.iter().all(|s| s.end_seconds <= 10.0));
        let ids: Vec<&str> = segments.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["0", "1", "2", "3"]);
    }

    #[test]
    fn test_pause_stats() {
        let t = transcription(vec![
            segment(
                0,
                0.0,
                3.0,
                Some(vec![
                    word("a", 0.0, 0.5),
                    word("b", 0.52, 1.0), // 20ms, ignored
                    word("c", 1.2, 1.5),  // 200ms short
                ]),
            ),
            segment(1, 2.0, 2.5, None),
            segment(
                2,
                2.0,
                5.0,
                Some(vec![
                    word("d", 2.0, 2.5), // 500ms medium
                    word("e", 3.5, 4.0), // 1000ms long
                ]),
            ),
        ]);
        let stats = calculate_pause_stats(&t);

        assert_eq!(stats.total_pauses, 3);
        assert_eq!(stats.avg_pause_ms, 567.0);
        assert_eq!(stats.max_pause_ms, 1000.0);
        assert_eq!(stats.min_pause_ms, 200.0);
        assert_eq!(stats.distribution.short, 1);
        assert_eq!(stats.distribution.medium, 1);
        assert_eq!(stats.distribution.long, 1);
    }

    #[test]
    fn test_pause_stats_without_words() {
        let stats = calculate_pause_stats(&transcription(vec![segment(0, 0.0, 1.0, None)]));
        assert_eq!(stats, PauseStats::default());
    }
}
