// JSON cut list
use super::{CutListFormatter, ExportContext, ExportFormat};
use crate::cut::{kept_duration, number_of_cuts, SpeechSegment};
use crate::error::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub struct JsonFormatter;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeptSegment {
    pub start_seconds: f64,
    pub end_seconds: f64,
}

/// Machine-readable summary of an edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CutList {
    pub source_file_name: String,
    pub fps_assumed: u32,
    pub total_duration_original: f64,
    pub total_duration_after_cuts: f64,
    pub total_time_removed: f64,
    pub number_of_cuts: usize,
    pub kept_segments: Vec<KeptSegment>,
    /// RFC 3339, UTC, millisecond precision.
    pub exported_at: String,
}

impl CutList {
    pub fn from_segments(
        segments: &[SpeechSegment],
        source_file_name: &str,
        original_duration: f64,
        fps: u32,
        exported_at: DateTime<Utc>,
    ) -> Self {
        let final_duration = kept_duration(segments);

        Self {
            source_file_name: source_file_name.to_string(),
            fps_assumed: fps,
            total_duration_original: original_duration,
            total_duration_after_cuts: final_duration,
            total_time_removed: original_duration - final_duration,
            number_of_cuts: number_of_cuts(segments),
            kept_segments: segments
                .iter()
                .filter(|s| s.enabled)
                .map(|s| KeptSegment {
                    start_seconds: s.start_seconds,
                    end_seconds: s.end_seconds,
                })
                .collect(),
            exported_at: exported_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

impl CutListFormatter for JsonFormatter {
    fn format(&self, segments: &[SpeechSegment], context: &ExportContext) -> Result<String> {
        let cut_list = CutList::from_segments(
            segments,
            &context.source_file_name,
            context.original_duration,
            context.fps,
            context.exported_at,
        );
        Ok(serde_json::to_string_pretty(&cut_list)?)
    }

    fn format_name(&self) -> ExportFormat {
        ExportFormat::Json
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cut::Segment;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap()
    }

    #[test]
    fn test_cut_list_fields() {
        let mut segments = vec![
            SpeechSegment::new("0", Segment::new(1.0, 3.0)),
            SpeechSegment::new("1", Segment::new(4.0, 5.0)),
            SpeechSegment::new("2", Segment::new(6.0, 8.0)),
        ];
        segments[1].enabled = false;

        let list = CutList::from_segments(&segments, "talk.mp4", 10.0, 30, fixed_time());
        assert_eq!(list.total_duration_after_cuts, 4.0);
        assert_eq!(list.total_time_removed, 6.0);
        assert_eq!(list.number_of_cuts, 1);
        assert_eq!(list.kept_segments.len(), 2);
        assert_eq!(list.exported_at, "2024-05-01T12:30:00.000Z");
    }

    #[test]
    fn test_json_field_names() {
        let segments = vec![SpeechSegment::new("0", Segment::new(0.5, 1.5))];
        let mut ctx = ExportContext::new("talk.mp4", 2.0).with_fps(25);
        ctx.exported_at = fixed_time();

        let output = JsonFormatter.format(&segments, &ctx).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(value["sourceFileName"], "talk.mp4");
        assert_eq!(value["fpsAssumed"], 25);
        assert_eq!(value["totalDurationOriginal"], 2.0);
        assert_eq!(value["totalDurationAfterCuts"], 1.0);
        assert_eq!(value["totalTimeRemoved"], 1.0);
        assert_eq!(value["numberOfCuts"], 0);
        assert_eq!(value["keptSegments"][0]["startSeconds"], 0.5);
        assert_eq!(value["keptSegments"][0]["endSeconds"], 1.5);
        assert_eq!(value["exportedAt"], "2024-05-01T12:30:00.000Z");
        // pretty-printed
        assert!(output.contains("\n  \"sourceFileName\""));
    }
}
