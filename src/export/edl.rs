// CMX 3600 edit decision list
use super::{CutListFormatter, ExportContext, ExportFormat};
use crate::cut::SpeechSegment;
use crate::error::Result;

pub struct EdlFormatter;

impl CutListFormatter for EdlFormatter {
    fn format(&self, segments: &[SpeechSegment], context: &ExportContext) -> Result<String> {
        Ok(generate_edl(segments, context.fps, &context.title()))
    }

    fn format_name(&self) -> ExportFormat {
        ExportFormat::Edl
    }
}

/// `HH:MM:SS:FF` at an integer frame rate, frames floored.
pub fn seconds_to_timecode(seconds: f64, fps: u32) -> String {
    let fps = u64::from(fps.max(1));
    // epsilon keeps 1.16s at 25fps on frame 29 instead of 28
    let total_frames = (seconds.max(0.0) * fps as f64 + 1e-9).floor() as u64;

    let frames = total_frames % fps;
    let total_secs = total_frames / fps;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let secs = total_secs % 60;

    format!("{:02}:{:02}:{:02}:{:02}", hours, minutes, secs, frames)
}

/// Build an EDL with one video and one audio event per enabled segment.
///
/// Record timecodes run back to back, so the edited timeline has no gaps.
pub fn generate_edl(segments: &[SpeechSegment], fps: u32, title: &str) -> String {
    let mut lines = vec![
        format!("TITLE: {title}"),
        "FCM: NON-DROP FRAME".to_string(),
        String::new(),
    ];

    let mut record_in = 0.0;
    for (index, segment) in segments.iter().filter(|s| s.enabled).enumerate() {
        let event = format!("{:03}", index + 1);
        let source_in = seconds_to_timecode(segment.start_seconds, fps);
        let source_out = seconds_to_timecode(segment.end_seconds, fps);
        let rec_in = seconds_to_timecode(record_in, fps);
        let rec_out = seconds_to_timecode(record_in + segment.duration_seconds, fps);

        for track in ["V", "A"] {
            lines.push(format!(
                "{event}  AX       {track}     C        {source_in} {source_out} {rec_in} {rec_out}"
            ));
        }
        lines.push(format!(
            "* SEGMENT {}: {:.2}s - {:.2}s",
            index + 1,
            segment.start_seconds,
            segment.end_seconds
        ));
        lines.push(String::new());

        record_in += segment.duration_seconds;
    }

    lines.join("\n")
}
