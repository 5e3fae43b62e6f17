//! Render the kept segments into a new media file with FFmpeg.
//!
//! Each enabled segment becomes a `trim`/`atrim` pair in one filter graph that
//! ends in `concat`. Long graphs are passed through `-filter_complex_script`
//! so the command line stays short.

use std::fmt::Write as _;
use std::path::Path;

use tracing::{debug, info};

use crate::cut::{enabled_segments, Segment, SpeechSegment};
use crate::error::{Result, SilenceCutError};

/// Segments above this count go into a filter script file.
pub const MAX_INLINE_SEGMENTS: usize = 100;

#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Whether the input has a video stream to trim alongside the audio.
    pub include_video: bool,
    pub video_codec: String,
    pub preset: String,
    pub crf: u8,
    pub audio_codec: String,
    pub audio_bitrate: String,
    pub max_inline_segments: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            include_video: true,
            video_codec: "libx264".to_string(),
            preset: "fast".to_string(),
            crf: 23,
            audio_codec: "aac".to_string(),
            audio_bitrate: "128k".to_string(),
            max_inline_segments: MAX_INLINE_SEGMENTS,
        }
    }
}

impl RenderOptions {
    pub fn audio_only() -> Self {
        Self {
            include_video: false,
            ..Self::default()
        }
    }
}

/// Build the `filter_complex` graph that keeps `segments` and concatenates
/// them into `[outv]`/`[outa]`.
pub fn build_filter_graph(segments: &[Segment], include_video: bool) -> String {
    let mut graph = String::new();

    for (i, seg) in segments.iter().enumerate() {
        if include_video {
            let _ = writeln!(
                graph,
                "[0:v]trim=start={:.3}:end={:.3},setpts=PTS-STARTPTS[v{i}];",
                seg.start_seconds, seg.end_seconds
            );
        }
        let _ = writeln!(
            graph,
            "[0:a]atrim=start={:.3}:end={:.3},asetpts=PTS-STARTPTS[a{i}];",
            seg.start_seconds, seg.end_seconds
        );
    }

    let inputs: String = (0..segments.len())
        .map(|i| {
            if include_video {
                format!("[v{i}][a{i}]")
            } else {
                format!("[a{i}]")
            }
        })
        .collect();

    if include_video {
        let _ = write!(
            graph,
            "{inputs}concat=n={}:v=1:a=1[outv][outa]",
            segments.len()
        );
    } else {
        let _ = write!(graph, "{inputs}concat=n={}:v=0:a=1[outa]", segments.len());
    }

    graph
}

/// Write a new file containing only the enabled segments of `input`.
pub async fn render_cut(
    input: &Path,
    output: &Path,
    segments: &[SpeechSegment],
    options: &RenderOptions,
) -> Result<()> {
    let keep = enabled_segments(segments);
    if keep.is_empty() {
        return Err(SilenceCutError::InvalidInput(
            "No enabled segments to render".to_string(),
        ));
    }
    if !input.exists() {
        return Err(SilenceCutError::FileNotFound(input.display().to_string()));
    }

    let graph = build_filter_graph(&keep, options.include_video);

    // Holds the script file (if any) until FFmpeg has finished
    let temp_dir = tempfile::tempdir()?;

    let mut cmd = tokio::process::Command::new("ffmpeg");
    cmd.args(["-y", "-hide_banner", "-loglevel", "error", "-i"])
        .arg(input);

    if keep.len() > options.max_inline_segments {
        let script = temp_dir.path().join("filter_graph.txt");
        tokio::fs::write(&script, &graph).await?;
        debug!(
            segments = keep.len(),
            script = %script.display(),
            "Using filter script"
        );
        cmd.arg("-filter_complex_script").arg(&script);
    } else {
        cmd.arg("-filter_complex").arg(graph.replace('\n', ""));
    }

    if options.include_video {
        cmd.args(["-map", "[outv]", "-map", "[outa]"])
            .args(["-c:v", options.video_codec.as_str()])
            .args(["-preset", options.preset.as_str()])
            .args(["-crf", options.crf.to_string().as_str()]);
    } else {
        cmd.args(["-map", "[outa]"]);
    }

    cmd.args(["-c:a", options.audio_codec.as_str()])
        .args(["-b:a", options.audio_bitrate.as_str()])
        .args(["-movflags", "+faststart"])
        .arg(output);

    info!(
        "Rendering {} segments from {} to {}",
        keep.len(),
        input.display(),
        output.display()
    );

    let result = cmd
        .output()
        .await
        .map_err(|e| SilenceCutError::Export(format!("Failed to run FFmpeg: {e}")))?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        return Err(SilenceCutError::Export(format!(
            "FFmpeg render failed: {}",
            stderr.lines().last().unwrap_or("Unknown error")
        )));
    }

    info!("Rendered {}", output.display());
    Ok(())
}
