pub mod edl;
pub mod json;
pub mod render;

pub use edl::{generate_edl, seconds_to_timecode, EdlFormatter};
pub use json::{CutList, JsonFormatter, KeptSegment};
pub use render::{build_filter_graph, render_cut, RenderOptions};

use crate::cut::SpeechSegment;
use crate::error::{Result, SilenceCutError};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::info;

/// Frame rate assumed for timecodes when none is configured.
pub const DEFAULT_FPS: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Edl,
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportFormat::Json => write!(f, "json"),
            ExportFormat::Edl => write!(f, "edl"),
        }
    }
}

impl ExportFormat {
    /// Suffix appended to the source stem, extension included.
    pub fn file_suffix(&self) -> &'static str {
        match self {
            ExportFormat::Json => "_cuts.json",
            ExportFormat::Edl => "_silence_removed.edl",
        }
    }
}

/// Everything an exporter needs besides the segments.
#[derive(Debug, Clone)]
pub struct ExportContext {
    pub source_file_name: String,
    pub original_duration: f64,
    pub fps: u32,
    /// EDL title; defaults to `"<stem> - Silence Removed"`.
    pub title: Option<String>,
    pub exported_at: DateTime<Utc>,
}

impl ExportContext {
    pub fn new(source_file_name: impl Into<String>, original_duration: f64) -> Self {
        Self {
            source_file_name: source_file_name.into(),
            original_duration,
            fps: DEFAULT_FPS,
            title: None,
            exported_at: Utc::now(),
        }
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    pub fn title(&self) -> String {
        self.title
            .clone()
            .unwrap_or_else(|| format!("{} - Silence Removed", file_stem(&self.source_file_name)))
    }
}

pub trait CutListFormatter {
    fn format(&self, segments: &[SpeechSegment], context: &ExportContext) -> Result<String>;
    fn format_name(&self) -> ExportFormat;
}

pub fn create_formatter(format: ExportFormat) -> Box<dyn CutListFormatter> {
    match format {
        ExportFormat::Json => Box::new(JsonFormatter),
        ExportFormat::Edl => Box::new(EdlFormatter),
    }
}

/// File name without its last extension.
pub fn file_stem(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(idx) if idx > 0 => &file_name[..idx],
        _ => file_name,
    }
}

/// `<dir>/<stem><suffix>` next to the input.
pub fn default_output_path(input: &Path, format: ExportFormat) -> PathBuf {
    let name = input
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("output");
    input.with_file_name(format!("{}{}", file_stem(name), format.file_suffix()))
}

/// Format the segments and write them to `path`.
pub fn write_export(
    format: ExportFormat,
    segments: &[SpeechSegment],
    context: &ExportContext,
    path: &Path,
) -> Result<()> {
    let content = create_formatter(format).format(segments, context)?;
    std::fs::write(path, content).map_err(|e| {
        SilenceCutError::Export(format!("Failed to write {}: {e}", path.display()))
    })?;
    info!("Wrote {} export to {}", format, path.display());
    Ok(())
}
