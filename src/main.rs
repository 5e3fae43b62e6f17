use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use silencecut::config::{Config, DetectionMode};
use silencecut::export::{
    default_output_path, render_cut, write_export, ExportContext, ExportFormat, RenderOptions,
};
use silencecut::history::{FileStore, HistoryEntry, HistoryStore};
use silencecut::params::{ContentType, ParamOverrides, Preset, UserSettings};
use silencecut::pipeline::{print_summary, run_silence_cut, PipelineConfig};
use silencecut::audio::has_video_stream;
use silencecut::cut::enabled_segments;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "silencecut")]
#[command(version, about = "Remove silence from talking-head videos")]
#[command(long_about = "Detect silence in video/audio files from word timestamps or audio energy, then export a cut list, an EDL or a rendered file.")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Detect silence in a file and export the cuts
    Run(RunArgs),
    /// Inspect or edit the export history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Input video/audio file
    input: PathBuf,

    /// Detection mode: transcript, energy
    #[arg(short, long)]
    mode: Option<String>,

    /// Preset: gentle, normal, aggressive
    #[arg(short, long)]
    preset: Option<String>,

    /// Content type: talking_head, tutorial, podcast, screen_recording
    #[arg(short, long)]
    content_type: Option<String>,

    /// Source language code (e.g., en, ja, es)
    #[arg(short, long, default_value = "en")]
    language: String,

    /// Only silences longer than this are removed (ms)
    #[arg(long)]
    min_silence_ms: Option<f64>,

    /// 0 (tight) to 100 (natural)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    naturalness: Option<u8>,

    /// Export formats: json, edl, both
    #[arg(short, long, default_value = "both")]
    format: String,

    /// Directory for exports (defaults to the input's directory)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Frame rate used for EDL timecodes
    #[arg(long)]
    fps: Option<u32>,

    /// Also render the cut media to this path
    #[arg(long)]
    render: Option<PathBuf>,

    /// Skip the parameter advisor and use the preset table
    #[arg(long)]
    no_advisor: bool,

    /// Do not record this run in the history
    #[arg(long)]
    no_history: bool,

    #[command(flatten)]
    tuning: TuningArgs,
}

/// Explicit overrides for single detection parameters.
#[derive(Args)]
struct TuningArgs {
    #[arg(long)]
    energy_multiplier: Option<f64>,
    #[arg(long)]
    minimum_speech_ms: Option<f64>,
    #[arg(long)]
    merge_gap_ms: Option<f64>,
    #[arg(long)]
    keep_short_pauses_ms: Option<f64>,
    #[arg(long)]
    pre_pad_ms: Option<f64>,
    #[arg(long)]
    post_pad_ms: Option<f64>,
    #[arg(long)]
    max_cuts_per_minute: Option<f64>,
}

impl From<&TuningArgs> for ParamOverrides {
    fn from(args: &TuningArgs) -> Self {
        ParamOverrides {
            energy_multiplier: args.energy_multiplier,
            minimum_silence_ms: None,
            minimum_speech_ms: args.minimum_speech_ms,
            merge_gap_ms: args.merge_gap_ms,
            keep_short_pauses_under_ms: args.keep_short_pauses_ms,
            pre_pad_ms: args.pre_pad_ms,
            post_pad_ms: args.post_pad_ms,
            max_jump_cut_rate_per_minute: args.max_cuts_per_minute,
        }
    }
}

#[derive(Subcommand)]
enum HistoryAction {
    /// List past exports, newest first
    List,
    /// Show one entry as JSON
    Show { id: String },
    /// Delete one entry
    Delete { id: String },
    /// Delete all entries
    Clear,
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

fn parse_formats(raw: &str) -> Result<Vec<ExportFormat>> {
    match raw.to_lowercase().as_str() {
        "json" => Ok(vec![ExportFormat::Json]),
        "edl" => Ok(vec![ExportFormat::Edl]),
        "both" => Ok(vec![ExportFormat::Json, ExportFormat::Edl]),
        _ => anyhow::bail!("Unknown format: {}. Use 'json', 'edl', or 'both'", raw),
    }
}

fn export_path(input: &Path, output_dir: Option<&Path>, format: ExportFormat) -> PathBuf {
    let path = default_output_path(input, format);
    match (output_dir, path.file_name()) {
        (Some(dir), Some(name)) => dir.join(name),
        _ => path,
    }
}

fn history_store(config: &Config) -> HistoryStore<FileStore> {
    HistoryStore::new(FileStore::new(config.history_dir()))
}

async fn run(args: RunArgs, config: Config) -> Result<()> {
    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let mode: DetectionMode = match args.mode {
        Some(ref m) => m.parse().map_err(|e: String| anyhow::anyhow!(e))?,
        None => config.default_mode,
    };
    let preset: Preset = match args.preset {
        Some(ref p) => p.parse().map_err(|e: String| anyhow::anyhow!(e))?,
        None => config.default_preset,
    };
    let content_type: ContentType = match args.content_type {
        Some(ref c) => c.parse().map_err(|e: String| anyhow::anyhow!(e))?,
        None => config.default_content_type,
    };
    let formats = parse_formats(&args.format)?;

    let mut config = config;
    if args.no_advisor {
        config.use_advisor = false;
    }
    if let Some(fps) = args.fps {
        config.fps = fps;
    }
    config
        .validate(mode)
        .context("Configuration validation failed")?;

    info!("Input:    {}", args.input.display());
    info!("Mode:     {}", mode);
    info!("Preset:   {} ({})", preset, content_type);
    info!(
        "Advisor:  {}",
        if config.advisor_enabled() { "groq" } else { "off" }
    );

    let pipeline_config = PipelineConfig {
        mode,
        settings: UserSettings {
            preset,
            content_type,
            min_silence_to_remove_ms: args.min_silence_ms,
            naturalness: args.naturalness,
        },
        overrides: ParamOverrides::from(&args.tuning),
        frame_size_ms: config.frame_size_ms,
        language: args.language.clone(),
        show_progress: true,
    };

    let cancelled = Arc::new(AtomicBool::new(false));
    let handler_flag = cancelled.clone();
    ctrlc::set_handler(move || {
        warn!("Interrupted, stopping after the current stage");
        handler_flag.store(true, Ordering::Relaxed);
    })
    .context("Failed to install Ctrl+C handler")?;

    let result = run_silence_cut(&args.input, &config, pipeline_config, cancelled)
        .await
        .context("Silence detection failed")?;

    let segments = &result.plan.segments;
    let file_name = args
        .input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input".to_string());
    let context =
        ExportContext::new(file_name.clone(), result.plan.summary.original_duration).with_fps(config.fps);

    if let Some(ref dir) = args.output_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    for format in formats {
        let path = export_path(&args.input, args.output_dir.as_deref(), format);
        write_export(format, segments, &context, &path)
            .with_context(|| format!("Failed to export {}", format))?;
    }

    if let Some(ref output) = args.render {
        let include_video = has_video_stream(&args.input).unwrap_or(false);
        let options = if include_video {
            RenderOptions::default()
        } else {
            RenderOptions::audio_only()
        };
        render_cut(&args.input, output, segments, &options)
            .await
            .context("Render failed")?;
    }

    if !args.no_history {
        let entry = HistoryEntry::new(
            file_name,
            result.plan.summary.original_duration,
            result.plan.summary.kept_duration,
            preset,
            content_type,
            enabled_segments(segments),
        );
        if let Err(e) = history_store(&config).save(entry) {
            warn!("Could not save history: {}", e);
        }
    }

    print_summary(&result);
    Ok(())
}

fn history(action: HistoryAction, config: &Config) -> Result<()> {
    let store = history_store(config);

    match action {
        HistoryAction::List => {
            let entries = store.list().context("Failed to read history")?;
            if entries.is_empty() {
                println!("No history yet");
            }
            for entry in entries {
                let when = chrono::DateTime::from_timestamp_millis(entry.timestamp)
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default();
                println!(
                    "{}  {}  {}  {:.1}s -> {:.1}s ({} cuts, {})",
                    entry.id,
                    when,
                    entry.file_name,
                    entry.original_duration,
                    entry.final_duration,
                    entry.number_of_cuts,
                    entry.preset
                );
            }
        }
        HistoryAction::Show { id } => {
            let entry = store
                .get(&id)
                .context("Failed to read history")?
                .with_context(|| format!("No history entry {}", id))?;
            println!("{}", serde_json::to_string_pretty(&entry)?);
        }
        HistoryAction::Delete { id } => {
            if store.delete(&id).context("Failed to update history")? {
                info!("Deleted {}", id);
            } else {
                anyhow::bail!("No history entry {}", id);
            }
        }
        HistoryAction::Clear => {
            store.clear().context("Failed to clear history")?;
            info!("History cleared");
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let config = Config::load().context("Failed to load configuration")?;

    match cli.command {
        Command::Run(args) => run(args, config).await,
        Command::History { action } => history(action, &config),
    }
}
