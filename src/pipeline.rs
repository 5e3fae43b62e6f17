use crate::audio::{
    check_ffmpeg, decode_wav, extract_audio, run_initial_detection, DecodedAudio, DetectionResult,
    DEFAULT_FRAME_SIZE_MS,
};
use crate::config::{Config, DetectionMode};
use crate::cut::{
    calculate_pause_stats, enabled_segments, enforce_pacing, refine_segments,
    segments_from_transcription, CutSummary, PauseStats, SpeechSegment,
};
use crate::error::{Result, SilenceCutError};
use crate::params::{
    resolve_params, AdviceRequest, DetectionParams, GroqAdvisor, ParamOverrides,
    ParameterAdvisor, ResolvedParams, UserSettings,
};
use crate::transcribe::{Transcriber, TranscriptionResult, WhisperClient};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Configuration for one silence-removal run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Which segmenter produces the final segments.
    pub mode: DetectionMode,
    /// Preset, content type and the naturalness sliders.
    pub settings: UserSettings,
    /// Per-knob overrides applied last.
    pub overrides: ParamOverrides,
    /// RMS frame length for the energy analysis.
    pub frame_size_ms: f64,
    /// Source language code, sent to transcription and the advisor.
    pub language: String,
    /// Show progress spinners.
    pub show_progress: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: DetectionMode::default(),
            settings: UserSettings::default(),
            overrides: ParamOverrides::default(),
            frame_size_ms: DEFAULT_FRAME_SIZE_MS,
            language: "en".to_string(),
            show_progress: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extraction,
    Transcription,
    Analysis,
    Advice,
    Refinement,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Extraction => write!(f, "extract"),
            Stage::Transcription => write!(f, "transcribe"),
            Stage::Analysis => write!(f, "analyze"),
            Stage::Advice => write!(f, "advise"),
            Stage::Refinement => write!(f, "refine"),
        }
    }
}

/// A completed stage and how long it took.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageReport {
    pub stage: Stage,
    pub elapsed: Duration,
}

impl StageReport {
    fn finished(stage: Stage, started: Instant) -> Self {
        let elapsed = started.elapsed();
        info!("Stage {} done in {:.2}s", stage, elapsed.as_secs_f64());
        Self { stage, elapsed }
    }
}

/// Everything decided for one input: the first energy pass, the parameters
/// and the final keep list.
#[derive(Debug, Clone)]
pub struct CutPlan {
    pub mode: DetectionMode,
    pub detection: DetectionResult,
    pub pause_stats: Option<PauseStats>,
    /// Advisor or fallback answer before user settings.
    pub resolved: ResolvedParams,
    /// Parameters actually used for the final segments.
    pub params: DetectionParams,
    pub segments: Vec<SpeechSegment>,
    pub summary: CutSummary,
    pub stages: Vec<StageReport>,
}

/// Decide which parts of `audio` to keep.
///
/// Runs the energy pass with the preset table, asks the advisor (if any) for
/// tuned parameters, applies user settings and overrides, then builds the
/// final segments with the segmenter selected by `config.mode`.
pub async fn plan_cuts(
    audio: &DecodedAudio,
    transcript: Option<&TranscriptionResult>,
    advisor: Option<&dyn ParameterAdvisor>,
    config: &PipelineConfig,
) -> Result<CutPlan> {
    let total_duration = audio.duration_secs();
    if audio.samples.is_empty() || total_duration <= 0.0 {
        return Err(SilenceCutError::InvalidInput(
            "Audio has zero duration".to_string(),
        ));
    }

    let transcript = match (config.mode, transcript) {
        (DetectionMode::Transcript, None) => {
            return Err(SilenceCutError::InvalidInput(
                "Transcript mode needs a transcription".to_string(),
            ));
        }
        (DetectionMode::Transcript, Some(t)) => Some(t),
        (DetectionMode::Energy, _) => None,
    };

    let mut stages = Vec::new();

    let started = Instant::now();
    let initial_params = config.settings.preset.fallback_params();
    let detection = run_initial_detection(
        &audio.samples,
        audio.sample_rate,
        total_duration,
        config.frame_size_ms,
        &initial_params,
    )?;
    let pause_stats = transcript.map(calculate_pause_stats);
    stages.push(StageReport::finished(Stage::Analysis, started));

    let started = Instant::now();
    let request = AdviceRequest {
        preset: config.settings.preset,
        content_type: config.settings.content_type,
        language: config.language.clone(),
        stats: (&detection.stats).into(),
        initial_segments: enabled_segments(&detection.initial_segments),
        pause_stats,
    };
    let resolved = resolve_params(advisor, &request).await?;
    let params = config
        .overrides
        .apply(config.settings.apply(resolved.params));
    info!("Parameters from {}: {}", resolved.source, resolved.notes);
    debug!("Effective parameters: {:?}", params);
    stages.push(StageReport::finished(Stage::Advice, started));

    let started = Instant::now();
    let segments = match transcript {
        Some(transcript) => {
            let from_words = segments_from_transcription(transcript, &params, total_duration);
            enforce_pacing(&from_words, &params, total_duration)
        }
        None => {
            let tuned = run_initial_detection(
                &audio.samples,
                audio.sample_rate,
                total_duration,
                config.frame_size_ms,
                &params,
            )?;
            refine_segments(&tuned.initial_segments, &params, total_duration)
        }
    };
    let summary = CutSummary::from_segments(&segments, total_duration);
    stages.push(StageReport::finished(Stage::Refinement, started));

    info!(
        "Keeping {} segments: {:.1}s of {:.1}s ({} cuts)",
        summary.segment_count, summary.kept_duration, summary.original_duration, summary.number_of_cuts
    );

    Ok(CutPlan {
        mode: config.mode,
        detection,
        pause_stats,
        resolved,
        params,
        segments,
        summary,
        stages,
    })
}

/// Result of a full run over a media file.
#[derive(Debug)]
pub struct PipelineResult {
    pub input: PathBuf,
    pub plan: CutPlan,
    /// Stage reports including extraction and transcription.
    pub stages: Vec<StageReport>,
    pub total_time: Duration,
    /// Language reported by transcription, if any.
    pub detected_language: Option<String>,
}

/// Cleanup guard that removes the temp directory when dropped.
struct TempCleanupGuard {
    temp_dir: Option<TempDir>,
    cancelled: Arc<AtomicBool>,
}

impl Drop for TempCleanupGuard {
    fn drop(&mut self) {
        if let Some(temp_dir) = self.temp_dir.take() {
            let path = temp_dir.path().to_path_buf();
            if self.cancelled.load(Ordering::Relaxed) {
                warn!("Pipeline cancelled, cleaning up temp files: {:?}", path);
            } else {
                debug!("Cleaning up temp directory: {:?}", path);
            }
        }
    }
}

fn check_cancelled(cancelled: &AtomicBool) -> Result<()> {
    if cancelled.load(Ordering::Relaxed) {
        return Err(SilenceCutError::Cancelled);
    }
    Ok(())
}

fn spinner(progress: Option<&MultiProgress>, message: &str) -> Option<ProgressBar> {
    progress.map(|mp| {
        let pb = mp.add(ProgressBar::new_spinner());
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    })
}

/// Detect silence in a media file and plan the cuts.
///
/// Extracts a 16 kHz mono WAV, transcribes it in transcript mode, runs the
/// energy analysis and asks the advisor when one is configured. Nothing is
/// written next to the input; exporting is left to the caller.
pub async fn run_silence_cut(
    input: &Path,
    config: &Config,
    pipeline_config: PipelineConfig,
    cancelled: Arc<AtomicBool>,
) -> Result<PipelineResult> {
    let start_time = Instant::now();

    if !input.exists() {
        return Err(SilenceCutError::FileNotFound(input.display().to_string()));
    }

    check_ffmpeg().map_err(|_| {
        SilenceCutError::AudioExtraction(
            "FFmpeg not found. Install it with: brew install ffmpeg (macOS) or apt install ffmpeg (Linux)".to_string()
        )
    })?;

    let guard = TempCleanupGuard {
        temp_dir: Some(TempDir::new()?),
        cancelled: cancelled.clone(),
    };
    let temp_path = match guard.temp_dir.as_ref() {
        Some(dir) => dir.path().to_path_buf(),
        None => return Err(SilenceCutError::Cancelled),
    };
    debug!("Using temp directory: {:?}", temp_path);

    let multi_progress = pipeline_config.show_progress.then(MultiProgress::new);
    let mut stages = Vec::new();

    // Stage 1: audio extraction
    check_cancelled(&cancelled)?;
    let started = Instant::now();
    let pb = spinner(multi_progress.as_ref(), "Extracting audio...");

    let audio_path = temp_path.join("audio.wav");
    extract_audio(input, &audio_path).await?;
    let audio = decode_wav(&audio_path)?;
    if audio.samples.is_empty() {
        return Err(SilenceCutError::InvalidInput(format!(
            "No audio samples in {}",
            input.display()
        )));
    }

    if let Some(pb) = pb {
        pb.finish_with_message(format!("✓ Audio extracted ({:.1}s)", audio.duration_secs()));
    }
    stages.push(StageReport::finished(Stage::Extraction, started));

    // Stage 2: transcription
    check_cancelled(&cancelled)?;
    let transcript = match pipeline_config.mode {
        DetectionMode::Transcript => {
            let api_key = config.groq_api_key.clone().ok_or_else(|| {
                SilenceCutError::Config(
                    "GROQ_API_KEY not set. Set it or use --mode energy.".to_string(),
                )
            })?;

            let started = Instant::now();
            let pb = spinner(multi_progress.as_ref(), "Transcribing...");

            let mut client = WhisperClient::new(api_key).with_language(pipeline_config.language.clone());
            if let Some(ref url) = config.api_base_url {
                client = client.with_base_url(url.as_str());
            }
            if let Some(ref model) = config.transcription_model {
                client = client.with_model(model.as_str());
            }
            info!("Transcribing with {}", client.name());
            let transcript = client.transcribe(&audio_path).await?;

            if let Some(pb) = pb {
                pb.finish_with_message(format!(
                    "✓ Transcribed {} words",
                    transcript.word_count()
                ));
            }
            stages.push(StageReport::finished(Stage::Transcription, started));
            Some(transcript)
        }
        DetectionMode::Energy => None,
    };

    // Stage 3: analysis, advice and refinement
    check_cancelled(&cancelled)?;
    let advisor = if config.advisor_enabled() {
        config.groq_api_key.as_ref().map(|key| {
            let mut advisor = GroqAdvisor::new(key.clone());
            if let Some(ref url) = config.api_base_url {
                advisor = advisor.with_base_url(url.as_str());
            }
            if let Some(ref model) = config.advisor_model {
                advisor = advisor.with_model(model.as_str());
            }
            advisor
        })
    } else {
        None
    };

    let pb = spinner(multi_progress.as_ref(), "Detecting silence...");
    let plan = plan_cuts(
        &audio,
        transcript.as_ref(),
        advisor.as_ref().map(|a| a as &dyn ParameterAdvisor),
        &pipeline_config,
    )
    .await?;
    if let Some(pb) = pb {
        pb.finish_with_message(format!(
            "✓ {} segments kept, {:.1}s removed",
            plan.summary.segment_count, plan.summary.time_removed
        ));
    }
    check_cancelled(&cancelled)?;

    stages.extend(plan.stages.iter().copied());

    let detected_language = transcript
        .as_ref()
        .map(|t| t.language.clone())
        .filter(|lang| !lang.is_empty() && lang != "unknown");

    Ok(PipelineResult {
        input: input.to_path_buf(),
        plan,
        stages,
        total_time: start_time.elapsed(),
        detected_language,
    })
}

/// Print a summary of the pipeline results.
pub fn print_summary(result: &PipelineResult) {
    let summary = &result.plan.summary;

    println!();
    println!("═══════════════════════════════════════════════════════════════");
    println!("                      Silence Removal Complete                  ");
    println!("═══════════════════════════════════════════════════════════════");
    println!();
    println!("  Input:      {}", result.input.display());
    println!("  Mode:       {}", result.plan.mode);
    println!("  Params:     {}", result.plan.resolved.source);
    if !result.plan.resolved.notes.is_empty() {
        println!("  Notes:      {}", result.plan.resolved.notes);
    }
    println!();
    println!("  Original:   {:.1}s", summary.original_duration);
    println!("  Kept:       {:.1}s", summary.kept_duration);
    println!(
        "  Removed:    {:.1}s ({:.0}%)",
        summary.time_removed,
        summary.removed_ratio() * 100.0
    );
    println!("  Segments:   {}", summary.segment_count);
    println!("  Cuts:       {}", summary.number_of_cuts);
    println!();
    println!("  Timing:");
    for report in &result.stages {
        println!(
            "    {:<12} {:.2}s",
            format!("{}:", report.stage),
            report.elapsed.as_secs_f64()
        );
    }
    println!("    {:<12} {:.2}s", "total:", result.total_time.as_secs_f64());
    if let Some(ref lang) = result.detected_language {
        println!();
        println!("  Transcribed language: {}", lang);
    }
    println!();
    println!("═══════════════════════════════════════════════════════════════");
}
