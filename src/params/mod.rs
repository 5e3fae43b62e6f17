//! Detection parameters, their hard ranges, and the advisor contract.
//!
//! Every parameter set the pipeline consumes goes through [`DetectionParams::clamped`].
//! Parameters coming from an external advisor are validated instead of clamped:
//! an out-of-range response is discarded in favour of the preset fallback table.

pub mod groq;

use crate::cut::{PauseStats, Segment};
use crate::audio::AudioStats;
use crate::error::{Result, SilenceCutError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use tracing::{debug, info, warn};

pub use groq::GroqAdvisor;

/// How aggressively silence is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Gentle,
    #[default]
    Normal,
    Aggressive,
}

impl std::fmt::Display for Preset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Preset::Gentle => write!(f, "gentle"),
            Preset::Normal => write!(f, "normal"),
            Preset::Aggressive => write!(f, "aggressive"),
        }
    }
}

impl std::str::FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gentle" => Ok(Preset::Gentle),
            "normal" => Ok(Preset::Normal),
            "aggressive" => Ok(Preset::Aggressive),
            _ => Err(format!(
                "Unknown preset: {}. Use 'gentle', 'normal', or 'aggressive'",
                s
            )),
        }
    }
}

impl Preset {
    /// Deterministic parameter table used whenever the advisor is unavailable.
    pub fn fallback_params(&self) -> DetectionParams {
        match self {
            Preset::Gentle => DetectionParams {
                energy_multiplier: 2.0,
                minimum_silence_ms: 800.0,
                minimum_speech_ms: 200.0,
                merge_gap_ms: 300.0,
                keep_short_pauses_under_ms: 500.0,
                pre_pad_ms: 200.0,
                post_pad_ms: 250.0,
                max_jump_cut_rate_per_minute: 15.0,
            },
            Preset::Normal => DetectionParams {
                energy_multiplier: 2.5,
                minimum_silence_ms: 500.0,
                minimum_speech_ms: 200.0,
                merge_gap_ms: 200.0,
                keep_short_pauses_under_ms: 300.0,
                pre_pad_ms: 150.0,
                post_pad_ms: 180.0,
                max_jump_cut_rate_per_minute: 25.0,
            },
            Preset::Aggressive => DetectionParams {
                energy_multiplier: 3.5,
                minimum_silence_ms: 300.0,
                minimum_speech_ms: 150.0,
                merge_gap_ms: 150.0,
                keep_short_pauses_under_ms: 200.0,
                pre_pad_ms: 100.0,
                post_pad_ms: 120.0,
                max_jump_cut_rate_per_minute: 35.0,
            },
        }
    }

    pub fn fallback_notes(&self) -> &'static str {
        match self {
            Preset::Gentle => "Gentle preset: conservative cuts, preserves natural pacing",
            Preset::Normal => "Default parameters (advisor unavailable)",
            Preset::Aggressive => "Aggressive preset: tight cuts, fast pacing",
        }
    }

    /// One-line guideline used when prompting the advisor.
    pub fn guideline(&self) -> &'static str {
        match self {
            Preset::Gentle => {
                "Preserve natural pacing, only remove obvious long pauses. Good for podcasts, interviews."
            }
            Preset::Normal => "Balanced cuts that feel professional. Good for most content.",
            Preset::Aggressive => {
                "Tight cuts for fast-paced content. Good for tutorials, energetic videos."
            }
        }
    }
}

/// Kind of footage being cut; only used as context for the advisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    #[default]
    TalkingHead,
    Tutorial,
    Podcast,
    ScreenRecording,
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentType::TalkingHead => write!(f, "talking_head"),
            ContentType::Tutorial => write!(f, "tutorial"),
            ContentType::Podcast => write!(f, "podcast"),
            ContentType::ScreenRecording => write!(f, "screen_recording"),
        }
    }
}

impl std::str::FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "talking_head" => Ok(ContentType::TalkingHead),
            "tutorial" => Ok(ContentType::Tutorial),
            "podcast" => Ok(ContentType::Podcast),
            "screen_recording" => Ok(ContentType::ScreenRecording),
            _ => Err(format!(
                "Unknown content type: {}. Use 'talking_head', 'tutorial', 'podcast', or 'screen_recording'",
                s
            )),
        }
    }
}

impl ContentType {
    pub fn guideline(&self) -> &'static str {
        match self {
            ContentType::TalkingHead => {
                "Preserve breathing room, avoid cutting emotion/emphasis pauses"
            }
            ContentType::Tutorial => "Can be tighter, viewers expect efficiency",
            ContentType::Podcast => "Conversational feel is important, preserve natural rhythm",
            ContentType::ScreenRecording => "Usually can be tight, focus on action",
        }
    }
}

pub const ENERGY_MULTIPLIER_RANGE: RangeInclusive<f64> = 1.5..=6.0;
pub const MINIMUM_SILENCE_MS_RANGE: RangeInclusive<f64> = 250.0..=1500.0;
pub const MINIMUM_SPEECH_MS_RANGE: RangeInclusive<f64> = 100.0..=500.0;
pub const MERGE_GAP_MS_RANGE: RangeInclusive<f64> = 100.0..=400.0;
pub const KEEP_SHORT_PAUSES_MS_RANGE: RangeInclusive<f64> = 150.0..=600.0;
pub const PRE_PAD_MS_RANGE: RangeInclusive<f64> = 80.0..=400.0;
pub const POST_PAD_MS_RANGE: RangeInclusive<f64> = 80.0..=400.0;
pub const MAX_CUT_RATE_RANGE: RangeInclusive<f64> = 10.0..=40.0;

/// The eight knobs that drive detection and refinement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionParams {
    /// Multiplier over the noise floor above which a frame counts as speech.
    pub energy_multiplier: f64,
    /// Only silence longer than this is cut.
    pub minimum_silence_ms: f64,
    /// Speech shorter than this is ignored.
    pub minimum_speech_ms: f64,
    /// Speech segments closer than this are merged.
    pub merge_gap_ms: f64,
    /// Pauses at or under this are never cut.
    pub keep_short_pauses_under_ms: f64,
    pub pre_pad_ms: f64,
    pub post_pad_ms: f64,
    /// Cap on cut density.
    pub max_jump_cut_rate_per_minute: f64,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Preset::Normal.fallback_params()
    }
}

impl DetectionParams {
    fn fields(&self) -> [(&'static str, f64, RangeInclusive<f64>); 8] {
        [
            ("energyMultiplier", self.energy_multiplier, ENERGY_MULTIPLIER_RANGE),
            ("minimumSilenceMs", self.minimum_silence_ms, MINIMUM_SILENCE_MS_RANGE),
            ("minimumSpeechMs", self.minimum_speech_ms, MINIMUM_SPEECH_MS_RANGE),
            ("mergeGapMs", self.merge_gap_ms, MERGE_GAP_MS_RANGE),
            (
                "keepShortPausesUnderMs",
                self.keep_short_pauses_under_ms,
                KEEP_SHORT_PAUSES_MS_RANGE,
            ),
            ("prePadMs", self.pre_pad_ms, PRE_PAD_MS_RANGE),
            ("postPadMs", self.post_pad_ms, POST_PAD_MS_RANGE),
            (
                "maxJumpCutRatePerMinute",
                self.max_jump_cut_rate_per_minute,
                MAX_CUT_RATE_RANGE,
            ),
        ]
    }

    /// Check every field against its declared range.
    pub fn validate(&self) -> Result<()> {
        for (name, value, range) in self.fields() {
            if !value.is_finite() || !range.contains(&value) {
                return Err(SilenceCutError::Validation(format!(
                    "{} = {} is outside [{}, {}]",
                    name,
                    value,
                    range.start(),
                    range.end()
                )));
            }
        }
        Ok(())
    }

    /// Copy with every field forced into its range. Non-finite values take the
    /// normal preset value.
    pub fn clamped(&self) -> DetectionParams {
        let defaults = Preset::Normal.fallback_params();
        let clamp = |value: f64, fallback: f64, range: RangeInclusive<f64>| {
            let value = if value.is_finite() { value } else { fallback };
            value.clamp(*range.start(), *range.end())
        };

        DetectionParams {
            energy_multiplier: clamp(
                self.energy_multiplier,
                defaults.energy_multiplier,
                ENERGY_MULTIPLIER_RANGE,
            ),
            minimum_silence_ms: clamp(
                self.minimum_silence_ms,
                defaults.minimum_silence_ms,
                MINIMUM_SILENCE_MS_RANGE,
            ),
            minimum_speech_ms: clamp(
                self.minimum_speech_ms,
                defaults.minimum_speech_ms,
                MINIMUM_SPEECH_MS_RANGE,
            ),
            merge_gap_ms: clamp(self.merge_gap_ms, defaults.merge_gap_ms, MERGE_GAP_MS_RANGE),
            keep_short_pauses_under_ms: clamp(
                self.keep_short_pauses_under_ms,
                defaults.keep_short_pauses_under_ms,
                KEEP_SHORT_PAUSES_MS_RANGE,
            ),
            pre_pad_ms: clamp(self.pre_pad_ms, defaults.pre_pad_ms, PRE_PAD_MS_RANGE),
            post_pad_ms: clamp(self.post_pad_ms, defaults.post_pad_ms, POST_PAD_MS_RANGE),
            max_jump_cut_rate_per_minute: clamp(
                self.max_jump_cut_rate_per_minute,
                defaults.max_jump_cut_rate_per_minute,
                MAX_CUT_RATE_RANGE,
            ),
        }
    }
}

/// Explicit per-knob overrides, typically from the command line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamOverrides {
    pub energy_multiplier: Option<f64>,
    pub minimum_silence_ms: Option<f64>,
    pub minimum_speech_ms: Option<f64>,
    pub merge_gap_ms: Option<f64>,
    pub keep_short_pauses_under_ms: Option<f64>,
    pub pre_pad_ms: Option<f64>,
    pub post_pad_ms: Option<f64>,
    pub max_jump_cut_rate_per_minute: Option<f64>,
}

impl ParamOverrides {
    pub fn is_empty(&self) -> bool {
        *self == ParamOverrides::default()
    }

    pub fn apply(&self, params: DetectionParams) -> DetectionParams {
        DetectionParams {
            energy_multiplier: self.energy_multiplier.unwrap_or(params.energy_multiplier),
            minimum_silence_ms: self.minimum_silence_ms.unwrap_or(params.minimum_silence_ms),
            minimum_speech_ms: self.minimum_speech_ms.unwrap_or(params.minimum_speech_ms),
            merge_gap_ms: self.merge_gap_ms.unwrap_or(params.merge_gap_ms),
            keep_short_pauses_under_ms: self
                .keep_short_pauses_under_ms
                .unwrap_or(params.keep_short_pauses_under_ms),
            pre_pad_ms: self.pre_pad_ms.unwrap_or(params.pre_pad_ms),
            post_pad_ms: self.post_pad_ms.unwrap_or(params.post_pad_ms),
            max_jump_cut_rate_per_minute: self
                .max_jump_cut_rate_per_minute
                .unwrap_or(params.max_jump_cut_rate_per_minute),
        }
        .clamped()
    }
}

/// User-facing knobs: preset, content type and the two sliders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserSettings {
    pub preset: Preset,
    pub content_type: ContentType,
    /// Replaces `minimum_silence_ms` when set.
    pub min_silence_to_remove_ms: Option<f64>,
    /// 0 (tighter) to 100 (more natural). Scales padding and pause retention.
    pub naturalness: Option<u8>,
}

impl UserSettings {
    pub fn apply(&self, params: DetectionParams) -> DetectionParams {
        let mut params = params;

        if let Some(ms) = self.min_silence_to_remove_ms {
            params.minimum_silence_ms = ms;
        }

        if let Some(naturalness) = self.naturalness {
            let k = f64::from(naturalness.min(100)) / 50.0;
            params.keep_short_pauses_under_ms = (200.0 + k * 200.0).round();
            params.pre_pad_ms = (100.0 + k * 100.0).round();
            params.post_pad_ms = (120.0 + k * 130.0).round();
            params.merge_gap_ms = (150.0 + k * 150.0).round();
        }

        params.clamped()
    }
}

/// Energy summary sent to the advisor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSummary {
    pub noise_floor_rms: f64,
    pub rms_p10: f64,
    pub rms_p50: f64,
    pub rms_p90: f64,
}

impl From<&AudioStats> for StatsSummary {
    fn from(stats: &AudioStats) -> Self {
        Self {
            noise_floor_rms: stats.noise_floor_rms,
            rms_p10: stats.rms_p10,
            rms_p50: stats.rms_p50,
            rms_p90: stats.rms_p90,
        }
    }
}

/// Everything the advisor gets to see. It never receives raw audio.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdviceRequest {
    pub preset: Preset,
    pub content_type: ContentType,
    /// Language for the free-text notes.
    pub language: String,
    pub stats: StatsSummary,
    pub initial_segments: Vec<Segment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pause_stats: Option<PauseStats>,
}

/// Advisor answer: a parameter set plus its reasoning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisedParams {
    #[serde(flatten)]
    pub params: DetectionParams,
    #[serde(default)]
    pub notes: String,
}

#[async_trait]
pub trait ParameterAdvisor: Send + Sync {
    async fn advise(&self, request: &AdviceRequest) -> Result<AdvisedParams>;
    fn name(&self) -> &'static str;
}

/// Where the effective parameters came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamsSource {
    Advisor,
    Fallback,
}

impl std::fmt::Display for ParamsSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamsSource::Advisor => write!(f, "advisor"),
            ParamsSource::Fallback => write!(f, "preset fallback"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedParams {
    pub params: DetectionParams,
    pub notes: String,
    pub source: ParamsSource,
}

impl ResolvedParams {
    pub fn fallback(preset: Preset) -> Self {
        Self {
            params: preset.fallback_params(),
            notes: preset.fallback_notes().to_string(),
            source: ParamsSource::Fallback,
        }
    }
}

/// Ask the advisor for tuned parameters, falling back to the preset table when
/// it is absent, fails, or answers outside the declared ranges.
pub async fn resolve_params(
    advisor: Option<&dyn ParameterAdvisor>,
    request: &AdviceRequest,
) -> Result<ResolvedParams> {
    let Some(advisor) = advisor else {
        debug!("No parameter advisor configured, using {} preset", request.preset);
        return Ok(ResolvedParams::fallback(request.preset));
    };

    match advisor.advise(request).await {
        Ok(advised) => match advised.params.validate() {
            Ok(()) => {
                info!("Using parameters from {}", advisor.name());
                Ok(ResolvedParams {
                    params: advised.params,
                    notes: advised.notes,
                    source: ParamsSource::Advisor,
                })
            }
            Err(e) => {
                warn!("{} returned invalid parameters: {}", advisor.name(), e);
                let mut resolved = ResolvedParams::fallback(request.preset);
                resolved.notes = format!(
                    "{} (advisor response was invalid, using defaults)",
                    resolved.notes
                );
                Ok(resolved)
            }
        },
        Err(e) if !e.is_recoverable() => Err(e),
        Err(e) => {
            warn!("{} failed, using {} preset: {}", advisor.name(), request.preset, e);
            Ok(ResolvedParams::fallback(request.preset))
        }
    }
}
