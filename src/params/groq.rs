//! Parameter advice from an LLM behind Groq's OpenAI-compatible chat API.

use crate::error::{Result, SilenceCutError};
use crate::params::{AdviceRequest, AdvisedParams, ParameterAdvisor, Preset};
use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

const SYSTEM_PROMPT: &str = "You are an audio engineering AI assistant. Output ONLY valid JSON matching the exact schema requested. No markdown code blocks, no explanation outside JSON, just the raw JSON object.";

const TEMPERATURE: f32 = 0.3;

const MAX_TOKENS: u32 = 1000;

/// Advisor that asks a chat model for detection parameters.
pub struct GroqAdvisor {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GroqAdvisor {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Point the advisor at another OpenAI-compatible server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Build the prompt. The model only sees summary statistics, never audio.
    fn build_prompt(&self, request: &AdviceRequest) -> String {
        let stats = &request.stats;
        let dynamic_range = stats.rms_p90 - stats.rms_p10;
        let snr = stats.rms_p50 / stats.noise_floor_rms.max(0.0001);

        let total_segments = request.initial_segments.len();
        let total_speech: f64 = request.initial_segments.iter().map(|s| s.duration()).sum();
        let avg_segment = if total_segments > 0 {
            total_speech / total_segments as f64
        } else {
            0.0
        };
        let total_video = request
            .initial_segments
            .last()
            .map(|s| s.end_seconds)
            .unwrap_or(0.0);
        let speech_ratio = if total_video > 0.0 {
            total_speech / total_video
        } else {
            0.0
        };

        let pause_summary = match &request.pause_stats {
            Some(p) if p.total_pauses > 0 => format!(
                "\n- Pauses between words: {} (avg {:.0}ms, min {:.0}ms, max {:.0}ms; {} short, {} medium, {} long)",
                p.total_pauses,
                p.avg_pause_ms,
                p.min_pause_ms,
                p.max_pause_ms,
                p.distribution.short,
                p.distribution.medium,
                p.distribution.long
            ),
            _ => String::new(),
        };

        let preset_guidelines: String = [Preset::Gentle, Preset::Normal, Preset::Aggressive]
            .iter()
            .map(|p| format!("- {}: {}", p.to_string().to_uppercase(), p.guideline()))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"You are an audio engineer AI that recommends silence-cutting parameters for video editing.

TASK:
Analyze the provided audio statistics and initial speech segments, then recommend parameters that will produce NATURAL-LOOKING cuts. The goal is to remove dead air without making the video feel artificially fast or robotic.

AUDIO ANALYSIS SUMMARY:
- Noise floor RMS: {noise:.6}
- RMS 10th percentile: {p10:.6}
- RMS 50th percentile (median): {p50:.6}
- RMS 90th percentile: {p90:.6}
- Dynamic range (P90-P10): {dynamic_range:.6}
- Signal-to-noise ratio: {snr:.2}x
- Initial segments detected: {total_segments}
- Average segment duration: {avg_segment:.2}s
- Speech ratio: {speech_pct:.1}%{pause_summary}

USER SETTINGS:
- Preset: {preset}
- Content type: {content_type}

PRESET GUIDELINES:
{preset_guidelines}

CONTENT TYPE CONSIDERATIONS:
- {content_type_raw}: {content_guideline}

NATURAL CUT RULES (must inform your recommendations):
1. keepShortPausesUnderMs: Natural speech has micro-pauses (200-400ms). Cutting these makes speech sound unnatural.
2. prePadMs/postPadMs: Too little padding cuts mid-word, too much defeats the purpose.
3. maxJumpCutRatePerMinute: More than 30 cuts/min feels "machine gun". Podcast/gentle content: 10-20 cuts/min max.
4. minimumSilenceMs: Only silence LONGER than this gets cut.
5. mergeGapMs: Speech segments separated by a tiny gap are merged instead of creating a micro-cut.

PARAMETER RANGES (you MUST stay within these):
- energyMultiplier: 1.5 - 6.0 (higher = more aggressive detection)
- minimumSilenceMs: 250 - 1500 (minimum silence to cut)
- minimumSpeechMs: 100 - 500 (ignore speech shorter than this)
- mergeGapMs: 100 - 400 (merge segments closer than this)
- keepShortPausesUnderMs: 150 - 600 (NEVER cut pauses shorter than this)
- prePadMs: 80 - 400 (padding before speech)
- postPadMs: 80 - 400 (padding after speech)
- maxJumpCutRatePerMinute: 10 - 40 (cap on cut density)

RESPOND WITH ONLY A VALID JSON OBJECT (no markdown, no explanation outside JSON):
{{
  "energyMultiplier": <number>,
  "minimumSilenceMs": <number>,
  "minimumSpeechMs": <number>,
  "mergeGapMs": <number>,
  "keepShortPausesUnderMs": <number>,
  "prePadMs": <number>,
  "postPadMs": <number>,
  "maxJumpCutRatePerMinute": <number>,
  "notes": "<brief explanation of your reasoning, in {language}>"
}}"#,
            noise = stats.noise_floor_rms,
            p10 = stats.rms_p10,
            p50 = stats.rms_p50,
            p90 = stats.rms_p90,
            speech_pct = speech_ratio * 100.0,
            preset = request.preset.to_string().to_uppercase(),
            content_type = request.content_type.to_string().replace('_', " "),
            content_type_raw = request.content_type,
            content_guideline = request.content_type.guideline(),
            language = language_code_to_name(&request.language),
        )
    }
}

/// Remove a surrounding markdown code fence, if any.
pub(crate) fn strip_code_fences(content: &str) -> Result<String> {
    let fence = Regex::new(r"(?s)^\s*```[a-zA-Z]*\s*(.*?)\s*```\s*$")
        .map_err(|e| SilenceCutError::ExternalService(format!("Invalid fence pattern: {e}")))?;

    Ok(match fence.captures(content) {
        Some(caps) => caps.get(1).map_or("", |m| m.as_str()).to_string(),
        None => content.trim().to_string(),
    })
}

/// Human-readable language name for the notes instruction.
fn language_code_to_name(code: &str) -> &'static str {
    match code.to_lowercase().as_str() {
        "ru" => "Russian",
        "es" => "Spanish",
        "fr" => "French",
        "de" => "German",
        "pt" => "Portuguese",
        "ja" => "Japanese",
        "id" => "Indonesian",
        _ => "English",
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize, Debug)]
struct ChatChoice {
    message: Option<ChatResponseMessage>,
}

#[derive(Deserialize, Debug)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[async_trait]
impl ParameterAdvisor for GroqAdvisor {
    async fn advise(&self, request: &AdviceRequest) -> Result<AdvisedParams> {
        let prompt = self.build_prompt(request);
        debug!(
            "Requesting parameters from {} ({} initial segments)",
            self.model,
            request.initial_segments.len()
        );

        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| SilenceCutError::ExternalService(format!("Advisor request failed: {e}")))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            SilenceCutError::ExternalService(format!("Failed to read advisor response: {e}"))
        })?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(SilenceCutError::ExternalService("rate limited".to_string()));
        }
        if !status.is_success() {
            return Err(SilenceCutError::ExternalService(format!(
                "Advisor API error ({}): {}",
                status, text
            )));
        }

        let chat: ChatResponse = serde_json::from_str(&text).map_err(|e| {
            SilenceCutError::ExternalService(format!("Failed to parse advisor response: {e}"))
        })?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| SilenceCutError::ExternalService("Empty advisor response".to_string()))?;

        let json = strip_code_fences(&content)?;
        serde_json::from_str::<AdvisedParams>(&json).map_err(|e| {
            warn!("Advisor returned non-JSON content: {}", content);
            SilenceCutError::ExternalService(format!("Failed to parse advisor JSON: {e}"))
        })
    }

    fn name(&self) -> &'static str {
        "groq"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cut::{PauseDistribution, PauseStats, Segment};
    use crate::params::{ContentType, StatsSummary};

    fn request() -> AdviceRequest {
        AdviceRequest {
            preset: Preset::Aggressive,
            content_type: ContentType::ScreenRecording,
            language: "ru".to_string(),
            stats: StatsSummary {
                noise_floor_rms: 0.0,
                rms_p10: 0.01,
                rms_p50: 0.05,
                rms_p90: 0.21,
            },
            initial_segments: vec![Segment::new(0.0, 2.0), Segment::new(3.0, 4.0)],
            pause_stats: None,
        }
    }

    #[test]
    fn test_advisor_creation() {
        let advisor = GroqAdvisor::new("test-key".to_string());
        assert_eq!(advisor.name(), "groq");
        assert_eq!(advisor.model, DEFAULT_MODEL);
        assert_eq!(advisor.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_with_model_and_base_url() {
        let advisor = GroqAdvisor::new("k".to_string())
            .with_model("llama-3.1-8b-instant")
            .with_base_url("http://localhost:8080/v1/");
        assert_eq!(advisor.model, "llama-3.1-8b-instant");
        assert_eq!(advisor.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn test_build_prompt_derived_stats() {
        let advisor = GroqAdvisor::new("k".to_string());
        let prompt = advisor.build_prompt(&request());

        assert!(prompt.contains("Dynamic range (P90-P10): 0.200000"));
        // noise floor of zero is floored at 0.0001
        assert!(prompt.contains("Signal-to-noise ratio: 500.00x"));
        assert!(prompt.contains("Initial segments detected: 2"));
        assert!(prompt.contains("Average segment duration: 1.50s"));
        assert!(prompt.contains("Speech ratio: 75.0%"));
        assert!(prompt.contains("Preset: AGGRESSIVE"));
        assert!(prompt.contains("Content type: screen recording"));
        assert!(prompt.contains("in Russian"));
        assert!(!prompt.contains("Pauses between words"));
    }

    #[test]
    fn test_build_prompt_with_pause_stats() {
        let advisor = GroqAdvisor::new("k".to_string());
        let mut req = request();
        req.pause_stats = Some(PauseStats {
            total_pauses: 4,
            avg_pause_ms: 420.0,
            max_pause_ms: 900.0,
            min_pause_ms: 80.0,
            distribution: PauseDistribution {
                short: 2,
                medium: 1,
                long: 1,
            },
        });
        let prompt = advisor.build_prompt(&req);
        assert!(prompt.contains("Pauses between words: 4 (avg 420ms"));
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```").unwrap(), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```\n{}\n```").unwrap(), "{}");
        assert_eq!(strip_code_fences("  {\"a\": 1}  ").unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn test_language_code_to_name() {
        assert_eq!(language_code_to_name("RU"), "Russian");
        assert_eq!(language_code_to_name("xx"), "English");
    }
}
