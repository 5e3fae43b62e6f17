use crate::error::{Result, SilenceCutError};
use crate::transcribe::{Transcriber, TranscriptionResult, TranscriptionSegment, Word};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::{debug, warn};

/// Groq's OpenAI-compatible API.
pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

pub const DEFAULT_MODEL: &str = "whisper-large-v3-turbo";

/// Maximum upload size accepted by the transcription endpoint (25 MB).
const MAX_FILE_SIZE: usize = 25 * 1024 * 1024;

/// Maximum retries for API calls.
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff.
const BASE_DELAY: Duration = Duration::from_millis(1000);

/// Whisper transcription client for OpenAI-compatible endpoints.
pub struct WhisperClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    language: Option<String>,
    retry_delay: Duration,
}

/// A failed attempt and whether it is worth repeating.
struct AttemptError {
    error: SilenceCutError,
    retryable: bool,
}

impl From<SilenceCutError> for AttemptError {
    fn from(error: SilenceCutError) -> Self {
        Self {
            error,
            retryable: true,
        }
    }
}

impl WhisperClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            language: None,
            retry_delay: BASE_DELAY,
        }
    }

    /// Point the client at another OpenAI-compatible server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the source language (ISO 639-1 code).
    pub fn with_language(mut self, language: String) -> Self {
        self.language = Some(language);
        self
    }

    /// Base delay for exponential backoff between attempts.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/audio/transcriptions", self.base_url)
    }

    /// Build the multipart form for the API request.
    async fn build_form(&self, audio_path: &Path) -> Result<Form> {
        let file_bytes = fs::read(audio_path).await?;
        let file_name = audio_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.wav")
            .to_string();

        let mime_type = match audio_path.extension().and_then(|e| e.to_str()) {
            Some("wav") => "audio/wav",
            Some("mp3") => "audio/mpeg",
            Some("m4a") => "audio/mp4",
            Some("flac") => "audio/flac",
            _ => "application/octet-stream",
        };

        let file_part = Part::bytes(file_bytes)
            .file_name(file_name)
            .mime_str(mime_type)?;

        let mut form = Form::new()
            .part("file", file_part)
            .text("model", self.model.clone())
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "word")
            .text("timestamp_granularities[]", "segment");

        if let Some(ref lang) = self.language {
            form = form.text("language", lang.clone());
        }

        Ok(form)
    }

    /// Make the API request (form is consumed, so no retries at this level).
    async fn call_api(&self, form: Form) -> std::result::Result<WhisperResponse, AttemptError> {
        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await
            .map_err(SilenceCutError::from)?;

        let status = response.status();
        debug!("Whisper API response status: {}", status);

        if status.is_success() {
            let body = response.text().await.map_err(SilenceCutError::from)?;
            debug!("Whisper API response: {}", truncate(&body, 500));
            let parsed: WhisperResponse = serde_json::from_str(&body).map_err(|e| {
                SilenceCutError::ExternalService(format!("Invalid transcription response: {e}"))
            })?;
            return Ok(parsed);
        }

        let error_body = response.text().await.unwrap_or_default();

        let message = match serde_json::from_str::<ApiErrorResponse>(&error_body) {
            Ok(api_error) => format!(
                "Transcription failed ({}): {}",
                status.as_u16(),
                api_error.error.message
            ),
            Err(_) => format!("Transcription failed ({}): {}", status.as_u16(), error_body),
        };

        Err(AttemptError {
            error: SilenceCutError::ExternalService(message),
            retryable: !status.is_client_error(),
        })
    }

    /// Transcribe with retry logic - rebuilds form on each attempt.
    async fn transcribe_with_retry(&self, audio_path: &Path) -> Result<WhisperResponse> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = self.retry_delay * 2u32.pow(attempt - 1);
                debug!("Retry attempt {} after {:?} delay", attempt, delay);
                tokio::time::sleep(delay).await;
            }

            let form = self.build_form(audio_path).await?;

            match self.call_api(form).await {
                Ok(response) => return Ok(response),
                Err(AttemptError {
                    error,
                    retryable: false,
                }) => return Err(error),
                Err(AttemptError { error, .. }) => {
                    warn!("Attempt {} failed: {}", attempt + 1, error);
                    last_error = Some(error);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| SilenceCutError::ExternalService("Unknown error".to_string())))
    }
}

/// Convert the API response into a transcription with words attached to
/// their segments.
fn parse_response(response: WhisperResponse) -> TranscriptionResult {
    let mut segments: Vec<TranscriptionSegment> = response
        .segments
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(index, seg)| TranscriptionSegment {
            id: seg.id.unwrap_or(index as u32),
            start: seg.start,
            end: seg.end,
            text: seg.text.trim().to_string(),
            words: seg.words.map(|words| words.into_iter().map(Word::from).collect()),
        })
        .collect();

    if segments.is_empty() && !response.text.trim().is_empty() {
        segments.push(TranscriptionSegment {
            id: 0,
            start: 0.0,
            end: response.duration,
            text: response.text.trim().to_string(),
            words: None,
        });
    }

    if let Some(words) = response.words {
        for word in words.into_iter().map(Word::from) {
            if let Some(index) = owning_segment(&segments, word.start) {
                segments[index].words.get_or_insert_with(Vec::new).push(word);
            }
        }
    }

    TranscriptionResult {
        text: response.text.trim().to_string(),
        segments,
        language: response.language.unwrap_or_else(|| "unknown".to_string()),
        duration: response.duration,
    }
}

/// Segment whose span contains `start`, else the last one starting before it,
/// else the first.
fn owning_segment(segments: &[TranscriptionSegment], start: f64) -> Option<usize> {
    segments
        .iter()
        .position(|s| start >= s.start && start <= s.end)
        .or_else(|| segments.iter().rposition(|s| s.start <= start))
        .or_else(|| (!segments.is_empty()).then_some(0))
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[async_trait]
impl Transcriber for WhisperClient {
    async fn transcribe(&self, audio_path: &Path) -> Result<TranscriptionResult> {
        debug!("Transcribing {:?} with {}", audio_path, self.model);

        let metadata = fs::metadata(audio_path).await?;
        if metadata.len() as usize > MAX_FILE_SIZE {
            return Err(SilenceCutError::InvalidInput(format!(
                "File too large for transcription: {} bytes (max {} bytes)",
                metadata.len(),
                MAX_FILE_SIZE
            )));
        }

        let response = self.transcribe_with_retry(audio_path).await?;
        let transcription = parse_response(response);

        debug!(
            "Transcription returned {} segments, {} words",
            transcription.segments.len(),
            transcription.word_count()
        );

        Ok(transcription)
    }

    fn name(&self) -> &'static str {
        "Whisper"
    }

    fn max_file_size(&self) -> usize {
        MAX_FILE_SIZE
    }
}

// API response types

#[derive(Debug, Deserialize)]
struct WhisperResponse {
    #[serde(default)]
    text: String,
    #[serde(default)]
    segments: Option<Vec<WhisperSegment>>,
    #[serde(default)]
    words: Option<Vec<WhisperWord>>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    duration: f64,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    #[serde(default)]
    id: Option<u32>,
    #[serde(default)]
    start: f64,
    #[serde(default)]
    end: f64,
    #[serde(default)]
    text: String,
    #[serde(default)]
    words: Option<Vec<WhisperWord>>,
}

#[derive(Debug, Deserialize)]
struct WhisperWord {
    #[serde(default)]
    word: String,
    #[serde(default)]
    start: f64,
    #[serde(default)]
    end: f64,
}

impl From<WhisperWord> for Word {
    fn from(w: WhisperWord) -> Self {
        Word {
            word: w.word.trim().to_string(),
            start: w.start,
            end: w.end,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}
