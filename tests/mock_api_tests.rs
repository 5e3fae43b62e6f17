//! Mock API tests for the transcription client and the parameter advisor
//!
//! These tests run the HTTP adapters against a local wiremock server.

use serde_json::json;
use silencecut::cut::Segment;
use silencecut::error::SilenceCutError;
use silencecut::params::{
    resolve_params, AdviceRequest, ContentType, GroqAdvisor, ParameterAdvisor, ParamsSource,
    Preset, StatsSummary,
};
use silencecut::transcribe::{Transcriber, WhisperClient};
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Whisper API Mock Tests
// ============================================================================

mod whisper_tests {
    use super::*;

    fn audio_file(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("audio.wav");
        std::fs::write(&path, b"RIFF0000WAVEfmt fake audio").unwrap();
        path
    }

    fn client(server: &MockServer) -> WhisperClient {
        WhisperClient::new("test-key".to_string())
            .with_base_url(server.uri())
            .with_retry_delay(Duration::from_millis(10))
    }

    #[tokio::test]
    async fn test_transcribe_with_segment_words() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/transcriptions"))
            .and(header("Authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "text": " hello world ",
                "language": "english",
                "duration": 3.0,
                "segments": [{
                    "id": 0, "start": 0.0, "end": 2.0, "text": " hello world",
                    "words": [
                        {"word": " hello", "start": 0.1, "end": 0.5},
                        {"word": "world", "start": 0.9, "end": 1.4}
                    ]
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let result = client(&server).transcribe(&audio_file(&dir)).await.unwrap();

        assert_eq!(result.text, "hello world");
        assert_eq!(result.language, "english");
        assert_eq!(result.duration, 3.0);
        assert_eq!(result.segments.len(), 1);
        assert_eq!(result.word_count(), 2);
        let words = result.segments[0].words.as_ref().unwrap();
        assert_eq!(words[0].word, "hello");
        assert_eq!(words[1].start, 0.9);
    }

    #[tokio::test]
    async fn test_top_level_words_are_attached() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/transcriptions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "text": "one two three",
                "duration": 6.0,
                "segments": [
                    {"id": 0, "start": 0.0, "end": 2.0, "text": "one two"},
                    {"id": 1, "start": 4.0, "end": 6.0, "text": "three"}
                ],
                "words": [
                    {"word": "one", "start": 0.2, "end": 0.6},
                    {"word": "two", "start": 2.5, "end": 2.9},
                    {"word": "three", "start": 4.2, "end": 4.8}
                ]
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let result = client(&server).transcribe(&audio_file(&dir)).await.unwrap();

        // "two" falls in the gap and belongs to the last segment starting before it
        let first: Vec<&str> = result.segments[0]
            .words
            .as_ref()
            .unwrap()
            .iter()
            .map(|w| w.word.as_str())
            .collect();
        assert_eq!(first, vec!["one", "two"]);
        assert_eq!(result.segments[1].words.as_ref().unwrap()[0].word, "three");
        assert_eq!(result.language, "unknown");
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/transcriptions"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"message": "Invalid API key"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let err = client(&server)
            .transcribe(&audio_file(&dir))
            .await
            .unwrap_err();

        assert!(matches!(err, SilenceCutError::ExternalService(_)));
        assert!(err.to_string().contains("401"));
        assert!(err.to_string().contains("Invalid API key"));
    }

    #[tokio::test]
    async fn test_server_error_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/transcriptions"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .expect(3)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let err = client(&server)
            .transcribe(&audio_file(&dir))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_oversized_file_is_rejected_before_upload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.wav");
        let file = std::fs::File::create(&path).unwrap();
        file.set_len(26 * 1024 * 1024).unwrap();

        let client = client(&server);
        assert_eq!(client.max_file_size(), 25 * 1024 * 1024);
        let err = client.transcribe(&path).await.unwrap_err();
        assert!(matches!(err, SilenceCutError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let server = MockServer::start().await;
        let result = client(&server)
            .transcribe(&PathBuf::from("/tmp/nonexistent_test.wav"))
            .await;
        assert!(matches!(result, Err(SilenceCutError::Io(_))));
    }
}

// ============================================================================
// Groq Advisor Mock Tests
// ============================================================================

mod advisor_tests {
    use super::*;

    fn request(preset: Preset) -> AdviceRequest {
        AdviceRequest {
            preset,
            content_type: ContentType::Podcast,
            language: "en".to_string(),
            stats: StatsSummary {
                noise_floor_rms: 0.002,
                rms_p10: 0.003,
                rms_p50: 0.08,
                rms_p90: 0.3,
            },
            initial_segments: vec![Segment::new(0.5, 4.0), Segment::new(5.0, 9.0)],
            pause_stats: None,
        }
    }

    fn chat_reply(content: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        }))
    }

    const VALID_PARAMS: &str = r#"{"energyMultiplier": 3.0, "minimumSilenceMs": 600, "minimumSpeechMs": 150, "mergeGapMs": 250, "keepShortPausesUnderMs": 350, "prePadMs": 120, "postPadMs": 200, "maxJumpCutRatePerMinute": 18, "notes": "relaxed podcast pacing"}"#;

    fn advisor_for(server: &MockServer) -> GroqAdvisor {
        GroqAdvisor::new("gsk-test".to_string()).with_base_url(server.uri())
    }

    #[tokio::test]
    async fn test_advice_is_parsed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer gsk-test"))
            .respond_with(chat_reply(VALID_PARAMS))
            .expect(1)
            .mount(&server)
            .await;

        let advisor = advisor_for(&server);
        let advised = advisor.advise(&request(Preset::Normal)).await.unwrap();

        assert_eq!(advised.params.energy_multiplier, 3.0);
        assert_eq!(advised.params.max_jump_cut_rate_per_minute, 18.0);
        assert_eq!(advised.notes, "relaxed podcast pacing");
        assert_eq!(advisor.name(), "groq");
    }

    #[tokio::test]
    async fn test_fenced_reply_is_unwrapped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(chat_reply(&format!("```json\n{VALID_PARAMS}\n```")))
            .mount(&server)
            .await;

        let advised = advisor_for(&server)
            .advise(&request(Preset::Normal))
            .await
            .unwrap();
        assert_eq!(advised.params.merge_gap_ms, 250.0);
    }

    #[tokio::test]
    async fn test_rate_limit_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = advisor_for(&server)
            .advise(&request(Preset::Normal))
            .await
            .unwrap_err();
        assert!(matches!(err, SilenceCutError::ExternalService(ref m) if m.contains("rate limited")));
    }

    #[tokio::test]
    async fn test_non_json_reply_is_a_service_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(chat_reply("I think you should cut more."))
            .mount(&server)
            .await;

        let err = advisor_for(&server)
            .advise(&request(Preset::Normal))
            .await
            .unwrap_err();
        assert!(matches!(err, SilenceCutError::ExternalService(_)));
    }

    #[tokio::test]
    async fn test_server_failure_falls_back_to_preset() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let advisor = advisor_for(&server);
        let resolved = resolve_params(Some(&advisor), &request(Preset::Aggressive))
            .await
            .unwrap();

        assert_eq!(resolved.source, ParamsSource::Fallback);
        assert_eq!(resolved.params, Preset::Aggressive.fallback_params());
    }

    #[tokio::test]
    async fn test_out_of_range_reply_falls_back_to_preset() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(chat_reply(&VALID_PARAMS.replace("3.0", "0.5")))
            .mount(&server)
            .await;

        let advisor = advisor_for(&server);
        let resolved = resolve_params(Some(&advisor), &request(Preset::Gentle))
            .await
            .unwrap();

        assert_eq!(resolved.source, ParamsSource::Fallback);
        assert_eq!(resolved.params, Preset::Gentle.fallback_params());
        assert!(resolved.notes.contains("invalid"));
    }

    #[tokio::test]
    async fn test_valid_reply_is_used() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(chat_reply(VALID_PARAMS))
            .mount(&server)
            .await;

        let advisor = advisor_for(&server);
        let resolved = resolve_params(Some(&advisor), &request(Preset::Normal))
            .await
            .unwrap();

        assert_eq!(resolved.source, ParamsSource::Advisor);
        assert_eq!(resolved.params.pre_pad_ms, 120.0);
    }
}
