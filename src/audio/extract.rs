use std::path::Path;
use std::process::Command;
use std::time::Duration;

use hound::{SampleFormat, WavReader};
use tracing::{debug, info};

use crate::error::{Result, SilenceCutError};

use super::{AudioMetadata, DecodedAudio};

/// Sample rate of the analysis WAV.
pub const ANALYSIS_SAMPLE_RATE: u32 = 16000;

/// Check if FFmpeg is installed and accessible.
pub fn check_ffmpeg() -> Result<()> {
    let output = Command::new("ffmpeg")
        .arg("-version")
        .output()
        .map_err(|e| {
            SilenceCutError::AudioExtraction(format!(
                "FFmpeg not found. Please install FFmpeg and ensure it's in your PATH. Error: {e}"
            ))
        })?;

    if !output.status.success() {
        return Err(SilenceCutError::AudioExtraction(
            "FFmpeg check failed".to_string(),
        ));
    }

    debug!("FFmpeg is available");
    Ok(())
}

/// Check if FFprobe is installed and accessible.
pub fn check_ffprobe() -> Result<()> {
    let output = Command::new("ffprobe")
        .arg("-version")
        .output()
        .map_err(|e| {
            SilenceCutError::AudioExtraction(format!(
                "FFprobe not found. Please install FFmpeg (includes FFprobe). Error: {e}"
            ))
        })?;

    if !output.status.success() {
        return Err(SilenceCutError::AudioExtraction(
            "FFprobe check failed".to_string(),
        ));
    }

    debug!("FFprobe is available");
    Ok(())
}

/// Get media duration using FFprobe.
pub fn get_audio_duration(input: &Path) -> Result<Duration> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(input)
        .output()
        .map_err(|e| SilenceCutError::AudioExtraction(format!("Failed to run FFprobe: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SilenceCutError::AudioExtraction(format!(
            "FFprobe failed: {stderr}"
        )));
    }

    parse_duration(&String::from_utf8_lossy(&output.stdout))
}

fn parse_duration(raw: &str) -> Result<Duration> {
    let duration_secs: f64 = raw.trim().parse().map_err(|e| {
        SilenceCutError::AudioExtraction(format!("Failed to parse duration '{}': {e}", raw.trim()))
    })?;

    if !duration_secs.is_finite() || duration_secs < 0.0 {
        return Err(SilenceCutError::AudioExtraction(format!(
            "Invalid duration: {duration_secs}"
        )));
    }

    Ok(Duration::from_secs_f64(duration_secs))
}

/// Whether the input carries at least one video stream.
pub fn has_video_stream(input: &Path) -> Result<bool> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=codec_type",
            "-of",
            "csv=p=0",
        ])
        .arg(input)
        .output()
        .map_err(|e| SilenceCutError::AudioExtraction(format!("Failed to run FFprobe: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SilenceCutError::AudioExtraction(format!(
            "FFprobe failed: {stderr}"
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).contains("video"))
}

/// Extract the audio track of a video/audio file into WAV.
///
/// The output is mono 16-bit PCM at 16kHz, enough for energy analysis and
/// small enough to upload for transcription.
pub async fn extract_audio(input: &Path, output: &Path) -> Result<AudioMetadata> {
    if !input.exists() {
        return Err(SilenceCutError::FileNotFound(input.display().to_string()));
    }

    info!("Extracting audio from {}", input.display());

    let duration = get_audio_duration(input)?;
    debug!("Input duration: {:?}", duration);

    let sample_rate = ANALYSIS_SAMPLE_RATE.to_string();
    let status = tokio::process::Command::new("ffmpeg")
        .args(["-y", "-v", "error", "-i"])
        .arg(input)
        .args(["-vn", "-acodec", "pcm_s16le", "-ar", sample_rate.as_str(), "-ac", "1"])
        .arg(output)
        .status()
        .await
        .map_err(|e| SilenceCutError::AudioExtraction(format!("Failed to run FFmpeg: {e}")))?;

    if !status.success() {
        return Err(SilenceCutError::AudioExtraction(
            "FFmpeg audio extraction failed".to_string(),
        ));
    }

    if !output.exists() {
        return Err(SilenceCutError::AudioExtraction(
            "Output file was not created".to_string(),
        ));
    }

    info!("Audio extracted to {}", output.display());

    Ok(AudioMetadata {
        duration,
        sample_rate: ANALYSIS_SAMPLE_RATE,
        channels: 1,
    })
}

/// Decode a WAV file into mono samples in [-1, 1].
///
/// Integer and float formats are accepted; multiple channels are averaged.
pub fn decode_wav(path: &Path) -> Result<DecodedAudio> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    debug!(
        "Decoding WAV: {} Hz, {} channels, {} bits",
        spec.sample_rate, spec.channels, spec.bits_per_sample
    );

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()?
        }
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<_, _>>()?,
    };

    let samples: Vec<f32> = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };

    Ok(DecodedAudio::new(samples, spec.sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};
    use tempfile::tempdir;

    fn ffmpeg_available() -> bool {
        Command::new("ffmpeg")
            .arg("-version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    #[test]
    fn test_check_ffmpeg() {
        let result = check_ffmpeg();
        if !ffmpeg_available() {
            eprintln!("Skipping test: FFmpeg not available or broken");
            return;
        }
        assert!(result.is_ok(), "FFmpeg check failed: {:?}", result.err());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("12.5\n").unwrap(), Duration::from_millis(12500));
        assert!(parse_duration("N/A").is_err());
        assert!(parse_duration("-1").is_err());
    }

    #[test]
    fn test_decode_mono_int_wav() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for _ in 0..8000 {
            writer.write_sample(16384i16).unwrap();
        }
        writer.finalize().unwrap();

        let audio = decode_wav(&path).unwrap();
        assert_eq!(audio.sample_rate, 16000);
        assert_eq!(audio.samples.len(), 8000);
        assert!((audio.samples[0] - 0.5).abs() < 1e-4);
        assert!((audio.duration_secs() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_decode_stereo_float_wav_averages_channels() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for _ in 0..100 {
            writer.write_sample(0.8f32).unwrap();
            writer.write_sample(0.2f32).unwrap();
        }
        writer.finalize().unwrap();

        let audio = decode_wav(&path).unwrap();
        assert_eq!(audio.samples.len(), 100);
        assert!((audio.samples[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_decode_missing_file() {
        let err = decode_wav(Path::new("/nonexistent/audio.wav")).unwrap_err();
        assert!(matches!(err, SilenceCutError::Wav(_)));
    }

    #[tokio::test]
    async fn test_extract_audio_file_not_found() {
        let result =
            extract_audio(Path::new("/nonexistent/file.mp4"), Path::new("/tmp/out.wav")).await;
        match &result {
            Err(SilenceCutError::FileNotFound(path)) => {
                assert!(path.contains("nonexistent"));
            }
            Err(other) => {
                panic!("Expected FileNotFound error, got: {other}");
            }
            Ok(_) => {
                panic!("Expected error but got Ok");
            }
        }
    }
}
