use crate::error::{Result, SilenceCutError};
use crate::params::{ContentType, Preset};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which segmenter produces the kept segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMode {
    /// Word timestamps from a transcription.
    #[default]
    Transcript,
    /// RMS energy of the audio alone.
    Energy,
}

impl std::fmt::Display for DetectionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectionMode::Transcript => write!(f, "transcript"),
            DetectionMode::Energy => write!(f, "energy"),
        }
    }
}

impl std::str::FromStr for DetectionMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "transcript" => Ok(DetectionMode::Transcript),
            "energy" => Ok(DetectionMode::Energy),
            _ => Err(format!(
                "Unknown mode: {}. Use 'transcript' or 'energy'",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub groq_api_key: Option<String>,
    /// OpenAI-compatible base URL used for transcription and advice.
    pub api_base_url: Option<String>,
    pub transcription_model: Option<String>,
    pub advisor_model: Option<String>,
    pub default_preset: Preset,
    pub default_content_type: ContentType,
    pub default_mode: DetectionMode,
    pub fps: u32,
    pub frame_size_ms: f64,
    pub use_advisor: bool,
    pub history_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            groq_api_key: None,
            api_base_url: None,
            transcription_model: None,
            advisor_model: None,
            default_preset: Preset::default(),
            default_content_type: ContentType::default(),
            default_mode: DetectionMode::default(),
            fps: 30,
            frame_size_ms: 20.0,
            use_advisor: true,
            history_dir: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        // Load from config file if it exists
        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                let contents = std::fs::read_to_string(&config_path)?;
                config = toml::from_str::<Config>(&contents).map_err(|e| {
                    SilenceCutError::Config(format!(
                        "Invalid config file {}: {}",
                        config_path.display(),
                        e
                    ))
                })?;
            }
        }

        config.apply_env();
        Ok(config)
    }

    /// Override fields from environment variables. Unparseable values are ignored.
    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("GROQ_API_KEY") {
            if !key.trim().is_empty() {
                self.groq_api_key = Some(key);
            }
        }
        if let Ok(url) = std::env::var("SILENCECUT_API_BASE_URL") {
            self.api_base_url = Some(url);
        }
        if let Ok(preset) = std::env::var("SILENCECUT_DEFAULT_PRESET") {
            if let Ok(p) = preset.parse() {
                self.default_preset = p;
            }
        }
        if let Ok(mode) = std::env::var("SILENCECUT_DEFAULT_MODE") {
            if let Ok(m) = mode.parse() {
                self.default_mode = m;
            }
        }
        if let Ok(fps) = std::env::var("SILENCECUT_FPS") {
            if let Ok(f) = fps.parse() {
                self.fps = f;
            }
        }
        if let Ok(flag) = std::env::var("SILENCECUT_USE_ADVISOR") {
            if let Ok(b) = flag.parse() {
                self.use_advisor = b;
            }
        }
    }

    pub fn validate(&self, mode: DetectionMode) -> Result<()> {
        if mode == DetectionMode::Transcript && self.groq_api_key.is_none() {
            return Err(SilenceCutError::Config(
                "GROQ_API_KEY not set. Transcript mode needs it; export it or use --mode energy"
                    .to_string(),
            ));
        }

        if self.fps == 0 {
            return Err(SilenceCutError::Config(
                "FPS must be greater than 0".to_string(),
            ));
        }

        if !(5.0..=100.0).contains(&self.frame_size_ms) {
            return Err(SilenceCutError::Config(format!(
                "Frame size must be between 5 and 100 ms, got {}",
                self.frame_size_ms
            )));
        }

        Ok(())
    }

    /// Whether the parameter advisor can be used.
    pub fn advisor_enabled(&self) -> bool {
        self.use_advisor && self.groq_api_key.is_some()
    }

    pub fn history_dir(&self) -> PathBuf {
        self.history_dir
            .clone()
            .unwrap_or_else(crate::history::FileStore::default_dir)
    }

    fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("silencecut").join("config.toml"))
    }
}
