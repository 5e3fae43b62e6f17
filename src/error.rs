use thiserror::Error;

#[derive(Error, Debug)]
pub enum SilenceCutError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Audio extraction failed: {0}")]
    AudioExtraction(String),

    #[error("External service failed: {0}")]
    ExternalService(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Export failed: {0}")]
    Export(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Pipeline cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

impl SilenceCutError {
    /// Whether the refinement stage may recover from this error with the
    /// preset fallback table.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, SilenceCutError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, SilenceCutError>;
