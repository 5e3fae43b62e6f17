pub mod audio;
pub mod config;
pub mod cut;
pub mod error;
pub mod export;
pub mod history;
pub mod params;
pub mod pipeline;
pub mod transcribe;

pub use config::{Config, DetectionMode};
pub use cut::{CutSummary, Segment, SpeechSegment};
pub use error::{Result, SilenceCutError};
pub use params::{DetectionParams, Preset, ContentType, UserSettings};
pub use pipeline::{
    plan_cuts, print_summary, run_silence_cut, CutPlan, PipelineConfig, PipelineResult, Stage,
    StageReport,
};
