//! Error types for the dialogue pipeline
//!
//! Per-turn synthesis problems are not errors here: they are recovered with a
//! silent placeholder and reported as [`SynthesisFailure`] records alongside
//! the successful result.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio_mixer::MixerError;
use crate::config::ConfigError;
use crate::synthesis::TtsError;

/// Fatal pipeline errors
#[derive(Error, Debug)]
pub enum CastError {
    #[error("No valid dialogue found. Use format: [SPEAKER] Text")]
    NoDialogueFound,

    #[error("Speech engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Preview failed: {0}")]
    PreviewFailed(TtsError),

    #[error("Export failed: {0}")]
    Export(MixerError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Generation cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<MixerError> for CastError {
    fn from(err: MixerError) -> Self {
        match err {
            MixerError::Cancelled => CastError::Cancelled,
            other => CastError::Export(other),
        }
    }
}

impl From<TtsError> for CastError {
    fn from(err: TtsError) -> Self {
        CastError::EngineUnavailable(err.to_string())
    }
}

/// Recovered per-turn synthesis failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisFailure {
    pub turn_index: usize,
    pub speaker: String,
    pub message: String,
}

impl std::fmt::Display for SynthesisFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "turn {} [{}]: {}", self.turn_index, self.speaker, self.message)
    }
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, CastError>;
