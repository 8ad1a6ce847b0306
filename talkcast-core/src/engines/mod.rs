//! Speech engines and the factory that builds them from configuration

mod espeak;
mod tone;

pub use espeak::{EspeakEngine, DEFAULT_ESPEAK_BINARY};
pub use tone::{ToneEngine, TONE_SAMPLE_RATE};

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::synthesis::{EngineConfig, TtsEngine, TtsError};
use crate::voice_assignment::{VoiceInfo, VoiceSelector};

/// Which engine to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// espeak-ng if it can be executed, otherwise the tone engine
    #[default]
    Auto,
    Tone,
    Espeak,
}

impl std::str::FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(EngineKind::Auto),
            "tone" => Ok(EngineKind::Tone),
            "espeak" | "espeak-ng" => Ok(EngineKind::Espeak),
            other => Err(format!("unknown engine '{}' (expected auto, tone or espeak)", other)),
        }
    }
}

/// Engine wrapper enum for dynamic dispatch
#[derive(Debug, Clone)]
pub enum TtsEngineWrapper {
    Tone(ToneEngine),
    Espeak(EspeakEngine),
}

impl TtsEngine for TtsEngineWrapper {
    fn synthesize(
        &self,
        text: &str,
        voice: &VoiceSelector,
        config: &EngineConfig,
        output_path: &Path,
    ) -> Result<(), TtsError> {
        match self {
            TtsEngineWrapper::Tone(engine) => engine.synthesize(text, voice, config, output_path),
            TtsEngineWrapper::Espeak(engine) => engine.synthesize(text, voice, config, output_path),
        }
    }

    fn list_voices(&self, config: &EngineConfig) -> Result<Vec<VoiceInfo>, TtsError> {
        match self {
            TtsEngineWrapper::Tone(engine) => engine.list_voices(config),
            TtsEngineWrapper::Espeak(engine) => engine.list_voices(config),
        }
    }

    fn engine_name(&self) -> &str {
        match self {
            TtsEngineWrapper::Tone(engine) => engine.engine_name(),
            TtsEngineWrapper::Espeak(engine) => engine.engine_name(),
        }
    }
}

// ============================================================================
// FACTORY
// ============================================================================

/// TTS engine factory
pub struct TtsFactory;

impl TtsFactory {
    pub fn create_tone_engine() -> ToneEngine {
        ToneEngine::new()
    }

    pub fn create_espeak_engine(binary: Option<&Path>) -> EspeakEngine {
        match binary {
            Some(path) => EspeakEngine::new().with_binary(path),
            None => EspeakEngine::new(),
        }
    }

    /// Build the engine for `kind`.
    ///
    /// An explicit `Espeak` request fails with `Unavailable` when the binary
    /// cannot be run; `Auto` degrades to the tone engine instead.
    pub fn create(kind: EngineKind, binary: Option<&Path>) -> Result<TtsEngineWrapper, TtsError> {
        match kind {
            EngineKind::Tone => Ok(TtsEngineWrapper::Tone(Self::create_tone_engine())),
            EngineKind::Espeak => {
                let engine = Self::create_espeak_engine(binary);
                let version = engine.probe()?;
                log::info!("Using {} ({})", version, engine.binary().display());
                Ok(TtsEngineWrapper::Espeak(engine))
            }
            EngineKind::Auto => {
                let engine = Self::create_espeak_engine(binary);
                match engine.probe() {
                    Ok(version) => {
                        log::info!("Using {} ({})", version, engine.binary().display());
                        Ok(TtsEngineWrapper::Espeak(engine))
                    }
                    Err(e) => {
                        log::warn!("{}; falling back to the tone engine", e);
                        Ok(TtsEngineWrapper::Tone(Self::create_tone_engine()))
                    }
                }
            }
        }
    }
}
