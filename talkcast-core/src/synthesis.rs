//! Synthesis Adapter - Turn text into audio clips, one turn at a time
//!
//! This module provides:
//! - The `TtsEngine` trait implemented by speech backends
//! - Engine configuration (rate, volume, language) fixed at construction
//! - A cached voice catalog per engine configuration
//! - Per-turn failure isolation with silent placeholders
//! - Optional concurrent synthesis, reassembled in turn order

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;

use crate::audio_clip::AudioClip;
use crate::dialogue_parser::{DialogueTurn, DEFAULT_WORDS_PER_MINUTE};
use crate::error::SynthesisFailure;
use crate::pipeline::CancelFlag;
use crate::voice_assignment::{VoiceCatalog, VoiceInfo, VoiceSelector};

/// Placeholder length substituted for a failed turn
pub const DEFAULT_PLACEHOLDER_MS: u32 = 500;

/// Default sample rate for placeholders (matches the export default)
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

// ============================================================================
// DATA MODELS
// ============================================================================

/// Errors reported by a speech engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TtsError {
    #[error("Text is empty")]
    EmptyText,

    #[error("TTS engine error: {0}")]
    Engine(String),

    #[error("Unsupported voice: {0}")]
    InvalidVoice(String),

    #[error("Engine not available: {0}")]
    Unavailable(String),

    #[error("File write error: {0}")]
    FileWrite(String),

    #[error("Audio decode error: {0}")]
    Decode(String),
}

/// Engine settings applied uniformly to every call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Speaking rate in words per minute
    pub rate: u32,
    /// Volume from 0.0 to 1.0
    pub volume: f32,
    /// Language variant (e.g. "en", "en-us")
    pub language: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rate: DEFAULT_WORDS_PER_MINUTE,
            volume: 1.0,
            language: "en".to_string(),
        }
    }
}

impl EngineConfig {
    /// Set speaking rate (80 - 450 wpm)
    pub fn with_rate(mut self, rate: u32) -> Self {
        self.rate = rate.clamp(80, 450);
        self
    }

    /// Set volume (0.0 - 1.0)
    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume.clamp(0.0, 1.0);
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }
}

/// How turns are dispatched to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SynthesisMode {
    /// One turn after another on the calling thread
    #[default]
    Sequential,
    /// Up to `max_tasks` turns in flight; results are put back in turn order
    Concurrent { max_tasks: usize },
}

/// Audio produced for one turn (real or placeholder)
#[derive(Debug, Clone)]
pub struct TurnAudio {
    pub index: usize,
    pub speaker: String,
    pub clip: AudioClip,
    /// Set when `clip` is a silent placeholder
    pub failure: Option<SynthesisFailure>,
}

impl TurnAudio {
    pub fn is_placeholder(&self) -> bool {
        self.failure.is_some()
    }
}

/// One unit of concurrent work
#[derive(Debug, Clone)]
pub struct SynthesisJob {
    pub index: usize,
    pub turn: DialogueTurn,
    pub voice: VoiceSelector,
}

// ============================================================================
// TRAIT DEFINITIONS
// ============================================================================

/// Speech engine trait for extensibility
pub trait TtsEngine: Send + Sync + Clone {
    /// Synthesize `text` with `voice` into a WAV file at `output_path`
    fn synthesize(
        &self,
        text: &str,
        voice: &VoiceSelector,
        config: &EngineConfig,
        output_path: &Path,
    ) -> Result<(), TtsError>;

    /// Voices usable with `config`
    fn list_voices(&self, config: &EngineConfig) -> Result<Vec<VoiceInfo>, TtsError>;

    /// Get engine name
    fn engine_name(&self) -> &str;
}

// ============================================================================
// SYNTHESIS ADAPTER
// ============================================================================

/// Wraps an engine with a fixed configuration and per-turn isolation
#[derive(Clone)]
pub struct SynthesisAdapter<E: TtsEngine> {
    engine: E,
    config: Arc<EngineConfig>,
    catalog: Arc<VoiceCatalog>,
    placeholder_ms: u32,
    placeholder_rate: u32,
}

impl<E: TtsEngine> SynthesisAdapter<E> {
    /// Create an adapter, querying the engine's voices once
    pub fn new(engine: E, config: EngineConfig) -> Result<Self, TtsError> {
        let voices = engine.list_voices(&config)?;
        log::info!(
            "{}: {} voices available (language '{}', rate {} wpm)",
            engine.engine_name(),
            voices.len(),
            config.language,
            config.rate
        );

        Ok(Self {
            engine,
            config: Arc::new(config),
            catalog: Arc::new(VoiceCatalog::new(voices)),
            placeholder_ms: DEFAULT_PLACEHOLDER_MS,
            placeholder_rate: DEFAULT_SAMPLE_RATE,
        })
    }

    /// Set the placeholder length and sample rate used for failed turns
    pub fn with_placeholder(mut self, duration_ms: u32, sample_rate: u32) -> Self {
        self.placeholder_ms = duration_ms;
        self.placeholder_rate = sample_rate;
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Cached voice catalog
    pub fn catalog(&self) -> &VoiceCatalog {
        &self.catalog
    }

    pub fn placeholder_ms(&self) -> u32 {
        self.placeholder_ms
    }

    /// Query the engine again and replace the cached catalog
    pub fn refresh_voices(&mut self) -> Result<&VoiceCatalog, TtsError> {
        let voices = self.engine.list_voices(&self.config)?;
        log::info!("{}: voice catalog refreshed ({} voices)", self.engine.engine_name(), voices.len());
        self.catalog = Arc::new(VoiceCatalog::new(voices));
        Ok(&self.catalog)
    }

    /// Apply a new engine configuration and refresh the voice catalog
    pub fn reconfigure(&mut self, config: EngineConfig) -> Result<(), TtsError> {
        self.config = Arc::new(config);
        self.refresh_voices()?;
        Ok(())
    }

    /// Synthesize one utterance, surfacing any engine error
    pub fn synthesize(
        &self,
        text: &str,
        voice: &VoiceSelector,
        artifact: &Path,
    ) -> Result<AudioClip, TtsError> {
        if text.trim().is_empty() {
            return Err(TtsError::EmptyText);
        }

        let result = self
            .engine
            .synthesize(text, voice, &self.config, artifact)
            .and_then(|_| {
                AudioClip::from_wav(artifact).map_err(|e| TtsError::Decode(e.to_string()))
            });

        if artifact.exists() {
            if let Err(e) = std::fs::remove_file(artifact) {
                log::warn!("Failed to remove {}: {}", artifact.display(), e);
            }
        }

        result
    }

    /// Synthesize one turn; failures become a silent placeholder plus a record
    pub fn synthesize_turn(
        &self,
        index: usize,
        turn: &DialogueTurn,
        voice: &VoiceSelector,
        workdir: &Path,
    ) -> TurnAudio {
        let artifact = artifact_path(workdir, index);

        match self.synthesize(&turn.text, voice, &artifact) {
            Ok(clip) => {
                log::debug!(
                    "Turn {} [{}] with '{}': {:.2}s",
                    index,
                    turn.speaker,
                    voice,
                    clip.duration_secs()
                );
                TurnAudio {
                    index,
                    speaker: turn.speaker.clone(),
                    clip,
                    failure: None,
                }
            }
            Err(e) => {
                log::warn!("Turn {} [{}] failed, using silence: {}", index, turn.speaker, e);
                TurnAudio {
                    index,
                    speaker: turn.speaker.clone(),
                    clip: AudioClip::silence(self.placeholder_ms, self.placeholder_rate),
                    failure: Some(SynthesisFailure {
                        turn_index: index,
                        speaker: turn.speaker.clone(),
                        message: e.to_string(),
                    }),
                }
            }
        }
    }

    fn placeholder_for(&self, index: usize, speaker: &str, message: String) -> TurnAudio {
        TurnAudio {
            index,
            speaker: speaker.to_string(),
            clip: AudioClip::silence(self.placeholder_ms, self.placeholder_rate),
            failure: Some(SynthesisFailure {
                turn_index: index,
                speaker: speaker.to_string(),
                message,
            }),
        }
    }
}

impl<E: TtsEngine + 'static> SynthesisAdapter<E> {
    /// Synthesize jobs with at most `max_tasks` in flight.
    ///
    /// The result is ordered by job index regardless of completion order.
    /// `on_done` is called as each job finishes. Once `cancel` is set no new
    /// job is started; unstarted jobs come back as placeholders.
    pub async fn synthesize_concurrent(
        &self,
        jobs: Vec<SynthesisJob>,
        workdir: &Path,
        max_tasks: usize,
        cancel: &CancelFlag,
        mut on_done: impl FnMut(&TurnAudio),
    ) -> Vec<TurnAudio> {
        let max_tasks = max_tasks.max(1);
        let mut join_set = JoinSet::new();
        let mut results: Vec<Option<TurnAudio>> = vec![None; jobs.len()];
        let positions: Vec<(usize, String)> =
            jobs.iter().map(|j| (j.index, j.turn.speaker.clone())).collect();

        for (slot, job) in jobs.into_iter().enumerate() {
            if cancel.is_cancelled() {
                log::info!("Cancelled, not starting turn {}", job.index);
                break;
            }

            let adapter = self.clone();
            let workdir: PathBuf = workdir.to_path_buf();

            join_set.spawn_blocking(move || {
                let audio = adapter.synthesize_turn(job.index, &job.turn, &job.voice, &workdir);
                (slot, audio)
            });

            while join_set.len() >= max_tasks {
                if let Some(done) = join_set.join_next().await {
                    collect(done, &mut results, &mut on_done);
                }
            }
        }

        while let Some(done) = join_set.join_next().await {
            collect(done, &mut results, &mut on_done);
        }

        results
            .into_iter()
            .zip(positions)
            .map(|(audio, (index, speaker))| {
                audio.unwrap_or_else(|| {
                    self.placeholder_for(index, &speaker, "synthesis not completed".to_string())
                })
            })
            .collect()
    }
}

fn collect(
    done: Result<(usize, TurnAudio), tokio::task::JoinError>,
    results: &mut [Option<TurnAudio>],
    on_done: &mut impl FnMut(&TurnAudio),
) {
    match done {
        Ok((slot, audio)) => {
            on_done(&audio);
            results[slot] = Some(audio);
        }
        Err(e) => log::error!("Synthesis task failed: {}", e),
    }
}

/// Intermediate artifact path for a turn
fn artifact_path(workdir: &Path, index: usize) -> PathBuf {
    workdir.join(format!("turn_{:04}.wav", index))
}

// ============================================================================
// TESTS
// ============================================================================
