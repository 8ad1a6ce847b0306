//! Dialogue Pipeline - Text in, one exported audio file out
//!
//! Stages: parse → speaker registry → voice assignment → synthesis and
//! mixing → export. A generation is a single blocking call; progress is
//! reported through an optional callback at each checkpoint and a
//! [`CancelFlag`] is honoured between turns.
//!
//! `generate` must not be called from inside an async runtime. Use
//! [`crate::worker::CastWorker`] or `spawn_blocking` from async code.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::audio_mixer::{AudioMixer, ExportFormat, MixOutcome, MixerConfig};
use crate::config::CastConfig;
use crate::dialogue_parser::{detect_speakers, Dialogue};
use crate::engines::{TtsEngineWrapper, TtsFactory};
use crate::error::{CastError, Result, SynthesisFailure};
use crate::synthesis::{EngineConfig, SynthesisAdapter, SynthesisJob, SynthesisMode, TtsEngine, TurnAudio};
use crate::voice_assignment::{
    auto_assign_voices, AssignmentStrategy, VoiceAssignment, VoiceAssignmentMap, VoiceCatalog,
    VoicePresets, VoiceSelector,
};

// ============================================================================
// PROGRESS AND CANCELLATION
// ============================================================================

/// Shared cancellation flag, checked between turns
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Checkpoint reached during a generation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    Parsed {
        turn_count: usize,
        speakers: Vec<String>,
    },
    TurnCompleted {
        index: usize,
        total: usize,
        speaker: String,
        failed: bool,
    },
    Mixed {
        duration_secs: f64,
        failures: usize,
    },
    Exported {
        output_file: PathBuf,
        file_size_bytes: u64,
    },
}

/// Progress callback
pub type ProgressCallback = Arc<dyn Fn(&PipelineEvent) + Send + Sync>;

fn emit(observer: Option<&ProgressCallback>, event: PipelineEvent) {
    if let Some(callback) = observer {
        callback(&event);
    }
}

// ============================================================================
// REQUEST / REPORT
// ============================================================================

/// One generation request
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub text: String,
    /// File name or path; generated from the speakers when absent
    pub output: Option<PathBuf>,
    /// Per-speaker voices, applied on top of configured overrides
    pub overrides: HashMap<String, VoiceSelector>,
    pub pause_ms: Option<u32>,
    pub format: Option<ExportFormat>,
}

impl GenerateRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_override(mut self, speaker: impl Into<String>, voice: impl Into<VoiceSelector>) -> Self {
        self.overrides.insert(speaker.into(), voice.into());
        self
    }

    pub fn with_pause_ms(mut self, pause_ms: u32) -> Self {
        self.pause_ms = Some(pause_ms);
        self
    }

    pub fn with_format(mut self, format: ExportFormat) -> Self {
        self.format = Some(format);
        self
    }
}

/// What a successful generation produced
#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    pub output_file: PathBuf,
    pub speakers: Vec<String>,
    pub voices: Vec<VoiceAssignment>,
    pub turn_count: usize,
    pub synthesized_count: usize,
    /// Turns replaced by silence
    pub failures: Vec<SynthesisFailure>,
    pub duration_secs: f64,
    pub file_size_bytes: u64,
    pub elapsed_ms: u64,
}

impl GenerationReport {
    /// "N of M turns synthesized"
    pub fn summary(&self) -> String {
        format!("{} of {} turns synthesized", self.synthesized_count, self.turn_count)
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// What a voice preview produced
#[derive(Debug, Clone, Serialize)]
pub struct PreviewReport {
    pub output_file: PathBuf,
    pub voice: VoiceSelector,
    pub duration_secs: f64,
    pub file_size_bytes: u64,
}

/// Pipeline-level settings not owned by the adapter or mixer
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub strategy: AssignmentStrategy,
    pub presets: VoicePresets,
    pub overrides: HashMap<String, VoiceSelector>,
    pub mode: SynthesisMode,
    pub output_dir: PathBuf,
}

impl PipelineOptions {
    pub fn from_config(config: &CastConfig) -> Self {
        Self {
            strategy: config.voices.strategy,
            presets: config.voices.presets.clone(),
            overrides: config.voices.overrides.clone(),
            mode: config.engine.mode,
            output_dir: config.output_dir(),
        }
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

pub struct DialoguePipeline<E: TtsEngine> {
    /// Held for the whole of a generation
    adapter: Mutex<SynthesisAdapter<E>>,
    mixer: AudioMixer,
    options: PipelineOptions,
}

impl DialoguePipeline<TtsEngineWrapper> {
    /// Build engine, adapter and mixer from configuration
    pub fn from_config(config: &CastConfig) -> Result<Self> {
        let engine = TtsFactory::create(config.engine.kind, config.engine.binary.as_deref())?;
        let adapter = SynthesisAdapter::new(engine, config.engine.engine_config())?
            .with_placeholder(config.engine.placeholder_ms, config.mixer.sample_rate);

        Ok(Self::new(
            adapter,
            AudioMixer::new(config.mixer.clone()),
            PipelineOptions::from_config(config),
        ))
    }
}

impl<E: TtsEngine + 'static> DialoguePipeline<E> {
    pub fn new(adapter: SynthesisAdapter<E>, mixer: AudioMixer, options: PipelineOptions) -> Self {
        Self {
            adapter: Mutex::new(adapter),
            mixer,
            options,
        }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn mixer_config(&self) -> &MixerConfig {
        self.mixer.config()
    }

    pub fn engine_name(&self) -> String {
        self.adapter.lock().engine().engine_name().to_string()
    }

    /// Parse text, failing when it holds no dialogue
    pub fn parse(&self, text: &str) -> Result<Dialogue> {
        let dialogue = Dialogue::parse(text);
        if dialogue.is_empty() {
            return Err(CastError::NoDialogueFound);
        }
        Ok(dialogue)
    }

    /// Unique speakers in first-seen order
    pub fn speakers(&self, text: &str) -> Vec<String> {
        detect_speakers(text)
    }

    /// Cached voice catalog of the current engine configuration
    pub fn voices(&self) -> VoiceCatalog {
        self.adapter.lock().catalog().clone()
    }

    /// Assign voices with the configured strategy, then apply overrides
    pub fn assign_voices(
        &self,
        speakers: &[String],
        overrides: &HashMap<String, VoiceSelector>,
    ) -> VoiceAssignmentMap {
        let catalog = self.voices();
        self.assign_with(speakers, &catalog, overrides)
    }

    fn assign_with(
        &self,
        speakers: &[String],
        catalog: &VoiceCatalog,
        overrides: &HashMap<String, VoiceSelector>,
    ) -> VoiceAssignmentMap {
        let mut map = auto_assign_voices(speakers, catalog, &self.options.presets, self.options.strategy);
        map.apply_overrides(&self.options.overrides);
        map.apply_overrides(overrides);
        map
    }

    /// Apply new engine settings; waits for any running generation
    pub fn reconfigure(&self, config: EngineConfig) -> Result<()> {
        self.adapter.lock().reconfigure(config)?;
        Ok(())
    }

    /// Query the engine's voices again
    pub fn refresh_voices(&self) -> Result<VoiceCatalog> {
        let mut adapter = self.adapter.lock();
        Ok(adapter.refresh_voices()?.clone())
    }

    /// Run one generation to completion.
    ///
    /// Per-turn synthesis failures do not fail the call; they are listed in
    /// the report and their turns are silent.
    pub fn generate(
        &self,
        request: &GenerateRequest,
        observer: Option<&ProgressCallback>,
        cancel: &CancelFlag,
    ) -> Result<GenerationReport> {
        let start = Instant::now();
        let adapter = self.adapter.lock();

        let dialogue = self.parse(&request.text)?;
        log::info!(
            "Parsed {} turns from {} speakers: {:?}",
            dialogue.turn_count(),
            dialogue.speakers.len(),
            dialogue.speakers
        );
        emit(
            observer,
            PipelineEvent::Parsed {
                turn_count: dialogue.turn_count(),
                speakers: dialogue.speakers.clone(),
            },
        );

        let voices = self.assign_with(&dialogue.speakers, adapter.catalog(), &request.overrides);
        let pause_ms = request.pause_ms.unwrap_or(self.mixer.config().pause_ms);

        let outcome = match self.options.mode {
            SynthesisMode::Sequential => {
                let total = dialogue.turn_count();
                self.mixer.mix_with(&adapter, &dialogue.turns, &voices, pause_ms, cancel, |audio| {
                    emit(observer, turn_event(audio, total));
                })?
            }
            SynthesisMode::Concurrent { max_tasks } => {
                self.mix_concurrent(&adapter, &dialogue, &voices, pause_ms, max_tasks, observer, cancel)?
            }
        };

        if cancel.is_cancelled() {
            return Err(CastError::Cancelled);
        }

        emit(
            observer,
            PipelineEvent::Mixed {
                duration_secs: outcome.track.duration_secs(),
                failures: outcome.failures.len(),
            },
        );

        let format = self.export_format(request);
        let output_file = self.output_path(request, &dialogue.speakers, format);
        let export = self.mixer_for(format).export(&outcome.track, &output_file)?;

        emit(
            observer,
            PipelineEvent::Exported {
                output_file: export.output_file.clone(),
                file_size_bytes: export.file_size_bytes,
            },
        );

        let report = GenerationReport {
            output_file: export.output_file,
            speakers: dialogue.speakers.clone(),
            voices: voices.entries().to_vec(),
            turn_count: dialogue.turn_count(),
            synthesized_count: outcome.synthesized_count(),
            failures: outcome.failures,
            duration_secs: export.duration_secs,
            file_size_bytes: export.file_size_bytes,
            elapsed_ms: start.elapsed().as_millis() as u64,
        };

        log::info!("Generation finished: {} -> {}", report.summary(), report.output_file.display());
        Ok(report)
    }

    /// Speak `text` with `voice` alone and export it, for auditioning voices.
    ///
    /// Markers are not parsed. Unlike a dialogue turn, a synthesis failure
    /// is returned as [`CastError::PreviewFailed`] instead of silence.
    pub fn preview(&self, text: &str, voice: &VoiceSelector, output: &Path) -> Result<PreviewReport> {
        let adapter = self.adapter.lock();
        let workdir = self.mixer.scratch_dir()?;

        let clip = adapter
            .synthesize(text, voice, &workdir.path().join("preview.wav"))
            .map_err(CastError::PreviewFailed)?;
        log::info!("Preview with '{}': {:.2}s", voice, clip.duration_secs());

        let audio = TurnAudio {
            index: 0,
            speaker: voice.to_string(),
            clip,
            failure: None,
        };
        let outcome = self.mixer.assemble(vec![audio], 0)?;

        let format = ExportFormat::from_path(output).unwrap_or(self.mixer.config().export_format);
        let output_file = self.resolve_output(output, format);
        let export = self.mixer_for(format).export(&outcome.track, &output_file)?;

        Ok(PreviewReport {
            output_file: export.output_file,
            voice: voice.clone(),
            duration_secs: export.duration_secs,
            file_size_bytes: export.file_size_bytes,
        })
    }

    fn mixer_for(&self, format: ExportFormat) -> AudioMixer {
        AudioMixer::new(MixerConfig {
            export_format: format,
            ..self.mixer.config().clone()
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn mix_concurrent(
        &self,
        adapter: &SynthesisAdapter<E>,
        dialogue: &Dialogue,
        voices: &VoiceAssignmentMap,
        pause_ms: u32,
        max_tasks: usize,
        observer: Option<&ProgressCallback>,
        cancel: &CancelFlag,
    ) -> Result<MixOutcome> {
        let total = dialogue.turn_count();
        let jobs: Vec<SynthesisJob> = dialogue
            .turns
            .iter()
            .enumerate()
            .map(|(index, turn)| SynthesisJob {
                index,
                turn: turn.clone(),
                voice: voices.resolve(&turn.speaker).clone(),
            })
            .collect();

        let workdir = self.mixer.scratch_dir()?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        log::debug!("Synthesizing {} turns with up to {} tasks", total, max_tasks);
        let results = runtime.block_on(adapter.synthesize_concurrent(
            jobs,
            workdir.path(),
            max_tasks,
            cancel,
            |audio| emit(observer, turn_event(audio, total)),
        ));

        if cancel.is_cancelled() {
            return Err(CastError::Cancelled);
        }

        Ok(self.mixer.assemble(results, pause_ms)?)
    }

    fn export_format(&self, request: &GenerateRequest) -> ExportFormat {
        request
            .format
            .or_else(|| request.output.as_deref().and_then(ExportFormat::from_path))
            .unwrap_or(self.mixer.config().export_format)
    }

    /// Resolve where a request's output goes.
    ///
    /// Bare file names land in the output directory; paths with a directory
    /// component are used as given. A missing extension is filled in.
    pub fn output_path(&self, request: &GenerateRequest, speakers: &[String], format: ExportFormat) -> PathBuf {
        match &request.output {
            Some(output) => self.resolve_output(output, format),
            None => self.resolve_output(Path::new(&default_output_name(speakers)), format),
        }
    }

    fn resolve_output(&self, output: &Path, format: ExportFormat) -> PathBuf {
        let path = if has_directory(output) {
            output.to_path_buf()
        } else {
            self.options.output_dir.join(output)
        };

        if path.extension().is_some() {
            path
        } else {
            path.with_extension(format.extension())
        }
    }
}

fn turn_event(audio: &TurnAudio, total: usize) -> PipelineEvent {
    PipelineEvent::TurnCompleted {
        index: audio.index,
        total,
        speaker: audio.speaker.clone(),
        failed: audio.is_placeholder(),
    }
}

fn has_directory(path: &Path) -> bool {
    path.is_absolute() || path.parent().map_or(false, |p| !p.as_os_str().is_empty())
}

/// `dialogue_<first three speakers>_<YYYYmmdd_HHMMSS>`
pub fn default_output_name(speakers: &[String]) -> String {
    let names: Vec<&str> = speakers.iter().take(3).map(String::as_str).collect();
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");

    if names.is_empty() {
        format!("dialogue_{}", timestamp)
    } else {
        format!("dialogue_{}_{}", names.join("_"), timestamp)
    }
}

// ============================================================================
// TESTS
// ============================================================================
