//! TalkCast core - speaker-tagged dialogue to a single narrated audio file
//!
//! ```text
//! [JOHN] Hello, how are you?
//! [SARAH] Hi John!
//! ```
//!
//! Pipeline stages, leaf first:
//! - [`dialogue_parser`]: text → ordered turns and first-seen speaker list
//! - [`voice_assignment`]: speakers → voice selectors
//! - [`synthesis`] and [`engines`]: one clip per turn, failures isolated
//! - [`audio_mixer`]: clips + silence gaps → one track → WAV/MP3
//! - [`pipeline`]: the blocking end-to-end call, [`worker`] runs it off-thread

pub mod audio_clip;
pub mod audio_mixer;
pub mod config;
pub mod dialogue_parser;
pub mod engines;
pub mod error;
pub mod names;
pub mod pipeline;
pub mod synthesis;
pub mod voice_assignment;
pub mod worker;

pub use audio_mixer::{AudioMixer, ExportFormat, MixedTrack, MixerConfig, Mp3Bitrate};
pub use config::CastConfig;
pub use dialogue_parser::{detect_speakers, parse_dialogue, Dialogue, DialogueTurn};
pub use engines::{EngineKind, TtsEngineWrapper, TtsFactory};
pub use error::{CastError, Result, SynthesisFailure};
pub use pipeline::{
    CancelFlag, DialoguePipeline, GenerateRequest, GenerationReport, PipelineEvent, PreviewReport,
    ProgressCallback,
};
pub use synthesis::{EngineConfig, SynthesisAdapter, SynthesisMode, TtsEngine, TtsError};
pub use voice_assignment::{auto_assign_voices, AssignmentStrategy, VoiceAssignmentMap, VoiceSelector};
pub use worker::{CastWorker, WorkerCommand, WorkerEvent};
