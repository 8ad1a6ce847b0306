//! Audio Mixing and Export - Combine turn clips into one track
//!
//! This module provides audio mixing functionality:
//! - Synthesize turns in order and append them to a mono track
//! - Insert a fixed silence gap between turns (never after the last)
//! - Resample and down-mix clips to the export format
//! - Export as WAV or MP3 (via ffmpeg) with metadata

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;
use tempfile::TempDir;
use thiserror::Error;

use crate::audio_clip::{samples_for_ms, write_wav};
use crate::dialogue_parser::DialogueTurn;
use crate::error::SynthesisFailure;
use crate::pipeline::CancelFlag;
use crate::synthesis::{SynthesisAdapter, TtsEngine, TurnAudio};
use crate::voice_assignment::VoiceAssignmentMap;

// ============================================================================
// DATA MODELS
// ============================================================================

/// Export format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// MP3 format (compressed)
    #[default]
    Mp3,
    /// WAV format (uncompressed)
    Wav,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Mp3 => "mp3",
            ExportFormat::Wav => "wav",
        }
    }

    /// Format implied by a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "mp3" => Some(ExportFormat::Mp3),
            "wav" => Some(ExportFormat::Wav),
            _ => None,
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mp3" => Ok(ExportFormat::Mp3),
            "wav" => Ok(ExportFormat::Wav),
            other => Err(format!("unsupported export format '{}'", other)),
        }
    }
}

/// MP3 bitrate options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Mp3Bitrate {
    /// 128 kbps (Good quality, ~1MB/min)
    Kbps128,
    /// 192 kbps (High quality, ~1.5MB/min)
    #[default]
    Kbps192,
    /// 256 kbps (Very high quality, ~2MB/min)
    Kbps256,
    /// 320 kbps (Maximum quality, ~2.5MB/min)
    Kbps320,
}

impl Mp3Bitrate {
    /// Get bitrate value in kbps
    pub fn kbps(&self) -> u32 {
        match self {
            Mp3Bitrate::Kbps128 => 128,
            Mp3Bitrate::Kbps192 => 192,
            Mp3Bitrate::Kbps256 => 256,
            Mp3Bitrate::Kbps320 => 320,
        }
    }

    /// Get display name
    pub fn display_name(&self) -> &str {
        match self {
            Mp3Bitrate::Kbps128 => "128 kbps (Good)",
            Mp3Bitrate::Kbps192 => "192 kbps (High)",
            Mp3Bitrate::Kbps256 => "256 kbps (Very High)",
            Mp3Bitrate::Kbps320 => "320 kbps (Max)",
        }
    }
}

impl TryFrom<u32> for Mp3Bitrate {
    type Error = String;

    fn try_from(kbps: u32) -> Result<Self, Self::Error> {
        match kbps {
            128 => Ok(Mp3Bitrate::Kbps128),
            192 => Ok(Mp3Bitrate::Kbps192),
            256 => Ok(Mp3Bitrate::Kbps256),
            320 => Ok(Mp3Bitrate::Kbps320),
            other => Err(format!("unsupported MP3 bitrate {} (use 128, 192, 256 or 320)", other)),
        }
    }
}

impl From<Mp3Bitrate> for u32 {
    fn from(bitrate: Mp3Bitrate) -> Self {
        bitrate.kbps()
    }
}

/// Audio metadata (written as ID3 tags for MP3)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub year: Option<String>,
    pub comment: Option<String>,
}

impl AudioMetadata {
    fn tags(&self) -> Vec<(&'static str, &str)> {
        [
            ("title", &self.title),
            ("artist", &self.artist),
            ("album", &self.album),
            ("year", &self.year),
            ("comment", &self.comment),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.as_deref().map(|v| (key, v)))
        .collect()
    }
}

/// Audio mixing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    /// Output sample rate (Hz); output is always mono
    pub sample_rate: u32,
    /// Silence between consecutive turns (ms)
    pub pause_ms: u32,
    /// Export format
    pub export_format: ExportFormat,
    /// MP3 bitrate (only used if export_format is MP3)
    pub mp3_bitrate: Mp3Bitrate,
    pub metadata: AudioMetadata,
    /// ffmpeg executable used for MP3 encoding
    pub ffmpeg_path: PathBuf,
    /// Parent of per-run scratch directories; the system temp dir when unset
    pub scratch_dir: Option<PathBuf>,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            pause_ms: 500,
            export_format: ExportFormat::Mp3,
            mp3_bitrate: Mp3Bitrate::Kbps192,
            metadata: AudioMetadata::default(),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            scratch_dir: None,
        }
    }
}

/// Errors that can occur during mixing and export
#[derive(Error, Debug)]
pub enum MixerError {
    #[error("No turns to mix")]
    NoTurns,

    #[error("Resampling failed: {0}")]
    Resample(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("Encoder error: {0}")]
    Encoder(String),

    #[error("Mixing cancelled")]
    Cancelled,
}

/// One constituent of a mixed track, in append order
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Segment {
    Clip {
        turn_index: usize,
        speaker: String,
        start: usize,
        len: usize,
        /// Silent stand-in for a failed turn
        placeholder: bool,
    },
    Silence {
        start: usize,
        len: usize,
    },
}

impl Segment {
    pub fn len(&self) -> usize {
        match self {
            Segment::Clip { len, .. } | Segment::Silence { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_silence(&self) -> bool {
        matches!(self, Segment::Silence { .. })
    }
}

/// Mono track assembled from turn clips and silence gaps
#[derive(Debug, Clone, PartialEq)]
pub struct MixedTrack {
    samples: Vec<f32>,
    sample_rate: u32,
    segments: Vec<Segment>,
}

impl MixedTrack {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            samples: Vec::new(),
            sample_rate,
            segments: Vec::new(),
        }
    }

    /// Append a turn's clip, converting it to the track's sample rate
    pub fn append_clip(&mut self, turn: TurnAudio) -> Result<(), MixerError> {
        let placeholder = turn.is_placeholder();
        let clip = turn.clip.resample(self.sample_rate).map_err(MixerError::Resample)?;

        let start = self.samples.len();
        self.samples.extend_from_slice(clip.samples());
        self.segments.push(Segment::Clip {
            turn_index: turn.index,
            speaker: turn.speaker,
            start,
            len: clip.len(),
            placeholder,
        });
        Ok(())
    }

    /// Append exactly `duration_ms` of silence
    pub fn append_silence(&mut self, duration_ms: u32) {
        let len = samples_for_ms(duration_ms, self.sample_rate);
        let start = self.samples.len();
        self.samples.resize(start + len, 0.0);
        self.segments.push(Segment::Silence { start, len });
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Total duration of inserted gaps
    pub fn silence_secs(&self) -> f64 {
        let gap_samples: usize = self
            .segments
            .iter()
            .filter(|s| s.is_silence())
            .map(Segment::len)
            .sum();
        gap_samples as f64 / self.sample_rate as f64
    }
}

/// A mixed track plus the per-turn failures recovered while building it
#[derive(Debug, Clone)]
pub struct MixOutcome {
    pub track: MixedTrack,
    pub failures: Vec<SynthesisFailure>,
}

impl MixOutcome {
    /// Turns that produced real audio
    pub fn synthesized_count(&self) -> usize {
        self.track
            .segments()
            .iter()
            .filter(|s| matches!(s, Segment::Clip { placeholder: false, .. }))
            .count()
    }
}

/// Result of writing a track to disk
#[derive(Debug, Clone, Serialize)]
pub struct ExportResult {
    /// Output file path (with extension)
    pub output_file: PathBuf,
    pub format: ExportFormat,
    /// Total duration in seconds
    pub duration_secs: f64,
    /// File size in bytes
    pub file_size_bytes: u64,
    /// Export duration in milliseconds
    pub elapsed_ms: u64,
}

// ============================================================================
// AUDIO MIXER
// ============================================================================

/// Audio mixer
#[derive(Debug, Clone, Default)]
pub struct AudioMixer {
    config: MixerConfig,
}

impl AudioMixer {
    pub fn new(config: MixerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MixerConfig {
        &self.config
    }

    /// Fresh `talkcast-*` directory for intermediate clips, removed on drop
    pub fn scratch_dir(&self) -> std::io::Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("talkcast-");

        match &self.config.scratch_dir {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
    }

    /// Synthesize `turns` in order and join them with `pause_ms` gaps
    pub fn mix<E: TtsEngine>(
        &self,
        adapter: &SynthesisAdapter<E>,
        turns: &[DialogueTurn],
        voices: &VoiceAssignmentMap,
        pause_ms: u32,
    ) -> Result<MixOutcome, MixerError> {
        self.mix_with(adapter, turns, voices, pause_ms, &CancelFlag::new(), |_| {})
    }

    /// Like [`AudioMixer::mix`], checking `cancel` before each turn and
    /// reporting every finished turn to `on_turn`.
    ///
    /// Intermediate clips live in a scratch directory that is removed on
    /// every exit path.
    pub fn mix_with<E: TtsEngine>(
        &self,
        adapter: &SynthesisAdapter<E>,
        turns: &[DialogueTurn],
        voices: &VoiceAssignmentMap,
        pause_ms: u32,
        cancel: &CancelFlag,
        mut on_turn: impl FnMut(&TurnAudio),
    ) -> Result<MixOutcome, MixerError> {
        if turns.is_empty() {
            return Err(MixerError::NoTurns);
        }

        let workdir = self.scratch_dir()?;
        let mut track = MixedTrack::new(self.config.sample_rate);
        let mut failures = Vec::new();

        for (index, turn) in turns.iter().enumerate() {
            if cancel.is_cancelled() {
                log::info!("Mixing cancelled before turn {}", index);
                return Err(MixerError::Cancelled);
            }

            let voice = voices.resolve(&turn.speaker);
            let audio = adapter.synthesize_turn(index, turn, voice, workdir.path());
            on_turn(&audio);

            if let Some(failure) = &audio.failure {
                failures.push(failure.clone());
            }
            track.append_clip(audio)?;

            if index + 1 < turns.len() {
                track.append_silence(pause_ms);
            }
        }

        log::info!(
            "Mixed {} turns ({} failed) into {:.2}s",
            turns.len(),
            failures.len(),
            track.duration_secs()
        );

        Ok(MixOutcome { track, failures })
    }

    /// Join already synthesized turns, in the order given
    pub fn assemble(&self, turns: Vec<TurnAudio>, pause_ms: u32) -> Result<MixOutcome, MixerError> {
        if turns.is_empty() {
            return Err(MixerError::NoTurns);
        }

        let count = turns.len();
        let mut track = MixedTrack::new(self.config.sample_rate);
        let mut failures = Vec::new();

        for (position, audio) in turns.into_iter().enumerate() {
            if let Some(failure) = &audio.failure {
                failures.push(failure.clone());
            }
            track.append_clip(audio)?;

            if position + 1 < count {
                track.append_silence(pause_ms);
            }
        }

        Ok(MixOutcome { track, failures })
    }

    /// Write `track` to `path` in the configured format.
    ///
    /// Partial output is removed when export fails.
    pub fn export(&self, track: &MixedTrack, path: &Path) -> Result<ExportResult, MixerError> {
        let start = Instant::now();
        let format = self.config.export_format;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let result = match format {
            ExportFormat::Wav => {
                write_wav(path, track.samples(), track.sample_rate()).map_err(MixerError::from)
            }
            ExportFormat::Mp3 => self.write_mp3_file(track, path),
        };

        if let Err(e) = result {
            if path.exists() {
                let _ = std::fs::remove_file(path);
            }
            log::error!("Export to {} failed: {}", path.display(), e);
            return Err(e);
        }

        let file_size_bytes = std::fs::metadata(path)?.len();
        let elapsed_ms = start.elapsed().as_millis() as u64;

        log::info!(
            "Exported {} ({:.2}s, {} bytes) in {}ms",
            path.display(),
            track.duration_secs(),
            file_size_bytes,
            elapsed_ms
        );

        Ok(ExportResult {
            output_file: path.to_path_buf(),
            format,
            duration_secs: track.duration_secs(),
            file_size_bytes,
            elapsed_ms,
        })
    }

    /// Encode through a temporary WAV next to the target
    fn write_mp3_file(&self, track: &MixedTrack, path: &Path) -> Result<(), MixerError> {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let temp_wav = tempfile::Builder::new()
            .prefix(".talkcast-")
            .suffix(".wav")
            .tempfile_in(dir)?;

        write_wav(temp_wav.path(), track.samples(), track.sample_rate())?;

        let mut cmd = Command::new(&self.config.ffmpeg_path);
        cmd.arg("-y")
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-i")
            .arg(temp_wav.path())
            .arg("-codec:a")
            .arg("libmp3lame")
            .arg("-b:a")
            .arg(format!("{}k", self.config.mp3_bitrate.kbps()))
            .arg("-ar")
            .arg(track.sample_rate().to_string())
            .arg("-ac")
            .arg("1");

        for (key, value) in self.config.metadata.tags() {
            cmd.arg("-metadata").arg(format!("{}={}", key, value));
        }
        cmd.arg(path);

        let output = cmd.output().map_err(|e| {
            MixerError::Encoder(format!(
                "failed to run {}: {}. Is ffmpeg installed?",
                self.config.ffmpeg_path.display(),
                e
            ))
        })?;

        if !output.status.success() {
            return Err(MixerError::Encoder(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        log::debug!("MP3 encoded at {}", self.config.mp3_bitrate.display_name());
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_clip::AudioClip;
    use crate::synthesis::{EngineConfig, TtsError};
    use crate::voice_assignment::{VoiceInfo, VoiceSelector};

    const RATE: u32 = 16000;

    /// 0.25s clips; fails for texts containing "FAIL"
    #[derive(Clone)]
    struct ScriptedEngine;

    impl TtsEngine for ScriptedEngine {
        fn synthesize(
            &self,
            text: &str,
            _voice: &VoiceSelector,
            _config: &EngineConfig,
            output_path: &Path,
        ) -> Result<(), TtsError> {
            if text.contains("FAIL") {
                // leave a truncated artifact behind, like a crashed engine would
                std::fs::write(output_path, b"RIFF").map_err(|e| TtsError::FileWrite(e.to_string()))?;
                return Err(TtsError::Engine("scripted failure".to_string()));
            }
            write_wav(output_path, &vec![0.5; 4000], RATE).map_err(|e| TtsError::FileWrite(e.to_string()))
        }

        fn list_voices(&self, _config: &EngineConfig) -> Result<Vec<VoiceInfo>, TtsError> {
            Ok(vec![VoiceInfo::new("v0", "Zero"), VoiceInfo::new("v1", "One")])
        }

        fn engine_name(&self) -> &str {
            "scripted"
        }
    }

    fn setup() -> (AudioMixer, SynthesisAdapter<ScriptedEngine>, VoiceAssignmentMap) {
        let mixer = AudioMixer::new(MixerConfig {
            sample_rate: RATE,
            export_format: ExportFormat::Wav,
            ..Default::default()
        });
        let adapter = SynthesisAdapter::new(ScriptedEngine, EngineConfig::default())
            .unwrap()
            .with_placeholder(500, RATE);
        let mut voices = VoiceAssignmentMap::new(VoiceSelector::new("v0"));
        voices.set("A", VoiceSelector::new("v0"));
        voices.set("B", VoiceSelector::new("v1"));
        (mixer, adapter, voices)
    }

    fn turns(texts: &[(&str, &str)]) -> Vec<DialogueTurn> {
        texts.iter().map(|(s, t)| DialogueTurn::new(*s, *t)).collect()
    }

    #[test]
    fn test_gap_count_law() {
        let (mixer, adapter, voices) = setup();
        let turns = turns(&[("A", "one"), ("B", "two"), ("A", "three")]);

        let outcome = mixer.mix(&adapter, &turns, &voices, 500).unwrap();
        let track = &outcome.track;

        assert_eq!(track.segments().len(), 5);
        assert!((track.silence_secs() - 1.0).abs() < 1e-9);
        assert!(!track.segments().last().unwrap().is_silence());
        assert!(!track.segments().first().unwrap().is_silence());
        assert_eq!(track.len(), 3 * 4000 + 2 * 8000);
        assert_eq!(outcome.synthesized_count(), 3);
        assert!(outcome.failures.is_empty());
    }

    #[test]
    fn test_segments_follow_turn_order() {
        let (mixer, adapter, voices) = setup();
        let turns = turns(&[("B", "first"), ("A", "second")]);

        let outcome = mixer.mix(&adapter, &turns, &voices, 100).unwrap();
        let speakers: Vec<&str> = outcome
            .track
            .segments()
            .iter()
            .filter_map(|s| match s {
                Segment::Clip { speaker, .. } => Some(speaker.as_str()),
                Segment::Silence { .. } => None,
            })
            .collect();

        assert_eq!(speakers, vec!["B", "A"]);
    }

    #[test]
    fn test_single_turn_has_no_gap() {
        let (mixer, adapter, voices) = setup();
        let outcome = mixer.mix(&adapter, &turns(&[("A", "alone")]), &voices, 500).unwrap();

        assert_eq!(outcome.track.segments().len(), 1);
        assert_eq!(outcome.track.silence_secs(), 0.0);
    }

    #[test]
    fn test_failed_turn_keeps_its_slot() {
        let (mixer, adapter, voices) = setup();
        let turns = turns(&[("A", "ok"), ("B", "FAIL here"), ("A", "ok again")]);

        let outcome = mixer.mix(&adapter, &turns, &voices, 500).unwrap();

        assert_eq!(outcome.track.segments().len(), 5);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].turn_index, 1);
        assert_eq!(outcome.synthesized_count(), 2);
        assert!(matches!(
            outcome.track.segments()[2],
            Segment::Clip { turn_index: 1, placeholder: true, len: 8000, .. }
        ));
    }

    fn scratch_mixer(root: &Path) -> AudioMixer {
        AudioMixer::new(MixerConfig {
            sample_rate: RATE,
            export_format: ExportFormat::Wav,
            scratch_dir: Some(root.to_path_buf()),
            ..Default::default()
        })
    }

    fn entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_scratch_dir_removed_after_failed_turn() {
        let (_, adapter, voices) = setup();
        let root = tempfile::tempdir().unwrap();
        let mixer = scratch_mixer(root.path());
        let mut seen_scratch = false;

        let outcome = mixer
            .mix_with(
                &adapter,
                &turns(&[("A", "ok"), ("B", "FAIL now")]),
                &voices,
                500,
                &CancelFlag::new(),
                |_| seen_scratch |= entries(root.path()) == 1,
            )
            .unwrap();

        assert_eq!(outcome.failures.len(), 1);
        assert!(seen_scratch);
        assert_eq!(entries(root.path()), 0);
    }

    #[test]
    fn test_scratch_dir_removed_after_cancel() {
        let (_, adapter, voices) = setup();
        let root = tempfile::tempdir().unwrap();
        let mixer = scratch_mixer(root.path());
        let cancel = CancelFlag::new();

        let trigger = cancel.clone();
        let result = mixer.mix_with(
            &adapter,
            &turns(&[("A", "one"), ("B", "FAIL two"), ("A", "three")]),
            &voices,
            500,
            &cancel,
            |audio| {
                if audio.index == 1 {
                    trigger.cancel();
                }
            },
        );

        assert!(matches!(result, Err(MixerError::Cancelled)));
        assert_eq!(entries(root.path()), 0);
    }

    #[test]
    fn test_missing_speaker_uses_default_voice() {
        let (mixer, adapter, voices) = setup();
        let outcome = mixer.mix(&adapter, &turns(&[("Stranger", "hello")]), &voices, 0).unwrap();
        assert_eq!(outcome.synthesized_count(), 1);
    }

    #[test]
    fn test_cancel_before_first_turn() {
        let (mixer, adapter, voices) = setup();
        let cancel = CancelFlag::new();
        cancel.cancel();

        let result = mixer.mix_with(&adapter, &turns(&[("A", "x")]), &voices, 500, &cancel, |_| {});
        assert!(matches!(result, Err(MixerError::Cancelled)));
    }

    #[test]
    fn test_no_turns() {
        let (mixer, adapter, voices) = setup();
        assert!(matches!(mixer.mix(&adapter, &[], &voices, 500), Err(MixerError::NoTurns)));
        assert!(matches!(mixer.assemble(Vec::new(), 500), Err(MixerError::NoTurns)));
    }

    #[test]
    fn test_assemble_resamples_clips() {
        let (mixer, _, _) = setup();
        let audio = |index: usize| TurnAudio {
            index,
            speaker: format!("S{index}"),
            clip: AudioClip::new(vec![0.1; 8000], 8000),
            failure: None,
        };

        let outcome = mixer.assemble(vec![audio(0), audio(1)], 250).unwrap();
        assert_eq!(outcome.track.sample_rate(), RATE);
        assert_eq!(outcome.track.len(), 16000 + 4000 + 16000);
    }

    #[test]
    fn test_export_wav() {
        let (mixer, adapter, voices) = setup();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.wav");

        let outcome = mixer.mix(&adapter, &turns(&[("A", "one"), ("B", "two")]), &voices, 500).unwrap();
        let result = mixer.export(&outcome.track, &path).unwrap();

        assert_eq!(result.output_file, path);
        assert!(result.file_size_bytes > 0);
        let decoded = AudioClip::from_wav(&path).unwrap();
        assert_eq!(decoded.len(), outcome.track.len());
        assert_eq!(decoded.sample_rate(), RATE);
    }

    #[test]
    fn test_mp3_export_failure_cleans_up() {
        let mixer = AudioMixer::new(MixerConfig {
            ffmpeg_path: PathBuf::from("/nonexistent/ffmpeg"),
            ..Default::default()
        });
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp3");

        let mut track = MixedTrack::new(44100);
        track.append_silence(100);

        let result = mixer.export(&track, &path);
        assert!(matches!(result, Err(MixerError::Encoder(_))));
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_bitrate_conversions() {
        assert_eq!(Mp3Bitrate::try_from(256), Ok(Mp3Bitrate::Kbps256));
        assert!(Mp3Bitrate::try_from(100).is_err());
        assert_eq!(u32::from(Mp3Bitrate::default()), 192);
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ExportFormat::from_path(Path::new("a/b.WAV")), Some(ExportFormat::Wav));
        assert_eq!(ExportFormat::from_path(Path::new("show.mp3")), Some(ExportFormat::Mp3));
        assert_eq!(ExportFormat::from_path(Path::new("show")), None);
    }
}
