use std::path::Path;
use std::sync::Arc;

use talkcast_core::audio_clip::{write_wav, AudioClip};
use talkcast_core::config::CastConfig;
use talkcast_core::engines::{EngineKind, ToneEngine};
use talkcast_core::pipeline::PipelineOptions;
use talkcast_core::voice_assignment::VoiceInfo;
use talkcast_core::{
    AudioMixer, CancelFlag, CastError, DialoguePipeline, EngineConfig, ExportFormat, GenerateRequest,
    MixerConfig, SynthesisAdapter, SynthesisMode, TtsEngine, TtsError, VoiceSelector,
};

const RATE: u32 = 16000;

/// One second per turn; turns whose text contains "glitch" fail
#[derive(Clone)]
struct FlakyEngine;

impl TtsEngine for FlakyEngine {
    fn synthesize(
        &self,
        text: &str,
        _voice: &VoiceSelector,
        _config: &EngineConfig,
        output_path: &Path,
    ) -> Result<(), TtsError> {
        if text.contains("glitch") {
            return Err(TtsError::Engine("engine crashed".to_string()));
        }
        write_wav(output_path, &vec![0.2; RATE as usize], RATE).map_err(|e| TtsError::FileWrite(e.to_string()))
    }

    fn list_voices(&self, _config: &EngineConfig) -> Result<Vec<VoiceInfo>, TtsError> {
        Ok(vec![VoiceInfo::new("low", "Low"), VoiceInfo::new("high", "High")])
    }

    fn engine_name(&self) -> &str {
        "flaky"
    }
}

fn wav_mixer() -> AudioMixer {
    AudioMixer::new(MixerConfig {
        sample_rate: RATE,
        export_format: ExportFormat::Wav,
        ..Default::default()
    })
}

fn options(dir: &Path, mode: SynthesisMode) -> PipelineOptions {
    PipelineOptions {
        mode,
        output_dir: dir.to_path_buf(),
        ..Default::default()
    }
}

fn flaky_pipeline(dir: &Path, mode: SynthesisMode) -> DialoguePipeline<FlakyEngine> {
    let adapter = SynthesisAdapter::new(FlakyEngine, EngineConfig::default())
        .unwrap()
        .with_placeholder(500, RATE);
    DialoguePipeline::new(adapter, wav_mixer(), options(dir, mode))
}

#[test]
fn john_and_sarah_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = flaky_pipeline(dir.path(), SynthesisMode::Sequential);

    let request = GenerateRequest::new("[JOHN] Hello, how are you?\n[SARAH] Hi John!").with_pause_ms(500);
    let report = pipeline.generate(&request, None, &CancelFlag::new()).unwrap();

    assert_eq!(report.speakers, vec!["JOHN", "SARAH"]);
    assert_eq!(report.turn_count, 2);
    assert_eq!(report.synthesized_count, 2);
    assert!(report.failures.is_empty());
    assert_eq!(report.summary(), "2 of 2 turns synthesized");

    // two one-second clips and a single half-second gap
    assert!((report.duration_secs - 2.5).abs() < 1e-9);

    let name = report.output_file.file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("dialogue_JOHN_SARAH_"));
    assert!(name.ends_with(".wav"));

    let exported = AudioClip::from_wav(&report.output_file).unwrap();
    assert_eq!(exported.len(), (RATE as f64 * 2.5) as usize);

    let voices: Vec<&str> = report.voices.iter().map(|v| v.voice.as_str()).collect();
    assert_eq!(voices, vec!["low", "high"]);
}

#[test]
fn one_failing_turn_is_reported_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = flaky_pipeline(dir.path(), SynthesisMode::Sequential);

    let text = "[A] first [B] a glitch here [A] third";
    let report = pipeline
        .generate(&GenerateRequest::new(text).with_output("partial"), None, &CancelFlag::new())
        .unwrap();

    assert_eq!(report.turn_count, 3);
    assert_eq!(report.synthesized_count, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].turn_index, 1);
    assert_eq!(report.failures[0].speaker, "B");
    assert_eq!(report.summary(), "2 of 3 turns synthesized");

    // 1s + 0.5s placeholder + 1s, plus two 0.5s gaps
    assert!((report.duration_secs - 3.5).abs() < 1e-9);
    assert_eq!(report.output_file, dir.path().join("partial.wav"));
}

#[test]
fn concurrent_mode_keeps_turn_order() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = flaky_pipeline(dir.path(), SynthesisMode::Concurrent { max_tasks: 3 });

    let text = "[A] one [B] two [C] glitch [D] four [A] five";
    let report = pipeline
        .generate(&GenerateRequest::new(text).with_output("concurrent"), None, &CancelFlag::new())
        .unwrap();

    assert_eq!(report.turn_count, 5);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].turn_index, 2);
    assert!((report.duration_secs - (4.0 + 0.5 + 4.0 * 0.5)).abs() < 1e-9);
}

#[test]
fn plain_text_uses_default_speaker() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = flaky_pipeline(dir.path(), SynthesisMode::Sequential);

    let report = pipeline
        .generate(&GenerateRequest::new("just plain text"), None, &CancelFlag::new())
        .unwrap();

    assert_eq!(report.speakers, vec!["Speaker"]);
    assert_eq!(report.turn_count, 1);
    assert!((report.duration_secs - 1.0).abs() < 1e-9);
}

#[test]
fn request_overrides_pick_voices() {
    let dir = tempfile::tempdir().unwrap();
    let adapter = SynthesisAdapter::new(ToneEngine::new(), EngineConfig::default()).unwrap();
    let pipeline = DialoguePipeline::new(adapter, wav_mixer(), options(dir.path(), SynthesisMode::Sequential));

    let request = GenerateRequest::new("[Host] Hi there [Guest] Hello")
        .with_override("Guest", "tone-5")
        .with_override("Nobody", "tone-3");
    let report = pipeline.generate(&request, None, &CancelFlag::new()).unwrap();

    assert_eq!(report.voices.len(), 2);
    assert_eq!(report.voices[0].voice.as_str(), "tone-0");
    assert_eq!(report.voices[1].voice.as_str(), "tone-5");
}

#[test]
fn cancelled_before_start_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = flaky_pipeline(dir.path(), SynthesisMode::Concurrent { max_tasks: 2 });
    let cancel = CancelFlag::new();
    cancel.cancel();

    let result = pipeline.generate(&GenerateRequest::new("[A] one [B] two"), None, &cancel);

    assert!(matches!(result, Err(CastError::Cancelled)));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn pipeline_from_config_with_tone_engine() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = CastConfig::default();
    config.engine.kind = EngineKind::Tone;
    config.mixer.export_format = ExportFormat::Wav;
    config.output_dir = Some(dir.path().to_path_buf());

    let pipeline = Arc::new(DialoguePipeline::from_config(&config).unwrap());
    assert_eq!(pipeline.engine_name(), "tone");
    assert_eq!(pipeline.voices().len(), 6);

    let report = pipeline
        .generate(
            &GenerateRequest::new("[Alice] Good morning. [Bob] Morning!"),
            None,
            &CancelFlag::new(),
        )
        .unwrap();

    assert!(report.output_file.starts_with(dir.path()));
    assert!(report.file_size_bytes > 0);
    assert!(report.is_complete());
}

#[test]
fn preview_speaks_one_line_with_chosen_voice() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = flaky_pipeline(dir.path(), SynthesisMode::Sequential);
    let target = dir.path().join("auditions").join("high.wav");

    let report = pipeline.preview("Is this me?", &VoiceSelector::new("high"), &target).unwrap();
    assert_eq!(report.output_file, target);
    assert!((report.duration_secs - 1.0).abs() < 1e-9);

    let result = pipeline.preview("a glitch", &VoiceSelector::new("high"), &target);
    assert!(matches!(result, Err(CastError::PreviewFailed(TtsError::Engine(_)))));
}
