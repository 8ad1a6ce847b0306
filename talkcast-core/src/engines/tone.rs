//! Offline tone engine.
//!
//! Produces a decaying sine per utterance, one pitch per voice. Useful for
//! tests and for machines without a speech synthesizer installed.

use std::path::Path;

use crate::audio_clip::write_wav;
use crate::synthesis::{EngineConfig, TtsEngine, TtsError};
use crate::voice_assignment::{VoiceInfo, VoiceSelector, FALLBACK_VOICE};

/// Native sample rate of generated clips
pub const TONE_SAMPLE_RATE: u32 = 22050;

/// (selector, display name, frequency in Hz)
const TONE_VOICES: [(&str, &str, f64); 6] = [
    ("tone-0", "Tone Low", 110.0),
    ("tone-1", "Tone High", 220.0),
    ("tone-2", "Tone Low Bright", 130.8),
    ("tone-3", "Tone High Bright", 261.6),
    ("tone-4", "Tone Low Warm", 98.0),
    ("tone-5", "Tone High Warm", 196.0),
];

const MIN_DURATION_SECS: f64 = 0.3;

#[derive(Debug, Clone, Default)]
pub struct ToneEngine;

impl ToneEngine {
    pub fn new() -> Self {
        Self
    }

    fn frequency_for(voice: &VoiceSelector) -> Result<f64, TtsError> {
        let id = match voice.as_str() {
            FALLBACK_VOICE => TONE_VOICES[0].0,
            other => other,
        };

        TONE_VOICES
            .iter()
            .find(|(selector, _, _)| *selector == id)
            .map(|(_, _, hz)| *hz)
            .ok_or_else(|| TtsError::InvalidVoice(voice.to_string()))
    }

    /// Spoken duration for `text` at `rate` words per minute
    pub fn duration_for(text: &str, rate: u32) -> f64 {
        let words = text.split_whitespace().count() as f64;
        (words * 60.0 / rate.max(1) as f64).max(MIN_DURATION_SECS)
    }

    fn render(frequency: f64, duration_secs: f64, volume: f32) -> Vec<f32> {
        let num_samples = (duration_secs * TONE_SAMPLE_RATE as f64) as usize;
        let amplitude = 0.3 * volume as f64;

        (0..num_samples)
            .map(|i| {
                let t = i as f64 / TONE_SAMPLE_RATE as f64;
                let decay = 1.0 - (i as f64 / num_samples as f64) * 0.5;
                (amplitude * decay * (2.0 * std::f64::consts::PI * frequency * t).sin()) as f32
            })
            .collect()
    }
}

impl TtsEngine for ToneEngine {
    fn synthesize(
        &self,
        text: &str,
        voice: &VoiceSelector,
        config: &EngineConfig,
        output_path: &Path,
    ) -> Result<(), TtsError> {
        if text.trim().is_empty() {
            return Err(TtsError::EmptyText);
        }

        let frequency = Self::frequency_for(voice)?;
        let duration = Self::duration_for(text, config.rate);
        let samples = Self::render(frequency, duration, config.volume);

        write_wav(output_path, &samples, TONE_SAMPLE_RATE)
            .map_err(|e| TtsError::FileWrite(e.to_string()))
    }

    fn list_voices(&self, config: &EngineConfig) -> Result<Vec<VoiceInfo>, TtsError> {
        Ok(TONE_VOICES
            .iter()
            .map(|(selector, name, _)| {
                VoiceInfo::new(*selector, *name).with_language(config.language.clone())
            })
            .collect())
    }

    fn engine_name(&self) -> &str {
        "tone"
    }
}
