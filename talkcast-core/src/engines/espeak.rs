//! espeak-ng command-line engine

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::names::Gender;
use crate::synthesis::{EngineConfig, TtsEngine, TtsError};
use crate::voice_assignment::{VoiceInfo, VoiceSelector, FALLBACK_VOICE};

pub const DEFAULT_ESPEAK_BINARY: &str = "espeak-ng";

/// Female variants appended to each language voice
const FEMALE_VARIANTS: [&str; 2] = ["f2", "f4"];

/// Drives the `espeak-ng` binary
#[derive(Debug, Clone)]
pub struct EspeakEngine {
    binary: PathBuf,
}

impl EspeakEngine {
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from(DEFAULT_ESPEAK_BINARY),
        }
    }

    /// Use a specific binary path
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Check that the binary can be executed
    pub fn probe(&self) -> Result<String, TtsError> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .output()
            .map_err(|e| {
                TtsError::Unavailable(format!("{}: {}", self.binary.display(), e))
            })?;

        if !output.status.success() {
            return Err(TtsError::Unavailable(format!(
                "{} --version exited with {}",
                self.binary.display(),
                output.status
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Parse the table printed by `espeak-ng --voices=<lang>`.
    ///
    /// ```text
    /// Pty Language       Age/Gender VoiceName          File          Other Languages
    ///  2  en-gb           --/M      English_(Great_Britain) gmw/en  (en 2)
    /// ```
    pub fn parse_voice_table(table: &str) -> Vec<VoiceInfo> {
        let mut voices = Vec::new();

        for line in table.lines().skip(1) {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 4 {
                continue;
            }

            let language = fields[1];
            let gender = match fields[2].rsplit('/').next() {
                Some("F") => Gender::Female,
                Some("M") => Gender::Male,
                _ => Gender::Neutral,
            };
            let name = fields[3].replace('_', " ");

            voices.push(
                VoiceInfo::new(language, name.clone())
                    .with_gender(gender)
                    .with_language(language),
            );

            if gender == Gender::Male {
                for variant in FEMALE_VARIANTS {
                    voices.push(
                        VoiceInfo::new(format!("{}+{}", language, variant), format!("{} ({})", name, variant))
                            .with_gender(Gender::Female)
                            .with_language(language),
                    );
                }
            }
        }

        voices
    }

    fn voice_arg<'a>(voice: &'a VoiceSelector, config: &'a EngineConfig) -> &'a str {
        match voice.as_str() {
            FALLBACK_VOICE | "" => &config.language,
            other => other,
        }
    }
}

impl Default for EspeakEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TtsEngine for EspeakEngine {
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

        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| TtsError::FileWrite(format!("Failed to create directory: {}", e)))?;
        }

        let voice = Self::voice_arg(voice, config);
        let amplitude = (config.volume.clamp(0.0, 2.0) * 100.0).round() as u32;

        log::debug!(
            "espeak-ng: {} chars with voice '{}', rate {}, amplitude {}",
            text.len(),
            voice,
            config.rate,
            amplitude
        );

        let mut child = Command::new(&self.binary)
            .arg("-w")
            .arg(output_path)
            .arg("-v")
            .arg(voice)
            .arg("-s")
            .arg(config.rate.to_string())
            .arg("-a")
            .arg(amplitude.to_string())
            .arg("--stdin")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| TtsError::Unavailable(format!("{}: {}", self.binary.display(), e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .map_err(|e| TtsError::Engine(format!("Failed to send text: {}", e)))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| TtsError::Engine(format!("espeak-ng did not finish: {}", e)))?;

        if !output.status.success() {
            return Err(TtsError::Engine(format!(
                "espeak-ng failed ({}): {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        if !output_path.exists() {
            return Err(TtsError::FileWrite(format!(
                "espeak-ng: output file not created: {}",
                output_path.display()
            )));
        }

        Ok(())
    }

    fn list_voices(&self, config: &EngineConfig) -> Result<Vec<VoiceInfo>, TtsError> {
        let output = Command::new(&self.binary)
            .arg(format!("--voices={}", config.language))
            .output()
            .map_err(|e| TtsError::Unavailable(format!("{}: {}", self.binary.display(), e)))?;

        if !output.status.success() {
            return Err(TtsError::Engine(format!(
                "espeak-ng --voices failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(Self::parse_voice_table(&String::from_utf8_lossy(&output.stdout)))
    }

    fn engine_name(&self) -> &str {
        "espeak-ng"
    }
}
