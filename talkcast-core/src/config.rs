//! Configuration for the dialogue pipeline.
//!
//! Loaded from built-in defaults, an optional TOML/YAML/JSON file, then
//! `TALKCAST_`-prefixed environment variables (nested keys split on `__`,
//! e.g. `TALKCAST_ENGINE__RATE=180`).

use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::audio_mixer::MixerConfig;
use crate::engines::EngineKind;
use crate::synthesis::{EngineConfig, SynthesisMode, DEFAULT_PLACEHOLDER_MS};
use crate::voice_assignment::{AssignmentStrategy, VoicePresets, VoiceSelector};

/// Environment variable naming a config file
pub const CONFIG_PATH_ENV: &str = "TALKCAST_CONFIG";

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "TALKCAST_";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CastConfig {
    /// Log verbosity (error, warn, info, debug, trace)
    pub log_level: String,
    pub engine: EngineSettings,
    pub voices: VoiceSettings,
    pub mixer: MixerConfig,
    /// Where generated files go; see [`CastConfig::output_dir`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
}

impl Default for CastConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            engine: EngineSettings::default(),
            voices: VoiceSettings::default(),
            mixer: MixerConfig::default(),
            output_dir: None,
        }
    }
}

/// Speech engine selection and settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub kind: EngineKind,
    /// Override for the engine executable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary: Option<PathBuf>,
    /// Speaking rate in words per minute
    pub rate: u32,
    pub volume: f32,
    pub language: String,
    /// Length of the silence substituted for a failed turn
    pub placeholder_ms: u32,
    pub mode: SynthesisMode,
}

impl Default for EngineSettings {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            kind: EngineKind::Auto,
            binary: None,
            rate: engine.rate,
            volume: engine.volume,
            language: engine.language,
            placeholder_ms: DEFAULT_PLACEHOLDER_MS,
            mode: SynthesisMode::Sequential,
        }
    }
}

impl EngineSettings {
    /// Settings passed to the engine on every call
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            rate: self.rate,
            volume: self.volume,
            language: self.language.clone(),
        }
    }
}

/// Voice assignment settings
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceSettings {
    pub strategy: AssignmentStrategy,
    pub presets: VoicePresets,
    /// Fixed voices per speaker, applied after automatic assignment
    pub overrides: HashMap<String, VoiceSelector>,
}

impl CastConfig {
    /// Load configuration.
    ///
    /// `path` wins over `TALKCAST_CONFIG`; with neither, only defaults and
    /// environment variables apply.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));

        let mut figment = Figment::from(Serialized::defaults(CastConfig::default()));

        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path));
            }
            log::debug!("Loading configuration from {}", path.display());

            figment = match path.extension().and_then(|s| s.to_str()) {
                Some("yaml") | Some("yml") => figment.merge(Yaml::file(path)),
                Some("json") => figment.merge(Json::file(path)),
                _ => figment.merge(Toml::file(path)),
            };
        }

        let config: CastConfig = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__").ignore(&["config"]))
            .extract()
            .map_err(Box::new)?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.log_level.parse::<log::LevelFilter>().is_err() {
            return Err(ConfigError::Invalid(format!("unknown log level '{}'", self.log_level)));
        }
        if self.engine.rate == 0 {
            return Err(ConfigError::Invalid("engine.rate must be positive".to_string()));
        }
        if !(0.0..=1.0).contains(&self.engine.volume) {
            return Err(ConfigError::Invalid(format!(
                "engine.volume must be between 0.0 and 1.0, got {}",
                self.engine.volume
            )));
        }
        if let SynthesisMode::Concurrent { max_tasks: 0 } = self.engine.mode {
            return Err(ConfigError::Invalid("engine.mode.max_tasks must be at least 1".to_string()));
        }
        if self.mixer.sample_rate == 0 {
            return Err(ConfigError::Invalid("mixer.sample_rate must be positive".to_string()));
        }
        Ok(())
    }

    /// Configured output directory, else `<audio dir>/talkcast`, else `./output`
    pub fn output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(default_output_dir)
    }

    /// Parsed `log_level`; `validate` rejects unknown levels
    pub fn log_level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

fn default_output_dir() -> PathBuf {
    dirs::audio_dir()
        .map(|dir| dir.join("talkcast"))
        .unwrap_or_else(|| PathBuf::from("./output"))
}
