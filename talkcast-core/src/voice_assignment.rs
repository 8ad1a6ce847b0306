//! Voice Assignment - Map speakers to engine voices
//!
//! Two strategies are supported:
//! - **Name inference**: guess a category from the speaker name, alternate
//!   unknown names by position, then pick the first catalog voice whose
//!   gender metadata matches.
//! - **Alternation**: even positions draw from pool A, odd positions from
//!   pool B, cycling inside each pool.
//!
//! `Auto` uses name inference when the engine reports gender metadata and
//! alternation otherwise. An empty catalog degrades every speaker to the
//! default selector.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::names::{detect_gender, Gender};

/// Selector used when the engine reports no voices at all
pub const FALLBACK_VOICE: &str = "default";

// ============================================================================
// DATA MODELS
// ============================================================================

/// Opaque engine-specific voice handle
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoiceSelector(String);

impl VoiceSelector {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for VoiceSelector {
    fn default() -> Self {
        Self::new(FALLBACK_VOICE)
    }
}

impl std::fmt::Display for VoiceSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VoiceSelector {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for VoiceSelector {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A voice as reported by an engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceInfo {
    pub selector: VoiceSelector,
    /// Human readable name
    pub name: String,
    /// Gender metadata, when the engine exposes it
    pub gender: Option<Gender>,
    #[serde(default)]
    pub languages: Vec<String>,
}

impl VoiceInfo {
    pub fn new(selector: impl Into<VoiceSelector>, name: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            name: name.into(),
            gender: None,
            languages: Vec::new(),
        }
    }

    pub fn with_gender(mut self, gender: Gender) -> Self {
        self.gender = Some(gender);
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.languages.push(language.into());
        self
    }
}

/// Voices available from one engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoiceCatalog {
    voices: Vec<VoiceInfo>,
}

impl VoiceCatalog {
    pub fn new(voices: Vec<VoiceInfo>) -> Self {
        Self { voices }
    }

    pub fn voices(&self) -> &[VoiceInfo] {
        &self.voices
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&VoiceInfo> {
        self.voices.get(index)
    }

    pub fn contains(&self, selector: &VoiceSelector) -> bool {
        self.voices.iter().any(|v| &v.selector == selector)
    }

    /// Whether any voice carries gender metadata
    pub fn has_gender_metadata(&self) -> bool {
        self.voices.iter().any(|v| v.gender.is_some())
    }

    pub fn first_with_gender(&self, gender: Gender) -> Option<&VoiceInfo> {
        self.voices.iter().find(|v| v.gender == Some(gender))
    }

    /// `"<index>: <name>"` lines for display
    pub fn describe(&self) -> Vec<String> {
        self.voices
            .iter()
            .enumerate()
            .map(|(i, v)| format!("{}: {} ({})", i, v.name, v.selector))
            .collect()
    }
}

/// Catalog positions feeding the alternation pools
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoicePresets {
    /// Pool A (even speaker positions)
    pub male: Vec<usize>,
    /// Pool B (odd speaker positions)
    pub female: Vec<usize>,
    /// Catalog position of the default voice
    pub default: usize,
}

impl Default for VoicePresets {
    fn default() -> Self {
        Self {
            male: vec![0, 2, 4],
            female: vec![1, 3, 5],
            default: 0,
        }
    }
}

/// How speakers are mapped to voices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStrategy {
    /// Name inference when the catalog has gender metadata, else alternation
    #[default]
    Auto,
    NameInference,
    Alternation,
}

impl AssignmentStrategy {
    /// Resolve `Auto` against a catalog
    pub fn resolve(self, catalog: &VoiceCatalog) -> AssignmentStrategy {
        match self {
            AssignmentStrategy::Auto if catalog.has_gender_metadata() => {
                AssignmentStrategy::NameInference
            }
            AssignmentStrategy::Auto => AssignmentStrategy::Alternation,
            other => other,
        }
    }
}

/// Voice picked for one speaker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceAssignment {
    pub speaker: String,
    pub voice: VoiceSelector,
    /// Category used to pick the voice (name inference only)
    pub category: Option<Gender>,
}

/// Speaker to voice mapping, in first-seen speaker order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceAssignmentMap {
    entries: Vec<VoiceAssignment>,
    default_voice: VoiceSelector,
}

impl VoiceAssignmentMap {
    pub fn new(default_voice: VoiceSelector) -> Self {
        Self {
            entries: Vec::new(),
            default_voice,
        }
    }

    /// Add or update the voice for a speaker
    pub fn set(&mut self, speaker: impl Into<String>, voice: VoiceSelector) {
        self.set_with_category(speaker.into(), voice, None);
    }

    fn set_with_category(&mut self, speaker: String, voice: VoiceSelector, category: Option<Gender>) {
        match self.entries.iter_mut().find(|e| e.speaker == speaker) {
            Some(entry) => {
                entry.voice = voice;
                entry.category = category;
            }
            None => self.entries.push(VoiceAssignment {
                speaker,
                voice,
                category,
            }),
        }
    }

    pub fn get(&self, speaker: &str) -> Option<&VoiceSelector> {
        self.entries
            .iter()
            .find(|e| e.speaker == speaker)
            .map(|e| &e.voice)
    }

    /// Voice for a speaker, falling back to the default selector
    pub fn resolve(&self, speaker: &str) -> &VoiceSelector {
        self.get(speaker).unwrap_or(&self.default_voice)
    }

    pub fn default_voice(&self) -> &VoiceSelector {
        &self.default_voice
    }

    pub fn entries(&self) -> &[VoiceAssignment] {
        &self.entries
    }

    pub fn speakers(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.speaker.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replace automatic picks with caller-supplied voices.
    ///
    /// Overrides for speakers not in the map are ignored.
    pub fn apply_overrides(&mut self, overrides: &HashMap<String, VoiceSelector>) {
        for (speaker, voice) in overrides {
            match self.entries.iter_mut().find(|e| &e.speaker == speaker) {
                Some(entry) => {
                    log::info!("Voice override: '{}' -> '{}'", speaker, voice);
                    entry.voice = voice.clone();
                    entry.category = None;
                }
                None => log::warn!("Ignoring voice override for unknown speaker '{}'", speaker),
            }
        }
    }
}

// ============================================================================
// ASSIGNMENT
// ============================================================================

/// Default selector for a catalog: the preset position, else the first voice
pub fn default_voice(catalog: &VoiceCatalog, presets: &VoicePresets) -> VoiceSelector {
    catalog
        .get(presets.default)
        .or_else(|| catalog.get(0))
        .map(|v| v.selector.clone())
        .unwrap_or_default()
}

/// Assign a voice to every speaker in `speakers`.
///
/// The returned map contains exactly the given speakers. Never fails: an
/// empty catalog maps everyone to the default selector.
pub fn auto_assign_voices(
    speakers: &[String],
    catalog: &VoiceCatalog,
    presets: &VoicePresets,
    strategy: AssignmentStrategy,
) -> VoiceAssignmentMap {
    let default = default_voice(catalog, presets);
    let mut map = VoiceAssignmentMap::new(default.clone());

    if catalog.is_empty() {
        log::warn!(
            "Engine reports no voices, all {} speakers use '{}'",
            speakers.len(),
            default
        );
        for speaker in speakers {
            map.set(speaker.clone(), default.clone());
        }
        return map;
    }

    let strategy = strategy.resolve(catalog);
    log::debug!("Assigning voices to {} speakers with {:?}", speakers.len(), strategy);

    let mut position = 0;
    for speaker in speakers {
        if map.get(speaker).is_some() {
            continue;
        }

        let (voice, category) = match strategy {
            AssignmentStrategy::Alternation => {
                (alternation_pick(position, catalog, presets), None)
            }
            _ => {
                let category = category_for(speaker, position);
                (category_voice(category, catalog), Some(category))
            }
        };

        log::info!("  '{}' -> '{}'", speaker, voice);
        map.set_with_category(speaker.clone(), voice, category);
        position += 1;
    }

    map
}

/// Category for a speaker; unknown names alternate by position
fn category_for(speaker: &str, position: usize) -> Gender {
    match detect_gender(speaker) {
        Gender::Neutral if position % 2 == 0 => Gender::Male,
        Gender::Neutral => Gender::Female,
        known => known,
    }
}

/// First voice with matching metadata, else the hard-coded category slot
fn category_voice(category: Gender, catalog: &VoiceCatalog) -> VoiceSelector {
    if let Some(voice) = catalog.first_with_gender(category) {
        return voice.selector.clone();
    }

    let slot = match category {
        Gender::Female => 1,
        _ => 0,
    };

    catalog
        .get(slot)
        .or_else(|| catalog.get(0))
        .map(|v| v.selector.clone())
        .unwrap_or_default()
}

fn alternation_pick(position: usize, catalog: &VoiceCatalog, presets: &VoicePresets) -> VoiceSelector {
    let pool = |indices: &[usize]| -> Vec<VoiceSelector> {
        indices
            .iter()
            .filter_map(|&i| catalog.get(i))
            .map(|v| v.selector.clone())
            .collect()
    };

    let mut pool_a = pool(&presets.male);
    let mut pool_b = pool(&presets.female);

    match (pool_a.is_empty(), pool_b.is_empty()) {
        (true, true) => {
            let first = default_voice(catalog, &VoicePresets { default: 0, ..presets.clone() });
            pool_b = vec![catalog.get(1).map(|v| v.selector.clone()).unwrap_or_else(|| first.clone())];
            pool_a = vec![first];
        }
        (true, false) => pool_a = pool_b.clone(),
        (false, true) => pool_b = pool_a.clone(),
        (false, false) => {}
    }

    let pool = if position % 2 == 0 { &pool_a } else { &pool_b };
    pool[(position / 2) % pool.len()].clone()
}

// ============================================================================
// TESTS
// ============================================================================
