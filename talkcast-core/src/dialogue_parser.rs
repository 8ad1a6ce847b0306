//! Dialogue Parser - Split speaker-tagged text into ordered turns
//!
//! Dialogue is written as a sequence of bracketed speaker markers, each
//! followed by what that speaker says:
//!
//! ```text
//! [JOHN] Hello, how are you?
//! [SARAH] Hi John! I'm doing great.
//! ```
//!
//! Turn extraction and speaker listing share one marker grammar:
//!
//! ```text
//! MARKER     := "[" SPEAKER_ID "]"
//! SPEAKER_ID := [A-Za-z] [A-Za-z0-9_]*
//! ```
//!
//! Anything in brackets that does not match the grammar (`[1]`, `[a b]`, an
//! unterminated `[`) is literal text of the surrounding turn.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Speaker used when the input carries no marker at all
pub const DEFAULT_SPEAKER: &str = "Speaker";

/// Speaking rate used for duration estimates (words per minute)
pub const DEFAULT_WORDS_PER_MINUTE: u32 = 150;

static MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[([A-Za-z][A-Za-z0-9_]*)\]").expect("marker pattern is a valid regex")
});

// ============================================================================
// DATA MODELS
// ============================================================================

/// One speaker's contiguous utterance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueTurn {
    pub speaker: String,
    pub text: String,
}

impl DialogueTurn {
    pub fn new(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
        }
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// Per-speaker statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeakerStats {
    pub name: String,
    pub turn_count: usize,
    pub total_characters: usize,
}

/// Parsed dialogue: ordered turns plus the speakers found in the source text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dialogue {
    pub turns: Vec<DialogueTurn>,
    /// Unique speakers in first-seen order, as listed by [`detect_speakers`]
    pub speakers: Vec<String>,
}

// ============================================================================
// PARSING
// ============================================================================

/// Parse dialogue text into ordered turns.
///
/// Markers without following text produce no turn. Input without any marker
/// becomes a single turn under [`DEFAULT_SPEAKER`]; empty input yields an
/// empty sequence.
pub fn parse_dialogue(text: &str) -> Vec<DialogueTurn> {
    let markers: Vec<_> = MARKER.captures_iter(text).collect();

    if markers.is_empty() {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }
        return vec![DialogueTurn::new(DEFAULT_SPEAKER, trimmed)];
    }

    if let Some(first) = markers.first().and_then(|c| c.get(0)) {
        let preamble = text[..first.start()].trim();
        if !preamble.is_empty() {
            log::warn!(
                "Ignoring {} chars of text before the first speaker marker",
                preamble.len()
            );
        }
    }

    let mut turns = Vec::with_capacity(markers.len());
    for (i, caps) in markers.iter().enumerate() {
        let (Some(whole), Some(speaker)) = (caps.get(0), caps.get(1)) else {
            continue;
        };

        let end = markers
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(text.len());

        let body = text[whole.end()..end].trim();
        if body.is_empty() {
            log::debug!("Marker [{}] has no text, skipping", speaker.as_str());
            continue;
        }

        turns.push(DialogueTurn::new(speaker.as_str(), body));
    }

    turns
}

/// Unique speaker identifiers in first-occurrence order.
///
/// Uses the same grammar as [`parse_dialogue`]; markers with no text are
/// still listed.
pub fn detect_speakers(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut speakers = Vec::new();

    for caps in MARKER.captures_iter(text) {
        if let Some(m) = caps.get(1) {
            if seen.insert(m.as_str()) {
                speakers.push(m.as_str().to_string());
            }
        }
    }

    speakers
}

impl Dialogue {
    /// Parse text into turns and its speaker list.
    ///
    /// When the text has no markers the speaker list is derived from the
    /// turns, so a plain-text input lists [`DEFAULT_SPEAKER`].
    pub fn parse(text: &str) -> Self {
        let turns = parse_dialogue(text);
        let mut speakers = detect_speakers(text);

        if speakers.is_empty() {
            for turn in &turns {
                if !speakers.contains(&turn.speaker) {
                    speakers.push(turn.speaker.clone());
                }
            }
        }

        Self { turns, speakers }
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }

    /// Get total character count
    pub fn total_characters(&self) -> usize {
        self.turns.iter().map(|t| t.text.chars().count()).sum()
    }

    /// Per-speaker statistics in first-seen order
    pub fn speaker_stats(&self) -> Vec<SpeakerStats> {
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut stats: Vec<SpeakerStats> = Vec::new();

        for turn in &self.turns {
            let slot = *index.entry(turn.speaker.as_str()).or_insert_with(|| {
                stats.push(SpeakerStats {
                    name: turn.speaker.clone(),
                    turn_count: 0,
                    total_characters: 0,
                });
                stats.len() - 1
            });

            stats[slot].turn_count += 1;
            stats[slot].total_characters += turn.text.chars().count();
        }

        stats
    }

    /// Filter turns by speaker
    pub fn turns_for(&self, speaker: &str) -> Vec<&DialogueTurn> {
        self.turns.iter().filter(|t| t.speaker == speaker).collect()
    }

    /// Rough spoken duration at `words_per_minute`
    pub fn estimated_duration_secs(&self, words_per_minute: u32) -> f64 {
        let words: usize = self.turns.iter().map(DialogueTurn::word_count).sum();
        let wpm = words_per_minute.max(1) as f64;
        words as f64 / (wpm / 60.0)
    }
}

// ============================================================================
// TESTS
// ============================================================================
