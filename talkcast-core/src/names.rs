//! Name-based gender guess used to vary voice assignment.
//!
//! This is a heuristic over common English given names, nothing more.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Voice category guessed from a speaker name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Neutral,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Neutral => "neutral",
        }
    }
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

static FEMALE_NAMES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "alice", "amanda", "amy", "angela", "anna", "ashley", "barbara", "betty", "carol",
        "caroline", "catherine", "chloe", "christine", "claire", "deborah", "diana", "donna",
        "dorothy", "elizabeth", "ella", "emily", "emma", "eve", "grace", "hannah", "helen",
        "isabella", "jane", "janet", "jennifer", "jessica", "julia", "julie", "karen", "kate",
        "katherine", "laura", "lily", "linda", "lisa", "lucy", "margaret", "maria", "mary",
        "megan", "melissa", "mia", "michelle", "nancy", "natalie", "nicole", "olivia", "rachel",
        "rebecca", "rose", "ruth", "sandra", "sarah", "sophia", "sophie", "susan", "victoria",
        "zoe",
    ]
    .into_iter()
    .collect()
});

static MALE_NAMES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "adam", "alex", "andrew", "anthony", "ben", "benjamin", "bob", "brian", "charles",
        "chris", "christopher", "daniel", "david", "edward", "eric", "frank", "george", "henry",
        "jack", "jacob", "james", "jason", "jeff", "john", "jonathan", "joseph", "joshua",
        "kevin", "kyle", "larry", "liam", "mark", "matthew", "michael", "mike", "noah", "oliver",
        "patrick", "paul", "peter", "richard", "robert", "ryan", "sam", "samuel", "scott",
        "steven", "thomas", "tim", "timothy", "tom", "william",
    ]
    .into_iter()
    .collect()
});

/// Guess a voice category from a speaker name (case-insensitive).
pub fn detect_gender(name: &str) -> Gender {
    let folded = name.trim().to_lowercase();

    if FEMALE_NAMES.contains(folded.as_str()) {
        Gender::Female
    } else if MALE_NAMES.contains(folded.as_str()) {
        Gender::Male
    } else {
        Gender::Neutral
    }
}
