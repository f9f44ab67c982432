use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Character name → free-text voice description. Keys are case-sensitive.
#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq, Eq)]
pub struct VoiceAssignment {
    pub descriptions: HashMap<String, String>,
}

impl VoiceAssignment {
    pub fn set(&mut self, character: &str, description: &str) {
        self.descriptions
            .insert(character.to_string(), description.to_string());
    }

    /// The trimmed description, or `None` when the character should use the default voice.
    pub fn description_for(&self, character: &str) -> Option<&str> {
        self.descriptions
            .get(character)
            .map(|d| d.trim())
            .filter(|d| !d.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Generating,
    Failed(String),
}
