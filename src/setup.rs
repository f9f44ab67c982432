use crate::config::{Config, CONFIG_PATH};
use crate::session::StorySession;
use anyhow::Result;
use inquire::Text;
use std::collections::HashMap;
use std::path::Path;

/// Prompts for a voice description per character, pre-filled from the session or from
/// descriptions remembered in `config.yml`, then remembers the answers.
pub fn assign_voices(session: &StorySession, config: &Config) -> Result<()> {
    let characters = session.characters();
    if characters.is_empty() {
        println!("The story has no lines to voice.");
        return Ok(());
    }

    println!("Describe a voice for each character (leave empty for the default voice).");
    let mut chosen = HashMap::new();
    for character in characters {
        let current = session
            .voice_description(&character)
            .or_else(|| config.voice.descriptions.get(&character).cloned())
            .unwrap_or_default();
        let label = format!("{}:", character);
        let description = Text::new(&label)
            .with_initial_value(&current)
            .with_placeholder("e.g. elderly man, deep gravelly voice, slow")
            .prompt()?;
        session.set_voice_description(&character, &description);
        chosen.insert(character, description);
    }

    if let Err(e) = Config::remember_voice_descriptions(Path::new(CONFIG_PATH), &chosen) {
        log::warn!("Could not remember voice descriptions: {:#}", e);
    }
    Ok(())
}
