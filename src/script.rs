use crate::config::Config;
use crate::llm::LlmClient;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One (speaker, utterance) unit, in narrative order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryLine {
    pub character: String,
    pub text: String,
}

impl StoryLine {
    pub fn new(character: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            character: character.into(),
            text: text.into(),
        }
    }
}

#[async_trait]
pub trait StoryParser: Send + Sync {
    async fn parse(&self, story: &str) -> Result<Vec<StoryLine>>;
}

pub fn create_story_parser(
    config: &Config,
    llm: Arc<dyn LlmClient>,
) -> Result<Arc<dyn StoryParser>> {
    match config.story.parser.as_str() {
        "llm" => Ok(Arc::new(LlmStoryParser::new(llm))),
        "colon" => Ok(Arc::new(ColonStoryParser)),
        other => Err(anyhow!("Unknown story parser: {}", other)),
    }
}

const SYSTEM_PROMPT: &str = "You split stories into spoken lines for a voice-acted reading. \
Respond with a single JSON object only.";

// --- LLM parser ---

pub struct LlmStoryParser {
    llm: Arc<dyn LlmClient>,
}

impl LlmStoryParser {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    fn prompt(story: &str) -> String {
        format!(
            "Split the following story into an ordered list of lines.\n\
            Rules:\n\
            1. Every line has a \"character\" (who speaks) and \"text\" (what is said).\n\
            2. Narration that is not spoken by a character belongs to \"Narrator\".\n\
            3. Keep the original order and wording.\n\
            4. Never put two consecutive lines with the same character; merge them instead.\n\
            Return JSON: {{ \"lines\": [ {{ \"character\": \"...\", \"text\": \"...\" }} ] }}\n\n\
            Story:\n{}",
            story
        )
    }
}

#[async_trait]
impl StoryParser for LlmStoryParser {
    async fn parse(&self, story: &str) -> Result<Vec<StoryLine>> {
        let response = self.llm.chat_json(SYSTEM_PROMPT, &Self::prompt(story)).await?;
        parse_lines_response(&response)
    }
}

#[derive(Deserialize)]
struct LinesResponse {
    lines: Option<Vec<StoryLine>>,
}

/// Decodes `{ "lines": [...] }`. A missing or null `lines` field is malformed;
/// an empty array is a valid story with nothing to say.
pub fn parse_lines_response(response: &str) -> Result<Vec<StoryLine>> {
    let clean_json = strip_code_blocks(response);
    let parsed: LinesResponse = serde_json::from_str(&clean_json)
        .with_context(|| format!("Failed to parse story lines JSON: {}", clean_json))?;
    let lines = parsed
        .lines
        .ok_or_else(|| anyhow!("Story parser response has no `lines` field"))?;
    Ok(normalize_lines(lines))
}

// --- Colon script parser ---

/// Reads `Name: what they say` per line. Lines without a colon are narration.
pub struct ColonStoryParser;

pub const NARRATOR: &str = "Narrator";

#[async_trait]
impl StoryParser for ColonStoryParser {
    async fn parse(&self, story: &str) -> Result<Vec<StoryLine>> {
        Ok(parse_colon_script(story))
    }
}

pub fn parse_colon_script(story: &str) -> Vec<StoryLine> {
    let lines = story
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| match line.split_once(':') {
            Some((character, text)) => StoryLine::new(character.trim(), text.trim()),
            None => StoryLine::new(NARRATOR, line.trim()),
        })
        .collect();
    normalize_lines(lines)
}

/// Trims, drops blank entries and merges adjacent lines from the same character.
pub fn normalize_lines(lines: Vec<StoryLine>) -> Vec<StoryLine> {
    let mut out: Vec<StoryLine> = Vec::with_capacity(lines.len());
    for line in lines {
        let character = line.character.trim();
        let text = line.text.trim();
        if character.is_empty() || text.is_empty() {
            continue;
        }
        match out.last_mut() {
            Some(prev) if prev.character == character => {
                prev.text.push(' ');
                prev.text.push_str(text);
            }
            _ => out.push(StoryLine::new(character, text)),
        }
    }
    out
}

pub fn strip_code_blocks(s: &str) -> String {
    let s = s.trim();
    if s.starts_with("```json") {
        s.trim_start_matches("```json").trim_end_matches("```").trim().to_string()
    } else if s.starts_with("```") {
        s.trim_start_matches("```").trim_end_matches("```").trim().to_string()
    } else {
        s.to_string()
    }
}
