use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub const CONFIG_PATH: &str = "config.yml";

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default = "default_output")]
    pub output_folder: String,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub voice: VoiceConfig,

    #[serde(default)]
    pub story: StoryConfig,

    #[serde(default)]
    pub resources: ResourceConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_seconds: default_timeout(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String, // "openai" or "ollama"
    pub openai: Option<OpenAIConfig>,
    pub ollama: Option<OllamaConfig>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            openai: None,
            ollama: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct OpenAIConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_openai_model")]
    pub model: String,
    pub base_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VoiceConfig {
    #[serde(default = "default_voice_provider")]
    pub provider: String,
    #[serde(default = "default_voice_id")]
    pub default_voice_id: String,
    /// Sample sentence the vendor speaks when designing a voice from a description.
    #[serde(default = "default_preview_text")]
    pub preview_text: String,
    pub elevenlabs: Option<ElevenLabsConfig>,
    /// Descriptions chosen in earlier `play` runs, keyed by character.
    #[serde(default)]
    pub descriptions: HashMap<String, String>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            provider: default_voice_provider(),
            default_voice_id: default_voice_id(),
            preview_text: default_preview_text(),
            elevenlabs: None,
            descriptions: HashMap::new(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ElevenLabsConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_elevenlabs_base_url")]
    pub base_url: String,
    #[serde(default = "default_elevenlabs_model")]
    pub model_id: String,
}

impl Default for ElevenLabsConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_elevenlabs_base_url(),
            model_id: default_elevenlabs_model(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StoryConfig {
    #[serde(default = "default_story_parser")]
    pub parser: String, // "llm" or "colon"
}

impl Default for StoryConfig {
    fn default() -> Self {
        Self {
            parser: default_story_parser(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ResourceConfig {
    #[serde(default = "default_image_path")]
    pub image_path: String,
    #[serde(default = "default_pdf_path")]
    pub pdf_path: String,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            image_path: default_image_path(),
            pdf_path: default_pdf_path(),
        }
    }
}

fn default_output() -> String {
    "output".to_string()
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    3000
}
fn default_timeout() -> u64 {
    120
}
fn default_llm_provider() -> String {
    "openai".to_string()
}
fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_voice_provider() -> String {
    "elevenlabs".to_string()
}
fn default_voice_id() -> String {
    "JBFqnCBsd6RMkjVDRZzb".to_string()
}
fn default_preview_text() -> String {
    "Every story needs a voice, and this one is mine. Listen closely, because the tale I am about to tell has twists you will not see coming.".to_string()
}
fn default_elevenlabs_base_url() -> String {
    "https://api.elevenlabs.io".to_string()
}
fn default_elevenlabs_model() -> String {
    "eleven_multilingual_v2".to_string()
}
fn default_story_parser() -> String {
    "llm".to_string()
}
fn default_image_path() -> String {
    "assets/image.png".to_string()
}
fn default_pdf_path() -> String {
    "assets/document.pdf".to_string()
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_PATH))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::read_from(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// The file as written, without environment overrides.
    pub fn read_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("{} not found. Please create one.", path.display());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_yaml_ng::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = serde_yaml_ng::to_string(self)?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Merges `chosen` into the descriptions stored at `path`. Blank entries are forgotten.
    /// The file is re-read so credentials taken from the environment are never written out.
    pub fn remember_voice_descriptions(
        path: &Path,
        chosen: &HashMap<String, String>,
    ) -> Result<()> {
        let mut on_disk = Self::read_from(path)?;
        for (character, description) in chosen {
            let description = description.trim();
            if description.is_empty() {
                on_disk.voice.descriptions.remove(character);
            } else {
                on_disk
                    .voice
                    .descriptions
                    .insert(character.clone(), description.to_string());
            }
        }
        on_disk.save_to(path)
    }

    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.output_folder)?;
        Ok(())
    }

    /// Credentials from the environment win over the file.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("OPENAI_API_KEY").filter(|k| !k.is_empty()) {
            self.llm.openai.get_or_insert_with(OpenAIConfig::default).api_key = key;
        }
        if let Some(key) = lookup("ELEVEN_LABS_API_KEY").filter(|k| !k.is_empty()) {
            self.voice
                .elevenlabs
                .get_or_insert_with(ElevenLabsConfig::default)
                .api_key = key;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_minimal_yaml_fills_defaults() {
        let config: Config = serde_yaml_ng::from_str("output_folder: out\n").unwrap();
        assert_eq!(config.output_folder, "out");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.voice.provider, "elevenlabs");
        assert_eq!(config.story.parser, "llm");
        assert!(config.voice.elevenlabs.is_none());
    }

    #[test]
    fn test_env_overrides_file_keys() {
        let yaml = r#"
llm:
  provider: openai
  openai:
    api_key: from-file
    model: gpt-4o
voice:
  elevenlabs:
    api_key: from-file
"#;
        let mut config: Config = serde_yaml_ng::from_str(yaml).unwrap();
        let env: HashMap<&str, &str> = [("OPENAI_API_KEY", "from-env")].into_iter().collect();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        let openai = config.llm.openai.unwrap();
        assert_eq!(openai.api_key, "from-env");
        assert_eq!(openai.model, "gpt-4o");
        let eleven = config.voice.elevenlabs.unwrap();
        assert_eq!(eleven.api_key, "from-file");
        assert_eq!(eleven.base_url, "https://api.elevenlabs.io");
    }

    #[test]
    fn test_env_creates_missing_sections() {
        let mut config = Config::default();
        config.apply_env(|k| (k == "ELEVEN_LABS_API_KEY").then(|| "xi".to_string()));
        assert_eq!(config.voice.elevenlabs.unwrap().api_key, "xi");
        assert!(config.llm.openai.is_none());
    }

    #[test]
    fn test_load_from_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.yml");
        fs::write(&path, "server:\n  port: 8080\nstory:\n  parser: colon\n")?;

        let config = Config::load_from(&path)?;
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.story.parser, "colon");
        Ok(())
    }

    #[test]
    fn test_remember_voice_descriptions() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.yml");
        fs::write(
            &path,
            "voice:\n  elevenlabs:\n    api_key: from-file\n  descriptions:\n    Hero: brave\n",
        )?;

        let chosen: HashMap<String, String> = [
            ("Hero".to_string(), " ".to_string()),
            ("Narrator".to_string(), " warm, slow ".to_string()),
        ]
        .into_iter()
        .collect();
        Config::remember_voice_descriptions(&path, &chosen)?;

        let saved = Config::read_from(&path)?;
        assert_eq!(saved.voice.descriptions.len(), 1);
        assert_eq!(saved.voice.descriptions["Narrator"], "warm, slow");
        assert_eq!(saved.voice.elevenlabs.unwrap().api_key, "from-file");
        Ok(())
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load_from(&dir.path().join("nope.yml")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
