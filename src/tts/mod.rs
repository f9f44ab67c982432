use crate::config::Config;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::time::Duration;

pub mod elevenlabs;

/// Voice design and speech synthesis, backed by a hosted vendor.
#[async_trait]
pub trait TtsClient: Send + Sync {
    /// Returns the vendor's preview payload as-is; see [`first_preview_id`].
    async fn create_previews(&self, description: &str, text: &str) -> Result<serde_json::Value>;

    async fn create_voice_from_preview(
        &self,
        name: &str,
        description: &str,
        generated_voice_id: &str,
    ) -> Result<String>;

    async fn delete_voice(&self, voice_id: &str) -> Result<()>;

    /// MPEG audio for `text` spoken by `voice_id`.
    async fn synthesize(&self, voice_id: &str, text: &str) -> Result<Vec<u8>>;

    /// Designs a voice from a description and persists the first preview under `name`.
    async fn design_voice(
        &self,
        name: &str,
        description: &str,
        sample_text: &str,
    ) -> Result<String> {
        let previews = self.create_previews(description, sample_text).await?;
        let generated_voice_id = first_preview_id(&previews)?;
        self.create_voice_from_preview(name, description, &generated_voice_id)
            .await
    }
}

pub fn first_preview_id(previews: &serde_json::Value) -> Result<String> {
    previews
        .get("previews")
        .and_then(|p| p.as_array())
        .and_then(|p| p.first())
        .and_then(|p| p.get("generated_voice_id"))
        .and_then(|id| id.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Preview response contains no generated voice"))
}

pub fn create_tts_client(config: &Config) -> Result<Box<dyn TtsClient>> {
    let timeout = Duration::from_secs(config.server.request_timeout_seconds);
    match config.voice.provider.as_str() {
        "elevenlabs" => {
            let cfg = config
                .voice
                .elevenlabs
                .as_ref()
                .context("ElevenLabs config missing")?;
            if cfg.api_key.is_empty() {
                anyhow::bail!(
                    "ElevenLabs API key missing. Set ELEVEN_LABS_API_KEY or voice.elevenlabs.api_key."
                );
            }
            Ok(Box::new(elevenlabs::ElevenLabsClient::new(cfg, timeout)?))
        }
        _ => Err(anyhow!("Unknown TTS provider: {}", config.voice.provider)),
    }
}
