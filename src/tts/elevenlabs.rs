use super::TtsClient;
use crate::config::ElevenLabsConfig;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const XI_API_KEY_HEADER: &str = "xi-api-key";

pub struct ElevenLabsClient {
    base_url: String,
    model_id: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct PreviewRequest<'a> {
    voice_description: &'a str,
    text: &'a str,
}

#[derive(Serialize)]
struct CreateVoiceRequest<'a> {
    voice_name: &'a str,
    voice_description: &'a str,
    generated_voice_id: &'a str,
}

#[derive(Deserialize)]
struct CreateVoiceResponse {
    voice_id: String,
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
}

impl ElevenLabsClient {
    pub fn new(config: &ElevenLabsConfig, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut key = HeaderValue::from_str(&config.api_key).context("Invalid ElevenLabs API key")?;
        key.set_sensitive(true);
        headers.insert(XI_API_KEY_HEADER, key);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model_id: config.model_id.clone(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check(resp: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status();
        let error_text = resp.text().await.unwrap_or_default();
        Err(anyhow!("ElevenLabs {} failed ({}): {}", what, status, error_text))
    }
}

#[async_trait]
impl TtsClient for ElevenLabsClient {
    async fn create_previews(&self, description: &str, text: &str) -> Result<serde_json::Value> {
        let resp = self
            .client
            .post(self.url("/v1/text-to-voice/create-previews"))
            .json(&PreviewRequest {
                voice_description: description,
                text,
            })
            .send()
            .await
            .context("ElevenLabs preview request failed")?;

        let resp = Self::check(resp, "preview generation").await?;
        let payload: serde_json::Value = resp.json().await?;
        log::debug!(
            "Received {} voice previews",
            payload["previews"].as_array().map_or(0, |p| p.len())
        );
        Ok(payload)
    }

    async fn create_voice_from_preview(
        &self,
        name: &str,
        description: &str,
        generated_voice_id: &str,
    ) -> Result<String> {
        let resp = self
            .client
            .post(self.url("/v1/text-to-voice/create-voice-from-preview"))
            .json(&CreateVoiceRequest {
                voice_name: name,
                voice_description: description,
                generated_voice_id,
            })
            .send()
            .await
            .context("ElevenLabs create voice request failed")?;

        let resp = Self::check(resp, "voice creation").await?;
        let created: CreateVoiceResponse = resp.json().await?;
        log::info!("Created voice '{}' as {}", name, created.voice_id);
        Ok(created.voice_id)
    }

    async fn delete_voice(&self, voice_id: &str) -> Result<()> {
        let resp = self
            .client
            .delete(self.url(&format!("/v1/voices/{}", voice_id)))
            .send()
            .await
            .context("ElevenLabs delete voice request failed")?;
        Self::check(resp, "voice deletion").await?;
        Ok(())
    }

    async fn synthesize(&self, voice_id: &str, text: &str) -> Result<Vec<u8>> {
        let resp = self
            .client
            .post(self.url(&format!("/v1/text-to-speech/{}", voice_id)))
            .header(ACCEPT, "audio/mpeg")
            .json(&SpeechRequest {
                text,
                model_id: &self.model_id,
            })
            .send()
            .await
            .context("ElevenLabs text-to-speech request failed")?;

        let resp = Self::check(resp, "text-to-speech").await?;
        Ok(resp.bytes().await?.to_vec())
    }
}
