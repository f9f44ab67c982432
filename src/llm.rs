use crate::config::Config;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::time::Duration;

#[async_trait]
pub trait LlmClient: Send + Sync + Debug {
    async fn chat(&self, system: &str, user: &str) -> Result<String>;

    /// Same as `chat`, but asks the provider to constrain output to a JSON object.
    async fn chat_json(&self, system: &str, user: &str) -> Result<String> {
        self.chat(system, user).await
    }

    /// `image_data_url` is a `data:<mime>;base64,<payload>` URL.
    async fn describe_image(&self, _prompt: &str, _image_data_url: &str) -> Result<String> {
        Err(anyhow!("Image input is not supported by this LLM provider"))
    }
}

pub fn create_llm(config: &Config) -> Result<Box<dyn LlmClient>> {
    let timeout = Duration::from_secs(config.server.request_timeout_seconds);
    match config.llm.provider.as_str() {
        "openai" => {
            let cfg = config.llm.openai.as_ref().context("OpenAI config missing")?;
            if cfg.api_key.is_empty() {
                anyhow::bail!("OpenAI API key missing. Set OPENAI_API_KEY or llm.openai.api_key.");
            }
            Ok(Box::new(OpenAIClient::new(
                &cfg.api_key,
                &cfg.model,
                cfg.base_url.as_deref(),
                timeout,
            )?))
        }
        "ollama" => {
            let cfg = config.llm.ollama.as_ref().context("Ollama config missing")?;
            Ok(Box::new(OllamaClient::new(&cfg.base_url, &cfg.model, timeout)?))
        }
        _ => Err(anyhow!("Unknown LLM provider: {}", config.llm.provider)),
    }
}

// --- OpenAI ---

#[derive(Debug)]
pub struct OpenAIClient {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAIClient {
    pub fn new(
        api_key: &str,
        model: &str,
        base_url: Option<&str>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: base_url
                .unwrap_or("https://api.openai.com/v1")
                .trim_end_matches('/')
                .to_string(),
            client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }

    async fn complete(&self, messages: Vec<OpenAIMessage>, json_mode: bool) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);

        let request_body = OpenAIRequest {
            model: self.model.clone(),
            messages,
            response_format: json_mode.then_some(OpenAIResponseFormat { kind: "json_object" }),
        };

        log::debug!("OpenAI request to {} (json_mode={})", url, json_mode);
        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request_body)
            .send()
            .await
            .context("OpenAI request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error_text = resp.text().await?;
            return Err(anyhow!("OpenAI API error ({}): {}", status, error_text));
        }

        let result: OpenAIResponse = resp.json().await.context("Failed to decode OpenAI response")?;
        first_choice_content(result)
    }
}

fn first_choice_content(result: OpenAIResponse) -> Result<String> {
    result
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| anyhow!("OpenAI response empty or missing content"))
}

#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<OpenAIResponseFormat>,
}

#[derive(Serialize)]
struct OpenAIResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct OpenAIMessage {
    role: String,
    content: OpenAIContent,
}

impl OpenAIMessage {
    fn text(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: OpenAIContent::Text(content.to_string()),
        }
    }
}

#[derive(Serialize)]
#[serde(untagged)]
enum OpenAIContent {
    Text(String),
    Parts(Vec<OpenAIContentPart>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OpenAIContentPart {
    Text { text: String },
    ImageUrl { image_url: OpenAIImageUrl },
}

#[derive(Serialize)]
struct OpenAIImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessageResponse,
}

#[derive(Deserialize)]
struct OpenAIMessageResponse {
    content: Option<String>,
}

#[async_trait]
impl LlmClient for OpenAIClient {
    async fn chat(&self, system: &str, user: &str) -> Result<String> {
        let messages = vec![
            OpenAIMessage::text("system", system),
            OpenAIMessage::text("user", user),
        ];
        self.complete(messages, false).await
    }

    async fn chat_json(&self, system: &str, user: &str) -> Result<String> {
        let messages = vec![
            OpenAIMessage::text("system", system),
            OpenAIMessage::text("user", user),
        ];
        self.complete(messages, true).await
    }

    async fn describe_image(&self, prompt: &str, image_data_url: &str) -> Result<String> {
        let messages = vec![OpenAIMessage {
            role: "user".to_string(),
            content: OpenAIContent::Parts(vec![
                OpenAIContentPart::Text { text: prompt.to_string() },
                OpenAIContentPart::ImageUrl {
                    image_url: OpenAIImageUrl { url: image_data_url.to_string() },
                },
            ]),
        }];
        self.complete(messages, false).await
    }
}

// --- Ollama ---

#[derive(Debug)]
pub struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }

    async fn send(
        &self,
        messages: Vec<OllamaMessage>,
        format: Option<&'static str>,
    ) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);

        let request_body = OllamaRequest {
            model: self.model.clone(),
            messages,
            stream: false,
            format,
        };

        let resp = self
            .client
            .post(&url)
            .json(&request_body)
            .send()
            .await
            .context("Ollama request failed")?;

        if !resp.status().is_success() {
            let error_text = resp.text().await?;
            return Err(anyhow!("Ollama API error: {}", error_text));
        }

        let result: OllamaResponse = resp.json().await.context("Failed to decode Ollama response")?;
        Ok(result.message.content)
    }
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
}

#[derive(Serialize)]
struct OllamaMessage {
    role: String,
    content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
}

impl OllamaMessage {
    fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
            images: Vec::new(),
        }
    }
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: OllamaMessageResponse,
}

#[derive(Deserialize)]
struct OllamaMessageResponse {
    content: String,
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn chat(&self, system: &str, user: &str) -> Result<String> {
        let messages = vec![OllamaMessage::new("system", system), OllamaMessage::new("user", user)];
        self.send(messages, None).await
    }

    async fn chat_json(&self, system: &str, user: &str) -> Result<String> {
        let messages = vec![OllamaMessage::new("system", system), OllamaMessage::new("user", user)];
        self.send(messages, Some("json")).await
    }

    async fn describe_image(&self, prompt: &str, image_data_url: &str) -> Result<String> {
        // Ollama wants the bare base64 payload
        let payload = image_data_url
            .split_once(";base64,")
            .map(|(_, data)| data)
            .unwrap_or(image_data_url);
        let mut message = OllamaMessage::new("user", prompt);
        message.images.push(payload.to_string());
        self.send(vec![message], None).await
    }
}
