use super::state::{AppState, DEFAULT_SESSION};
use crate::error::ServiceError;
use crate::script::StoryLine;
use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::header;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::path::Path;
use std::sync::Arc;

pub const SESSION_HEADER: &str = "x-session-id";

const IMAGE_PROMPT: &str = "Describe what is in this image.";
const PDF_SYSTEM_PROMPT: &str = "You summarize documents clearly and concisely.";
const PDF_TEXT_LIMIT: usize = 12_000;

pub fn create_router(state: Arc<AppState>) -> Router {
    log::info!("Creating API router with endpoints:");
    log::info!("  GET  /health");
    log::info!("  GET  /voices");
    log::info!("  POST /openai-json");
    log::info!("  POST /text-to-speech");
    log::info!("  POST /generate-previews");
    log::info!("  POST /create-voice-from-preview");
    log::info!("  POST /generate-and-create-voice");
    log::info!("  POST /edit-voice");
    log::info!("  POST /analyze-image");
    log::info!("  POST /chat-with-local-pdf");

    Router::new()
        .route("/health", get(health))
        .route("/voices", get(list_voices))
        .route("/openai-json", post(parse_story))
        .route("/text-to-speech", post(text_to_speech))
        .route("/generate-previews", post(generate_previews))
        .route("/create-voice-from-preview", post(create_voice_from_preview))
        .route("/generate-and-create-voice", post(generate_and_create_voice))
        .route("/edit-voice", post(edit_voice))
        .route("/analyze-image", post(analyze_image))
        .route("/chat-with-local-pdf", post(chat_with_local_pdf))
        .with_state(state)
}

/// Client session from the `x-session-id` header; absent or blank means the shared default.
pub struct SessionId(pub String);

impl<S: Send + Sync> FromRequestParts<S> for SessionId {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_SESSION);
        Ok(SessionId(id.to_string()))
    }
}

fn required<'a>(value: &'a Option<String>) -> Option<&'a str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SavedVoicesResponse {
    saved_voice_ids: Vec<String>,
}

async fn list_voices(
    State(state): State<Arc<AppState>>,
    SessionId(session): SessionId,
) -> Json<SavedVoicesResponse> {
    Json(SavedVoicesResponse {
        saved_voice_ids: state.voices.list(&session).await,
    })
}

#[derive(Debug, Deserialize)]
struct StoryRequest {
    story: Option<String>,
}

#[derive(Debug, Serialize)]
struct LinesResponse {
    lines: Vec<StoryLine>,
}

async fn parse_story(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<StoryRequest>,
) -> Result<Json<LinesResponse>, ServiceError> {
    let story = required(&payload.story)
        .ok_or_else(|| ServiceError::validation("Missing story in request body."))?;

    let lines = state
        .parser
        .parse(story)
        .await
        .map_err(|e| ServiceError::upstream("Error parsing story", e))?;
    log::info!("Parsed story into {} lines", lines.len());
    Ok(Json(LinesResponse { lines }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpeechRequest {
    text: Option<String>,
    lines: Option<Vec<StoryLine>>,
    voice_id: Option<String>,
}

async fn text_to_speech(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SpeechRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let voice_id = required(&payload.voice_id)
        .unwrap_or(state.config.voice.default_voice_id.as_str())
        .to_string();

    let texts: Vec<&str> = match (&payload.lines, required(&payload.text)) {
        (Some(lines), _) if !lines.is_empty() => {
            if let Some(i) = lines.iter().position(|l| l.text.trim().is_empty()) {
                return Err(ServiceError::validation(format!(
                    "Line {} has no text.",
                    i + 1
                )));
            }
            lines.iter().map(|l| l.text.trim()).collect()
        }
        (_, Some(text)) => vec![text],
        _ => return Err(ServiceError::validation("Missing text or lines in request body.")),
    };

    let mut audio = Vec::new();
    for (i, text) in texts.iter().enumerate() {
        let chunk = state
            .tts
            .synthesize(&voice_id, text)
            .await
            .map_err(|e| {
                let context = format!("Error converting text to speech (line {})", i + 1);
                ServiceError::upstream(context, e)
            })?;
        audio.extend_from_slice(&chunk);
    }
    log::info!("Synthesized {} segment(s), {} bytes", texts.len(), audio.len());

    Ok(([(header::CONTENT_TYPE, "audio/mpeg")], audio))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreviewRequest {
    voice_description: Option<String>,
    text: Option<String>,
}

async fn generate_previews(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PreviewRequest>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let (Some(description), Some(text)) =
        (required(&payload.voice_description), required(&payload.text))
    else {
        return Err(ServiceError::validation(
            "Missing voiceDescription or text in request body.",
        ));
    };

    let previews = state
        .tts
        .create_previews(description, text)
        .await
        .map_err(|e| ServiceError::upstream("Error generating previews", e))?;
    Ok(Json(previews))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateFromPreviewRequest {
    voice_name: Option<String>,
    voice_description: Option<String>,
    generated_voice_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreatedVoiceResponse {
    voice_id: String,
}

async fn create_voice_from_preview(
    State(state): State<Arc<AppState>>,
    SessionId(session): SessionId,
    Json(payload): Json<CreateFromPreviewRequest>,
) -> Result<Json<CreatedVoiceResponse>, ServiceError> {
    let (Some(name), Some(description), Some(generated_voice_id)) = (
        required(&payload.voice_name),
        required(&payload.voice_description),
        required(&payload.generated_voice_id),
    ) else {
        return Err(ServiceError::validation(
            "Missing voiceName, voiceDescription, or generatedVoiceId in request body.",
        ));
    };

    let voice_id = state
        .tts
        .create_voice_from_preview(name, description, generated_voice_id)
        .await
        .map_err(|e| ServiceError::upstream("Error creating voice", e))?;
    state.voices.record(&session, &voice_id).await;
    Ok(Json(CreatedVoiceResponse { voice_id }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DesignVoiceRequest {
    voice_name: Option<String>,
    voice_description: Option<String>,
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DesignedVoiceResponse {
    voice_id: String,
    saved_voice_ids: Vec<String>,
}

async fn generate_and_create_voice(
    State(state): State<Arc<AppState>>,
    SessionId(session): SessionId,
    Json(payload): Json<DesignVoiceRequest>,
) -> Result<Json<DesignedVoiceResponse>, ServiceError> {
    let (Some(name), Some(description), Some(text)) = (
        required(&payload.voice_name),
        required(&payload.voice_description),
        required(&payload.text),
    ) else {
        return Err(ServiceError::validation(
            "Missing voiceName, voiceDescription, or text in request body.",
        ));
    };

    let voice_id = state
        .tts
        .design_voice(name, description, text)
        .await
        .map_err(|e| ServiceError::upstream("Error generating and creating voice", e))?;
    let saved_voice_ids = state.voices.record(&session, &voice_id).await;
    Ok(Json(DesignedVoiceResponse {
        voice_id,
        saved_voice_ids,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EditVoiceRequest {
    voice_id: Option<String>,
    voice_name: Option<String>,
    voice_description: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EditedVoiceResponse {
    old_voice_id: String,
    new_voice_id: String,
    saved_voice_ids: Vec<String>,
}

/// Re-designs a saved voice from a new description. The vendor cannot edit a
/// designed voice in place, so a new one replaces the old.
async fn edit_voice(
    State(state): State<Arc<AppState>>,
    SessionId(session): SessionId,
    Json(payload): Json<EditVoiceRequest>,
) -> Result<Json<EditedVoiceResponse>, ServiceError> {
    let (Some(old_voice_id), Some(name), Some(description)) = (
        required(&payload.voice_id),
        required(&payload.voice_name),
        required(&payload.voice_description),
    ) else {
        return Err(ServiceError::validation(
            "Missing voiceId, voiceName, or voiceDescription in request body.",
        ));
    };

    if !state.voices.contains(&session, old_voice_id).await {
        return Err(ServiceError::not_found(format!("Voice {} not found", old_voice_id)));
    }

    let new_voice_id = state
        .tts
        .design_voice(name, description, &state.config.voice.preview_text)
        .await
        .map_err(|e| ServiceError::upstream("Error editing voice", e))?;

    if let Err(e) = state.tts.delete_voice(old_voice_id).await {
        log::warn!("Could not delete replaced voice {}: {:#}", old_voice_id, e);
    }

    let saved_voice_ids = state
        .voices
        .replace(&session, old_voice_id, &new_voice_id)
        .await?;
    log::info!("Voice {} replaced by {}", old_voice_id, new_voice_id);

    Ok(Json(EditedVoiceResponse {
        old_voice_id: old_voice_id.to_string(),
        new_voice_id,
        saved_voice_ids,
    }))
}

#[derive(Debug, Serialize)]
struct AnalysisResponse {
    analysis: String,
}

async fn analyze_image(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AnalysisResponse>, ServiceError> {
    let path = Path::new(&state.config.resources.image_path);
    let bytes = read_local_file(path, "Image").await?;

    let data_url = format!(
        "data:{};base64,{}",
        image_mime_type(path),
        base64::engine::general_purpose::STANDARD.encode(&bytes)
    );
    let analysis = state
        .llm
        .describe_image(IMAGE_PROMPT, &data_url)
        .await
        .map_err(|e| ServiceError::upstream("Error analyzing image", e))?;
    Ok(Json(AnalysisResponse { analysis }))
}

#[derive(Debug, Serialize)]
struct SummaryResponse {
    summary: String,
}

async fn chat_with_local_pdf(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SummaryResponse>, ServiceError> {
    let path = Path::new(&state.config.resources.pdf_path);
    let bytes = read_local_file(path, "PDF").await?;

    let text = tokio::task::spawn_blocking(move || {
        pdf_extract::extract_text_from_mem(&bytes).map_err(|e| e.to_string())
    })
    .await
    .map_err(|e| ServiceError::upstream("Error reading PDF", e))?
    .map_err(|e| ServiceError::upstream("Error extracting PDF text", e))?;

    let text = text.trim();
    if text.is_empty() {
        return Err(ServiceError::upstream("Error extracting PDF text", "no text found"));
    }
    let excerpt: String = text.chars().take(PDF_TEXT_LIMIT).collect();

    let summary = state
        .llm
        .chat(
            PDF_SYSTEM_PROMPT,
            &format!("Summarize the following document:\n\n{}", excerpt),
        )
        .await
        .map_err(|e| ServiceError::upstream("Error summarizing PDF", e))?;
    Ok(Json(SummaryResponse { summary }))
}

/// Missing configured files are reported as bad requests, like missing body fields.
async fn read_local_file(path: &Path, kind: &str) -> Result<Vec<u8>, ServiceError> {
    match tokio::fs::try_exists(path).await {
        Ok(true) => {}
        Ok(false) => {
            return Err(ServiceError::validation(format!(
                "{} file not found at {}",
                kind,
                path.display()
            )))
        }
        Err(e) => {
            return Err(ServiceError::upstream(
                format!("Error checking {}", path.display()),
                e,
            ))
        }
    }
    tokio::fs::read(path)
        .await
        .map_err(|e| ServiceError::upstream(format!("Error reading {}", path.display()), e))
}

fn image_mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/png",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::llm::LlmClient;
    use crate::script::LlmStoryParser;
    use crate::tts::TtsClient;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use std::sync::Mutex;
    use tower::ServiceExt;

    #[derive(Debug)]
    struct MockLlm;

    #[async_trait]
    impl LlmClient for MockLlm {
        async fn chat(&self, _system: &str, user: &str) -> Result<String> {
            Ok(format!("summary of {} chars", user.len()))
        }

        async fn chat_json(&self, _system: &str, _user: &str) -> Result<String> {
            let lines = r#"[{"character":"Alice","text":"Hi"},{"character":"Bob","text":"Hello"}]"#;
            Ok(format!(r#"{{"lines":{}}}"#, lines))
        }

        async fn describe_image(&self, _prompt: &str, image_data_url: &str) -> Result<String> {
            if !image_data_url.starts_with("data:image/png;base64,") {
                return Err(anyhow!("unexpected data url"));
            }
            Ok("a small square".to_string())
        }
    }

    #[derive(Default)]
    struct MockTts {
        created: Mutex<usize>,
        deleted: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TtsClient for MockTts {
        async fn create_previews(&self, description: &str, _text: &str) -> Result<Value> {
            Ok(json!({
                "previews": [{
                    "generated_voice_id": format!("gen-{}", description.len()),
                    "audio_base_64": ""
                }]
            }))
        }

        async fn create_voice_from_preview(
            &self,
            _name: &str,
            _description: &str,
            generated: &str,
        ) -> Result<String> {
            let mut created = self.created.lock().unwrap();
            *created += 1;
            Ok(format!("voice-{}-{}", generated, created))
        }

        async fn delete_voice(&self, voice_id: &str) -> Result<()> {
            self.deleted.lock().unwrap().push(voice_id.to_string());
            Ok(())
        }

        async fn synthesize(&self, voice_id: &str, text: &str) -> Result<Vec<u8>> {
            if text == "boom" {
                return Err(anyhow!("vendor exploded"));
            }
            Ok(format!("[{}:{}]", voice_id, text).into_bytes())
        }
    }

    fn app_with(config: Config) -> (Router, Arc<MockTts>) {
        let tts = Arc::new(MockTts::default());
        let llm: Arc<dyn LlmClient> = Arc::new(MockLlm);
        let parser = Arc::new(LlmStoryParser::new(llm.clone()));
        let state = AppState::new(config, llm, tts.clone(), parser);
        (create_router(Arc::new(state)), tts)
    }

    fn app() -> (Router, Arc<MockTts>) {
        let mut config = Config::default();
        config.voice.default_voice_id = "narrator".to_string();
        app_with(config)
    }

    fn post_json(uri: &str, session: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(session) = session {
            builder = builder.header(SESSION_HEADER, session);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn body_bytes(resp: axum::response::Response) -> Vec<u8> {
        axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    async fn body_json(resp: axum::response::Response) -> Value {
        serde_json::from_slice(&body_bytes(resp).await).unwrap()
    }

    #[tokio::test]
    async fn test_openai_json_returns_lines() {
        let (app, _) = app();
        let resp = app
            .oneshot(post_json("/openai-json", None, json!({ "story": "Alice: Hi\nBob: Hello" })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["lines"][0]["character"], "Alice");
        assert_eq!(body["lines"][1]["character"], "Bob");
    }

    #[tokio::test]
    async fn test_openai_json_rejects_blank_story() {
        let (app, _) = app();
        let resp = app
            .oneshot(post_json("/openai-json", None, json!({ "story": "  " })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_text_to_speech_single_and_lines() {
        let (app, _) = app();
        let resp = app
            .clone()
            .oneshot(post_json("/text-to-speech", None, json!({ "text": "Hello" })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "audio/mpeg");
        assert_eq!(body_bytes(resp).await, b"[narrator:Hello]".to_vec());

        let resp = app
            .oneshot(post_json(
                "/text-to-speech",
                None,
                json!({
                    "voiceId": "v7",
                    "lines": [
                        { "character": "Alice", "text": "Hi" },
                        { "character": "Bob", "text": "Yo" }
                    ]
                }),
            ))
            .await
            .unwrap();
        assert_eq!(body_bytes(resp).await, b"[v7:Hi][v7:Yo]".to_vec());
    }

    #[tokio::test]
    async fn test_text_to_speech_errors() {
        let (app, _) = app();
        let resp = app
            .clone()
            .oneshot(post_json("/text-to-speech", None, json!({})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = app
            .oneshot(post_json("/text-to-speech", None, json!({ "text": "boom" })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let text = String::from_utf8(body_bytes(resp).await).unwrap();
        assert!(text.contains("vendor exploded"));
    }

    #[tokio::test]
    async fn test_generate_previews_validation_and_passthrough() {
        let (app, _) = app();
        let resp = app
            .clone()
            .oneshot(post_json("/generate-previews", None, json!({ "text": "sample" })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = app
            .oneshot(post_json(
                "/generate-previews",
                None,
                json!({ "voiceDescription": "calm", "text": "sample" }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["previews"][0]["generated_voice_id"], "gen-4");
    }

    #[tokio::test]
    async fn test_created_voices_are_session_scoped() {
        let (app, _) = app();
        let resp = app
            .clone()
            .oneshot(post_json(
                "/create-voice-from-preview",
                Some("alpha"),
                json!({
                    "voiceName": "Hero",
                    "voiceDescription": "bold",
                    "generatedVoiceId": "gen-1"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["voice_id"], "voice-gen-1-1");

        let list = |session: &'static str| {
            Request::builder()
                .uri("/voices")
                .header(SESSION_HEADER, session)
                .body(Body::empty())
                .unwrap()
        };
        let alpha = body_json(app.clone().oneshot(list("alpha")).await.unwrap()).await;
        assert_eq!(alpha["savedVoiceIds"], json!(["voice-gen-1-1"]));
        let beta = body_json(app.oneshot(list("beta")).await.unwrap()).await;
        assert_eq!(beta["savedVoiceIds"], json!([]));
    }

    #[tokio::test]
    async fn test_create_voice_requires_all_fields() {
        let (app, _) = app();
        let resp = app
            .oneshot(post_json(
                "/create-voice-from-preview",
                None,
                json!({ "voiceName": "Hero", "voiceDescription": "bold" }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_generate_then_edit_voice() {
        let (app, tts) = app();
        let resp = app
            .clone()
            .oneshot(post_json(
                "/generate-and-create-voice",
                None,
                json!({ "voiceName": "Hero", "voiceDescription": "bold", "text": "sample text" }),
            ))
            .await
            .unwrap();
        let created = body_json(resp).await;
        assert_eq!(created["voiceId"], "voice-gen-4-1");
        assert_eq!(created["savedVoiceIds"], json!(["voice-gen-4-1"]));

        let resp = app
            .clone()
            .oneshot(post_json(
                "/edit-voice",
                None,
                json!({
                    "voiceId": "voice-gen-4-1",
                    "voiceName": "Hero",
                    "voiceDescription": "bolder"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let edited = body_json(resp).await;
        assert_eq!(edited["oldVoiceId"], "voice-gen-4-1");
        assert_eq!(edited["newVoiceId"], "voice-gen-6-2");
        assert_eq!(edited["savedVoiceIds"], json!(["voice-gen-6-2"]));
        assert_eq!(*tts.deleted.lock().unwrap(), vec!["voice-gen-4-1"]);

        let resp = app
            .oneshot(post_json(
                "/edit-voice",
                None,
                json!({
                    "voiceId": "voice-gen-4-1",
                    "voiceName": "Hero",
                    "voiceDescription": "again"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_analyze_image_reads_configured_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let image = dir.path().join("picture.png");
        std::fs::write(&image, [0x89, b'P', b'N', b'G'])?;

        let mut config = Config::default();
        config.resources.image_path = image.to_string_lossy().to_string();
        let (app, _) = app_with(config);

        let resp = app
            .oneshot(post_json("/analyze-image", None, json!({})))
            .await?;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["analysis"], "a small square");
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_local_files() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut config = Config::default();
        config.resources.image_path = dir.path().join("none.png").to_string_lossy().to_string();
        config.resources.pdf_path = dir.path().join("none.pdf").to_string_lossy().to_string();
        let (app, _) = app_with(config);

        let resp = app
            .clone()
            .oneshot(post_json("/analyze-image", None, json!({})))
            .await?;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = app
            .oneshot(post_json("/chat-with-local-pdf", None, json!({})))
            .await?;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let text = String::from_utf8(body_bytes(resp).await)?;
        assert!(text.contains("PDF file not found"));
        Ok(())
    }

    #[tokio::test]
    async fn test_voice_design_routes_require_all_fields() {
        let (app, tts) = app();
        let resp = app
            .clone()
            .oneshot(post_json(
                "/generate-and-create-voice",
                None,
                json!({ "voiceName": "Hero", "text": "sample text" }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = app
            .oneshot(post_json(
                "/edit-voice",
                None,
                json!({ "voiceId": "voice-1", "voiceDescription": "  " }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let text = String::from_utf8(body_bytes(resp).await).unwrap();
        assert!(text.contains("voiceName"));
        assert_eq!(*tts.created.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_text_to_speech_rejects_blank_line() {
        let (app, _) = app();
        let resp = app
            .oneshot(post_json(
                "/text-to-speech",
                None,
                json!({
                    "lines": [
                        { "character": "Alice", "text": "Hi" },
                        { "character": "Bob", "text": "   " }
                    ]
                }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let text = String::from_utf8(body_bytes(resp).await).unwrap();
        assert!(text.contains("Line 2"));
    }

    /// Single-page PDF; `text` is drawn in Helvetica when given.
    fn pdf_with_text(text: Option<&str>) -> Vec<u8> {
        let content = text
            .map(|t| format!("BT /F1 12 Tf 20 100 Td ({}) Tj ET", t))
            .unwrap_or_default();
        let objects = [
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 200 200] \
             /Resources << /Font << /F1 5 0 R >> >> /Contents 4 0 R >>"
                .to_string(),
            format!(
                "<< /Length {} >>\nstream\n{}\nendstream",
                content.len(),
                content
            ),
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
        ];

        let mut pdf = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for (i, body) in objects.iter().enumerate() {
            offsets.push(pdf.len());
            pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
        }
        let xref = pdf.len();
        pdf.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
        pdf.extend_from_slice(b"0000000000 65535 f \n");
        for offset in offsets {
            pdf.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        pdf.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
                objects.len() + 1,
                xref
            )
            .as_bytes(),
        );
        pdf
    }

    fn app_with_pdf(dir: &Path, text: Option<&str>) -> Result<Router> {
        let pdf = dir.join("document.pdf");
        std::fs::write(&pdf, pdf_with_text(text))?;
        let mut config = Config::default();
        config.resources.pdf_path = pdf.to_string_lossy().to_string();
        Ok(app_with(config).0)
    }

    #[tokio::test]
    async fn test_chat_with_local_pdf_summarizes_text() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let app = app_with_pdf(dir.path(), Some("Hello from the archive"))?;

        let resp = app
            .oneshot(post_json("/chat-with-local-pdf", None, json!({})))
            .await?;
        assert_eq!(resp.status(), StatusCode::OK);
        let summary = body_json(resp).await["summary"].as_str().unwrap_or_default().to_string();
        assert!(summary.starts_with("summary of"), "{}", summary);
        Ok(())
    }

    #[tokio::test]
    async fn test_chat_with_local_pdf_without_text() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let app = app_with_pdf(dir.path(), None)?;

        let resp = app
            .oneshot(post_json("/chat-with-local-pdf", None, json!({})))
            .await?;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let text = String::from_utf8(body_bytes(resp).await)?;
        assert!(text.contains("Error extracting PDF text"));
        Ok(())
    }

    #[test]
    fn test_image_mime_type() {
        assert_eq!(image_mime_type(Path::new("a.JPG")), "image/jpeg");
        assert_eq!(image_mime_type(Path::new("a.webp")), "image/webp");
        assert_eq!(image_mime_type(Path::new("a")), "image/png");
    }
}
