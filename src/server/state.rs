use crate::config::Config;
use crate::error::ServiceError;
use crate::llm::LlmClient;
use crate::script::StoryParser;
use crate::tts::TtsClient;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub const DEFAULT_SESSION: &str = "default";

/// Voice ids created through the API, grouped by client session.
#[derive(Default)]
pub struct VoiceStore {
    sessions: RwLock<HashMap<String, Vec<String>>>,
}

impl VoiceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `voice_id` and returns the session's ids after the change.
    pub async fn record(&self, session: &str, voice_id: &str) -> Vec<String> {
        let mut sessions = self.sessions.write().await;
        let ids = sessions.entry(session.to_string()).or_default();
        if !ids.iter().any(|id| id == voice_id) {
            ids.push(voice_id.to_string());
        }
        ids.clone()
    }

    pub async fn contains(&self, session: &str, voice_id: &str) -> bool {
        let sessions = self.sessions.read().await;
        sessions
            .get(session)
            .is_some_and(|ids| ids.iter().any(|id| id == voice_id))
    }

    /// Swaps `old` for `new` in place, keeping its position.
    pub async fn replace(
        &self,
        session: &str,
        old: &str,
        new: &str,
    ) -> Result<Vec<String>, ServiceError> {
        let mut sessions = self.sessions.write().await;
        let ids = sessions
            .get_mut(session)
            .ok_or_else(|| ServiceError::not_found(format!("Voice {} not found", old)))?;
        let slot = ids
            .iter_mut()
            .find(|id| id.as_str() == old)
            .ok_or_else(|| ServiceError::not_found(format!("Voice {} not found", old)))?;
        *slot = new.to_string();
        Ok(ids.clone())
    }

    pub async fn list(&self, session: &str) -> Vec<String> {
        let sessions = self.sessions.read().await;
        sessions.get(session).cloned().unwrap_or_default()
    }
}

pub struct AppState {
    pub config: Config,
    pub llm: Arc<dyn LlmClient>,
    pub tts: Arc<dyn TtsClient>,
    pub parser: Arc<dyn StoryParser>,
    pub voices: VoiceStore,
}

impl AppState {
    pub fn new(
        config: Config,
        llm: Arc<dyn LlmClient>,
        tts: Arc<dyn TtsClient>,
        parser: Arc<dyn StoryParser>,
    ) -> Self {
        Self {
            config,
            llm,
            tts,
            parser,
            voices: VoiceStore::new(),
        }
    }
}
