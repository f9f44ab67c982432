use crate::config::Config;
use crate::error::ServiceError;
use crate::playback::{PlaybackBackend, PlaybackController, Track};
use crate::script::{StoryLine, StoryParser};
use crate::state::{SessionStatus, VoiceAssignment};
use crate::tts::TtsClient;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded(usize),
    /// A later `load_story` call was issued before this one resolved; its result was dropped.
    Superseded,
}

#[derive(Default)]
struct SessionInner {
    lines: Vec<StoryLine>,
    assignment: VoiceAssignment,
    status: SessionStatus,
}

/// Parse → assign voices → synthesize → hand tracks to playback.
pub struct StorySession {
    parser: Arc<dyn StoryParser>,
    tts: Arc<dyn TtsClient>,
    default_voice_id: String,
    preview_text: String,
    latest_ticket: AtomicU64,
    inner: Mutex<SessionInner>,
    // description → provisioned voice id
    voice_cache: tokio::sync::Mutex<HashMap<String, String>>,
}

impl StorySession {
    pub fn new(config: &Config, parser: Arc<dyn StoryParser>, tts: Arc<dyn TtsClient>) -> Self {
        Self {
            parser,
            tts,
            default_voice_id: config.voice.default_voice_id.clone(),
            preview_text: config.voice.preview_text.clone(),
            latest_ticket: AtomicU64::new(0),
            inner: Mutex::new(SessionInner::default()),
            voice_cache: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub async fn load_story(&self, raw: &str) -> Result<LoadOutcome, ServiceError> {
        if raw.trim().is_empty() {
            return Err(ServiceError::validation("Story text is empty"));
        }

        let ticket = self.latest_ticket.fetch_add(1, Ordering::SeqCst) + 1;
        self.lock().status = SessionStatus::Loading;
        log::info!("Parsing story ({} chars, request {})", raw.len(), ticket);

        let result = self.parser.parse(raw).await;

        let mut inner = self.lock();
        if ticket != self.latest_ticket.load(Ordering::SeqCst) {
            log::debug!("Discarding story parse result for superseded request {}", ticket);
            return Ok(LoadOutcome::Superseded);
        }

        match result {
            Ok(lines) => {
                let count = lines.len();
                inner.lines = lines;
                inner.status = SessionStatus::Ready;
                log::info!("Story parsed into {} lines", count);
                Ok(LoadOutcome::Loaded(count))
            }
            Err(e) => {
                let err = ServiceError::upstream("Failed to parse story", e);
                inner.status = SessionStatus::Failed(err.to_string());
                Err(err)
            }
        }
    }

    pub fn set_voice_description(&self, character: &str, description: &str) {
        self.lock().assignment.set(character, description);
    }

    pub fn voice_description(&self, character: &str) -> Option<String> {
        self.lock().assignment.descriptions.get(character).cloned()
    }

    pub fn lines(&self) -> Vec<StoryLine> {
        self.lock().lines.clone()
    }

    /// Unique characters in order of first appearance.
    pub fn characters(&self) -> Vec<String> {
        let inner = self.lock();
        let mut seen = Vec::new();
        for line in &inner.lines {
            if !seen.contains(&line.character) {
                seen.push(line.character.clone());
            }
        }
        seen
    }

    pub fn status(&self) -> SessionStatus {
        self.lock().status.clone()
    }

    pub async fn generate<B: PlaybackBackend>(
        &self,
        player: &mut PlaybackController<B>,
    ) -> Result<usize, ServiceError> {
        self.generate_with_progress(player, |_, _| {}).await
    }

    /// Synthesizes every line in order. Any failure aborts the batch and leaves
    /// `player` untouched. `progress` receives (lines done, total).
    pub async fn generate_with_progress<B, F>(
        &self,
        player: &mut PlaybackController<B>,
        progress: F,
    ) -> Result<usize, ServiceError>
    where
        B: PlaybackBackend,
        F: Fn(usize, usize) + Sync,
    {
        let (lines, assignment) = {
            let mut inner = self.lock();
            inner.status = SessionStatus::Generating;
            (inner.lines.clone(), inner.assignment.clone())
        };

        match self.synthesize_lines(&lines, &assignment, &progress).await {
            Ok(tracks) => {
                let count = tracks.len();
                player.initialize(tracks);
                self.lock().status = SessionStatus::Ready;
                Ok(count)
            }
            Err(err) => {
                self.lock().status = SessionStatus::Failed(err.to_string());
                Err(err)
            }
        }
    }

    async fn synthesize_lines(
        &self,
        lines: &[StoryLine],
        assignment: &VoiceAssignment,
        progress: &(dyn Fn(usize, usize) + Sync),
    ) -> Result<Vec<Track>, ServiceError> {
        let mut tracks = Vec::with_capacity(lines.len());
        for (i, line) in lines.iter().enumerate() {
            let description = assignment.description_for(&line.character);
            let voice_id = self.voice_for(&line.character, description).await.map_err(|e| {
                ServiceError::upstream(
                    format!("Failed to create voice for {} (line {})", line.character, i + 1),
                    e,
                )
            })?;

            log::debug!("Synthesizing line {}/{} with voice {}", i + 1, lines.len(), voice_id);
            let audio = self.tts.synthesize(&voice_id, &line.text).await.map_err(|e| {
                ServiceError::upstream(
                    format!("Failed to synthesize line {} ({})", i + 1, line.character),
                    e,
                )
            })?;
            tracks.push(Track::audio(&line.character, audio));
            progress(i + 1, lines.len());
        }
        Ok(tracks)
    }

    async fn voice_for(
        &self,
        character: &str,
        description: Option<&str>,
    ) -> anyhow::Result<String> {
        let Some(description) = description else {
            return Ok(self.default_voice_id.clone());
        };

        let mut cache = self.voice_cache.lock().await;
        if let Some(voice_id) = cache.get(description) {
            return Ok(voice_id.clone());
        }
        log::info!("Designing voice for {}: {}", character, description);
        let voice_id = self
            .tts
            .design_voice(character, description, &self.preview_text)
            .await?;
        cache.insert(description.to_string(), voice_id.clone());
        Ok(voice_id)
    }
}
