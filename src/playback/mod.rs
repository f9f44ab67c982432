//! Ordered, back-to-back playback of a fixed track list.
//!
//! The controller never touches audio hardware itself. It drives a
//! [`PlaybackBackend`] and advances only when told a track finished
//! naturally through [`PlaybackController::track_ended`].
//!
//! Resume policy: [`PlaybackController::start`] always plays from the first
//! track. [`PlaybackController::resume`] continues from where
//! [`PlaybackController::stop`] paused.

use anyhow::Result;
use std::sync::Arc;

pub mod export;
#[cfg(feature = "playback")]
pub mod rodio_backend;

pub use export::ExportBackend;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackSource {
    Audio(Arc<[u8]>),
    Url(url::Url),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub character: String,
    pub source: TrackSource,
}

impl Track {
    pub fn audio(character: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            character: character.into(),
            source: TrackSource::Audio(data.into()),
        }
    }

    pub fn url(character: impl Into<String>, url: url::Url) -> Self {
        Self {
            character: character.into(),
            source: TrackSource::Url(url),
        }
    }
}

pub trait PlaybackBackend {
    /// Begin playing `track` from its start, replacing whatever was loaded.
    fn play(&mut self, track: &Track) -> Result<()>;
    fn pause(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Paused { index: usize },
    Playing { index: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    Started { index: usize },
    Advanced { index: usize },
    Stopped { index: usize },
    Finished,
    Failed { index: usize, message: String },
    /// The call had no effect in the current state.
    Ignored,
}

pub struct PlaybackController<B: PlaybackBackend> {
    backend: B,
    tracks: Vec<Track>,
    state: PlaybackState,
}

impl<B: PlaybackBackend> PlaybackController<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            tracks: Vec::new(),
            state: PlaybackState::Stopped,
        }
    }

    pub fn initialize(&mut self, tracks: Vec<Track>) {
        if self.is_playing() {
            self.stop();
        }
        log::info!("Playback initialized with {} tracks", tracks.len());
        self.tracks = tracks;
        self.state = PlaybackState::Stopped;
    }

    /// Plays from the first track, or stops when already playing.
    pub fn start(&mut self) -> PlaybackEvent {
        if self.is_playing() {
            return self.stop();
        }
        if self.tracks.is_empty() {
            return PlaybackEvent::Ignored;
        }
        self.play_at(0, |index| PlaybackEvent::Started { index })
    }

    pub fn resume(&mut self) -> PlaybackEvent {
        match self.state {
            PlaybackState::Playing { .. } => PlaybackEvent::Ignored,
            PlaybackState::Paused { index } => {
                self.play_at(index, |index| PlaybackEvent::Started { index })
            }
            PlaybackState::Stopped => self.start(),
        }
    }

    pub fn stop(&mut self) -> PlaybackEvent {
        match self.state {
            PlaybackState::Playing { index } => {
                self.backend.pause();
                self.state = PlaybackState::Paused { index };
                log::info!("Playback stopped at track {}", index);
                PlaybackEvent::Stopped { index }
            }
            _ => PlaybackEvent::Ignored,
        }
    }

    /// Completion signal for the current track. Ignored unless playing.
    pub fn track_ended(&mut self) -> PlaybackEvent {
        let PlaybackState::Playing { index } = self.state else {
            return PlaybackEvent::Ignored;
        };
        if index + 1 < self.tracks.len() {
            self.play_at(index + 1, |index| PlaybackEvent::Advanced { index })
        } else {
            self.state = PlaybackState::Stopped;
            log::info!("Playback finished after {} tracks", self.tracks.len());
            PlaybackEvent::Finished
        }
    }

    fn play_at(&mut self, index: usize, on_success: fn(usize) -> PlaybackEvent) -> PlaybackEvent {
        match self.backend.play(&self.tracks[index]) {
            Ok(()) => {
                self.state = PlaybackState::Playing { index };
                log::debug!("Playing track {} ({})", index, self.tracks[index].character);
                on_success(index)
            }
            Err(e) => {
                self.state = PlaybackState::Stopped;
                log::warn!("Playback failed at track {}: {:#}", index, e);
                PlaybackEvent::Failed {
                    index,
                    message: format!("{:#}", e),
                }
            }
        }
    }

    /// Plays the whole list from the start. `wait` must block until the
    /// backend's current track has finished. Returns how many tracks played.
    pub fn play_through<F>(&mut self, mut wait: F) -> Result<usize>
    where
        F: FnMut(&B),
    {
        let mut played = 0;
        let mut event = self.start();
        loop {
            match event {
                PlaybackEvent::Started { index } | PlaybackEvent::Advanced { index } => {
                    log::info!(
                        "Track {}/{}: {}",
                        index + 1,
                        self.tracks.len(),
                        self.tracks[index].character
                    );
                    played += 1;
                    wait(&self.backend);
                    event = self.track_ended();
                }
                PlaybackEvent::Failed { index, message } => {
                    anyhow::bail!("Playback failed at track {}: {}", index + 1, message)
                }
                _ => return Ok(played),
            }
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.state, PlaybackState::Playing { .. })
    }

    pub fn current_index(&self) -> usize {
        match self.state {
            PlaybackState::Stopped => 0,
            PlaybackState::Paused { index } | PlaybackState::Playing { index } => index,
        }
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}
