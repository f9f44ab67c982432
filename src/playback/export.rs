use super::{PlaybackBackend, Track, TrackSource};
use anyhow::{anyhow, Context, Result};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// "Plays" tracks by appending their audio to one file, in play order.
/// MPEG frames concatenate cleanly, so the result is a single playable MP3.
/// Each play completes immediately; the caller fires `track_ended` right after.
pub struct ExportBackend {
    path: PathBuf,
    written: usize,
}

impl ExportBackend {
    /// Truncates `path`.
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tracks_written(&self) -> usize {
        self.written
    }
}

impl PlaybackBackend for ExportBackend {
    fn play(&mut self, track: &Track) -> Result<()> {
        let data = match &track.source {
            TrackSource::Audio(data) => data,
            TrackSource::Url(url) => return Err(anyhow!("Cannot export remote track {}", url)),
        };
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        file.write_all(data)?;
        self.written += 1;
        Ok(())
    }

    fn pause(&mut self) {}
}
