use super::{PlaybackBackend, Track, TrackSource};
use anyhow::{anyhow, Context, Result};
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink};
use std::io::Cursor;

/// Plays tracks on the default output device.
pub struct RodioBackend {
    _stream: OutputStream,
    sink: Sink,
}

impl RodioBackend {
    pub fn try_new() -> Result<Self> {
        let stream =
            OutputStreamBuilder::open_default_stream().context("Failed to open audio output")?;
        let sink = Sink::connect_new(stream.mixer());
        Ok(Self {
            _stream: stream,
            sink,
        })
    }

    /// Blocks until the loaded track has finished.
    pub fn wait_until_end(&self) {
        self.sink.sleep_until_end();
    }
}

impl PlaybackBackend for RodioBackend {
    fn play(&mut self, track: &Track) -> Result<()> {
        let data = match &track.source {
            TrackSource::Audio(data) => data.to_vec(),
            TrackSource::Url(url) => {
                return Err(anyhow!("Remote tracks are not supported: {}", url))
            }
        };
        let source = Decoder::new(Cursor::new(data)).context("Failed to decode track")?;
        // clear() also pauses the sink
        self.sink.clear();
        self.sink.append(source);
        self.sink.play();
        Ok(())
    }

    fn pause(&mut self) {
        self.sink.pause();
    }
}
