// src/sound.rs
// Real hit-sound voice backed by rodio. Only built with the `rodio` feature.

use rodio::source::Buffered;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;
use thiserror::Error;

use crate::audio::AudioVoice;

/// Represents an error that can occur when opening the device or loading the clip.
#[derive(Debug, Error)]
pub enum SoundError {
    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode audio data: {0}")]
    Decode(#[from] rodio::decoder::DecoderError),
    #[error("No audio output device: {0}")]
    Stream(#[from] rodio::StreamError),
    #[error("Playback failed: {0}")]
    Play(#[from] rodio::PlayError),
}

impl From<SoundError> for crate::Error {
    fn from(err: SoundError) -> Self {
        crate::Error::audio(err)
    }
}

type Clip = Buffered<Decoder<Cursor<Vec<u8>>>>;

/// One clip on the default output device. Decoded once, cloned per play.
pub struct RodioVoice {
    // The output stream. Must be kept alive.
    _stream: OutputStream,
    handle: OutputStreamHandle,
    clip: Clip,
    sink: Option<Sink>,
}

impl RodioVoice {
    /// Loads the clip from a file path (wav/mp3/ogg/flac via symphonia).
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SoundError> {
        let mut bytes = Vec::new();
        File::open(path)?.read_to_end(&mut bytes)?;
        Self::from_bytes(bytes)
    }

    /// Loads the clip from memory, e.g. an embedded asset.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, SoundError> {
        let clip = Decoder::new(Cursor::new(bytes))?.buffered();
        let (stream, handle) = OutputStream::try_default()?;
        log::debug!("hit clip loaded: {} ch @ {} Hz", clip.channels(), clip.sample_rate());
        Ok(Self { _stream: stream, handle, clip, sink: None })
    }
}

impl AudioVoice for RodioVoice {
    fn rewind(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }

    fn play(&mut self, volume: f32) -> crate::Result<()> {
        let sink = Sink::try_new(&self.handle).map_err(SoundError::from)?;
        sink.set_volume(volume);
        sink.append(self.clip.clone());
        self.sink = Some(sink);
        Ok(())
    }
}

// We can't automatically derive Debug because the stream handle is opaque.
impl std::fmt::Debug for RodioVoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RodioVoice")
            .field("channels", &self.clip.channels())
            .field("sample_rate", &self.clip.sample_rate())
            .field("playing", &self.sink.is_some())
            .finish()
    }
}
