//! core/encode/mod.rs
//! The sink side of transcoding.
//!
//! Decoders never know what they are encoding to. They talk to:
//! - [`MetadataSink`]: stream parameters, canonical tags, pictures, gain
//! - [`Encoder`]: the above plus PCM blocks, written into a [`Buffer`]

mod wav;

use std::io;

use thiserror::Error;

use super::tags::MetaTag;
use super::types::{Picture, ReplayGain, StreamParams};

pub use wav::WavEncoder;

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Tag rendering failed: {0}")]
    Tag(#[from] id3::Error),

    #[error("Unsupported stream parameters: {0}")]
    InvalidParams(String),

    #[error("Encoder used out of order: {0}")]
    Usage(&'static str),
}

/// Receives everything a decoder learns during the metadata scan.
pub trait MetadataSink {
    fn set_stream_params(&mut self, params: StreamParams) -> Result<(), EncodeError>;
    fn set_text_tag(&mut self, field: MetaTag, value: &str);
    fn set_picture_tag(&mut self, picture: &Picture);
    fn set_gain(&mut self, gain: ReplayGain);
}

/// A target-format encoder.
///
/// Call order: metadata (via [`MetadataSink`]) -> `render_tag` ->
/// `encode_pcm_data`* -> `encode_finish`.
pub trait Encoder: MetadataSink + Send {
    /// Write the file header / tag once metadata is complete.
    fn render_tag(&mut self, out: &mut Buffer) -> Result<usize, EncodeError>;

    /// Encode one block of planar PCM. `channels[c][i]` holds sample `i` of
    /// channel `c` at `bits_per_sample` resolution.
    fn encode_pcm_data(
        &mut self,
        channels: &[Vec<i32>],
        samples_per_channel: usize,
        bits_per_sample: u32,
        out: &mut Buffer,
    ) -> Result<usize, EncodeError>;

    /// Flush whatever the format needs at the end of the stream.
    fn encode_finish(&mut self, out: &mut Buffer) -> Result<usize, EncodeError>;

    /// Predicted size of the complete output in bytes.
    fn calculate_size(&self) -> u64;
}

/// Growable output buffer. Append-only; readers may look at any prefix that
/// has already been produced.
#[derive(Debug, Default)]
pub struct Buffer {
    data: Vec<u8>,
}

impl Buffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, bytes: &[u8]) -> usize {
        self.data.extend_from_slice(bytes);
        bytes.len()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Bytes in `[offset, offset + size)` that exist so far.
    pub fn slice(&self, offset: usize, size: usize) -> &[u8] {
        if offset >= self.data.len() {
            return &[];
        }
        let end = offset.saturating_add(size).min(self.data.len());
        &self.data[offset..end]
    }
}
