//! core/decode/mod.rs
//! Source decoders behind one stepping contract.
//!
//! Both adapters sit on symphonia, but keep the two native disciplines apart:
//! - [`flac::FlacDecoder`] routes metadata blocks and decoded frames through
//!   callbacks, one native frame per step, at the source bit depth.
//! - [`vorbis::VorbisDecoder`] pulls interleaved 16-bit samples into a fixed
//!   decode buffer and de-interleaves them per step.

mod comments;
pub mod flac;
pub mod vorbis;

#[cfg(test)]
mod fixtures;

use std::fs::File;
use std::io;
use std::path::Path;
use std::time::SystemTime;

use symphonia::core::audio::AudioBufferRef;
use symphonia::core::codecs::{CodecParameters, CodecType, Decoder as NativeDecoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;
use tracing::{debug, warn};

use super::encode::{Buffer, EncodeError, Encoder, MetadataSink};
use super::types::StreamParams;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Source unavailable: {0}")]
    Io(#[from] io::Error),

    #[error("Not decodable: {0}")]
    NotDecodable(String),

    #[error("Malformed metadata: {0}")]
    MalformedMetadata(String),

    #[error("Frame decode failed: {0}")]
    Frame(String),

    #[error("Decoder used out of order: {0}")]
    Usage(&'static str),

    #[error(transparent)]
    Encode(#[from] EncodeError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    More,
    EndOfStream,
}

/// A source decoder as seen by the transcoding driver.
///
/// Call order: `open` -> `process_metadata` (once) -> `process_next_frame`
/// until [`FrameStatus::EndOfStream`] or an error.
pub trait Decoder: Send {
    fn open(&mut self, path: &Path) -> Result<(), DecodeError>;

    /// Modification time of the source, captured at `open`.
    fn mtime(&self) -> SystemTime;

    fn process_metadata(&mut self, sink: &mut dyn MetadataSink) -> Result<(), DecodeError>;

    /// Produce one unit of PCM into `encoder`. The unit size is adapter
    /// specific.
    fn process_next_frame(
        &mut self,
        encoder: &mut dyn Encoder,
        out: &mut Buffer,
    ) -> Result<FrameStatus, DecodeError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    Flac,
    Vorbis,
}

impl Codec {
    pub fn create(self) -> Box<dyn Decoder> {
        match self {
            Codec::Flac => Box::new(flac::FlacDecoder::new()),
            Codec::Vorbis => Box::new(vorbis::VorbisDecoder::new()),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Codec::Flac => "flac",
            Codec::Vorbis => "vorbis",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "flac" => Some(Codec::Flac),
            "vorbis" | "ogg" => Some(Codec::Vorbis),
            _ => None,
        }
    }
}

/// Adapter lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Closed,
    Opened,
    Scanned,
    Finished,
}

/// symphonia demuxer + codec for one track, shared by both adapters.
pub(crate) struct NativeStream {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn NativeDecoder>,
    track_id: u32,
    params: CodecParameters,
}

impl NativeStream {
    /// Probe `path`, require its default track to be `codec`, build the
    /// native decoder. Returns the stream and the source mtime.
    pub(crate) fn open(path: &Path, codec: CodecType) -> Result<(Self, SystemTime), DecodeError> {
        let file = File::open(path)?;
        let mtime = file.metadata()?.modified()?;
        let mss = MediaSourceStream::new(Box::new(file), MediaSourceStreamOptions::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| DecodeError::NotDecodable(format!("probe failed: {e}")))?;

        let track = probed
            .format
            .default_track()
            .ok_or_else(|| DecodeError::NotDecodable("no audio track".into()))?;
        if track.codec_params.codec != codec {
            return Err(DecodeError::NotDecodable(format!(
                "unexpected codec {:?}",
                track.codec_params.codec
            )));
        }
        let track_id = track.id;
        let params = track.codec_params.clone();

        let decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| DecodeError::NotDecodable(format!("decoder init failed: {e}")))?;

        debug!(path = %path.display(), track_id, "native stream opened");
        Ok((
            Self {
                format: probed.format,
                decoder,
                track_id,
                params,
            },
            mtime,
        ))
    }

    pub(crate) fn params(&self) -> &CodecParameters {
        &self.params
    }

    /// Stream description from the codec parameters, if complete.
    pub(crate) fn stream_params(&self) -> Option<StreamParams> {
        let sample_rate = self.params.sample_rate?;
        let channels = self.params.channels?.count();
        Some(StreamParams {
            total_samples: self.params.n_frames.unwrap_or(0),
            sample_rate,
            channels: u16::try_from(channels).ok()?,
        })
    }

    /// Decode the next packet of our track. `Ok(false)` at end of stream;
    /// on `Ok(true)` the samples are in [`NativeStream::last_decoded`].
    pub(crate) fn decode_next(&mut self) -> Result<bool, DecodeError> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return Ok(false);
                }
                Err(SymphoniaError::IoError(e)) => return Err(DecodeError::Io(e)),
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(e) => return Err(DecodeError::Frame(e.to_string())),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(_) => return Ok(true),
                Err(SymphoniaError::DecodeError(msg)) => {
                    warn!(ts = packet.ts(), "skipping corrupt packet: {msg}");
                    continue;
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return Ok(false);
                }
                Err(e) => return Err(DecodeError::Frame(e.to_string())),
            }
        }
    }

    pub(crate) fn last_decoded(&self) -> AudioBufferRef<'_> {
        self.decoder.last_decoded()
    }
}
