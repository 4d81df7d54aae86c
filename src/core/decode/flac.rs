//! core/decode/flac.rs
//! Callback-style FLAC adapter.
//!
//! Every metadata item goes through [`FlacDecoder::metadata_callback`] and
//! every decoded frame through [`FlacDecoder::write_callback`]; the
//! `Decoder` methods only pump the native stream into those two hooks.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use symphonia::core::audio::{AudioBufferRef, SampleBuffer, Signal};
use symphonia::core::codecs::CODEC_TYPE_FLAC;
use tracing::{debug, warn};

use super::super::encode::{Buffer, Encoder, MetadataSink};
use super::super::tags::vocab::FLAC_TAGS;
use super::super::tags::{TagScanner, decode_picture};
use super::super::types::StreamParams;
use super::comments::{FlacBlock, RawComment, read_flac_blocks};
use super::{DecodeError, Decoder, FrameStatus, NativeStream, Stage};

/// One item of the metadata scan.
enum MetadataItem<'a> {
    StreamInfo(StreamParams),
    Comment(&'a RawComment),
    /// Raw PICTURE block body.
    Picture(&'a [u8]),
}

pub struct FlacDecoder {
    stream: Option<NativeStream>,
    path: PathBuf,
    mtime: SystemTime,
    stage: Stage,
    bits_per_sample: u32,
    saw_stream_info: bool,
}

impl FlacDecoder {
    pub fn new() -> Self {
        Self {
            stream: None,
            path: PathBuf::new(),
            mtime: SystemTime::UNIX_EPOCH,
            stage: Stage::Closed,
            bits_per_sample: 0,
            saw_stream_info: false,
        }
    }

    fn metadata_callback(
        &mut self,
        item: MetadataItem<'_>,
        scanner: &mut TagScanner,
        sink: &mut dyn MetadataSink,
    ) -> Result<(), DecodeError> {
        match item {
            MetadataItem::StreamInfo(params) => {
                sink.set_stream_params(params)?;
                self.saw_stream_info = true;
            }
            MetadataItem::Comment(comment) => {
                scanner.comment(&comment.name, &comment.value, sink);
            }
            MetadataItem::Picture(raw) => match decode_picture(raw) {
                Ok(picture) => sink.set_picture_tag(&picture),
                Err(e) => warn!("skipping malformed picture block: {e}"),
            },
        }
        Ok(())
    }

    fn write_callback(
        &mut self,
        channels: &[Vec<i32>],
        frames: usize,
        encoder: &mut dyn Encoder,
        out: &mut Buffer,
    ) -> Result<(), DecodeError> {
        encoder.encode_pcm_data(channels, frames, self.bits_per_sample, out)?;
        Ok(())
    }
}

impl Default for FlacDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FlacDecoder {
    fn open(&mut self, path: &Path) -> Result<(), DecodeError> {
        if self.stage != Stage::Closed {
            return Err(DecodeError::Usage("open called twice"));
        }
        let (stream, mtime) = NativeStream::open(path, CODEC_TYPE_FLAC)?;
        self.stream = Some(stream);
        self.path = path.to_path_buf();
        self.mtime = mtime;
        self.stage = Stage::Opened;
        Ok(())
    }

    fn mtime(&self) -> SystemTime {
        self.mtime
    }

    fn process_metadata(&mut self, sink: &mut dyn MetadataSink) -> Result<(), DecodeError> {
        if self.stage != Stage::Opened {
            return Err(DecodeError::Usage("metadata scan out of order"));
        }
        let Some(stream) = self.stream.as_ref() else {
            return Err(DecodeError::Usage("decoder not open"));
        };
        let info = stream.stream_params();
        let bits = stream.params().bits_per_sample;
        let blocks = read_flac_blocks(&self.path)?;

        let mut scanner = TagScanner::new(FLAC_TAGS);
        if let Some(params) = info {
            self.bits_per_sample = bits.unwrap_or(16);
            self.metadata_callback(MetadataItem::StreamInfo(params), &mut scanner, sink)?;
        }
        for block in &blocks {
            match block {
                FlacBlock::Comments(comments) => {
                    for comment in comments {
                        self.metadata_callback(MetadataItem::Comment(comment), &mut scanner, sink)?;
                    }
                }
                FlacBlock::Picture(raw) => {
                    self.metadata_callback(MetadataItem::Picture(raw), &mut scanner, sink)?;
                }
            }
        }
        scanner.finish(sink);

        if !self.saw_stream_info || !(1..=32).contains(&self.bits_per_sample) {
            return Err(DecodeError::NotDecodable("no usable STREAMINFO".into()));
        }
        debug!(bits = self.bits_per_sample, "flac metadata scanned");
        self.stage = Stage::Scanned;
        Ok(())
    }

    fn process_next_frame(
        &mut self,
        encoder: &mut dyn Encoder,
        out: &mut Buffer,
    ) -> Result<FrameStatus, DecodeError> {
        match self.stage {
            Stage::Scanned => {}
            Stage::Finished => return Ok(FrameStatus::EndOfStream),
            _ => return Err(DecodeError::Usage("frame requested before metadata")),
        }
        let Some(stream) = self.stream.as_mut() else {
            return Err(DecodeError::Usage("decoder not open"));
        };

        if !stream.decode_next()? {
            self.stage = Stage::Finished;
            return Ok(FrameStatus::EndOfStream);
        }
        let (channels, frames) = planar_samples(stream.last_decoded(), self.bits_per_sample);
        self.write_callback(&channels, frames, encoder, out)?;
        Ok(FrameStatus::More)
    }
}

/// Copy a decoded frame into per-channel buffers at the source bit depth.
fn planar_samples(decoded: AudioBufferRef<'_>, bits_per_sample: u32) -> (Vec<Vec<i32>>, usize) {
    let frames = decoded.frames();
    let count = decoded.spec().channels.count();

    let mut channels = match decoded {
        AudioBufferRef::S32(buf) => (0..count).map(|c| buf.chan(c).to_vec()).collect::<Vec<_>>(),
        other => {
            let mut samples = SampleBuffer::<i32>::new(other.capacity() as u64, *other.spec());
            samples.copy_planar_ref(other);
            samples
                .samples()
                .chunks(frames.max(1))
                .take(count)
                .map(<[i32]>::to_vec)
                .collect()
        }
    };

    let shift = 32 - bits_per_sample;
    if shift > 0 {
        for channel in &mut channels {
            for s in channel.iter_mut() {
                *s = to_source_depth(*s, shift);
            }
        }
    }
    (channels, frames)
}

/// Undo symphonia's left-justification of FLAC samples.
fn to_source_depth(sample: i32, shift: u32) -> i32 {
    sample >> shift
}
