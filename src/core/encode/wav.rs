//! core/encode/wav.rs
//! 16-bit PCM RIFF/WAVE encoder with an embedded ID3 chunk.
//!
//! The whole layout is known once the stream parameters are in, so the
//! output size is exact whenever the source declares its sample count:
//!
//! ```text
//! RIFF <size> WAVE | fmt  (16 bytes, PCM) | id3  <tag> | data <len> <samples>
//! ```

use tracing::debug;

use super::super::tags::{MetaTag, TagWriter};
use super::super::types::{Picture, ReplayGain, StreamParams};
use super::{Buffer, EncodeError, Encoder, MetadataSink};

const BYTES_PER_SAMPLE: u64 = 2;
/// `data` length written when the sample count is unknown.
const STREAMING_DATA_LEN: u32 = u32::MAX;

#[derive(Debug, Default)]
pub struct WavEncoder {
    params: Option<StreamParams>,
    tags: TagWriter,
    header_len: u64,
    /// Samples per channel written so far.
    written: u64,
    finished: bool,
}

impl WavEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn params(&self) -> Result<StreamParams, EncodeError> {
        self.params
            .ok_or(EncodeError::Usage("stream parameters not set"))
    }

    fn frame_bytes(params: &StreamParams) -> u64 {
        params.channels as u64 * BYTES_PER_SAMPLE
    }

    /// Declared length of the `data` chunk, `None` when the source did not
    /// say how long it is.
    fn declared_data_len(&self) -> Option<u64> {
        let params = self.params?;
        (params.total_samples > 0).then(|| params.total_samples * Self::frame_bytes(&params))
    }

    fn header(&self, params: &StreamParams, tag: &[u8]) -> Vec<u8> {
        let channels = params.channels;
        let block_align = channels * BYTES_PER_SAMPLE as u16;
        let byte_rate = params.sample_rate * block_align as u32;

        let tag_chunk_len = if tag.is_empty() {
            0
        } else {
            8 + tag.len() as u64 + (tag.len() as u64 % 2)
        };
        let data_len = match self.declared_data_len() {
            Some(len) => u32::try_from(len).unwrap_or(STREAMING_DATA_LEN),
            None => STREAMING_DATA_LEN,
        };
        let riff_len = (4 + 8 + 16 + tag_chunk_len + 8)
            .saturating_add(data_len as u64)
            .min(u32::MAX as u64) as u32;

        let mut out = Vec::with_capacity(44 + tag_chunk_len as usize);
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&riff_len.to_le_bytes());
        out.extend_from_slice(b"WAVE");

        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes()); // PCM
        out.extend_from_slice(&channels.to_le_bytes());
        out.extend_from_slice(&params.sample_rate.to_le_bytes());
        out.extend_from_slice(&byte_rate.to_le_bytes());
        out.extend_from_slice(&block_align.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());

        if !tag.is_empty() {
            out.extend_from_slice(b"id3 ");
            out.extend_from_slice(&(tag.len() as u32).to_le_bytes());
            out.extend_from_slice(tag);
            if tag.len() % 2 == 1 {
                out.push(0);
            }
        }

        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        out
    }
}

impl MetadataSink for WavEncoder {
    fn set_stream_params(&mut self, params: StreamParams) -> Result<(), EncodeError> {
        if params.channels == 0 || params.sample_rate == 0 {
            return Err(EncodeError::InvalidParams(format!(
                "{} channels at {} Hz",
                params.channels, params.sample_rate
            )));
        }
        debug!(
            total_samples = params.total_samples,
            sample_rate = params.sample_rate,
            channels = params.channels,
            "wav stream parameters"
        );
        self.params = Some(params);
        Ok(())
    }

    fn set_text_tag(&mut self, field: MetaTag, value: &str) {
        self.tags.set_text(field, value);
    }

    fn set_picture_tag(&mut self, picture: &Picture) {
        self.tags.add_picture(picture);
    }

    fn set_gain(&mut self, gain: ReplayGain) {
        self.tags.set_gain(gain);
    }
}

impl Encoder for WavEncoder {
    fn render_tag(&mut self, out: &mut Buffer) -> Result<usize, EncodeError> {
        let params = self.params()?;
        let tag = self.tags.render()?;
        let header = self.header(&params, &tag);
        self.header_len = header.len() as u64;
        Ok(out.write(&header))
    }

    fn encode_pcm_data(
        &mut self,
        channels: &[Vec<i32>],
        samples_per_channel: usize,
        bits_per_sample: u32,
        out: &mut Buffer,
    ) -> Result<usize, EncodeError> {
        let params = self.params()?;
        if self.finished {
            return Err(EncodeError::Usage("pcm after encode_finish"));
        }
        if channels.len() != params.channels as usize {
            return Err(EncodeError::InvalidParams(format!(
                "got {} channel buffers for a {}-channel stream",
                channels.len(),
                params.channels
            )));
        }
        if !(1..=32).contains(&bits_per_sample) {
            return Err(EncodeError::InvalidParams(format!(
                "{bits_per_sample} bits per sample"
            )));
        }
        if channels.iter().any(|c| c.len() < samples_per_channel) {
            return Err(EncodeError::InvalidParams(
                "channel buffer shorter than sample count".into(),
            ));
        }

        // Never write past the length promised in the header.
        let mut count = samples_per_channel as u64;
        if params.total_samples > 0 {
            count = count.min(params.total_samples.saturating_sub(self.written));
        }

        let mut bytes = Vec::with_capacity(count as usize * Self::frame_bytes(&params) as usize);
        for i in 0..count as usize {
            for channel in channels {
                let sample = to_i16(channel[i], bits_per_sample);
                bytes.extend_from_slice(&sample.to_le_bytes());
            }
        }
        self.written += count;
        Ok(out.write(&bytes))
    }

    fn encode_finish(&mut self, out: &mut Buffer) -> Result<usize, EncodeError> {
        let params = self.params()?;
        if self.finished {
            return Ok(0);
        }
        self.finished = true;

        if params.total_samples > self.written {
            let missing = params.total_samples - self.written;
            debug!(missing, "padding short stream with silence");
            let pad = vec![0u8; (missing * Self::frame_bytes(&params)) as usize];
            self.written = params.total_samples;
            return Ok(out.write(&pad));
        }
        Ok(0)
    }

    fn calculate_size(&self) -> u64 {
        self.header_len + self.declared_data_len().unwrap_or(0)
    }
}

/// Requantize a sample from `bits` resolution to 16 bits.
fn to_i16(sample: i32, bits: u32) -> i16 {
    let scaled = if bits > 16 {
        sample >> (bits - 16)
    } else {
        sample << (16 - bits)
    };
    scaled.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}
