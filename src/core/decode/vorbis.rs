//! core/decode/vorbis.rs
//! Pull-style Ogg Vorbis adapter.
//!
//! Decoded audio is pulled as interleaved 16-bit samples into a pending
//! queue; each step hands at most one decode buffer's worth to the encoder.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::CODEC_TYPE_VORBIS;
use tracing::debug;

use super::super::encode::{Buffer, Encoder, MetadataSink};
use super::super::tags::vocab::{METADATA_BLOCK_PICTURE, VORBIS_TAGS};
use super::super::tags::{TagScanner, decode_base64_picture};
use super::comments::read_vorbis_comments;
use super::{DecodeError, Decoder, FrameStatus, NativeStream, Stage};

/// Interleaved samples handed out per step (4096 bytes of 16-bit PCM).
pub const DECODE_BUFFER_SAMPLES: usize = 2048;
const BITS_PER_SAMPLE: u32 = 16;

pub struct VorbisDecoder {
    stream: Option<NativeStream>,
    path: PathBuf,
    mtime: SystemTime,
    stage: Stage,
    channels: usize,
    pending: VecDeque<i16>,
    exhausted: bool,
}

impl VorbisDecoder {
    pub fn new() -> Self {
        Self {
            stream: None,
            path: PathBuf::new(),
            mtime: SystemTime::UNIX_EPOCH,
            stage: Stage::Closed,
            channels: 0,
            pending: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Decode packets until something is pending or the stream ends.
    fn refill(&mut self) -> Result<(), DecodeError> {
        while self.pending.is_empty() && !self.exhausted {
            let Some(stream) = self.stream.as_mut() else {
                return Err(DecodeError::Usage("decoder not open"));
            };
            if !stream.decode_next()? {
                self.exhausted = true;
                break;
            }
            let decoded = stream.last_decoded();
            let mut samples = SampleBuffer::<i16>::new(decoded.capacity() as u64, *decoded.spec());
            samples.copy_interleaved_ref(decoded);
            self.pending.extend(samples.samples());
        }
        Ok(())
    }
}

impl Default for VorbisDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for VorbisDecoder {
    fn open(&mut self, path: &Path) -> Result<(), DecodeError> {
        if self.stage != Stage::Closed {
            return Err(DecodeError::Usage("open called twice"));
        }
        let (stream, mtime) = NativeStream::open(path, CODEC_TYPE_VORBIS)?;
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

        let Some(params) = stream.stream_params() else {
            return Err(DecodeError::NotDecodable("no stream description".into()));
        };
        sink.set_stream_params(params)?;
        self.channels = params.channels as usize;

        let mut scanner = TagScanner::new(VORBIS_TAGS);
        for comment in read_vorbis_comments(&self.path)? {
            if comment.name.eq_ignore_ascii_case(METADATA_BLOCK_PICTURE) {
                let picture = decode_base64_picture(&comment.value)
                    .map_err(|e| DecodeError::MalformedMetadata(format!("picture: {e}")))?;
                sink.set_picture_tag(&picture);
            } else {
                scanner.comment(&comment.name, &comment.value, sink);
            }
        }
        scanner.finish(sink);

        debug!(channels = self.channels, "vorbis metadata scanned");
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

        self.refill()?;
        if self.pending.is_empty() {
            self.stage = Stage::Finished;
            return Ok(FrameStatus::EndOfStream);
        }

        let take = self.pending.len().min(DECODE_BUFFER_SAMPLES);
        let samples_per_channel = take / self.channels.max(1);
        if samples_per_channel < 1 {
            return Err(DecodeError::Frame(format!(
                "{take} samples do not fill one {}-channel frame",
                self.channels
            )));
        }
        let used = samples_per_channel * self.channels;
        let block: Vec<i16> = self.pending.drain(..used).collect();

        let channels = deinterleave(&block, self.channels);
        encoder.encode_pcm_data(&channels, samples_per_channel, BITS_PER_SAMPLE, out)?;
        Ok(FrameStatus::More)
    }
}

/// Split interleaved samples into one contiguous buffer per channel.
/// Trailing samples that do not complete a frame are dropped.
pub fn deinterleave(interleaved: &[i16], channels: usize) -> Vec<Vec<i32>> {
    if channels == 0 {
        return Vec::new();
    }
    let frames = interleaved.len() / channels;
    let mut out = vec![Vec::with_capacity(frames); channels];
    for frame in interleaved.chunks_exact(channels) {
        for (channel, &sample) in out.iter_mut().zip(frame) {
            channel.push(sample as i32);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{OggVorbisFixture, VORBIS_FRAMES_PER_PACKET};
    use super::*;
    use crate::core::encode::testing::RecordingSink;
    use crate::core::tags::{MetaTag, encode_picture_block};
    use crate::core::types::{Picture, StreamParams};
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    fn opened(fixture: OggVorbisFixture<'_>) -> (tempfile::TempDir, VorbisDecoder) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.ogg");
        fixture.write(&path);
        let mut dec = VorbisDecoder::new();
        dec.open(&path).unwrap();
        (dir, dec)
    }

    fn run_to_end(dec: &mut VorbisDecoder, sink: &mut RecordingSink) -> Vec<FrameStatus> {
        let mut out = Buffer::new();
        let mut steps = Vec::new();
        loop {
            let step = dec.process_next_frame(sink, &mut out).unwrap();
            steps.push(step);
            if step == FrameStatus::EndOfStream {
                return steps;
            }
        }
    }

    #[test]
    fn stereo_splits_even_and_odd() {
        let interleaved: Vec<i16> = (0..8).collect();
        let split = deinterleave(&interleaved, 2);
        assert_eq!(split, vec![vec![0, 2, 4, 6], vec![1, 3, 5, 7]]);
    }

    #[test]
    fn mono_and_multichannel() {
        assert_eq!(deinterleave(&[5, -5], 1), vec![vec![5, -5]]);

        let six: Vec<i16> = (0..12).collect();
        let split = deinterleave(&six, 6);
        assert_eq!(split.len(), 6);
        assert_eq!(split[5], vec![5, 11]);
    }

    #[test]
    fn partial_frame_is_dropped() {
        assert_eq!(deinterleave(&[1, 2, 3], 2), vec![vec![1], vec![2]]);
        assert!(deinterleave(&[1, 2], 0).is_empty());
    }

    fn scanned(channels: usize, pending: usize) -> VorbisDecoder {
        let mut dec = VorbisDecoder::new();
        dec.stage = Stage::Scanned;
        dec.channels = channels;
        dec.exhausted = true;
        dec.pending.extend(std::iter::repeat_n(7i16, pending));
        dec
    }

    #[test]
    fn pending_queue_is_handed_out_in_bounded_blocks() {
        let mut dec = scanned(2, DECODE_BUFFER_SAMPLES + 10);
        let mut sink = RecordingSink::default();
        let mut out = Buffer::new();

        assert_eq!(
            dec.process_next_frame(&mut sink, &mut out).unwrap(),
            FrameStatus::More
        );
        assert_eq!(
            dec.process_next_frame(&mut sink, &mut out).unwrap(),
            FrameStatus::More
        );
        assert_eq!(
            dec.process_next_frame(&mut sink, &mut out).unwrap(),
            FrameStatus::EndOfStream
        );
        assert_eq!(
            dec.process_next_frame(&mut sink, &mut out).unwrap(),
            FrameStatus::EndOfStream
        );

        let counts: Vec<(usize, u32)> = sink.blocks.iter().map(|b| (b.1, b.2)).collect();
        assert_eq!(counts, vec![(1024, 16), (5, 16)]);
        assert_eq!(sink.blocks[0].0.len(), 2);
        assert_eq!(sink.blocks[0].0[1].len(), 1024);
    }

    #[test]
    fn short_tail_is_a_decode_error_not_end_of_stream() {
        let mut dec = scanned(3, DECODE_BUFFER_SAMPLES);
        let mut sink = RecordingSink::default();
        let mut out = Buffer::new();

        assert_eq!(
            dec.process_next_frame(&mut sink, &mut out).unwrap(),
            FrameStatus::More
        );
        assert_eq!(sink.blocks[0].1, 682);
        assert!(matches!(
            dec.process_next_frame(&mut sink, &mut out),
            Err(DecodeError::Frame(_))
        ));
    }

    #[test]
    fn metadata_before_open_is_a_usage_error() {
        let mut dec = VorbisDecoder::new();
        let mut sink = RecordingSink::default();
        assert!(matches!(
            dec.process_metadata(&mut sink),
            Err(DecodeError::Usage(_))
        ));
        assert!(sink.gains.is_empty());
    }

    #[test]
    fn ogg_file_is_scanned_and_decoded() {
        let (_dir, mut dec) = opened(OggVorbisFixture {
            comments: vec!["title=Song", "REPLAYGAIN_TRACK_GAIN=-6.50 dB", "X-CUSTOM=dropped"],
            ..OggVorbisFixture::default()
        });
        let mut sink = RecordingSink::default();
        dec.process_metadata(&mut sink).unwrap();

        assert_eq!(
            sink.params,
            vec![StreamParams {
                total_samples: 2 * VORBIS_FRAMES_PER_PACKET as u64,
                sample_rate: 44_100,
                channels: 2,
            }]
        );
        assert_eq!(sink.text, vec![(MetaTag::Title, "Song".to_string())]);
        assert!(sink.pictures.is_empty());
        assert_eq!(sink.gains.len(), 1);
        assert_eq!(sink.gains[0].track_gain, Some(-6.5));
        assert_eq!(sink.gains[0].album_gain, None);

        let steps = run_to_end(&mut dec, &mut sink);
        assert_eq!(
            steps,
            vec![FrameStatus::More, FrameStatus::More, FrameStatus::EndOfStream]
        );
        assert_eq!(sink.blocks.len(), 2);
        for (channels, frames, bits) in &sink.blocks {
            assert_eq!((*frames, *bits), (VORBIS_FRAMES_PER_PACKET, 16));
            assert_eq!(channels.len(), 2);
            for channel in channels {
                assert_eq!(channel.len(), *frames);
                assert!(channel.iter().all(|&s| s == 0));
            }
        }
    }

    #[test]
    fn malformed_picture_comment_fails_the_scan() {
        let (_dir, mut dec) = opened(OggVorbisFixture {
            comments: vec!["TITLE=Song", "METADATA_BLOCK_PICTURE=not*base64!"],
            ..OggVorbisFixture::default()
        });
        let mut sink = RecordingSink::default();

        assert!(matches!(
            dec.process_metadata(&mut sink),
            Err(DecodeError::MalformedMetadata(_))
        ));
        assert!(sink.pictures.is_empty());
        assert!(sink.gains.is_empty());

        let mut out = Buffer::new();
        assert!(matches!(
            dec.process_next_frame(&mut sink, &mut out),
            Err(DecodeError::Usage(_))
        ));
    }

    #[test]
    fn picture_comment_is_forwarded_once_with_its_type() {
        let cover = Picture {
            mime_type: "image/png".into(),
            picture_type: 17,
            description: "fish".into(),
            data: vec![0x89, b'P', b'N', b'G'],
        };
        let comment = format!(
            "metadata_block_picture={}",
            STANDARD.encode(encode_picture_block(&cover))
        );
        let (_dir, mut dec) = opened(OggVorbisFixture {
            channels: 1,
            comments: vec![comment.as_str()],
            packets: 1,
        });
        let mut sink = RecordingSink::default();
        dec.process_metadata(&mut sink).unwrap();

        assert_eq!(sink.pictures, vec![cover]);
        assert!(sink.text.is_empty());
        assert_eq!(sink.gains.len(), 1);

        run_to_end(&mut dec, &mut sink);
        let counts: Vec<(usize, usize)> = sink.blocks.iter().map(|b| (b.0.len(), b.1)).collect();
        assert_eq!(counts, vec![(1, VORBIS_FRAMES_PER_PACKET)]);
    }
}
