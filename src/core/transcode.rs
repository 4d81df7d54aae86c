//! core/transcode.rs
//! The transcoding driver: one decoder, one encoder, one growing buffer.
//!
//! Reads only decode as far as they need to; everything produced so far is
//! kept, so re-reading an earlier range never decodes again.

use std::path::PathBuf;
use std::time::SystemTime;

use thiserror::Error;
use tracing::{debug, error};

use super::decode::{Codec, DecodeError, Decoder, FrameStatus};
use super::encode::{Buffer, EncodeError, Encoder};

#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("Transcode of {0} already failed")]
    Failed(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    New,
    Decoding,
    Finished,
    Failed,
}

pub struct Transcoder<E: Encoder> {
    source: PathBuf,
    decoder: Box<dyn Decoder>,
    encoder: E,
    buffer: Buffer,
    state: State,
}

impl<E: Encoder> Transcoder<E> {
    pub fn new(source: impl Into<PathBuf>, codec: Codec, encoder: E) -> Self {
        Self::with_decoder(source, codec.create(), encoder)
    }

    pub fn with_decoder(source: impl Into<PathBuf>, decoder: Box<dyn Decoder>, encoder: E) -> Self {
        Self {
            source: source.into(),
            decoder,
            encoder,
            buffer: Buffer::new(),
            state: State::New,
        }
    }

    /// Open the source, run the metadata scan and write the output header.
    pub fn init(&mut self) -> Result<(), TranscodeError> {
        if self.state != State::New {
            return Ok(());
        }
        let result = self.start();
        match &result {
            Ok(()) => self.state = State::Decoding,
            Err(e) => {
                error!(source = %self.source.display(), "transcoder init failed: {e}");
                self.state = State::Failed;
            }
        }
        result
    }

    fn start(&mut self) -> Result<(), TranscodeError> {
        self.decoder.open(&self.source)?;
        self.decoder.process_metadata(&mut self.encoder)?;
        self.encoder.render_tag(&mut self.buffer)?;
        debug!(
            source = %self.source.display(),
            header = self.buffer.len(),
            "transcoder ready"
        );
        Ok(())
    }

    /// Exact size once decoding has finished, the encoder's estimate before.
    pub fn get_size(&self) -> u64 {
        if self.state == State::Finished {
            self.buffer.len() as u64
        } else {
            self.encoder.calculate_size()
        }
    }

    pub fn mtime(&self) -> SystemTime {
        self.decoder.mtime()
    }

    /// Serve `[offset, offset + size)`, decoding forward as needed. Short
    /// (or empty) results mean end of file.
    pub fn read(&mut self, offset: u64, size: u32) -> Result<Vec<u8>, TranscodeError> {
        if self.state == State::New {
            self.init()?;
        }
        let end = offset.saturating_add(size as u64);

        while self.state == State::Decoding && (self.buffer.len() as u64) < end {
            if let Err(e) = self.step() {
                error!(
                    source = %self.source.display(),
                    buffered = self.buffer.len(),
                    "transcode failed: {e}"
                );
                self.state = State::Failed;
                if (self.buffer.len() as u64) < end {
                    return Err(e);
                }
            }
        }

        if self.state == State::Failed && (self.buffer.len() as u64) < end {
            return Err(TranscodeError::Failed(self.source.clone()));
        }

        let Ok(offset) = usize::try_from(offset) else {
            return Ok(Vec::new());
        };
        Ok(self.buffer.slice(offset, size as usize).to_vec())
    }

    fn step(&mut self) -> Result<(), TranscodeError> {
        match self
            .decoder
            .process_next_frame(&mut self.encoder, &mut self.buffer)?
        {
            FrameStatus::More => {}
            FrameStatus::EndOfStream => {
                self.encoder.encode_finish(&mut self.buffer)?;
                self.state = State::Finished;
                debug!(
                    source = %self.source.display(),
                    size = self.buffer.len(),
                    "transcode complete"
                );
            }
        }
        Ok(())
    }
}
