//! Core data types shared between the decoders, the sinks and the filesystem.
//!
//! Rule of thumb:
//! - These structs should be "boring bags of data"
//! - No FUSE code
//! - No codec code
//!
//! A decoder fills them in, an encoder consumes them.

/// Stream description forwarded to the sink once per file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamParams {
    /// Samples per channel for the whole file. 0 means "unknown".
    pub total_samples: u64,
    pub sample_rate: u32,
    pub channels: u16,
}

/// One embedded picture, normalized from either a FLAC PICTURE block or a
/// base64 `METADATA_BLOCK_PICTURE` comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Picture {
    pub mime_type: String,
    /// FLAC/ID3 picture type code (3 = front cover).
    pub picture_type: u32,
    pub description: String,
    pub data: Vec<u8>,
}

/// ReplayGain triple.
///
/// `None` is the "absent" sentinel. Each value is independent: a file may
/// carry a track gain without an album gain.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReplayGain {
    pub reference: Option<f64>,
    pub album_gain: Option<f64>,
    pub track_gain: Option<f64>,
}
