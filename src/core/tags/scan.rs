//! core/tags/scan.rs
//! Comment normalization shared by every decoder.
//!
//! - Known names are forwarded to the sink right away as canonical tags.
//! - The three ReplayGain names are buffered and emitted once by [`TagScanner::finish`].
//! - Everything else is dropped.

use super::super::encode::MetadataSink;
use super::super::types::ReplayGain;
use super::util::parse_float_prefix;
use super::vocab::{
    self, MetaTag, REPLAYGAIN_ALBUM_GAIN, REPLAYGAIN_REFERENCE_LOUDNESS, REPLAYGAIN_TRACK_GAIN,
    TagTable,
};

/// What happened to one comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comment {
    Forwarded(MetaTag),
    GainBuffered,
    Ignored,
}

pub struct TagScanner {
    table: TagTable,
    gain: ReplayGain,
}

impl TagScanner {
    pub fn new(table: TagTable) -> Self {
        Self {
            table,
            gain: ReplayGain::default(),
        }
    }

    pub fn comment(&mut self, name: &str, value: &str, sink: &mut dyn MetadataSink) -> Comment {
        let name = name.to_ascii_uppercase();

        if let Some(tag) = vocab::lookup(self.table, &name) {
            sink.set_text_tag(tag, value);
            return Comment::Forwarded(tag);
        }

        let slot = match name.as_str() {
            REPLAYGAIN_REFERENCE_LOUDNESS => &mut self.gain.reference,
            REPLAYGAIN_ALBUM_GAIN => &mut self.gain.album_gain,
            REPLAYGAIN_TRACK_GAIN => &mut self.gain.track_gain,
            _ => return Comment::Ignored,
        };
        *slot = Some(parse_float_prefix(value));
        Comment::GainBuffered
    }

    /// Emit the gain triple. Consumes the scanner so it happens once.
    pub fn finish(self, sink: &mut dyn MetadataSink) {
        sink.set_gain(self.gain);
    }
}
