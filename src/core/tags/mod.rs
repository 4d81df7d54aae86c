//! core/tags/mod.rs
//!
//! Metadata normalization utilities.
//! Public API:
//! - [`MetaTag`] and the per-codec tables map comment names to canonical fields.
//! - [`TagScanner`] forwards known comments and buffers ReplayGain.
//! - [`decode_picture`] / [`decode_base64_picture`] turn embedded art into a [`Picture`](super::types::Picture).
//! - [`TagWriter`] renders canonical tags as ID3 for the output file.

mod art;
mod scan;
mod util;
pub mod vocab;
mod write;

pub use art::{decode_base64_picture, decode_picture};
pub use scan::TagScanner;
pub use vocab::MetaTag;
pub use write::TagWriter;

#[cfg(test)]
pub(crate) use art::encode_picture_block;
