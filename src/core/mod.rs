//! core/mod.rs
//!
//! Everything that is not the filesystem surface:
//! - Map virtual names to real files and back (`library`)
//! - Decode FLAC / Ogg Vorbis sources behind one contract (`decode`)
//! - Normalize comments and embedded pictures (`tags`)
//! - Encode PCM plus tags into the target format (`encode`)
//! - Step a decoder into an encoder on demand (`transcode`)
//!
//! Nothing in here knows about FUSE. The `fs` layer resolves a path, asks
//! `library` for the backing file, and drives a `transcode::Transcoder`.

pub mod decode;
pub mod encode;
pub mod library;
pub mod tags;
pub mod transcode;
pub mod types;
