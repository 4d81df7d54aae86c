//! core/tags/art.rs
//! Embedded picture decoding.
//!
//! Both source codecs store cover art in the FLAC PICTURE block layout
//! (all integers big-endian):
//!
//! ```text
//! type u32 | mime_len u32 | mime | desc_len u32 | desc (UTF-8)
//! width u32 | height u32 | depth u32 | colors u32 | data_len u32 | data
//! ```
//!
//! Ogg Vorbis wraps the same block in base64 inside a comment.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Buf;
use thiserror::Error;

use super::super::types::Picture;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PictureError {
    #[error("picture block truncated in {0}")]
    Truncated(&'static str),

    #[error("picture {0} is not valid UTF-8")]
    InvalidText(&'static str),

    #[error("invalid base64 picture payload: {0}")]
    InvalidBase64(String),
}

/// Decode a raw PICTURE block.
pub fn decode_picture(raw: &[u8]) -> Result<Picture, PictureError> {
    let mut buf = raw;

    let picture_type = read_u32(&mut buf, "type")?;
    let mime = read_sized(&mut buf, "mime type")?;
    let mime_type = String::from_utf8(mime).map_err(|_| PictureError::InvalidText("mime type"))?;
    let desc = read_sized(&mut buf, "description")?;
    let description =
        String::from_utf8(desc).map_err(|_| PictureError::InvalidText("description"))?;

    // width, height, depth, colors: not needed by any sink.
    for field in ["width", "height", "depth", "colors"] {
        read_u32(&mut buf, field)?;
    }

    let data = read_sized(&mut buf, "data")?;

    Ok(Picture {
        mime_type,
        picture_type,
        description,
        data,
    })
}

/// Decode a base64 `METADATA_BLOCK_PICTURE` value, then the block inside it.
pub fn decode_base64_picture(text: &str) -> Result<Picture, PictureError> {
    let raw = STANDARD
        .decode(text.trim())
        .map_err(|e| PictureError::InvalidBase64(e.to_string()))?;
    decode_picture(&raw)
}

fn read_u32(buf: &mut &[u8], field: &'static str) -> Result<u32, PictureError> {
    if buf.remaining() < 4 {
        return Err(PictureError::Truncated(field));
    }
    Ok(buf.get_u32())
}

fn read_sized(buf: &mut &[u8], field: &'static str) -> Result<Vec<u8>, PictureError> {
    let len = read_u32(buf, field)? as usize;
    if buf.remaining() < len {
        return Err(PictureError::Truncated(field));
    }
    let out = buf[..len].to_vec();
    buf.advance(len);
    Ok(out)
}

#[cfg(test)]
pub(crate) fn encode_picture_block(p: &Picture) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&p.picture_type.to_be_bytes());
    out.extend_from_slice(&(p.mime_type.len() as u32).to_be_bytes());
    out.extend_from_slice(p.mime_type.as_bytes());
    out.extend_from_slice(&(p.description.len() as u32).to_be_bytes());
    out.extend_from_slice(p.description.as_bytes());
    for v in [600u32, 600, 24, 0] {
        out.extend_from_slice(&v.to_be_bytes());
    }
    out.extend_from_slice(&(p.data.len() as u32).to_be_bytes());
    out.extend_from_slice(&p.data);
    out
}
