//! core/decode/comments.rs
//! Comment lists and picture blocks read straight from the container.
//!
//! symphonia's demuxers turn `METADATA_BLOCK_PICTURE` comments into visuals
//! (dropping malformed ones) and keep only picture types they have a usage
//! key for. The adapters scan the headers as stored instead.

use std::fs::File;
use std::io;
use std::path::Path;

use symphonia::core::io::{BufReader, MediaSourceStream, MediaSourceStreamOptions, ReadBytes};
use tracing::debug;

use super::DecodeError;

/// Cap on a reassembled Ogg header packet.
const MAX_HEADER_PACKET: usize = 16 * 1024 * 1024;

const FLAC_MARKER: [u8; 4] = *b"fLaC";
const FLAC_LAST_BLOCK: u8 = 0x80;
const FLAC_BLOCK_VORBIS_COMMENT: u8 = 4;
const FLAC_BLOCK_PICTURE: u8 = 6;

const OGG_MARKER: [u8; 4] = *b"OggS";
const OGG_BEGINS_STREAM: u8 = 0x02;
const OGG_ENDS_STREAM: u8 = 0x04;

const VORBIS_IDENT_HEADER: &[u8] = b"\x01vorbis";
const VORBIS_COMMENT_HEADER: &[u8] = b"\x03vorbis";

/// One `NAME=value` comment, name as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawComment {
    pub name: String,
    pub value: String,
}

/// A FLAC metadata block the adapters forward, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FlacBlock {
    Comments(Vec<RawComment>),
    Picture(Vec<u8>),
}

fn open_source(path: &Path) -> Result<MediaSourceStream, DecodeError> {
    let file = File::open(path)?;
    Ok(MediaSourceStream::new(
        Box::new(file),
        MediaSourceStreamOptions::default(),
    ))
}

/// Short reads are malformed metadata; anything else stays an I/O error.
fn truncated(what: &'static str) -> impl Fn(io::Error) -> DecodeError {
    move |e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            DecodeError::MalformedMetadata(format!("{what} truncated"))
        } else {
            DecodeError::Io(e)
        }
    }
}

/// Every VORBIS_COMMENT and PICTURE block of a FLAC file.
pub(crate) fn read_flac_blocks(path: &Path) -> Result<Vec<FlacBlock>, DecodeError> {
    let mut src = open_source(path)?;
    let eof = truncated("FLAC metadata");

    let mut marker = src.read_quad_bytes().map_err(&eof)?;
    if marker[..3] == *b"ID3" {
        skip_id3v2(&mut src).map_err(&eof)?;
        marker = src.read_quad_bytes().map_err(&eof)?;
    }
    if marker != FLAC_MARKER {
        return Err(DecodeError::NotDecodable("missing fLaC marker".into()));
    }

    let mut blocks = Vec::new();
    loop {
        let header = src.read_u8().map_err(&eof)?;
        let len = src.read_be_u24().map_err(&eof)? as usize;
        match header & !FLAC_LAST_BLOCK {
            FLAC_BLOCK_VORBIS_COMMENT => {
                let body = src.read_boxed_slice_exact(len).map_err(&eof)?;
                blocks.push(FlacBlock::Comments(parse_comment_list(&body)?));
            }
            FLAC_BLOCK_PICTURE => {
                let body = src.read_boxed_slice_exact(len).map_err(&eof)?;
                blocks.push(FlacBlock::Picture(body.into_vec()));
            }
            _ => src.ignore_bytes(len as u64).map_err(&eof)?,
        }
        if header & FLAC_LAST_BLOCK != 0 {
            break;
        }
    }
    debug!(blocks = blocks.len(), "flac metadata blocks read");
    Ok(blocks)
}

/// Skip an ID3v2 tag whose first four bytes are already consumed.
fn skip_id3v2(src: &mut MediaSourceStream) -> io::Result<()> {
    let _revision = src.read_u8()?;
    let flags = src.read_u8()?;
    let size = src
        .read_quad_bytes()?
        .iter()
        .fold(0u64, |acc, &b| (acc << 7) | u64::from(b & 0x7f));
    let footer = if flags & 0x10 != 0 { 10 } else { 0 };
    src.ignore_bytes(size + footer)
}

/// The comment header of the first Vorbis stream in an Ogg file.
pub(crate) fn read_vorbis_comments(path: &Path) -> Result<Vec<RawComment>, DecodeError> {
    let mut src = open_source(path)?;

    let mut serial = None;
    let mut packet = Vec::new();
    let mut completed = 0;

    loop {
        let page = OggPage::read(&mut src)?;
        if serial.is_none()
            && page.flags & OGG_BEGINS_STREAM != 0
            && page.body.starts_with(VORBIS_IDENT_HEADER)
        {
            serial = Some(page.serial);
        }
        if serial != Some(page.serial) {
            continue;
        }

        let mut offset = 0;
        for &lace in page.lacing.iter() {
            let end = offset + usize::from(lace);
            packet.extend_from_slice(&page.body[offset..end]);
            offset = end;
            if packet.len() > MAX_HEADER_PACKET {
                return Err(DecodeError::MalformedMetadata(
                    "Vorbis header packet too large".into(),
                ));
            }
            if lace < 255 {
                completed += 1;
                if completed == 2 {
                    let comments = parse_comment_packet(&packet)?;
                    debug!(serial = page.serial, comments = comments.len(), "vorbis comments read");
                    return Ok(comments);
                }
                packet.clear();
            }
        }

        if page.flags & OGG_ENDS_STREAM != 0 {
            return Err(DecodeError::MalformedMetadata(
                "Vorbis stream ended before its comment header".into(),
            ));
        }
    }
}

struct OggPage {
    flags: u8,
    serial: u32,
    lacing: Box<[u8]>,
    body: Box<[u8]>,
}

impl OggPage {
    fn read(src: &mut MediaSourceStream) -> Result<Self, DecodeError> {
        let eof = truncated("Ogg page");
        if src.read_quad_bytes().map_err(&eof)? != OGG_MARKER {
            return Err(DecodeError::MalformedMetadata("lost Ogg page sync".into()));
        }
        let _version = src.read_u8().map_err(&eof)?;
        let flags = src.read_u8().map_err(&eof)?;
        // granule position
        src.ignore_bytes(8).map_err(&eof)?;
        let serial = src.read_u32().map_err(&eof)?;
        // sequence number, checksum
        src.ignore_bytes(8).map_err(&eof)?;
        let segments = src.read_u8().map_err(&eof)?;
        let lacing = src
            .read_boxed_slice_exact(usize::from(segments))
            .map_err(&eof)?;
        let body_len = lacing.iter().map(|&l| usize::from(l)).sum();
        let body = src.read_boxed_slice_exact(body_len).map_err(&eof)?;
        Ok(Self {
            flags,
            serial,
            lacing,
            body,
        })
    }
}

fn parse_comment_packet(packet: &[u8]) -> Result<Vec<RawComment>, DecodeError> {
    let body = packet.strip_prefix(VORBIS_COMMENT_HEADER).ok_or_else(|| {
        DecodeError::MalformedMetadata("second Vorbis header is not a comment header".into())
    })?;
    parse_comment_list(body)
}

/// Vendor string, then `NAME=value` entries; every length is a
/// little-endian u32. Entries without `=` are skipped.
fn parse_comment_list(body: &[u8]) -> Result<Vec<RawComment>, DecodeError> {
    let eof = truncated("comment list");
    let mut reader = BufReader::new(body);

    let vendor_len = reader.read_u32().map_err(&eof)?;
    reader.ignore_bytes(u64::from(vendor_len)).map_err(&eof)?;

    let count = reader.read_u32().map_err(&eof)?;
    let mut comments = Vec::new();
    for _ in 0..count {
        let len = reader.read_u32().map_err(&eof)? as usize;
        let entry = String::from_utf8_lossy(reader.read_buf_bytes_ref(len).map_err(&eof)?);
        if let Some((name, value)) = entry.split_once('=') {
            comments.push(RawComment {
                name: name.to_string(),
                value: value.to_string(),
            });
        }
    }
    Ok(comments)
}
