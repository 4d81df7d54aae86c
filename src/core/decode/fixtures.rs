//! Minimal FLAC and Ogg Vorbis files for the decoder tests.
//!
//! The FLAC writer emits STREAMINFO, optional comment and picture blocks and
//! one VERBATIM stereo frame. The Ogg Vorbis writer emits valid headers with
//! a single two-entry codebook and one short-block mode, followed by audio
//! packets whose floors are all unused, so every decoded sample is silence.

use std::path::Path;

use symphonia::core::checksum::{Crc8Ccitt, Crc16Ansi, Crc32};
use symphonia::core::io::Monitor;

/// Frames each Ogg Vorbis audio packet after the first decodes to.
pub const VORBIS_FRAMES_PER_PACKET: usize = 128;

/// Vorbis comment list body: vendor, count, `len | NAME=value` entries.
pub fn comment_list(comments: &[&str]) -> Vec<u8> {
    let vendor = b"wavfs fixtures";
    let mut out = Vec::new();
    out.extend_from_slice(&(vendor.len() as u32).to_le_bytes());
    out.extend_from_slice(vendor);
    out.extend_from_slice(&(comments.len() as u32).to_le_bytes());
    for comment in comments {
        out.extend_from_slice(&(comment.len() as u32).to_le_bytes());
        out.extend_from_slice(comment.as_bytes());
    }
    out
}

/// Stereo, 16-bit, 44.1 kHz, one frame of `left.len()` samples (16..=256).
pub struct FlacFixture<'a> {
    pub left: Vec<i16>,
    pub right: Vec<i16>,
    pub comments: Vec<&'a str>,
    /// Raw PICTURE block bodies.
    pub pictures: Vec<Vec<u8>>,
}

impl Default for FlacFixture<'_> {
    fn default() -> Self {
        let left = vec![1, 300, 32767, -1, 0, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17];
        let right = vec![-2, -32768, 5, 4, 3, 2, 1, 0, -1, -2, -3, -4, -5, -6, -7, -8];
        Self {
            left,
            right,
            comments: Vec::new(),
            pictures: Vec::new(),
        }
    }
}

impl FlacFixture<'_> {
    pub fn bytes(&self) -> Vec<u8> {
        let frames = self.left.len();
        assert!((16..=256).contains(&frames) && self.right.len() == frames);

        let mut info = Vec::new();
        info.extend_from_slice(&(frames as u16).to_be_bytes());
        info.extend_from_slice(&(frames as u16).to_be_bytes());
        info.extend_from_slice(&[0; 6]);
        let packed = (44_100u64 << 44) | (1 << 41) | (15 << 36) | frames as u64;
        info.extend_from_slice(&packed.to_be_bytes());
        info.extend_from_slice(&[0; 16]);

        let mut blocks = vec![(0u8, info)];
        if !self.comments.is_empty() {
            blocks.push((4, comment_list(&self.comments)));
        }
        for picture in &self.pictures {
            blocks.push((6, picture.clone()));
        }

        let mut out = b"fLaC".to_vec();
        let last = blocks.len() - 1;
        for (i, (kind, body)) in blocks.iter().enumerate() {
            let flag = if i == last { 0x80 } else { 0 };
            out.push(flag | kind);
            out.extend_from_slice(&(body.len() as u32).to_be_bytes()[1..]);
            out.extend_from_slice(body);
        }
        out.extend_from_slice(&self.frame());
        out
    }

    /// Fixed block size, frame 0, 8-bit block size, independent stereo.
    fn frame(&self) -> Vec<u8> {
        let mut frame = vec![0xff, 0xf8, 0x69, 0x18, 0x00, (self.left.len() - 1) as u8];
        let mut crc8 = Crc8Ccitt::new(0);
        crc8.process_buf_bytes(&frame);
        frame.push(crc8.crc());

        for channel in [&self.left, &self.right] {
            // VERBATIM subframe, no wasted bits
            frame.push(0x02);
            for sample in channel {
                frame.extend_from_slice(&sample.to_be_bytes());
            }
        }

        let mut crc16 = Crc16Ansi::new(0);
        crc16.process_buf_bytes(&frame);
        frame.extend_from_slice(&crc16.crc().to_be_bytes());
        frame
    }

    pub fn write(&self, path: &Path) {
        std::fs::write(path, self.bytes()).unwrap();
    }
}

/// 44.1 kHz Vorbis with 256-sample blocks.
pub struct OggVorbisFixture<'a> {
    pub channels: u8,
    pub comments: Vec<&'a str>,
    /// Audio packets after the first; each yields
    /// [`VORBIS_FRAMES_PER_PACKET`] frames.
    pub packets: usize,
}

impl Default for OggVorbisFixture<'_> {
    fn default() -> Self {
        Self {
            channels: 2,
            comments: Vec::new(),
            packets: 2,
        }
    }
}

impl OggVorbisFixture<'_> {
    pub fn bytes(&self) -> Vec<u8> {
        let mut ogg = OggWriter::new(0x5eed);
        ogg.packets(&[self.ident()], 0, OggWriter::BEGINS_STREAM);
        ogg.packets(&[self.comment(), setup()], 0, 0);

        let audio = vec![vec![0u8]; self.packets + 1];
        let granule = (self.packets * VORBIS_FRAMES_PER_PACKET) as u64;
        ogg.packets(&audio, granule, OggWriter::ENDS_STREAM);
        ogg.out
    }

    pub fn write(&self, path: &Path) {
        std::fs::write(path, self.bytes()).unwrap();
    }

    fn ident(&self) -> Vec<u8> {
        let mut p = b"\x01vorbis".to_vec();
        p.extend_from_slice(&0u32.to_le_bytes());
        p.push(self.channels);
        p.extend_from_slice(&44_100u32.to_le_bytes());
        p.extend_from_slice(&[0; 12]);
        // blocksize_0 = blocksize_1 = 2^8
        p.push(0x88);
        p.push(0x01);
        p
    }

    fn comment(&self) -> Vec<u8> {
        let mut p = b"\x03vorbis".to_vec();
        p.extend_from_slice(&comment_list(&self.comments));
        p.push(0x01);
        p
    }
}

fn setup() -> Vec<u8> {
    let mut bits = BitWriter::default();

    // one codebook: 1 dimension, 2 entries of length 1, no lookup
    bits.put(0, 8);
    bits.put(0x564342, 24);
    bits.put(1, 16);
    bits.put(2, 24);
    bits.put(0, 1);
    bits.put(0, 1);
    bits.put(0, 5);
    bits.put(0, 5);
    bits.put(0, 4);

    // one time-domain placeholder
    bits.put(0, 6);
    bits.put(0, 16);

    // one floor1 without partitions
    bits.put(0, 6);
    bits.put(1, 16);
    bits.put(0, 5);
    bits.put(0, 2);
    bits.put(4, 4);

    // one empty type-0 residue
    bits.put(0, 6);
    bits.put(0, 16);
    bits.put(0, 24);
    bits.put(0, 24);
    bits.put(0, 24);
    bits.put(0, 6);
    bits.put(0, 8);
    bits.put(0, 3);
    bits.put(0, 1);

    // one mapping, single submap, no coupling
    bits.put(0, 6);
    bits.put(0, 16);
    bits.put(0, 1);
    bits.put(0, 1);
    bits.put(0, 2);
    bits.put(0, 8);
    bits.put(0, 8);
    bits.put(0, 8);

    // one short-block mode
    bits.put(0, 6);
    bits.put(0, 1);
    bits.put(0, 16);
    bits.put(0, 16);
    bits.put(0, 8);

    // framing
    bits.put(1, 1);

    let mut p = b"\x05vorbis".to_vec();
    p.extend_from_slice(&bits.bytes);
    p
}

/// Vorbis bit packing: least significant bit first.
#[derive(Default)]
struct BitWriter {
    bytes: Vec<u8>,
    used: u32,
}

impl BitWriter {
    fn put(&mut self, value: u32, bits: u32) {
        for i in 0..bits {
            if self.used % 8 == 0 {
                self.bytes.push(0);
            }
            let bit = ((value >> i) & 1) as u8;
            if let Some(last) = self.bytes.last_mut() {
                *last |= bit << (self.used % 8);
            }
            self.used += 1;
        }
    }
}

struct OggWriter {
    serial: u32,
    sequence: u32,
    out: Vec<u8>,
}

impl OggWriter {
    const CONTINUED: u8 = 0x01;
    const BEGINS_STREAM: u8 = 0x02;
    const ENDS_STREAM: u8 = 0x04;

    fn new(serial: u32) -> Self {
        Self {
            serial,
            sequence: 0,
            out: Vec::new(),
        }
    }

    /// Lay `packets` out over as many pages as the lacing needs. BOS goes on
    /// the first page, EOS on the last.
    fn packets(&mut self, packets: &[Vec<u8>], granule: u64, flags: u8) {
        let mut segments = Vec::new();
        let mut data = Vec::new();
        for packet in packets {
            let mut rest = packet.len();
            loop {
                let lace = rest.min(255);
                segments.push(lace as u8);
                rest -= lace;
                if lace < 255 {
                    break;
                }
            }
            data.extend_from_slice(packet);
        }

        let pages: Vec<&[u8]> = segments.chunks(255).collect();
        let mut offset = 0;
        let mut continued = false;
        for (i, lacing) in pages.iter().enumerate() {
            let mut page_flags = flags & !Self::ENDS_STREAM;
            if i > 0 {
                page_flags &= !Self::BEGINS_STREAM;
            }
            if i == pages.len() - 1 {
                page_flags |= flags & Self::ENDS_STREAM;
            }
            if continued {
                page_flags |= Self::CONTINUED;
            }

            let ends_packet = lacing.iter().any(|&l| l < 255);
            let page_granule = if ends_packet { granule } else { u64::MAX };
            let len: usize = lacing.iter().map(|&l| usize::from(l)).sum();
            self.page(page_flags, page_granule, lacing, &data[offset..offset + len]);

            offset += len;
            continued = lacing.last() == Some(&255);
        }
    }

    fn page(&mut self, flags: u8, granule: u64, lacing: &[u8], body: &[u8]) {
        let mut page = b"OggS".to_vec();
        page.push(0);
        page.push(flags);
        page.extend_from_slice(&granule.to_le_bytes());
        page.extend_from_slice(&self.serial.to_le_bytes());
        page.extend_from_slice(&self.sequence.to_le_bytes());
        page.extend_from_slice(&[0; 4]);
        page.push(lacing.len() as u8);
        page.extend_from_slice(lacing);
        page.extend_from_slice(body);

        let mut crc = Crc32::new(0);
        crc.process_buf_bytes(&page);
        page[22..26].copy_from_slice(&crc.crc().to_le_bytes());

        self.sequence += 1;
        self.out.extend_from_slice(&page);
    }
}
