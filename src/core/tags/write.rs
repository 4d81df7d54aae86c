//! Build the ID3 tag embedded in the transcoded output from canonical tags.

use id3::frame::{ExtendedText, Picture as Id3Picture, PictureType};
use id3::{Tag, TagLike, Version};

use super::super::types::{Picture, ReplayGain};
use super::util::format_slash_pair;
use super::vocab::MetaTag;

/// Accumulates canonical tags, pictures and gain into one ID3v2.4 tag.
///
/// Track and disc numbers arrive as separate number/total comments in either
/// order, so they are held back and combined into TRCK/TPOS at render time.
#[derive(Debug)]
pub struct TagWriter {
    tag: Tag,
    track: Option<String>,
    track_total: Option<String>,
    disc: Option<String>,
    disc_total: Option<String>,
}

impl Default for TagWriter {
    fn default() -> Self {
        Self {
            tag: Tag::new(),
            track: None,
            track_total: None,
            disc: None,
            disc_total: None,
        }
    }
}

impl TagWriter {
    pub fn set_text(&mut self, field: MetaTag, value: &str) {
        match field {
            MetaTag::TrackNumber => self.track = Some(value.to_string()),
            MetaTag::TrackTotal => self.track_total = Some(value.to_string()),
            MetaTag::DiscNumber => self.disc = Some(value.to_string()),
            MetaTag::DiscTotal => self.disc_total = Some(value.to_string()),
            _ => match frame_for(field) {
                Frame::Text(id) => self.tag.set_text(id, value),
                Frame::UserText(description) => {
                    let _ = self.tag.add_frame(ExtendedText {
                        description: description.to_string(),
                        value: value.to_string(),
                    });
                }
            },
        }
    }

    pub fn add_picture(&mut self, picture: &Picture) {
        let _ = self.tag.add_frame(Id3Picture {
            mime_type: picture.mime_type.clone(),
            picture_type: picture_type(picture.picture_type),
            description: picture.description.clone(),
            data: picture.data.clone(),
        });
    }

    pub fn set_gain(&mut self, gain: ReplayGain) {
        let fields = [
            ("replaygain_reference_loudness", gain.reference),
            ("replaygain_album_gain", gain.album_gain),
            ("replaygain_track_gain", gain.track_gain),
        ];
        for (description, value) in fields {
            if let Some(db) = value {
                let _ = self.tag.add_frame(ExtendedText {
                    description: description.to_string(),
                    value: format!("{db:.2} dB"),
                });
            }
        }
    }

    /// Serialize the tag. Returns an empty vec when there is nothing to write.
    pub fn render(&self) -> Result<Vec<u8>, id3::Error> {
        let mut tag = self.tag.clone();
        if let Some(trck) = format_slash_pair(self.track.as_deref(), self.track_total.as_deref()) {
            tag.set_text("TRCK", trck);
        }
        if let Some(tpos) = format_slash_pair(self.disc.as_deref(), self.disc_total.as_deref()) {
            tag.set_text("TPOS", tpos);
        }

        if tag.frames().next().is_none() {
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        tag.write_to(&mut out, Version::Id3v24)?;
        Ok(out)
    }
}

enum Frame {
    Text(&'static str),
    UserText(&'static str),
}

fn frame_for(field: MetaTag) -> Frame {
    match field {
        MetaTag::Title => Frame::Text("TIT2"),
        MetaTag::Artist => Frame::Text("TPE1"),
        MetaTag::Album => Frame::Text("TALB"),
        MetaTag::Genre => Frame::Text("TCON"),
        MetaTag::Date => Frame::Text("TDRC"),
        MetaTag::Composer => Frame::Text("TCOM"),
        MetaTag::Performer => Frame::Text("TOPE"),
        MetaTag::Copyright => Frame::Text("TCOP"),
        MetaTag::EncodedBy => Frame::Text("TENC"),
        MetaTag::Organization => Frame::Text("TPUB"),
        MetaTag::Conductor => Frame::Text("TPE3"),
        MetaTag::AlbumArtist => Frame::Text("TPE2"),
        // set_text intercepts these; TagWriter::render combines them.
        MetaTag::TrackNumber | MetaTag::TrackTotal => Frame::Text("TRCK"),
        MetaTag::DiscNumber | MetaTag::DiscTotal => Frame::Text("TPOS"),
        MetaTag::MusicBrainzAlbumArtistId => Frame::UserText("MusicBrainz Album Artist Id"),
        MetaTag::MusicBrainzAlbumId => Frame::UserText("MusicBrainz Album Id"),
        MetaTag::MusicBrainzReleaseCountry => Frame::UserText("MusicBrainz Album Release Country"),
        MetaTag::MusicBrainzAlbumStatus => Frame::UserText("MusicBrainz Album Status"),
        MetaTag::MusicBrainzAlbumType => Frame::UserText("MusicBrainz Album Type"),
        MetaTag::MusicBrainzArtistId => Frame::UserText("MusicBrainz Artist Id"),
        MetaTag::MusicBrainzReleaseGroupId => Frame::UserText("MusicBrainz Release Group Id"),
        MetaTag::MusicBrainzTrackId => Frame::UserText("MusicBrainz Track Id"),
    }
}

fn picture_type(code: u32) -> PictureType {
    match code {
        0 => PictureType::Other,
        1 => PictureType::Icon,
        2 => PictureType::OtherIcon,
        3 => PictureType::CoverFront,
        4 => PictureType::CoverBack,
        5 => PictureType::Leaflet,
        6 => PictureType::Media,
        7 => PictureType::LeadArtist,
        8 => PictureType::Artist,
        9 => PictureType::Conductor,
        10 => PictureType::Band,
        11 => PictureType::Composer,
        12 => PictureType::Lyricist,
        13 => PictureType::RecordingLocation,
        14 => PictureType::DuringRecording,
        15 => PictureType::DuringPerformance,
        16 => PictureType::ScreenCapture,
        17 => PictureType::BrightFish,
        18 => PictureType::Illustration,
        19 => PictureType::BandLogo,
        20 => PictureType::PublisherLogo,
        other => PictureType::Undefined(u8::try_from(other).unwrap_or(u8::MAX)),
    }
}
