//! core/tags/vocab.rs
//! The canonical metadata vocabulary and the per-codec comment name tables.
//!
//! Both source codecs carry Vorbis-style comments, but they disagree on a
//! couple of MusicBrainz names, so each decoder gets its own table.

/// Canonical metadata fields understood by every encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaTag {
    Title,
    Artist,
    Album,
    Genre,
    Date,
    Composer,
    Performer,
    Copyright,
    EncodedBy,
    Organization,
    Conductor,
    AlbumArtist,
    TrackNumber,
    TrackTotal,
    DiscNumber,
    DiscTotal,
    MusicBrainzAlbumArtistId,
    MusicBrainzAlbumId,
    MusicBrainzReleaseCountry,
    MusicBrainzAlbumStatus,
    MusicBrainzAlbumType,
    MusicBrainzArtistId,
    MusicBrainzReleaseGroupId,
    MusicBrainzTrackId,
}

/// Upper-case comment name -> canonical field.
pub type TagTable = &'static [(&'static str, MetaTag)];

pub const FLAC_TAGS: TagTable = &[
    ("TITLE", MetaTag::Title),
    ("ARTIST", MetaTag::Artist),
    ("ALBUM", MetaTag::Album),
    ("GENRE", MetaTag::Genre),
    ("DATE", MetaTag::Date),
    ("COMPOSER", MetaTag::Composer),
    ("PERFORMER", MetaTag::Performer),
    ("COPYRIGHT", MetaTag::Copyright),
    ("ENCODED_BY", MetaTag::EncodedBy),
    ("ORGANIZATION", MetaTag::Organization),
    ("CONDUCTOR", MetaTag::Conductor),
    ("ALBUMARTIST", MetaTag::AlbumArtist),
    ("ALBUM ARTIST", MetaTag::AlbumArtist),
    ("TRACKNUMBER", MetaTag::TrackNumber),
    ("TRACKTOTAL", MetaTag::TrackTotal),
    ("DISCNUMBER", MetaTag::DiscNumber),
    ("DISCTOTAL", MetaTag::DiscTotal),
    ("MUSICBRAINZ_ALBUMARTISTID", MetaTag::MusicBrainzAlbumArtistId),
    ("MUSICBRAINZ_ALBUMID", MetaTag::MusicBrainzAlbumId),
    ("RELEASECOUNTRY", MetaTag::MusicBrainzReleaseCountry),
    ("MUSICBRAINZ_ALBUMSTATUS", MetaTag::MusicBrainzAlbumStatus),
    ("MUSICBRAINZ_ALBUMTYPE", MetaTag::MusicBrainzAlbumType),
    ("MUSICBRAINZ_ARTISTID", MetaTag::MusicBrainzArtistId),
    ("MUSICBRAINZ_RELEASEGROUPID", MetaTag::MusicBrainzReleaseGroupId),
    ("MUSICBRAINZ_TRACKID", MetaTag::MusicBrainzTrackId),
];

pub const VORBIS_TAGS: TagTable = &[
    ("TITLE", MetaTag::Title),
    ("ARTIST", MetaTag::Artist),
    ("ALBUM", MetaTag::Album),
    ("GENRE", MetaTag::Genre),
    ("DATE", MetaTag::Date),
    ("COMPOSER", MetaTag::Composer),
    ("PERFORMER", MetaTag::Performer),
    ("COPYRIGHT", MetaTag::Copyright),
    ("ENCODED_BY", MetaTag::EncodedBy),
    ("ORGANIZATION", MetaTag::Organization),
    ("CONDUCTOR", MetaTag::Conductor),
    ("ALBUMARTIST", MetaTag::AlbumArtist),
    ("ALBUM ARTIST", MetaTag::AlbumArtist),
    ("TRACKNUMBER", MetaTag::TrackNumber),
    ("TRACKTOTAL", MetaTag::TrackTotal),
    ("DISCNUMBER", MetaTag::DiscNumber),
    ("DISCTOTAL", MetaTag::DiscTotal),
    ("MUSICBRAINZ_ALBUMARTISTID", MetaTag::MusicBrainzAlbumArtistId),
    ("MUSICBRAINZ_ALBUMID", MetaTag::MusicBrainzAlbumId),
    ("RELEASECOUNTRY", MetaTag::MusicBrainzReleaseCountry),
    ("RELEASESTATUS", MetaTag::MusicBrainzAlbumStatus),
    ("RELEASETYPE", MetaTag::MusicBrainzAlbumType),
    ("MUSICBRAINZ_ARTISTID", MetaTag::MusicBrainzArtistId),
    ("MUSICBRAINZ_RELEASEGROUPID", MetaTag::MusicBrainzReleaseGroupId),
    ("MUSICBRAINZ_TRACKID", MetaTag::MusicBrainzTrackId),
];

/// Comment names carrying ReplayGain values. These are never forwarded as
/// text; they are buffered into one `ReplayGain`.
pub const REPLAYGAIN_REFERENCE_LOUDNESS: &str = "REPLAYGAIN_REFERENCE_LOUDNESS";
pub const REPLAYGAIN_ALBUM_GAIN: &str = "REPLAYGAIN_ALBUM_GAIN";
pub const REPLAYGAIN_TRACK_GAIN: &str = "REPLAYGAIN_TRACK_GAIN";

/// Vorbis comment carrying a base64-encoded FLAC PICTURE block.
pub const METADATA_BLOCK_PICTURE: &str = "METADATA_BLOCK_PICTURE";

/// Look up an already upper-cased comment name.
pub fn lookup(table: TagTable, upper_name: &str) -> Option<MetaTag> {
    table
        .iter()
        .find(|(name, _)| *name == upper_name)
        .map(|(_, tag)| *tag)
}
