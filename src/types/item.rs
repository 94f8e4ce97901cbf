//! Item codec: one stored record and its metadata summary.
//!
//! An item record is `id (u64 BE) || feature bitfield (1 byte) || present
//! feature fields in fixed order || payload`. Bit positions are a format
//! contract; new fields must claim bits above all existing ones so old files
//! keep decoding. The decoder here is metadata-only and never touches payload
//! bytes; callers read payloads straight from the file using
//! [`ItemMetadata::contents_offset`] and [`ItemMetadata::size`].

use serde::{Deserialize, Serialize};

use crate::error::{OatsError, Result};

/// Reserved sentinel for a future extension area. No extension fields are
/// defined at this major version, so a set bit means the payload boundary is
/// unknowable and the item is refused.
pub const FEAT_EXTENDED: u8 = 1 << 0;
/// An i64 millisecond timestamp follows the bitfield.
pub const FEAT_TIMESTAMP: u8 = 1 << 1;
/// An i64 session id follows.
pub const FEAT_SESSION_ID: u8 = 1 << 2;
/// A u16-length-prefixed image filename follows; marks the item as an image.
pub const FEAT_IMAGE: u8 = 1 << 3;
/// Flag only: the item was pushed from a mobile front end.
pub const FEAT_MOBILE: u8 = 1 << 4;
/// Flag only: the item is a stub whose payload was trimmed away.
pub const FEAT_VOID: u8 = 1 << 5;
/// A u16-length-prefixed filename follows; marks the item as a file (or, with
/// [`FEAT_VIDEO_KIND`], a video).
pub const FEAT_FILE: u8 = 1 << 6;
/// A one-byte video container tag follows; marks the item as a video.
pub const FEAT_VIDEO_KIND: u8 = 1 << 7;

/// Recognized video containers, stored as a single byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoKind {
    Mp4 = 1,
    Ogg = 2,
    Webm = 3,
}

impl VideoKind {
    pub(crate) fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::Mp4),
            2 => Some(Self::Ogg),
            3 => Some(Self::Webm),
            _ => None,
        }
    }

    /// Sniff the container from a payload's leading bytes.
    ///
    /// MP4 carries `ftyp` at offset 4, Ogg starts with `OggS`, and WebM with
    /// the EBML marker. Anything else is refused.
    pub fn sniff(payload: &[u8]) -> Result<Self> {
        if payload.len() >= 8 && &payload[4..8] == b"ftyp" {
            return Ok(Self::Mp4);
        }
        if payload.starts_with(b"OggS") {
            return Ok(Self::Ogg);
        }
        if payload.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
            return Ok(Self::Webm);
        }
        Err(OatsError::UnknownVideoKind)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Ogg => "ogg",
            Self::Webm => "webm",
        }
    }
}

/// Broad display category of an item, derived from its feature bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Text,
    Image,
    File,
    Video,
}

/// The optional feature fields of one item. Absent fields occupy zero bytes
/// on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Features {
    pub timestamp: Option<i64>,
    pub session_id: Option<i64>,
    pub image_filename: Option<Vec<u8>>,
    pub filename: Option<Vec<u8>>,
    pub is_mobile: bool,
    pub is_void: bool,
    pub video_kind: Option<VideoKind>,
}

impl Features {
    /// The bitfield byte describing which fields are present.
    #[must_use]
    pub fn bits(&self) -> u8 {
        let mut bits = 0u8;
        if self.timestamp.is_some() {
            bits |= FEAT_TIMESTAMP;
        }
        if self.session_id.is_some() {
            bits |= FEAT_SESSION_ID;
        }
        if self.image_filename.is_some() {
            bits |= FEAT_IMAGE;
        }
        if self.is_mobile {
            bits |= FEAT_MOBILE;
        }
        if self.is_void {
            bits |= FEAT_VOID;
        }
        if self.filename.is_some() {
            bits |= FEAT_FILE;
        }
        if self.video_kind.is_some() {
            bits |= FEAT_VIDEO_KIND;
        }
        bits
    }

    /// Display category. Video wins over file when both bits are set; void is
    /// orthogonal and reported separately.
    #[must_use]
    pub fn kind(&self) -> ItemKind {
        if self.image_filename.is_some() {
            ItemKind::Image
        } else if self.video_kind.is_some() {
            ItemKind::Video
        } else if self.filename.is_some() {
            ItemKind::File
        } else {
            ItemKind::Text
        }
    }

    /// The stubbed copy of these features: void set, filename fields gone.
    #[must_use]
    pub fn stubbed(&self) -> Self {
        Self {
            timestamp: self.timestamp,
            session_id: self.session_id,
            image_filename: None,
            filename: None,
            is_mobile: self.is_mobile,
            is_void: true,
            video_kind: self.video_kind,
        }
    }
}

/// One stored record, fully materialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub id: u64,
    pub features: Features,
    pub payload: Vec<u8>,
}

impl Item {
    /// Serialize to the on-disk item record.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(16 + self.payload.len());
        out.extend_from_slice(&self.id.to_be_bytes());
        out.push(self.features.bits());

        if let Some(ts) = self.features.timestamp {
            out.extend_from_slice(&ts.to_be_bytes());
        }
        if let Some(sess) = self.features.session_id {
            out.extend_from_slice(&sess.to_be_bytes());
        }
        if let Some(name) = &self.features.image_filename {
            encode_name(&mut out, name)?;
        }
        if let Some(name) = &self.features.filename {
            encode_name(&mut out, name)?;
        }
        if let Some(kind) = self.features.video_kind {
            out.push(kind as u8);
        }

        out.extend_from_slice(&self.payload);
        Ok(out)
    }

    /// Deserialize a whole record, payload included. Scans should prefer
    /// [`ItemMetadata::decode`] and leave payload bytes on disk.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let meta = ItemMetadata::decode(bytes, 0)?;
        let payload = bytes[meta.contents_offset as usize..].to_vec();
        Ok(Self {
            id: meta.id,
            features: meta.features,
            payload,
        })
    }
}

fn encode_name(out: &mut Vec<u8>, name: &[u8]) -> Result<()> {
    let len = u16::try_from(name.len())
        .map_err(|_| OatsError::FilenameTooLong { len: name.len() })?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(name);
    Ok(())
}

/// In-memory summary of one item produced during scans. Filename bytes are
/// owned copies; the payload stays on disk at
/// `start_offset + contents_offset` for `size - contents_offset` bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMetadata {
    pub id: u64,
    pub features: Features,
    /// File position of the item record, just past the frame's leading length.
    pub start_offset: u64,
    /// Bytes from `start_offset` to the payload.
    pub contents_offset: u64,
    /// Total item-record length.
    pub size: u64,
}

impl ItemMetadata {
    /// Decode the feature fields of the record in `bytes`, which begins at
    /// absolute file position `start_offset`. The payload is not touched.
    pub fn decode(bytes: &[u8], start_offset: u64) -> Result<Self> {
        let mut r = FieldReader::new(bytes, start_offset);

        let id = u64::from_be_bytes(r.take_array::<8>("id")?);
        let bits = r.take_array::<1>("feature bitfield")?[0];

        if bits & FEAT_EXTENDED != 0 {
            return Err(OatsError::Corruption {
                offset: start_offset,
                reason: "extended feature bit set; payload length unknowable".into(),
            });
        }

        let mut features = Features::default();
        if bits & FEAT_TIMESTAMP != 0 {
            features.timestamp = Some(i64::from_be_bytes(r.take_array::<8>("timestamp")?));
        }
        if bits & FEAT_SESSION_ID != 0 {
            features.session_id = Some(i64::from_be_bytes(r.take_array::<8>("session id")?));
        }
        if bits & FEAT_IMAGE != 0 {
            features.image_filename = Some(r.take_name("image filename")?);
        }
        features.is_mobile = bits & FEAT_MOBILE != 0;
        features.is_void = bits & FEAT_VOID != 0;
        if bits & FEAT_FILE != 0 {
            features.filename = Some(r.take_name("filename")?);
        }
        if bits & FEAT_VIDEO_KIND != 0 {
            let tag = r.take_array::<1>("video kind")?[0];
            features.video_kind = Some(VideoKind::from_tag(tag).ok_or_else(|| {
                OatsError::Corruption {
                    offset: start_offset + r.pos() - 1,
                    reason: format!("unknown video kind tag {tag}"),
                }
            })?);
        }

        Ok(Self {
            id,
            features,
            start_offset,
            contents_offset: r.pos(),
            size: bytes.len() as u64,
        })
    }

    /// Length of the payload, which the decoder left on disk.
    #[must_use]
    pub fn payload_len(&self) -> u64 {
        self.size - self.contents_offset
    }
}

/// Bounds-checked cursor over an item record's bytes.
struct FieldReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    start_offset: u64,
}

impl<'a> FieldReader<'a> {
    fn new(bytes: &'a [u8], start_offset: u64) -> Self {
        Self {
            bytes,
            pos: 0,
            start_offset,
        }
    }

    fn pos(&self) -> u64 {
        self.pos as u64
    }

    fn overrun(&self, what: &str) -> OatsError {
        OatsError::Corruption {
            offset: self.start_offset + self.pos(),
            reason: format!("{what} reads past the item record"),
        }
    }

    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|end| *end <= self.bytes.len());
        let end = end.ok_or_else(|| self.overrun(what))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self, what: &str) -> Result<[u8; N]> {
        let slice = self.take(N, what)?;
        let mut arr = [0u8; N];
        arr.copy_from_slice(slice);
        Ok(arr)
    }

    fn take_name(&mut self, what: &str) -> Result<Vec<u8>> {
        let len = u16::from_be_bytes(self.take_array::<2>(what)?);
        Ok(self.take(usize::from(len), what)?.to_vec())
    }
}
