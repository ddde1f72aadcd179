//! Extra-field parsing and encoding.
//!
//! Every central and local header carries a variable "extra field" area: a
//! sequence of `(id, length, body)` triples. Ids this engine understands
//! decode to typed values; every other id is preserved opaquely so that a
//! rewrite can reproduce the area byte-for-byte. The area itself must be
//! well-formed — a triple truncated by the declared area length is a format
//! error, not something to skip.
//!
//! The Zip64 extended-info field (0x0001) is special: its body cannot be
//! decoded in isolation because a sub-field is present iff the matching
//! fixed header field reads as its 16/32-bit sentinel. The collection
//! therefore stores its body raw and resolves it on request, given the
//! sentinel set observed by the header parser.

use crate::fields::{ZIP64_MARKER_16, ZIP64_MARKER_32};
use spanzip_core::crc::Crc32;
use spanzip_core::error::{Result, SpanZipError};
use spanzip_core::position::ArchivePosition;

/// Zip64 extended information (0x0001).
pub const ZIP64_EXTENDED_INFO_ID: u16 = 0x0001;
/// NTFS timestamps (0x000A).
pub const NTFS_TIMESTAMPS_ID: u16 = 0x000A;
/// PKWARE Unix timestamps and ownership (0x000D).
pub const PKWARE_UNIX_ID: u16 = 0x000D;
/// Windows NT security descriptor (0x4453).
pub const SECURITY_DESCRIPTOR_ID: u16 = 0x4453;
/// Info-ZIP extended timestamp (0x5455).
pub const EXTENDED_TIMESTAMP_ID: u16 = 0x5455;
/// Code page override (0x5543).
pub const CODE_PAGE_ID: u16 = 0x5543;
/// Xceed unicode name (0x554E).
pub const XCEED_UNICODE_ID: u16 = 0x554E;
/// Info-ZIP Unix timestamps, original variant (0x5855).
pub const INFO_ZIP_UNIX_ID: u16 = 0x5855;
/// Info-ZIP unicode comment (0x6375).
pub const UNICODE_COMMENT_ID: u16 = 0x6375;
/// Info-ZIP unicode path (0x7075).
pub const UNICODE_PATH_ID: u16 = 0x7075;

/// Signature inside the Xceed unicode body ("NUCX", little-endian).
const XCEED_UNICODE_SIGNATURE: u32 = 0x5843_554E;

/// Which header a field travels in. Several ids use different body layouts
/// in the two header types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderKind {
    /// Local file header.
    Local,
    /// Central directory header.
    Central,
}

fn u16_at(b: &[u8], i: usize) -> Option<u16> {
    b.get(i..i + 2).map(|s| u16::from_le_bytes([s[0], s[1]]))
}

fn u32_at(b: &[u8], i: usize) -> Option<u32> {
    b.get(i..i + 4)
        .map(|s| u32::from_le_bytes(s.try_into().unwrap()))
}

fn u64_at(b: &[u8], i: usize) -> Option<u64> {
    b.get(i..i + 8)
        .map(|s| u64::from_le_bytes(s.try_into().unwrap()))
}

/// A decoded timestamp, in seconds and nanoseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZipTimestamp {
    /// Whole seconds since 1970-01-01T00:00:00Z.
    pub seconds: i64,
    /// Sub-second part in nanoseconds.
    pub nanoseconds: u32,
}

/// Offset between the FILETIME epoch (1601) and the Unix epoch, in seconds.
const FILETIME_EPOCH_OFFSET: i64 = 11_644_473_600;

impl ZipTimestamp {
    /// From a 32-bit Unix time (1-second precision).
    pub fn from_unix(seconds: u32) -> Self {
        Self {
            seconds: seconds as i64,
            nanoseconds: 0,
        }
    }

    /// From a Windows FILETIME (100-nanosecond intervals since 1601).
    pub fn from_filetime(filetime: u64) -> Self {
        Self {
            seconds: (filetime / 10_000_000) as i64 - FILETIME_EPOCH_OFFSET,
            nanoseconds: ((filetime % 10_000_000) * 100) as u32,
        }
    }
}

/// NTFS timestamps extra field (0x000A): FILETIME stamps with
/// 100-nanosecond precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NtfsTimestamps {
    /// Last write time (FILETIME).
    pub modified: Option<u64>,
    /// Last access time (FILETIME).
    pub accessed: Option<u64>,
    /// Creation time (FILETIME).
    pub created: Option<u64>,
}

impl NtfsTimestamps {
    fn decode(_kind: HeaderKind, body: &[u8]) -> Option<Self> {
        // Layout: reserved u32, then (tag u16, size u16, data) attributes.
        if body.len() < 4 {
            return None;
        }
        let mut field = Self::default();
        let mut at = 4;
        while at < body.len() {
            let tag = u16_at(body, at)?;
            let size = u16_at(body, at + 2)? as usize;
            at += 4;
            let data = body.get(at..at + size)?;
            if tag == 0x0001 && size >= 24 {
                field.modified = Some(u64_at(data, 0)?);
                field.accessed = Some(u64_at(data, 8)?);
                field.created = Some(u64_at(data, 16)?);
            }
            at += size;
        }
        Some(field)
    }

    fn encode(&self, _kind: HeaderKind) -> Option<Vec<u8>> {
        let (modified, accessed, created) = (self.modified?, self.accessed?, self.created?);
        let mut out = Vec::with_capacity(32);
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&0x0001u16.to_le_bytes());
        out.extend_from_slice(&24u16.to_le_bytes());
        out.extend_from_slice(&modified.to_le_bytes());
        out.extend_from_slice(&accessed.to_le_bytes());
        out.extend_from_slice(&created.to_le_bytes());
        Some(out)
    }
}

/// Info-ZIP extended timestamp extra field (0x5455): Unix times gated by a
/// flag byte. The local body carries every flagged time; the central body
/// carries the flags and the write time only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExtendedTimestamp {
    /// Presence flags (bit 0 mtime, bit 1 atime, bit 2 ctime).
    pub flags: u8,
    /// Last write time, Unix seconds.
    pub modified: Option<u32>,
    /// Last access time, Unix seconds.
    pub accessed: Option<u32>,
    /// Creation time, Unix seconds.
    pub created: Option<u32>,
}

impl ExtendedTimestamp {
    fn decode(kind: HeaderKind, body: &[u8]) -> Option<Self> {
        let flags = *body.first()?;
        let mut field = Self {
            flags,
            ..Self::default()
        };
        let mut at = 1;
        if flags & 0x01 != 0 {
            field.modified = Some(u32_at(body, at)?);
            at += 4;
        }
        if kind == HeaderKind::Central {
            // The central form stops after the write time regardless of the
            // access/creation flag bits.
            return Some(field);
        }
        if flags & 0x02 != 0 {
            field.accessed = Some(u32_at(body, at)?);
            at += 4;
        }
        if flags & 0x04 != 0 {
            field.created = Some(u32_at(body, at)?);
        }
        Some(field)
    }

    fn encode(&self, kind: HeaderKind) -> Option<Vec<u8>> {
        let mut out = vec![self.flags];
        if self.flags & 0x01 != 0 {
            out.extend_from_slice(&self.modified?.to_le_bytes());
        }
        if kind == HeaderKind::Central {
            return Some(out);
        }
        if self.flags & 0x02 != 0 {
            out.extend_from_slice(&self.accessed?.to_le_bytes());
        }
        if self.flags & 0x04 != 0 {
            out.extend_from_slice(&self.created?.to_le_bytes());
        }
        Some(out)
    }
}

/// PKWARE Unix extra field (0x000D): access/write times plus ownership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnixType1 {
    /// Last access time, Unix seconds.
    pub accessed: u32,
    /// Last write time, Unix seconds.
    pub modified: u32,
    /// Owning user id.
    pub uid: u16,
    /// Owning group id.
    pub gid: u16,
    /// Variable tail (device numbers or link target).
    pub data: Vec<u8>,
}

impl UnixType1 {
    fn decode(_kind: HeaderKind, body: &[u8]) -> Option<Self> {
        Some(Self {
            accessed: u32_at(body, 0)?,
            modified: u32_at(body, 4)?,
            uid: u16_at(body, 8)?,
            gid: u16_at(body, 10)?,
            data: body[12..].to_vec(),
        })
    }

    fn encode(&self, _kind: HeaderKind) -> Option<Vec<u8>> {
        let mut out = Vec::with_capacity(12 + self.data.len());
        out.extend_from_slice(&self.accessed.to_le_bytes());
        out.extend_from_slice(&self.modified.to_le_bytes());
        out.extend_from_slice(&self.uid.to_le_bytes());
        out.extend_from_slice(&self.gid.to_le_bytes());
        out.extend_from_slice(&self.data);
        Some(out)
    }
}

/// Info-ZIP Unix extra field, original variant (0x5855). The local body
/// appends uid/gid; the central body stops after the times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnixType0 {
    /// Last access time, Unix seconds.
    pub accessed: u32,
    /// Last write time, Unix seconds.
    pub modified: u32,
    /// Owning user id (local header only).
    pub uid: Option<u16>,
    /// Owning group id (local header only).
    pub gid: Option<u16>,
}

impl UnixType0 {
    fn decode(kind: HeaderKind, body: &[u8]) -> Option<Self> {
        let accessed = u32_at(body, 0)?;
        let modified = u32_at(body, 4)?;
        let (uid, gid) = if kind == HeaderKind::Local && body.len() >= 12 {
            (u16_at(body, 8), u16_at(body, 10))
        } else {
            (None, None)
        };
        Some(Self {
            accessed,
            modified,
            uid,
            gid,
        })
    }

    fn encode(&self, kind: HeaderKind) -> Option<Vec<u8>> {
        let mut out = Vec::with_capacity(12);
        out.extend_from_slice(&self.accessed.to_le_bytes());
        out.extend_from_slice(&self.modified.to_le_bytes());
        if kind == HeaderKind::Local {
            if let (Some(uid), Some(gid)) = (self.uid, self.gid) {
                out.extend_from_slice(&uid.to_le_bytes());
                out.extend_from_slice(&gid.to_le_bytes());
            }
        }
        Some(out)
    }
}

/// Info-ZIP unicode path extra field (0x7075): UTF-8 name plus a CRC-32 of
/// the standard name bytes it overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnicodePath {
    /// Field version (always 1).
    pub version: u8,
    /// CRC-32 of the header's standard name bytes.
    pub name_crc32: u32,
    /// UTF-8 name bytes.
    pub name: Vec<u8>,
}

impl UnicodePath {
    /// True when `standard_name` still hashes to the CRC recorded at
    /// write time. A mismatch means the standard name was rewritten after
    /// this field, and the UTF-8 override is stale.
    pub fn matches_name(&self, standard_name: &[u8]) -> bool {
        Crc32::compute(standard_name) == self.name_crc32
    }

    fn decode(_kind: HeaderKind, body: &[u8]) -> Option<Self> {
        let version = *body.first()?;
        if version != 1 {
            return None;
        }
        Some(Self {
            version,
            name_crc32: u32_at(body, 1)?,
            name: body[5..].to_vec(),
        })
    }

    fn encode(&self, _kind: HeaderKind) -> Option<Vec<u8>> {
        let mut out = Vec::with_capacity(5 + self.name.len());
        out.push(self.version);
        out.extend_from_slice(&self.name_crc32.to_le_bytes());
        out.extend_from_slice(&self.name);
        Some(out)
    }
}

/// Info-ZIP unicode comment extra field (0x6375). Central headers only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnicodeComment {
    /// Field version (always 1).
    pub version: u8,
    /// CRC-32 of the header's standard comment bytes.
    pub comment_crc32: u32,
    /// UTF-8 comment bytes.
    pub comment: Vec<u8>,
}

impl UnicodeComment {
    /// True when `standard_comment` still hashes to the recorded CRC.
    pub fn matches_comment(&self, standard_comment: &[u8]) -> bool {
        Crc32::compute(standard_comment) == self.comment_crc32
    }

    fn decode(kind: HeaderKind, body: &[u8]) -> Option<Self> {
        if kind != HeaderKind::Central {
            return None;
        }
        let version = *body.first()?;
        if version != 1 {
            return None;
        }
        Some(Self {
            version,
            comment_crc32: u32_at(body, 1)?,
            comment: body[5..].to_vec(),
        })
    }

    fn encode(&self, kind: HeaderKind) -> Option<Vec<u8>> {
        if kind != HeaderKind::Central {
            return None;
        }
        let mut out = Vec::with_capacity(5 + self.comment.len());
        out.push(self.version);
        out.extend_from_slice(&self.comment_crc32.to_le_bytes());
        out.extend_from_slice(&self.comment);
        Some(out)
    }
}

/// Code-page override extra field (0x5543): the OEM code page the standard
/// name/comment bytes were written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodePage {
    /// Windows code page identifier.
    pub code_page: u32,
}

impl CodePage {
    fn decode(_kind: HeaderKind, body: &[u8]) -> Option<Self> {
        Some(Self {
            code_page: u32_at(body, 0)?,
        })
    }

    fn encode(&self, _kind: HeaderKind) -> Option<Vec<u8>> {
        Some(self.code_page.to_le_bytes().to_vec())
    }
}

/// Xceed unicode extra field (0x554E): an inner "NUCX" signature followed
/// by the UTF-16LE entry name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XceedUnicode {
    /// Decoded entry name.
    pub name: String,
}

impl XceedUnicode {
    fn decode(_kind: HeaderKind, body: &[u8]) -> Option<Self> {
        if u32_at(body, 0)? != XCEED_UNICODE_SIGNATURE {
            return None;
        }
        let text = &body[4..];
        if text.len() % 2 != 0 {
            return None;
        }
        let units: Vec<u16> = text
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        String::from_utf16(&units).ok().map(|name| Self { name })
    }

    fn encode(&self, _kind: HeaderKind) -> Option<Vec<u8>> {
        let mut out = Vec::with_capacity(4 + self.name.len() * 2);
        out.extend_from_slice(&XCEED_UNICODE_SIGNATURE.to_le_bytes());
        for unit in self.name.encode_utf16() {
            out.extend_from_slice(&unit.to_le_bytes());
        }
        Some(out)
    }
}

/// Windows NT security descriptor extra field (0x4453). The central body
/// carries only the uncompressed descriptor size; the local body carries the
/// (possibly compressed) descriptor itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityDescriptor {
    /// Uncompressed descriptor size.
    pub uncompressed_size: u32,
    /// Field version (local header only).
    pub version: Option<u8>,
    /// Compression method applied to the descriptor (local header only).
    pub compression: Option<u16>,
    /// CRC-32 of the uncompressed descriptor (local header only).
    pub data_crc32: Option<u32>,
    /// Descriptor bytes as stored (local header only).
    pub data: Vec<u8>,
}

impl SecurityDescriptor {
    fn decode(kind: HeaderKind, body: &[u8]) -> Option<Self> {
        let uncompressed_size = u32_at(body, 0)?;
        if kind == HeaderKind::Central {
            return Some(Self {
                uncompressed_size,
                version: None,
                compression: None,
                data_crc32: None,
                data: Vec::new(),
            });
        }
        Some(Self {
            uncompressed_size,
            version: Some(*body.get(4)?),
            compression: Some(u16_at(body, 5)?),
            data_crc32: Some(u32_at(body, 7)?),
            data: body[11..].to_vec(),
        })
    }

    fn encode(&self, kind: HeaderKind) -> Option<Vec<u8>> {
        if kind == HeaderKind::Central {
            return Some(self.uncompressed_size.to_le_bytes().to_vec());
        }
        let mut out = Vec::with_capacity(11 + self.data.len());
        out.extend_from_slice(&self.uncompressed_size.to_le_bytes());
        out.push(self.version?);
        out.extend_from_slice(&self.compression?.to_le_bytes());
        out.extend_from_slice(&self.data_crc32?.to_le_bytes());
        out.extend_from_slice(&self.data);
        Some(out)
    }
}

/// One extra field, either decoded or preserved opaquely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtraField {
    /// Zip64 extended info, kept raw until the header sentinels are known.
    Zip64(Vec<u8>),
    /// NTFS timestamps.
    Ntfs(NtfsTimestamps),
    /// Info-ZIP extended timestamp.
    ExtendedTimestamp(ExtendedTimestamp),
    /// PKWARE Unix field.
    UnixType1(UnixType1),
    /// Info-ZIP Unix field (original variant).
    UnixType0(UnixType0),
    /// Info-ZIP unicode path.
    UnicodePath(UnicodePath),
    /// Info-ZIP unicode comment.
    UnicodeComment(UnicodeComment),
    /// Code-page override.
    CodePage(CodePage),
    /// Xceed unicode name.
    XceedUnicode(XceedUnicode),
    /// Windows NT security descriptor.
    SecurityDescriptor(SecurityDescriptor),
    /// Any id this engine does not interpret.
    Unknown {
        /// The field id.
        id: u16,
        /// The raw body.
        body: Vec<u8>,
    },
}

impl ExtraField {
    /// Decode one field body. Known ids whose body does not decode for this
    /// header kind are preserved opaquely rather than rejected.
    pub fn decode(id: u16, kind: HeaderKind, body: &[u8]) -> Self {
        let decoded = match id {
            ZIP64_EXTENDED_INFO_ID => Some(Self::Zip64(body.to_vec())),
            NTFS_TIMESTAMPS_ID => NtfsTimestamps::decode(kind, body).map(Self::Ntfs),
            EXTENDED_TIMESTAMP_ID => {
                ExtendedTimestamp::decode(kind, body).map(Self::ExtendedTimestamp)
            }
            PKWARE_UNIX_ID => UnixType1::decode(kind, body).map(Self::UnixType1),
            INFO_ZIP_UNIX_ID => UnixType0::decode(kind, body).map(Self::UnixType0),
            UNICODE_PATH_ID => UnicodePath::decode(kind, body).map(Self::UnicodePath),
            UNICODE_COMMENT_ID => UnicodeComment::decode(kind, body).map(Self::UnicodeComment),
            CODE_PAGE_ID => CodePage::decode(kind, body).map(Self::CodePage),
            XCEED_UNICODE_ID => XceedUnicode::decode(kind, body).map(Self::XceedUnicode),
            SECURITY_DESCRIPTOR_ID => {
                SecurityDescriptor::decode(kind, body).map(Self::SecurityDescriptor)
            }
            _ => None,
        };
        decoded.unwrap_or(Self::Unknown {
            id,
            body: body.to_vec(),
        })
    }

    /// The field id this value encodes under.
    pub fn id(&self) -> u16 {
        match self {
            Self::Zip64(_) => ZIP64_EXTENDED_INFO_ID,
            Self::Ntfs(_) => NTFS_TIMESTAMPS_ID,
            Self::ExtendedTimestamp(_) => EXTENDED_TIMESTAMP_ID,
            Self::UnixType1(_) => PKWARE_UNIX_ID,
            Self::UnixType0(_) => INFO_ZIP_UNIX_ID,
            Self::UnicodePath(_) => UNICODE_PATH_ID,
            Self::UnicodeComment(_) => UNICODE_COMMENT_ID,
            Self::CodePage(_) => CODE_PAGE_ID,
            Self::XceedUnicode(_) => XCEED_UNICODE_ID,
            Self::SecurityDescriptor(_) => SECURITY_DESCRIPTOR_ID,
            Self::Unknown { id, .. } => *id,
        }
    }

    /// Encode the body for the given header kind. `None` means the field
    /// does not apply to that kind or lacks the data to be written.
    pub fn encode(&self, kind: HeaderKind) -> Option<Vec<u8>> {
        match self {
            Self::Zip64(raw) => Some(raw.clone()),
            Self::Ntfs(f) => f.encode(kind),
            Self::ExtendedTimestamp(f) => f.encode(kind),
            Self::UnixType1(f) => f.encode(kind),
            Self::UnixType0(f) => f.encode(kind),
            Self::UnicodePath(f) => f.encode(kind),
            Self::UnicodeComment(f) => f.encode(kind),
            Self::CodePage(f) => f.encode(kind),
            Self::XceedUnicode(f) => f.encode(kind),
            Self::SecurityDescriptor(f) => f.encode(kind),
            Self::Unknown { body, .. } => Some(body.clone()),
        }
    }
}

/// Which fixed header fields read as their Zip64 sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Zip64Sentinels {
    /// Uncompressed size read as 0xFFFFFFFF.
    pub size: bool,
    /// Compressed size read as 0xFFFFFFFF.
    pub packed_size: bool,
    /// Local header offset read as 0xFFFFFFFF (central headers only).
    pub local_header_offset: bool,
    /// Disk start number read as 0xFFFF (central headers only).
    pub disk_start: bool,
}

impl Zip64Sentinels {
    /// Derive the sentinel set for a central header's raw fields.
    pub fn for_central(size: u32, packed_size: u32, offset: u32, disk_start: u16) -> Self {
        Self {
            size: size == ZIP64_MARKER_32,
            packed_size: packed_size == ZIP64_MARKER_32,
            local_header_offset: offset == ZIP64_MARKER_32,
            disk_start: disk_start == ZIP64_MARKER_16,
        }
    }

    /// Derive the sentinel set for a local header's raw fields.
    pub fn for_local(size: u32, packed_size: u32) -> Self {
        Self {
            size: size == ZIP64_MARKER_32,
            packed_size: packed_size == ZIP64_MARKER_32,
            ..Self::default()
        }
    }

    /// True when any sentinel fired.
    pub fn any(&self) -> bool {
        self.size || self.packed_size || self.local_header_offset || self.disk_start
    }
}

/// Resolved Zip64 extended information.
///
/// A sub-field is set iff the matching sentinel fired; the body holds the
/// fired sub-fields back to back in fixed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Zip64ExtendedInfo {
    /// 64-bit uncompressed size.
    pub size: Option<u64>,
    /// 64-bit compressed size.
    pub packed_size: Option<u64>,
    /// 64-bit local header offset.
    pub local_header_offset: Option<u64>,
    /// 32-bit disk start number.
    pub disk_start: Option<u32>,
}

impl Zip64ExtendedInfo {
    /// Parse a raw Zip64 body against the sentinel set.
    ///
    /// Sub-fields are consumed strictly in the order size, packed size,
    /// local header offset, disk start; only fired sentinels consume bytes.
    /// Running out of body is a format error.
    pub fn parse(
        kind: HeaderKind,
        body: &[u8],
        sentinels: Zip64Sentinels,
        position: ArchivePosition,
    ) -> Result<Self> {
        let truncated =
            || SpanZipError::bad_format(position, "Zip64 extra field shorter than its sentinels");
        let mut info = Self::default();
        let mut at = 0;
        if sentinels.size {
            info.size = Some(u64_at(body, at).ok_or_else(truncated)?);
            at += 8;
        }
        if sentinels.packed_size {
            info.packed_size = Some(u64_at(body, at).ok_or_else(truncated)?);
            at += 8;
        }
        if kind == HeaderKind::Central {
            if sentinels.local_header_offset {
                info.local_header_offset = Some(u64_at(body, at).ok_or_else(truncated)?);
                at += 8;
            }
            if sentinels.disk_start {
                info.disk_start = Some(u32_at(body, at).ok_or_else(truncated)?);
            }
        }
        Ok(info)
    }
}

/// The decoded extra-field area of one header.
///
/// Holds at most one field per id; when the byte source repeats an id the
/// last occurrence wins. Iteration order is the (deduplicated) order of the
/// source area.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtraFields {
    fields: Vec<ExtraField>,
}

impl ExtraFields {
    /// An empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an extra-field area.
    ///
    /// `position` is the archive position of the area start, used for
    /// diagnostics. A triple whose header or body runs past the area is a
    /// format error.
    pub fn parse(kind: HeaderKind, area: &[u8], position: ArchivePosition) -> Result<Self> {
        let mut fields = Self::new();
        let mut at = 0;
        while at < area.len() {
            let (Some(id), Some(len)) = (u16_at(area, at), u16_at(area, at + 2)) else {
                return Err(SpanZipError::bad_format(
                    position,
                    format!("extra field truncated at byte {at}"),
                ));
            };
            let body_start = at + 4;
            let body_end = body_start + len as usize;
            let Some(body) = area.get(body_start..body_end) else {
                return Err(SpanZipError::bad_format(
                    position,
                    format!("extra field {id:#06x} body truncated at byte {at}"),
                ));
            };
            fields.insert(ExtraField::decode(id, kind, body));
            at = body_end;
        }
        Ok(fields)
    }

    /// Insert a field, replacing any existing field with the same id.
    pub fn insert(&mut self, field: ExtraField) {
        if let Some(existing) = self.fields.iter_mut().find(|f| f.id() == field.id()) {
            *existing = field;
        } else {
            self.fields.push(field);
        }
    }

    /// Look up a field by id.
    pub fn get(&self, id: u16) -> Option<&ExtraField> {
        self.fields.iter().find(|f| f.id() == id)
    }

    /// Iterate the fields in source order.
    pub fn iter(&self) -> impl Iterator<Item = &ExtraField> {
        self.fields.iter()
    }

    /// Number of distinct fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when no fields are present.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Resolve the Zip64 extended info against a sentinel set, if the field
    /// is present.
    pub fn zip64(
        &self,
        kind: HeaderKind,
        sentinels: Zip64Sentinels,
        position: ArchivePosition,
    ) -> Result<Option<Zip64ExtendedInfo>> {
        match self.get(ZIP64_EXTENDED_INFO_ID) {
            Some(ExtraField::Zip64(raw)) => {
                Zip64ExtendedInfo::parse(kind, raw, sentinels, position).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Re-encode the area for the given header kind, in field order.
    /// Fields that do not apply to the kind are skipped.
    pub fn encode(&self, kind: HeaderKind) -> Vec<u8> {
        let mut out = Vec::new();
        for field in &self.fields {
            if let Some(body) = field.encode(kind) {
                out.extend_from_slice(&field.id().to_le_bytes());
                out.extend_from_slice(&(body.len() as u16).to_le_bytes());
                out.extend_from_slice(&body);
            }
        }
        out
    }

    /// Resolve write/access/creation timestamps across every present
    /// timestamp-bearing field.
    ///
    /// Each slot is taken independently from the present field with the
    /// finest declared precision; ties go NTFS, then extended timestamp,
    /// then PKWARE Unix, then Info-ZIP Unix.
    pub fn timestamps(&self) -> Timestamps {
        // Candidates in tie-break order; precision in nanoseconds.
        let mut resolved = Timestamps::default();
        let mut precision = SlotPrecision::default();
        for field in TIMESTAMP_PRECEDENCE {
            let Some(candidate) = self.timestamp_candidate(field) else {
                continue;
            };
            resolved.take_finer(&mut precision, &candidate);
        }
        resolved
    }

    fn timestamp_candidate(&self, id: u16) -> Option<TimestampCandidate> {
        match self.get(id)? {
            ExtraField::Ntfs(f) => Some(TimestampCandidate {
                precision_ns: 100,
                modified: f.modified.map(ZipTimestamp::from_filetime),
                accessed: f.accessed.map(ZipTimestamp::from_filetime),
                created: f.created.map(ZipTimestamp::from_filetime),
            }),
            ExtraField::ExtendedTimestamp(f) => Some(TimestampCandidate {
                precision_ns: 1_000_000_000,
                modified: f.modified.map(ZipTimestamp::from_unix),
                accessed: f.accessed.map(ZipTimestamp::from_unix),
                created: f.created.map(ZipTimestamp::from_unix),
            }),
            ExtraField::UnixType1(f) => Some(TimestampCandidate {
                precision_ns: 1_000_000_000,
                modified: Some(ZipTimestamp::from_unix(f.modified)),
                accessed: Some(ZipTimestamp::from_unix(f.accessed)),
                created: None,
            }),
            ExtraField::UnixType0(f) => Some(TimestampCandidate {
                precision_ns: 1_000_000_000,
                modified: Some(ZipTimestamp::from_unix(f.modified)),
                accessed: Some(ZipTimestamp::from_unix(f.accessed)),
                created: None,
            }),
            _ => None,
        }
    }
}

const TIMESTAMP_PRECEDENCE: [u16; 4] = [
    NTFS_TIMESTAMPS_ID,
    EXTENDED_TIMESTAMP_ID,
    PKWARE_UNIX_ID,
    INFO_ZIP_UNIX_ID,
];

struct TimestampCandidate {
    precision_ns: u64,
    modified: Option<ZipTimestamp>,
    accessed: Option<ZipTimestamp>,
    created: Option<ZipTimestamp>,
}

#[derive(Default)]
struct SlotPrecision {
    modified: Option<u64>,
    accessed: Option<u64>,
    created: Option<u64>,
}

/// Timestamps resolved from the extra-field area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timestamps {
    /// Last write time.
    pub modified: Option<ZipTimestamp>,
    /// Last access time.
    pub accessed: Option<ZipTimestamp>,
    /// Creation time.
    pub created: Option<ZipTimestamp>,
}

impl Timestamps {
    /// Fill any slot this value lacks from `other`.
    pub fn or(self, other: Self) -> Self {
        Self {
            modified: self.modified.or(other.modified),
            accessed: self.accessed.or(other.accessed),
            created: self.created.or(other.created),
        }
    }

    fn take_finer(&mut self, held: &mut SlotPrecision, candidate: &TimestampCandidate) {
        // Strict improvement only: candidates arrive in tie-break order.
        fn take(
            slot: &mut Option<ZipTimestamp>,
            held: &mut Option<u64>,
            time: Option<ZipTimestamp>,
            precision_ns: u64,
        ) {
            if let Some(time) = time {
                if held.map_or(true, |p| precision_ns < p) {
                    *slot = Some(time);
                    *held = Some(precision_ns);
                }
            }
        }
        take(
            &mut self.modified,
            &mut held.modified,
            candidate.modified,
            candidate.precision_ns,
        );
        take(
            &mut self.accessed,
            &mut held.accessed,
            candidate.accessed,
            candidate.precision_ns,
        );
        take(
            &mut self.created,
            &mut held.created,
            candidate.created,
            candidate.precision_ns,
        );
    }
}
