//! Central directory parsing.
//!
//! The central directory is a contiguous run of per-entry records near the
//! archive end. Construction is two-phase: [`RawCentralHeader`] holds the
//! fields exactly as read, and [`RawCentralHeader::resolve`] applies the
//! ZIP64 sentinel substitution to produce a [`CentralHeader`] with usable
//! 64-bit values. The raw record is kept inside the resolved one so a
//! rewrite can reproduce the original bytes.

use crate::extra::{
    ExtraField, ExtraFields, HeaderKind, UNICODE_COMMENT_ID, UNICODE_PATH_ID, Zip64Sentinels,
};
use crate::fields::{CompressionMethod, DosDateTime, GeneralPurposeFlags, HostSystem};
use spanzip_core::cancel::CancelToken;
use spanzip_core::error::{Result, SpanZipError};
use spanzip_core::position::ArchivePosition;
use spanzip_core::volume::VolumeSet;

/// Central directory header signature ("PK\x01\x02").
pub const CENTRAL_HEADER_SIGNATURE: u32 = 0x0201_4B50;

/// Fixed portion of a central header.
pub const CENTRAL_HEADER_FIXED_LEN: u64 = 46;

/// Unix directory bits in the high half of the external attributes.
const UNIX_MODE_MASK: u32 = 0o170000;
const UNIX_MODE_DIR: u32 = 0o040000;

/// Amiga FIB directory bits in the external attributes.
const AMIGA_ATTR_MASK: u32 = 0x0C00_0000;
const AMIGA_ATTR_DIR: u32 = 0x0800_0000;

/// DOS directory attribute bit.
const DOS_ATTR_DIR: u32 = 0x10;

/// A central header exactly as stored, before sentinel resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCentralHeader {
    /// Version-made-by word (host system in the high byte).
    pub version_made_by: u16,
    /// Version needed to extract.
    pub version_needed: u16,
    /// General purpose bit flags.
    pub flags: GeneralPurposeFlags,
    /// Compression method.
    pub method: CompressionMethod,
    /// DOS modification stamp.
    pub timestamp: DosDateTime,
    /// CRC-32 of the uncompressed payload.
    pub crc32: u32,
    /// Compressed size as stored (may be the ZIP64 sentinel).
    pub raw_packed_size: u32,
    /// Uncompressed size as stored (may be the ZIP64 sentinel).
    pub raw_size: u32,
    /// Start disk as stored (may be the ZIP64 sentinel).
    pub raw_disk_start: u16,
    /// Local header offset as stored (may be the ZIP64 sentinel).
    pub raw_local_offset: u32,
    /// Internal attributes word.
    pub internal_attributes: u16,
    /// External attributes word (host-specific).
    pub external_attributes: u32,
    /// Entry name, raw bytes.
    pub name: Vec<u8>,
    /// Decoded extra-field area.
    pub extra: ExtraFields,
    /// Entry comment, raw bytes.
    pub comment: Vec<u8>,
    /// Position of the record signature.
    pub position: ArchivePosition,
}

impl RawCentralHeader {
    /// Resolve the ZIP64 sentinels against the extra-field area.
    ///
    /// A fixed field reading as its sentinel with no Zip64 extra field to
    /// supply the real value is a contradiction and fails as bad format.
    pub fn resolve(self, index: u64) -> Result<CentralHeader> {
        let sentinels = Zip64Sentinels::for_central(
            self.raw_size,
            self.raw_packed_size,
            self.raw_local_offset,
            self.raw_disk_start,
        );
        let zip64 = self.extra.zip64(HeaderKind::Central, sentinels, self.position)?;
        if sentinels.any() && zip64.is_none() {
            return Err(SpanZipError::bad_format(
                self.position,
                "header has ZIP64 sentinel fields but no ZIP64 extra field",
            ));
        }
        let zip64 = zip64.unwrap_or_default();

        let size = match zip64.size {
            Some(v) if sentinels.size => v,
            _ => self.raw_size as u64,
        };
        let packed_size = match zip64.packed_size {
            Some(v) if sentinels.packed_size => v,
            _ => self.raw_packed_size as u64,
        };
        let local_offset = match zip64.local_header_offset {
            Some(v) if sentinels.local_header_offset => v,
            _ => self.raw_local_offset as u64,
        };
        let disk_start = match zip64.disk_start {
            Some(v) if sentinels.disk_start => v,
            _ => self.raw_disk_start as u32,
        };

        Ok(CentralHeader {
            index,
            size,
            packed_size,
            local_offset,
            disk_start,
            raw: self,
        })
    }
}

/// A fully resolved central directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentralHeader {
    /// Zero-based position of this record in the directory.
    pub index: u64,
    /// Uncompressed size, sentinel-resolved.
    pub size: u64,
    /// Compressed size, sentinel-resolved.
    pub packed_size: u64,
    /// Local header offset on its start disk, sentinel-resolved.
    pub local_offset: u64,
    /// Disk on which the local header starts, sentinel-resolved.
    pub disk_start: u32,
    /// The record as stored.
    pub raw: RawCentralHeader,
}

impl CentralHeader {
    /// Host system that wrote the entry.
    pub fn host(&self) -> HostSystem {
        HostSystem::from_u8((self.raw.version_made_by >> 8) as u8)
    }

    /// Entry name, raw bytes.
    pub fn name(&self) -> &[u8] {
        &self.raw.name
    }

    /// Entry name for display. Character-set resolution for non-UTF-8
    /// names is left to the caller; this is a lossy view.
    pub fn name_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.raw.name)
    }

    /// Whether the entry's crc/sizes trail the payload in a descriptor.
    pub fn has_data_descriptor(&self) -> bool {
        self.raw.flags.has_data_descriptor()
    }

    /// UTF-8 name from a unicode-path extra field, when its recorded CRC
    /// still matches the standard name bytes. A stale override is ignored.
    pub fn unicode_name(&self) -> Option<&str> {
        match self.raw.extra.get(UNICODE_PATH_ID)? {
            ExtraField::UnicodePath(path) if path.matches_name(&self.raw.name) => {
                std::str::from_utf8(&path.name).ok()
            }
            _ => None,
        }
    }

    /// UTF-8 comment from a unicode-comment extra field, under the same
    /// CRC gate as [`CentralHeader::unicode_name`].
    pub fn unicode_comment(&self) -> Option<&str> {
        match self.raw.extra.get(UNICODE_COMMENT_ID)? {
            ExtraField::UnicodeComment(c) if c.matches_comment(&self.raw.comment) => {
                std::str::from_utf8(&c.comment).ok()
            }
            _ => None,
        }
    }

    /// Whether the entry denotes a directory.
    ///
    /// Checked in priority order: a `/`-terminated name; a zero-size
    /// `\`-terminated name written by a FAT-family host; the host-specific
    /// directory bits in the external attributes.
    pub fn is_directory(&self) -> bool {
        if self.raw.name.last() == Some(&b'/') {
            return true;
        }
        if self.size == 0 && self.host().is_fat_family() && self.raw.name.last() == Some(&b'\\') {
            return true;
        }
        let attrs = self.raw.external_attributes;
        let host = self.host();
        if host.is_unix_family() {
            return (attrs >> 16) & UNIX_MODE_MASK == UNIX_MODE_DIR;
        }
        if host == HostSystem::Amiga {
            return attrs & AMIGA_ATTR_MASK == AMIGA_ATTR_DIR;
        }
        if host.is_fat_family() {
            return attrs & DOS_ATTR_DIR != 0;
        }
        false
    }
}

/// Reads the full run of central headers.
pub struct CentralDirectory;

impl CentralDirectory {
    /// Parse exactly `entries_total` records starting at `start`, bounded
    /// by `cd_size` declared bytes.
    ///
    /// Any signature mismatch or a record running past the declared bounds
    /// aborts the parse; a partial directory is never returned.
    pub fn read<V: VolumeSet>(
        volumes: &mut V,
        start: ArchivePosition,
        cd_size: u64,
        entries_total: u64,
        cancel: &CancelToken,
    ) -> Result<Vec<CentralHeader>> {
        volumes.seek(start)?;
        let mut entries = Vec::with_capacity(entries_total.min(1 << 16) as usize);
        let mut consumed = 0u64;
        for index in 0..entries_total {
            cancel.check()?;
            let position = volumes.position();
            if consumed + CENTRAL_HEADER_FIXED_LEN > cd_size {
                return Err(SpanZipError::bad_format(
                    position,
                    format!("central directory ends before record {index}"),
                ));
            }

            let mut fixed = [0u8; CENTRAL_HEADER_FIXED_LEN as usize];
            volumes.read_header_at(position, &mut fixed)?;
            let sig = u32::from_le_bytes(fixed[0..4].try_into().unwrap());
            if sig != CENTRAL_HEADER_SIGNATURE {
                return Err(SpanZipError::invalid_signature(
                    position,
                    CENTRAL_HEADER_SIGNATURE,
                    sig,
                ));
            }

            let u16_at = |i: usize| u16::from_le_bytes(fixed[i..i + 2].try_into().unwrap());
            let u32_at = |i: usize| u32::from_le_bytes(fixed[i..i + 4].try_into().unwrap());
            let name_len = u16_at(28) as u64;
            let extra_len = u16_at(30) as u64;
            let comment_len = u16_at(32) as u64;

            consumed += CENTRAL_HEADER_FIXED_LEN + name_len + extra_len + comment_len;
            if consumed > cd_size {
                return Err(SpanZipError::bad_format(
                    position,
                    format!("record {index} runs past the declared central directory end"),
                ));
            }

            let mut name = vec![0u8; name_len as usize];
            volumes.read_exact(&mut name)?;
            let extra_position = volumes.position();
            let mut extra_area = vec![0u8; extra_len as usize];
            volumes.read_exact(&mut extra_area)?;
            let mut comment = vec![0u8; comment_len as usize];
            volumes.read_exact(&mut comment)?;

            let raw = RawCentralHeader {
                version_made_by: u16_at(4),
                version_needed: u16_at(6),
                flags: GeneralPurposeFlags::new(u16_at(8)),
                method: CompressionMethod::from_u16(u16_at(10)),
                timestamp: DosDateTime::new(u16_at(14), u16_at(12)),
                crc32: u32_at(16),
                raw_packed_size: u32_at(20),
                raw_size: u32_at(24),
                raw_disk_start: u16_at(34),
                raw_local_offset: u32_at(42),
                internal_attributes: u16_at(36),
                external_attributes: u32_at(38),
                name,
                extra: ExtraFields::parse(HeaderKind::Central, &extra_area, extra_position)?,
                comment,
                position,
            };
            entries.push(raw.resolve(index)?);
        }
        Ok(entries)
    }
}
