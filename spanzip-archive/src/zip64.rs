//! ZIP64 end-of-central-directory discovery.
//!
//! When an archive outgrows the 16/32-bit EOCDR fields, a 20-byte locator
//! sits immediately before the EOCDR and points at a ZIP64 EOCDR elsewhere
//! in the set. The locator position is exact: either the 20 bytes directly
//! preceding the EOCDR carry the locator signature, or the archive has no
//! ZIP64 trailer at all.
//!
//! Once a ZIP64 EOCDR is found it supersedes the EOCDR wholesale; fields
//! are never merged one by one.

use crate::eocd::EndOfCentralDirectory;
use spanzip_core::error::{Result, SpanZipError};
use spanzip_core::position::ArchivePosition;
use spanzip_core::volume::VolumeSet;

/// ZIP64 EOCD locator signature ("PK\x06\x07").
pub const ZIP64_LOCATOR_SIGNATURE: u32 = 0x0706_4B50;

/// ZIP64 EOCDR signature ("PK\x06\x06").
pub const ZIP64_EOCDR_SIGNATURE: u32 = 0x0606_4B50;

/// Locator size on the wire.
pub const ZIP64_LOCATOR_LEN: u64 = 20;

/// Fixed core of the ZIP64 EOCDR, before the extensible sector.
pub const ZIP64_EOCDR_FIXED_LEN: u64 = 56;

/// The record-size field counts bytes after itself; the fixed core
/// contributes this many of them.
const ZIP64_EOCDR_COUNTED_FIXED: u64 = 44;

/// Extensible-sector attribute id used by central-directory encryption.
const EXTENSIBLE_ENCRYPTION_ID: u16 = 0x0017;

/// The ZIP64 end-of-central-directory locator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Zip64Locator {
    /// Disk holding the ZIP64 EOCDR.
    pub eocdr_disk: u32,
    /// Offset of the ZIP64 EOCDR on that disk.
    pub eocdr_offset: u64,
    /// Total number of disks in the archive.
    pub total_disks: u32,
    /// Position of the locator signature.
    pub position: ArchivePosition,
}

impl Zip64Locator {
    /// Look for a locator in the 20 bytes preceding the EOCDR.
    ///
    /// Returns `Ok(None)` when those bytes do not carry the locator
    /// signature and the EOCDR stands on its own. An EOCDR with sentinel
    /// fields but no locator is a contradiction and fails as bad format.
    pub fn locate<V: VolumeSet>(
        volumes: &mut V,
        eocdr: &EndOfCentralDirectory,
    ) -> Result<Option<Self>> {
        let found = if eocdr.linear_offset >= ZIP64_LOCATOR_LEN {
            // The locator must sit on the same disk as the EOCDR, so a
            // probe fragmented across a boundary cannot be a locator.
            match Self::read_at(volumes, eocdr.linear_offset - ZIP64_LOCATOR_LEN) {
                Err(SpanZipError::FragmentedHeader { .. }) => None,
                other => other?,
            }
        } else {
            None
        };
        if found.is_none() && eocdr.requires_zip64() {
            return Err(SpanZipError::bad_format(
                eocdr.position,
                "trailer has ZIP64 sentinel fields but no ZIP64 locator precedes it",
            ));
        }
        Ok(found)
    }

    fn read_at<V: VolumeSet>(volumes: &mut V, linear: u64) -> Result<Option<Self>> {
        let position = volumes
            .linear_to_position(linear)
            .ok_or_else(|| SpanZipError::bad_format(ArchivePosition::ZERO, "empty volume set"))?;
        let mut bytes = [0u8; ZIP64_LOCATOR_LEN as usize];
        volumes.read_header_at(position, &mut bytes)?;
        if u32::from_le_bytes(bytes[0..4].try_into().unwrap()) != ZIP64_LOCATOR_SIGNATURE {
            return Ok(None);
        }

        let locator = Self {
            eocdr_disk: u32::from_le_bytes(bytes[4..8].try_into().unwrap()),
            eocdr_offset: u64::from_le_bytes(bytes[8..16].try_into().unwrap()),
            total_disks: u32::from_le_bytes(bytes[16..20].try_into().unwrap()),
            position,
        };

        if !volumes.is_multi_volume() && (locator.total_disks > 1 || locator.eocdr_disk != 0) {
            return Err(SpanZipError::multi_volume_ambiguous(
                locator.total_disks.max(locator.eocdr_disk + 1) - 1,
            ));
        }
        if volumes.is_multi_volume()
            && locator.total_disks != 0
            && locator.total_disks != volumes.disk_count()
        {
            return Err(SpanZipError::bad_format(
                position,
                format!(
                    "locator claims {} disks but the set has {}",
                    locator.total_disks,
                    volumes.disk_count()
                ),
            ));
        }
        Ok(Some(locator))
    }
}

/// The ZIP64 end-of-central-directory record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zip64EndOfCentralDirectory {
    /// Declared record size (bytes after the record-size field).
    pub record_size: u64,
    /// Version-made-by word.
    pub version_made_by: u16,
    /// Version needed to extract.
    pub version_needed: u16,
    /// Number of the disk holding this record.
    pub disk_number: u32,
    /// Disk on which the central directory starts.
    pub cd_start_disk: u32,
    /// Central-directory entries on this disk.
    pub entries_this_disk: u64,
    /// Central-directory entries in the whole archive.
    pub entries_total: u64,
    /// Central-directory size in bytes.
    pub cd_size: u64,
    /// Central-directory offset on its start disk.
    pub cd_offset: u64,
    /// Extensible data sector, raw.
    pub extensible: Vec<u8>,
    /// Position of the record signature.
    pub position: ArchivePosition,
}

impl Zip64EndOfCentralDirectory {
    /// Seek to the position named by the locator and parse the record.
    pub fn read<V: VolumeSet>(volumes: &mut V, locator: &Zip64Locator) -> Result<Self> {
        let position = volumes
            .resolve(locator.eocdr_disk, locator.eocdr_offset)
            .ok_or_else(|| {
                SpanZipError::bad_format(
                    locator.position,
                    "locator points outside the volume set",
                )
            })?;

        let mut fixed = [0u8; ZIP64_EOCDR_FIXED_LEN as usize];
        volumes.read_header_at(position, &mut fixed)?;
        let sig = u32::from_le_bytes(fixed[0..4].try_into().unwrap());
        if sig != ZIP64_EOCDR_SIGNATURE {
            return Err(SpanZipError::invalid_signature(
                position,
                ZIP64_EOCDR_SIGNATURE,
                sig,
            ));
        }

        let u16_at = |i: usize| u16::from_le_bytes(fixed[i..i + 2].try_into().unwrap());
        let u32_at = |i: usize| u32::from_le_bytes(fixed[i..i + 4].try_into().unwrap());
        let u64_at = |i: usize| u64::from_le_bytes(fixed[i..i + 8].try_into().unwrap());

        let record_size = u64_at(4);
        if record_size < ZIP64_EOCDR_COUNTED_FIXED {
            return Err(SpanZipError::bad_format(
                position,
                format!("ZIP64 trailer record size {record_size} below the fixed minimum"),
            ));
        }
        let linear = volumes.position_to_linear(position).ok_or_else(|| {
            SpanZipError::bad_format(position, "record position unmappable")
        })?;
        // The record (signature + size field + counted bytes) must fit in
        // the archive. The declared size is untrusted input and may be
        // large enough to overflow the addition.
        let record_end = linear
            .checked_add(12)
            .and_then(|v| v.checked_add(record_size));
        if !record_end.is_some_and(|end| end <= volumes.len()) {
            return Err(SpanZipError::bad_format(
                position,
                "ZIP64 trailer record size runs past the end of the archive",
            ));
        }

        let mut record = Self {
            record_size,
            version_made_by: u16_at(12),
            version_needed: u16_at(14),
            disk_number: u32_at(16),
            cd_start_disk: u32_at(20),
            entries_this_disk: u64_at(24),
            entries_total: u64_at(32),
            cd_size: u64_at(40),
            cd_offset: u64_at(48),
            extensible: Vec::new(),
            position,
        };

        if record.entries_this_disk > record.entries_total {
            return Err(SpanZipError::bad_format(
                position,
                format!(
                    "per-disk entry count {} exceeds total {}",
                    record.entries_this_disk, record.entries_total
                ),
            ));
        }
        if record.cd_size > linear {
            return Err(SpanZipError::bad_format(
                position,
                "central directory larger than the bytes preceding its trailer",
            ));
        }

        let extensible_len = (record_size - ZIP64_EOCDR_COUNTED_FIXED) as usize;
        if extensible_len > 0 {
            record.extensible = vec![0u8; extensible_len];
            volumes.read_exact(&mut record.extensible)?;
        }

        if record.uses_central_directory_encryption() {
            return Err(SpanZipError::unsupported(
                position,
                "central directory encryption",
            ));
        }
        Ok(record)
    }

    /// True when the extensible sector carries the central-directory
    /// encryption attribute. The version-needed value alone is not a
    /// signal; releases past 6.2 cover plenty of unencrypted features.
    pub fn uses_central_directory_encryption(&self) -> bool {
        // Extensible sector: (id u16, size u32, data) attribute records.
        // Malformed tails are treated as opaque, not as errors.
        let mut at = 0;
        while at + 6 <= self.extensible.len() {
            let id = u16::from_le_bytes(self.extensible[at..at + 2].try_into().unwrap());
            let size =
                u32::from_le_bytes(self.extensible[at + 2..at + 6].try_into().unwrap()) as usize;
            if id == EXTENSIBLE_ENCRYPTION_ID {
                return true;
            }
            at += 6 + size;
        }
        false
    }
}
