//! Central/local header cross-validation.
//!
//! The same entry is described twice, once in the central directory and
//! once by its local header. The two must agree before the entry is handed
//! to callers; a disagreement means the directory and the data stream were
//! written (or truncated) independently and nothing about the entry can be
//! trusted.

use crate::central::CentralHeader;
use crate::descriptor::DataDescriptor;
use crate::extra::Timestamps;
use crate::local::LocalHeader;
use spanzip_core::error::{Result, SpanZipError};
use spanzip_core::position::ArchivePosition;

/// The validated view of one archive entry, combining both headers and,
/// when present, the resolved data descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// The entry's central directory header.
    pub central: CentralHeader,
    /// The entry's local header.
    pub local: LocalHeader,
    /// The trailing data descriptor, when the entry uses one.
    pub descriptor: Option<DataDescriptor>,
    /// Timestamps resolved across both extra-field areas; local fields
    /// take precedence over central ones slot by slot.
    pub timestamps: Timestamps,
}

impl ArchiveEntry {
    /// Check agreement between the headers and assemble the entry.
    ///
    /// Name bytes, version-needed, compression method, and the DOS stamp
    /// must always match. The crc/size triple is checked only for entries
    /// without a data descriptor; with one, the local fields are
    /// conventionally zero and the descriptor has already been resolved
    /// against the central values.
    pub fn assemble(
        central: CentralHeader,
        local: LocalHeader,
        descriptor: Option<DataDescriptor>,
    ) -> Result<Self> {
        let at = local.position;
        if central.raw.name != local.name {
            return Err(header_mismatch(at, central.index, "name"));
        }
        if central.raw.version_needed != local.version_needed {
            return Err(header_mismatch(at, central.index, "version needed"));
        }
        if central.raw.method != local.method {
            return Err(header_mismatch(at, central.index, "compression method"));
        }
        if central.raw.timestamp != local.timestamp {
            return Err(header_mismatch(at, central.index, "modification stamp"));
        }
        if descriptor.is_none() {
            if central.raw.crc32 != local.crc32 {
                return Err(header_mismatch(at, central.index, "crc"));
            }
            if central.size != local.size {
                return Err(header_mismatch(at, central.index, "size"));
            }
            if central.packed_size != local.packed_size {
                return Err(header_mismatch(at, central.index, "compressed size"));
            }
        }

        let timestamps = local.extra.timestamps().or(central.raw.extra.timestamps());
        Ok(Self {
            central,
            local,
            descriptor,
            timestamps,
        })
    }

    /// Entry name, raw bytes.
    pub fn name(&self) -> &[u8] {
        self.central.name()
    }

    /// CRC-32 of the uncompressed payload, from the descriptor when one
    /// is present.
    pub fn crc32(&self) -> u32 {
        self.descriptor
            .map_or(self.central.raw.crc32, |d| d.crc32)
    }

    /// Uncompressed size.
    pub fn size(&self) -> u64 {
        self.descriptor.map_or(self.central.size, |d| d.size)
    }

    /// Compressed size.
    pub fn packed_size(&self) -> u64 {
        self.descriptor
            .map_or(self.central.packed_size, |d| d.packed_size)
    }

    /// Position of the first payload byte.
    pub fn data_position(&self) -> ArchivePosition {
        self.local.data_position
    }

    /// Whether the entry denotes a directory.
    pub fn is_directory(&self) -> bool {
        self.central.is_directory()
    }
}

fn header_mismatch(at: ArchivePosition, index: u64, field: &str) -> SpanZipError {
    SpanZipError::bad_format(
        at,
        format!("local header for entry {index} disagrees with the central directory on {field}"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::central::RawCentralHeader;
    use crate::extra::{ExtendedTimestamp, ExtraField, ExtraFields};
    use crate::fields::{CompressionMethod, DosDateTime, GeneralPurposeFlags};

    fn central() -> CentralHeader {
        let raw = RawCentralHeader {
            version_made_by: 0x0314,
            version_needed: 20,
            flags: GeneralPurposeFlags::new(0),
            method: CompressionMethod::Deflate,
            timestamp: DosDateTime::new(0x58CF, 0x6000),
            crc32: 0x12345678,
            raw_packed_size: 50,
            raw_size: 100,
            raw_disk_start: 0,
            raw_local_offset: 0,
            internal_attributes: 0,
            external_attributes: 0,
            name: b"a.txt".to_vec(),
            extra: ExtraFields::new(),
            comment: Vec::new(),
            position: ArchivePosition::ZERO,
        };
        raw.resolve(0).unwrap()
    }

    fn local() -> LocalHeader {
        LocalHeader {
            version_needed: 20,
            flags: GeneralPurposeFlags::new(0),
            method: CompressionMethod::Deflate,
            timestamp: DosDateTime::new(0x58CF, 0x6000),
            crc32: 0x12345678,
            packed_size: 50,
            size: 100,
            name: b"a.txt".to_vec(),
            extra: ExtraFields::new(),
            position: ArchivePosition::on_first_disk(0x40),
            data_position: ArchivePosition::on_first_disk(0x63),
        }
    }

    #[test]
    fn test_agreeing_headers_assemble() {
        let entry = ArchiveEntry::assemble(central(), local(), None).unwrap();
        assert_eq!(entry.size(), 100);
        assert_eq!(entry.crc32(), 0x12345678);
        assert_eq!(entry.name(), b"a.txt");
    }

    #[test]
    fn test_name_mismatch_is_fatal() {
        let mut l = local();
        l.name = b"b.txt".to_vec();
        let err = ArchiveEntry::assemble(central(), l, None).unwrap_err();
        assert!(err.is_bad_format());
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn test_method_mismatch_is_fatal() {
        let mut l = local();
        l.method = CompressionMethod::Stored;
        let err = ArchiveEntry::assemble(central(), l, None).unwrap_err();
        assert!(err.is_bad_format());
    }

    #[test]
    fn test_crc_checked_only_without_descriptor() {
        let mut l = local();
        l.crc32 = 0;
        l.size = 0;
        l.packed_size = 0;
        assert!(ArchiveEntry::assemble(central(), l.clone(), None).is_err());

        // With a descriptor the zeroed local fields are expected.
        let descriptor = DataDescriptor {
            crc32: 0x12345678,
            packed_size: 50,
            size: 100,
            has_signature: false,
            wire_len: 12,
        };
        let entry = ArchiveEntry::assemble(central(), l, Some(descriptor)).unwrap();
        assert_eq!(entry.size(), 100);
        assert_eq!(entry.packed_size(), 50);
    }

    #[test]
    fn test_local_timestamps_take_precedence() {
        let mut c = central();
        c.raw.extra.insert(ExtraField::ExtendedTimestamp(ExtendedTimestamp {
            flags: 0x01,
            modified: Some(1_000),
            accessed: None,
            created: None,
        }));
        let mut l = local();
        l.extra.insert(ExtraField::ExtendedTimestamp(ExtendedTimestamp {
            flags: 0x03,
            modified: Some(2_000),
            accessed: Some(3_000),
            created: None,
        }));
        let entry = ArchiveEntry::assemble(c, l, None).unwrap();
        assert_eq!(entry.timestamps.modified.unwrap().seconds, 2_000);
        assert_eq!(entry.timestamps.accessed.unwrap().seconds, 3_000);
    }
}
