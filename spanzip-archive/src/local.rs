//! Local header parsing.
//!
//! Each entry's payload is preceded by a 30-byte local header repeating a
//! subset of the central fields. Local headers are read lazily: the central
//! header supplies the (disk, offset) to seek to, which may be a different
//! disk than the directory itself.

use crate::central::CentralHeader;
use crate::extra::{ExtraFields, HeaderKind, Zip64Sentinels};
use crate::fields::{CompressionMethod, DosDateTime, GeneralPurposeFlags};
use spanzip_core::error::{Result, SpanZipError};
use spanzip_core::position::ArchivePosition;
use spanzip_core::volume::VolumeSet;

/// Local header signature ("PK\x03\x04").
pub const LOCAL_HEADER_SIGNATURE: u32 = 0x0403_4B50;

/// Fixed portion of a local header.
pub const LOCAL_HEADER_FIXED_LEN: u64 = 30;

/// A parsed local header with its ZIP64 sentinels resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalHeader {
    /// Version needed to extract.
    pub version_needed: u16,
    /// General purpose bit flags.
    pub flags: GeneralPurposeFlags,
    /// Compression method.
    pub method: CompressionMethod,
    /// DOS modification stamp.
    pub timestamp: DosDateTime,
    /// CRC-32 as stored. Zero by convention when a data descriptor is used.
    pub crc32: u32,
    /// Compressed size, sentinel-resolved. Zero by convention when a data
    /// descriptor is used.
    pub packed_size: u64,
    /// Uncompressed size, sentinel-resolved. Zero by convention when a
    /// data descriptor is used.
    pub size: u64,
    /// Entry name, raw bytes.
    pub name: Vec<u8>,
    /// Decoded extra-field area.
    pub extra: ExtraFields,
    /// Position of the header signature.
    pub position: ArchivePosition,
    /// Position of the first payload byte.
    pub data_position: ArchivePosition,
}

impl LocalHeader {
    /// Seek to the position named by a central header and parse the local
    /// header there.
    ///
    /// Encrypted entries are rejected here: the directory can still be
    /// listed, but their local structures are not parseable further.
    pub fn read<V: VolumeSet>(volumes: &mut V, central: &CentralHeader) -> Result<Self> {
        let position = volumes
            .resolve(central.disk_start, central.local_offset)
            .ok_or_else(|| {
                SpanZipError::bad_format(
                    central.raw.position,
                    format!(
                        "entry {} points at disk {}, offset {:#x}, outside the volume set",
                        central.index, central.disk_start, central.local_offset
                    ),
                )
            })?;

        let mut fixed = [0u8; LOCAL_HEADER_FIXED_LEN as usize];
        volumes.read_header_at(position, &mut fixed)?;
        let sig = u32::from_le_bytes(fixed[0..4].try_into().unwrap());
        if sig != LOCAL_HEADER_SIGNATURE {
            return Err(SpanZipError::invalid_signature(
                position,
                LOCAL_HEADER_SIGNATURE,
                sig,
            ));
        }

        let u16_at = |i: usize| u16::from_le_bytes(fixed[i..i + 2].try_into().unwrap());
        let u32_at = |i: usize| u32::from_le_bytes(fixed[i..i + 4].try_into().unwrap());

        let flags = GeneralPurposeFlags::new(u16_at(6));
        if flags.is_encrypted() || flags.uses_strong_encryption() {
            return Err(SpanZipError::unsupported(position, "encryption"));
        }

        let raw_packed_size = u32_at(18);
        let raw_size = u32_at(22);
        let name_len = u16_at(26) as usize;
        let extra_len = u16_at(28) as usize;

        let mut name = vec![0u8; name_len];
        volumes.read_exact(&mut name)?;
        let extra_position = volumes.position();
        let mut extra_area = vec![0u8; extra_len];
        volumes.read_exact(&mut extra_area)?;
        let extra = ExtraFields::parse(HeaderKind::Local, &extra_area, extra_position)?;
        let data_position = volumes.position();

        // Local headers carry only the size pair; offset and disk
        // sentinels do not apply.
        let sentinels = Zip64Sentinels::for_local(raw_size, raw_packed_size);
        let zip64 = extra
            .zip64(HeaderKind::Local, sentinels, position)?
            .unwrap_or_default();
        let size = match zip64.size {
            Some(v) if sentinels.size => v,
            _ => raw_size as u64,
        };
        let packed_size = match zip64.packed_size {
            Some(v) if sentinels.packed_size => v,
            _ => raw_packed_size as u64,
        };

        Ok(Self {
            version_needed: u16_at(4),
            flags,
            method: CompressionMethod::from_u16(u16_at(8)),
            timestamp: DosDateTime::new(u16_at(12), u16_at(10)),
            crc32: u32_at(14),
            packed_size,
            size,
            name,
            extra,
            position,
            data_position,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::central::{CENTRAL_HEADER_SIGNATURE, CentralDirectory};
    use spanzip_core::cancel::CancelToken;
    use spanzip_core::volume::SingleVolume;
    use std::io::Cursor;

    fn local_bytes(name: &[u8], flags: u16, crc: u32, sizes: (u32, u32)) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&LOCAL_HEADER_SIGNATURE.to_le_bytes());
        out.extend_from_slice(&20u16.to_le_bytes());
        out.extend_from_slice(&flags.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // stored
        out.extend_from_slice(&0u16.to_le_bytes()); // time
        out.extend_from_slice(&0x58CFu16.to_le_bytes()); // date
        out.extend_from_slice(&crc.to_le_bytes());
        out.extend_from_slice(&sizes.0.to_le_bytes()); // packed
        out.extend_from_slice(&sizes.1.to_le_bytes()); // size
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(name);
        out
    }

    fn central_for(name: &'static [u8], local_offset: u32) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&CENTRAL_HEADER_SIGNATURE.to_le_bytes());
        out.extend_from_slice(&[20, 3]); // made by: Unix
        out.extend_from_slice(&20u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0x58CFu16.to_le_bytes());
        out.extend_from_slice(&0xCAFEBABEu32.to_le_bytes());
        out.extend_from_slice(&4u32.to_le_bytes());
        out.extend_from_slice(&4u32.to_le_bytes());
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(&[0u8; 8]); // extra/comment/disk/internal
        out.extend_from_slice(&0u32.to_le_bytes()); // external
        out.extend_from_slice(&local_offset.to_le_bytes());
        out.extend_from_slice(name);
        out
    }

    #[test]
    fn test_read_local_for_entry() {
        let local = local_bytes(b"a.txt", 0, 0xCAFEBABE, (4, 4));
        let data_at = local.len() as u64;
        let mut bytes = local;
        bytes.extend_from_slice(b"data");
        let cd_at = bytes.len() as u64;
        bytes.extend_from_slice(&central_for(b"a.txt", 0));
        let cd_size = bytes.len() as u64 - cd_at;

        let mut vol = SingleVolume::new(Cursor::new(bytes)).unwrap();
        let entries = CentralDirectory::read(
            &mut vol,
            ArchivePosition::on_first_disk(cd_at),
            cd_size,
            1,
            &CancelToken::new(),
        )
        .unwrap();
        let local = LocalHeader::read(&mut vol, &entries[0]).unwrap();
        assert_eq!(local.name, b"a.txt");
        assert_eq!(local.crc32, 0xCAFEBABE);
        assert_eq!(local.size, 4);
        assert_eq!(
            local.data_position,
            ArchivePosition::on_first_disk(data_at)
        );
    }

    #[test]
    fn test_encrypted_entry_is_unsupported() {
        let local = local_bytes(b"a.txt", 0x0001, 0, (4, 4));
        let mut bytes = local;
        bytes.extend_from_slice(b"data");
        let cd_at = bytes.len() as u64;
        bytes.extend_from_slice(&central_for(b"a.txt", 0));
        let cd_size = bytes.len() as u64 - cd_at;

        let mut vol = SingleVolume::new(Cursor::new(bytes)).unwrap();
        let entries = CentralDirectory::read(
            &mut vol,
            ArchivePosition::on_first_disk(cd_at),
            cd_size,
            1,
            &CancelToken::new(),
        )
        .unwrap();
        let err = LocalHeader::read(&mut vol, &entries[0]).unwrap_err();
        assert!(matches!(err, SpanZipError::UnsupportedFeature { .. }));
    }

    #[test]
    fn test_bad_local_offset_in_central_header() {
        let mut bytes = central_for(b"a.txt", 0).to_vec();
        let cd_size = bytes.len() as u64;
        // Point the entry past the end of the archive.
        bytes[42..46].copy_from_slice(&0xFFFF_0000u32.to_le_bytes());
        let mut vol = SingleVolume::new(Cursor::new(bytes)).unwrap();
        let entries = CentralDirectory::read(
            &mut vol,
            ArchivePosition::ZERO,
            cd_size,
            1,
            &CancelToken::new(),
        )
        .unwrap();
        let err = LocalHeader::read(&mut vol, &entries[0]).unwrap_err();
        assert!(err.is_bad_format());
    }

    #[test]
    fn test_wrong_signature_at_local_position() {
        let mut bytes = b"XXXXXXXX".to_vec();
        let cd_at = bytes.len() as u64;
        bytes.extend_from_slice(&central_for(b"a.txt", 0));
        let cd_size = bytes.len() as u64 - cd_at;
        let mut vol = SingleVolume::new(Cursor::new(bytes)).unwrap();
        let entries = CentralDirectory::read(
            &mut vol,
            ArchivePosition::on_first_disk(cd_at),
            cd_size,
            1,
            &CancelToken::new(),
        )
        .unwrap();
        let err = LocalHeader::read(&mut vol, &entries[0]).unwrap_err();
        assert!(matches!(err, SpanZipError::InvalidSignature { .. }));
    }
}
