//! Data descriptor resolution.
//!
//! When the "has data descriptor" flag is set, an entry's crc and sizes
//! trail the payload. The descriptor may or may not carry a leading
//! signature, and writers exist on both sides, so resolution tries two
//! readings against the values the central header promised:
//!
//! 1. No signature: the window starts directly with the crc.
//! 2. Signature: the window starts with the descriptor signature and the
//!    crc follows it, pushing the size out by four more bytes.
//!
//! The no-signature reading is tried first. Compressed payload bytes can
//! coincidentally equal the signature, and archives exist in the wild that
//! only resolve correctly under this exact trial order, so it must not be
//! reversed. A window matching neither reading is corrupt.

use spanzip_core::error::{Result, SpanZipError};
use spanzip_core::volume::VolumeSet;

/// Data descriptor signature ("PK\x07\x08").
pub const DATA_DESCRIPTOR_SIGNATURE: u32 = 0x0807_4B50;

/// The values a descriptor must reproduce, taken from the central header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpectedDescriptor {
    /// CRC-32 of the uncompressed payload.
    pub crc32: u32,
    /// Compressed size.
    pub packed_size: u64,
    /// Uncompressed size.
    pub size: u64,
    /// Whether the descriptor uses 8-byte size fields.
    pub zip64: bool,
}

/// A resolved data descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataDescriptor {
    /// CRC-32 of the uncompressed payload.
    pub crc32: u32,
    /// Compressed size.
    pub packed_size: u64,
    /// Uncompressed size.
    pub size: u64,
    /// Whether a leading signature was present.
    pub has_signature: bool,
    /// Bytes the descriptor occupies on the wire.
    pub wire_len: u64,
}

impl DataDescriptor {
    /// Read and resolve the descriptor at the cursor, which must sit on
    /// the first byte past the entry payload.
    pub fn read<V: VolumeSet>(volumes: &mut V, expected: ExpectedDescriptor) -> Result<Self> {
        let position = volumes.position();
        if expected.zip64 {
            let mut window = [0u8; 20];
            volumes.read_exact(&mut window)?;

            let crc = u32::from_le_bytes(window[0..4].try_into().unwrap());
            let packed = u64::from_le_bytes(window[4..12].try_into().unwrap());
            let size = u64::from_le_bytes(window[12..20].try_into().unwrap());
            if expected.matches(crc, packed, size) {
                return Ok(Self {
                    crc32: crc,
                    packed_size: packed,
                    size,
                    has_signature: false,
                    wire_len: 20,
                });
            }

            let sig = crc;
            let crc = u32::from_le_bytes(window[4..8].try_into().unwrap());
            let packed = u64::from_le_bytes(window[8..16].try_into().unwrap());
            if sig == DATA_DESCRIPTOR_SIGNATURE {
                let mut tail = [0u8; 4];
                volumes.read_exact(&mut tail)?;
                let size = u64::from_le_bytes([
                    window[16], window[17], window[18], window[19], tail[0], tail[1], tail[2],
                    tail[3],
                ]);
                if expected.matches(crc, packed, size) {
                    return Ok(Self {
                        crc32: crc,
                        packed_size: packed,
                        size,
                        has_signature: true,
                        wire_len: 24,
                    });
                }
            }
        } else {
            let mut window = [0u8; 12];
            volumes.read_exact(&mut window)?;

            let crc = u32::from_le_bytes(window[0..4].try_into().unwrap());
            let packed = u32::from_le_bytes(window[4..8].try_into().unwrap()) as u64;
            let size = u32::from_le_bytes(window[8..12].try_into().unwrap()) as u64;
            if expected.matches(crc, packed, size) {
                return Ok(Self {
                    crc32: crc,
                    packed_size: packed,
                    size,
                    has_signature: false,
                    wire_len: 12,
                });
            }

            let sig = crc;
            let crc = u32::from_le_bytes(window[4..8].try_into().unwrap());
            let packed = u32::from_le_bytes(window[8..12].try_into().unwrap()) as u64;
            if sig == DATA_DESCRIPTOR_SIGNATURE {
                let mut tail = [0u8; 4];
                volumes.read_exact(&mut tail)?;
                let size = u32::from_le_bytes(tail) as u64;
                if expected.matches(crc, packed, size) {
                    return Ok(Self {
                        crc32: crc,
                        packed_size: packed,
                        size,
                        has_signature: true,
                        wire_len: 16,
                    });
                }
            }
        }
        Err(SpanZipError::bad_format(
            position,
            "data descriptor missing or corrupt",
        ))
    }
}

impl ExpectedDescriptor {
    fn matches(&self, crc32: u32, packed_size: u64, size: u64) -> bool {
        self.crc32 == crc32 && self.packed_size == packed_size && self.size == size
    }
}
