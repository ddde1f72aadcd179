//! End-of-central-directory record discovery.
//!
//! The EOCDR is the entry point into every ZIP archive: a 22-byte trailer,
//! optionally followed by a comment of up to 65535 bytes, sitting at the
//! very end of the last disk. Because the comment may itself contain bytes
//! that look like the record signature, discovery scans backward from the
//! archive end and accepts only a candidate whose declared comment length
//! reaches the end of the archive exactly.

use crate::fields::{ZIP64_MARKER_16, ZIP64_MARKER_32};
use spanzip_core::error::{Result, SpanZipError};
use spanzip_core::position::ArchivePosition;
use spanzip_core::volume::VolumeSet;

/// EOCDR signature ("PK\x05\x06").
pub const EOCDR_SIGNATURE: u32 = 0x0605_4B50;

/// Fixed portion of the record, before the comment.
pub const EOCDR_FIXED_LEN: u64 = 22;

/// Largest possible trailing comment.
const MAX_COMMENT_LEN: u64 = u16::MAX as u64;

/// The end-of-central-directory record.
///
/// Counts and offsets are kept exactly as read; any field equal to its
/// 16/32-bit sentinel means the real value lives in the ZIP64 record and
/// the whole EOCDR is superseded once that record is found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndOfCentralDirectory {
    /// Number of the disk holding this record.
    pub disk_number: u16,
    /// Disk on which the central directory starts.
    pub cd_start_disk: u16,
    /// Central-directory entries on this disk.
    pub entries_this_disk: u16,
    /// Central-directory entries in the whole archive.
    pub entries_total: u16,
    /// Central-directory size in bytes.
    pub cd_size: u32,
    /// Central-directory offset on its start disk.
    pub cd_offset: u32,
    /// Trailing archive comment, raw bytes.
    pub comment: Vec<u8>,
    /// Position of the record signature.
    pub position: ArchivePosition,
    /// Byte address of the record counted linearly across all disks.
    pub linear_offset: u64,
}

impl EndOfCentralDirectory {
    /// True when any field reads as its ZIP64 sentinel, meaning a ZIP64
    /// record must be present to supply the real value.
    pub fn requires_zip64(&self) -> bool {
        self.disk_number == ZIP64_MARKER_16
            || self.cd_start_disk == ZIP64_MARKER_16
            || self.entries_this_disk == ZIP64_MARKER_16
            || self.entries_total == ZIP64_MARKER_16
            || self.cd_size == ZIP64_MARKER_32
            || self.cd_offset == ZIP64_MARKER_32
    }

    /// Locate and parse the record nearest to the end of the archive.
    ///
    /// Candidates failing the comment-length consistency check are decoys
    /// and the scan continues toward the start of the window. A nonzero
    /// disk number under a single-volume assumption is returned as
    /// [`SpanZipError::MultiVolumeAmbiguous`] so the caller can reopen the
    /// archive as a volume set and retry.
    pub fn locate<V: VolumeSet>(volumes: &mut V) -> Result<Self> {
        let archive_len = volumes.len();
        if archive_len < EOCDR_FIXED_LEN {
            return Err(SpanZipError::bad_format(
                ArchivePosition::ZERO,
                "archive too small to hold an end of central directory record",
            ));
        }

        // The window end coincides with the archive end, so a candidate is
        // consistent iff its comment reaches the end of the window.
        let window_start = archive_len.saturating_sub(EOCDR_FIXED_LEN + MAX_COMMENT_LEN);
        let window_pos = volumes
            .linear_to_position(window_start)
            .ok_or_else(|| SpanZipError::bad_format(ArchivePosition::ZERO, "empty volume set"))?;
        let mut window = vec![0u8; (archive_len - window_start) as usize];
        volumes.read_exact_at(window_pos, &mut window)?;

        let last = window.len() - EOCDR_FIXED_LEN as usize;
        for at in (0..=last).rev() {
            let sig = u32::from_le_bytes(window[at..at + 4].try_into().unwrap());
            if sig != EOCDR_SIGNATURE {
                continue;
            }
            let comment_len =
                u16::from_le_bytes(window[at + 20..at + 22].try_into().unwrap()) as usize;
            if at + EOCDR_FIXED_LEN as usize + comment_len != window.len() {
                continue;
            }
            let linear_offset = window_start + at as u64;
            let position = volumes.linear_to_position(linear_offset).ok_or_else(|| {
                SpanZipError::bad_format(ArchivePosition::ZERO, "record position unmappable")
            })?;
            return Self::parse(volumes, &window[at..], position, linear_offset);
        }

        Err(SpanZipError::bad_format(
            volumes
                .linear_to_position(window_start)
                .unwrap_or(ArchivePosition::ZERO),
            "end of central directory record not found",
        ))
    }

    fn parse<V: VolumeSet>(
        volumes: &V,
        bytes: &[u8],
        position: ArchivePosition,
        linear_offset: u64,
    ) -> Result<Self> {
        let u16_at = |i: usize| u16::from_le_bytes(bytes[i..i + 2].try_into().unwrap());
        let u32_at = |i: usize| u32::from_le_bytes(bytes[i..i + 4].try_into().unwrap());

        let record = Self {
            disk_number: u16_at(4),
            cd_start_disk: u16_at(6),
            entries_this_disk: u16_at(8),
            entries_total: u16_at(10),
            cd_size: u32_at(12),
            cd_offset: u32_at(16),
            comment: bytes[22..22 + u16_at(20) as usize].to_vec(),
            position,
            linear_offset,
        };

        if record.disk_number != ZIP64_MARKER_16 {
            let disk = record.disk_number as u32;
            if !volumes.is_multi_volume() && disk != 0 {
                return Err(SpanZipError::multi_volume_ambiguous(disk));
            }
            if volumes.is_multi_volume() && disk + 1 != volumes.disk_count() {
                return Err(SpanZipError::bad_format(
                    position,
                    format!(
                        "trailer claims disk {} but the set ends at disk {}",
                        disk,
                        volumes.disk_count() - 1
                    ),
                ));
            }
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spanzip_core::volume::{SingleVolume, SplitVolumes};
    use std::io::Cursor;

    fn eocdr_bytes(
        disk_number: u16,
        entries_total: u16,
        cd_size: u32,
        cd_offset: u32,
        comment: &[u8],
    ) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&EOCDR_SIGNATURE.to_le_bytes());
        out.extend_from_slice(&disk_number.to_le_bytes());
        out.extend_from_slice(&disk_number.to_le_bytes());
        out.extend_from_slice(&entries_total.to_le_bytes());
        out.extend_from_slice(&entries_total.to_le_bytes());
        out.extend_from_slice(&cd_size.to_le_bytes());
        out.extend_from_slice(&cd_offset.to_le_bytes());
        out.extend_from_slice(&(comment.len() as u16).to_le_bytes());
        out.extend_from_slice(comment);
        out
    }

    fn single(bytes: Vec<u8>) -> SingleVolume<Cursor<Vec<u8>>> {
        SingleVolume::new(Cursor::new(bytes)).unwrap()
    }

    #[test]
    fn test_locate_plain_record() {
        let mut archive = b"payload".to_vec();
        let at = archive.len() as u64;
        archive.extend_from_slice(&eocdr_bytes(0, 2, 0x40, 0x10, b"hello"));
        let mut vol = single(archive);
        let record = EndOfCentralDirectory::locate(&mut vol).unwrap();
        assert_eq!(record.entries_total, 2);
        assert_eq!(record.cd_offset, 0x10);
        assert_eq!(record.comment, b"hello");
        assert_eq!(record.position, ArchivePosition::on_first_disk(at));
        assert!(!record.requires_zip64());
    }

    #[test]
    fn test_decoy_signatures_in_comment_are_skipped() {
        // The comment embeds two full decoy records followed by trailing
        // text, so each decoy's declared zero-length comment stops short
        // of the archive end and fails the consistency check.
        let decoy = eocdr_bytes(0, 99, 0xAAAA_AAAA, 0xBBBB_BBBB, b"");
        let mut comment = Vec::new();
        comment.extend_from_slice(&decoy);
        comment.extend_from_slice(&decoy);
        comment.extend_from_slice(b" written by tooling");
        let genuine = eocdr_bytes(0, 7, 0x30, 0x20, &comment);

        let mut archive = b"data".to_vec();
        archive.extend_from_slice(&genuine);
        let mut vol = single(archive);
        let record = EndOfCentralDirectory::locate(&mut vol).unwrap();
        assert_eq!(record.entries_total, 7);
        assert_eq!(record.comment.len(), comment.len());
    }

    #[test]
    fn test_decoy_nearest_to_end_fails_consistency() {
        // A record-shaped byte run near the end whose comment length does
        // not reach the archive end must be rejected in favor of the
        // consistent record further from the end.
        let mut decoy_tail = eocdr_bytes(0, 5, 0, 0, b"");
        decoy_tail[20..22].copy_from_slice(&100u16.to_le_bytes());
        let genuine = eocdr_bytes(0, 1, 0x10, 0, &decoy_tail);
        let mut vol = single(genuine);
        let record = EndOfCentralDirectory::locate(&mut vol).unwrap();
        assert_eq!(record.entries_total, 1);
    }

    #[test]
    fn test_no_record_is_fatal() {
        let mut vol = single(vec![0u8; 64]);
        let err = EndOfCentralDirectory::locate(&mut vol).unwrap_err();
        assert!(err.is_bad_format());
    }

    #[test]
    fn test_too_small_archive() {
        let mut vol = single(vec![0u8; 10]);
        let err = EndOfCentralDirectory::locate(&mut vol).unwrap_err();
        assert!(err.is_bad_format());
    }

    #[test]
    fn test_nonzero_disk_under_single_volume_assumption() {
        let mut bytes = eocdr_bytes(0, 1, 0, 0, b"");
        // Patch the disk-number fields to 3.
        bytes[4..6].copy_from_slice(&3u16.to_le_bytes());
        bytes[6..8].copy_from_slice(&3u16.to_le_bytes());
        let mut vol = single(bytes.clone());
        let err = EndOfCentralDirectory::locate(&mut vol).unwrap_err();
        assert!(matches!(
            err,
            SpanZipError::MultiVolumeAmbiguous { disk: 3 }
        ));

        // The same bytes parse cleanly as the last disk of a 4-volume set.
        let mut parts: Vec<Cursor<Vec<u8>>> =
            (0..3).map(|_| Cursor::new(b"vol".to_vec())).collect();
        parts.push(Cursor::new(bytes));
        let mut set = SplitVolumes::new(parts).unwrap();
        let record = EndOfCentralDirectory::locate(&mut set).unwrap();
        assert_eq!(record.disk_number, 3);
    }

    #[test]
    fn test_disk_count_mismatch_under_multi_volume() {
        let mut bytes = eocdr_bytes(0, 1, 0, 0, b"");
        bytes[4..6].copy_from_slice(&5u16.to_le_bytes());
        let mut set =
            SplitVolumes::new(vec![Cursor::new(b"a".to_vec()), Cursor::new(bytes)]).unwrap();
        let err = EndOfCentralDirectory::locate(&mut set).unwrap_err();
        assert!(err.is_bad_format());
    }

    #[test]
    fn test_sentinel_fields_set_requires_zip64() {
        let bytes = eocdr_bytes(0, ZIP64_MARKER_16, ZIP64_MARKER_32, ZIP64_MARKER_32, b"");
        let mut vol = single(bytes);
        let record = EndOfCentralDirectory::locate(&mut vol).unwrap();
        assert!(record.requires_zip64());
    }
}
