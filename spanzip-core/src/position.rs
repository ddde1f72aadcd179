//! Archive positions.
//!
//! A position inside a (possibly split) ZIP archive is a pair of disk number
//! and byte offset on that disk. Positions are totally ordered: disk first,
//! then offset. Arithmetic across disk boundaries is *not* defined here —
//! crossing a boundary depends on the individual volume sizes, so advancing
//! a position is a [`VolumeSet`](crate::volume::VolumeSet) operation.

/// A byte position inside a multi-volume archive.
///
/// For a single-volume archive the disk number is always zero and the offset
/// is the plain file offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ArchivePosition {
    /// Zero-based disk (volume) number.
    pub disk: u32,
    /// Byte offset on that disk.
    pub offset: u64,
}

impl ArchivePosition {
    /// Create a position from a disk number and an on-disk offset.
    pub const fn new(disk: u32, offset: u64) -> Self {
        Self { disk, offset }
    }

    /// A position on disk zero.
    pub const fn on_first_disk(offset: u64) -> Self {
        Self { disk: 0, offset }
    }

    /// The very start of the archive.
    pub const ZERO: Self = Self { disk: 0, offset: 0 };
}

impl std::fmt::Display for ArchivePosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.disk == 0 {
            write!(f, "offset {:#x}", self.offset)
        } else {
            write!(f, "disk {}, offset {:#x}", self.disk, self.offset)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_across_disks() {
        let a = ArchivePosition::new(0, 0xFFFF_FFFF);
        let b = ArchivePosition::new(1, 0);
        let c = ArchivePosition::new(1, 16);
        assert!(a < b);
        assert!(b < c);
        assert!(ArchivePosition::ZERO < a);
    }

    #[test]
    fn test_display() {
        assert_eq!(ArchivePosition::on_first_disk(42).to_string(), "offset 0x2a");
        assert_eq!(
            ArchivePosition::new(3, 16).to_string(),
            "disk 3, offset 0x10"
        );
    }
}
