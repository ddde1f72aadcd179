//! Byte-addressable volume streams.
//!
//! A ZIP archive may be a single file or a set of sequentially numbered
//! volume files ("disks"). The parser never does cross-disk arithmetic
//! itself: it works in [`ArchivePosition`] coordinates and delegates all
//! boundary handling to a [`VolumeSet`].
//!
//! Fixed-size headers are read atomically: the parser asserts a disk lock
//! around the read, and a read that would have to continue on the next disk
//! while locked fails with a distinct "fragmented header" condition instead
//! of silently spanning the boundary or reporting a generic I/O error.

use crate::error::{Result, SpanZipError};
use crate::position::ArchivePosition;
use std::io::{Read, Seek, SeekFrom};

/// A seekable, byte-addressable view over the disks of an archive.
///
/// Implementations provide the cursor primitives; the trait supplies disk
/// arithmetic (linear addressing, cross-disk resolution) on top of them so
/// that every implementation agrees on boundary semantics.
pub trait VolumeSet {
    /// Number of disks in the set (≥ 1).
    fn disk_count(&self) -> u32;

    /// Length in bytes of one disk, or `None` if the disk does not exist.
    fn disk_len(&self, disk: u32) -> Option<u64>;

    /// Move the cursor to an absolute position.
    ///
    /// Seeking to the end of a disk is allowed (the next read continues on
    /// the following disk, if any); seeking past it is an error.
    fn seek(&mut self, pos: ArchivePosition) -> Result<()>;

    /// Current cursor position.
    fn position(&self) -> ArchivePosition;

    /// Read up to `buf.len()` bytes at the cursor, advancing it.
    ///
    /// Returns 0 only at the end of the last disk. While the disk lock is
    /// held, a read that would have to continue on the next disk fails with
    /// [`SpanZipError::FragmentedHeader`].
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Assert the disk lock for an atomic header read.
    fn lock_disk(&mut self);

    /// Release the disk lock.
    fn unlock_disk(&mut self);

    /// Whether this set was opened under a multi-volume assumption.
    fn is_multi_volume(&self) -> bool;

    /// Total length in bytes across all disks.
    fn len(&self) -> u64 {
        (0..self.disk_count())
            .map(|d| self.disk_len(d).unwrap_or(0))
            .sum()
    }

    /// True when the set holds no bytes at all.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Length of the final disk.
    fn last_disk_len(&self) -> u64 {
        self.disk_len(self.disk_count() - 1).unwrap_or(0)
    }

    /// Validate a `(disk, offset)` pair read from archive metadata.
    ///
    /// Returns `None` when the disk does not exist or the offset lies past
    /// the end of that disk.
    fn resolve(&self, disk: u32, offset: u64) -> Option<ArchivePosition> {
        let disk_len = self.disk_len(disk)?;
        if offset > disk_len {
            return None;
        }
        Some(ArchivePosition::new(disk, offset))
    }

    /// Map a position to its linear byte address across all disks.
    fn position_to_linear(&self, pos: ArchivePosition) -> Option<u64> {
        self.disk_len(pos.disk)?;
        let mut linear = 0u64;
        for disk in 0..pos.disk {
            linear += self.disk_len(disk)?;
        }
        if pos.offset > self.disk_len(pos.disk)? {
            return None;
        }
        Some(linear + pos.offset)
    }

    /// Map a linear byte address to a position.
    ///
    /// An address equal to `len()` maps to the end of the last disk.
    fn linear_to_position(&self, linear: u64) -> Option<ArchivePosition> {
        let mut remaining = linear;
        let count = self.disk_count();
        for disk in 0..count {
            let disk_len = self.disk_len(disk)?;
            if remaining < disk_len || (disk + 1 == count && remaining == disk_len) {
                return Some(ArchivePosition::new(disk, remaining));
            }
            remaining -= disk_len;
        }
        None
    }

    /// Fill `buf` completely from the cursor.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read(&mut buf[filled..])?;
            if n == 0 {
                return Err(SpanZipError::bad_format(
                    self.position(),
                    format!(
                        "unexpected end of archive ({} of {} bytes read)",
                        filled,
                        buf.len()
                    ),
                ));
            }
            filled += n;
        }
        Ok(())
    }

    /// Seek to `pos` and fill `buf` completely.
    fn read_exact_at(&mut self, pos: ArchivePosition, buf: &mut [u8]) -> Result<()> {
        self.seek(pos)?;
        self.read_exact(buf)
    }

    /// Atomically read a fixed-size header at `pos`.
    ///
    /// The disk lock is held for the duration of the read, so a header that
    /// straddles a volume boundary surfaces as
    /// [`SpanZipError::FragmentedHeader`].
    fn read_header_at(&mut self, pos: ArchivePosition, buf: &mut [u8]) -> Result<()> {
        self.seek(pos)?;
        self.lock_disk();
        let outcome = self.read_exact(buf);
        self.unlock_disk();
        outcome
    }
}

/// A single-file archive.
///
/// Disk numbers other than zero do not exist; the disk lock is satisfied
/// trivially because no read can cross a boundary.
pub struct SingleVolume<R: Read + Seek> {
    reader: R,
    len: u64,
    cursor: u64,
}

impl<R: Read + Seek> SingleVolume<R> {
    /// Wrap a seekable reader as a one-disk volume set.
    pub fn new(mut reader: R) -> Result<Self> {
        let len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        Ok(Self {
            reader,
            len,
            cursor: 0,
        })
    }

    /// Consume the volume set and return the inner reader.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read + Seek> VolumeSet for SingleVolume<R> {
    fn disk_count(&self) -> u32 {
        1
    }

    fn disk_len(&self, disk: u32) -> Option<u64> {
        (disk == 0).then_some(self.len)
    }

    fn seek(&mut self, pos: ArchivePosition) -> Result<()> {
        if pos.disk != 0 || pos.offset > self.len {
            return Err(SpanZipError::bad_format(
                pos,
                "seek target outside the archive",
            ));
        }
        self.reader.seek(SeekFrom::Start(pos.offset))?;
        self.cursor = pos.offset;
        Ok(())
    }

    fn position(&self) -> ArchivePosition {
        ArchivePosition::on_first_disk(self.cursor)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self.reader.read(buf)?;
        self.cursor += n as u64;
        Ok(n)
    }

    fn lock_disk(&mut self) {}

    fn unlock_disk(&mut self) {}

    fn is_multi_volume(&self) -> bool {
        false
    }

    fn len(&self) -> u64 {
        self.len
    }
}

/// A split archive: an ordered set of volume files.
///
/// Reads continue transparently from one disk onto the next, except while
/// the disk lock is held.
pub struct SplitVolumes<R: Read + Seek> {
    disks: Vec<Disk<R>>,
    current: u32,
    cursor: u64,
    locked: bool,
}

struct Disk<R> {
    reader: R,
    len: u64,
}

impl<R: Read + Seek> SplitVolumes<R> {
    /// Build a volume set from readers in disk order.
    pub fn new(readers: Vec<R>) -> Result<Self> {
        if readers.is_empty() {
            return Err(SpanZipError::bad_format(
                ArchivePosition::ZERO,
                "a split archive needs at least one volume",
            ));
        }
        let mut disks = Vec::with_capacity(readers.len());
        for mut reader in readers {
            let len = reader.seek(SeekFrom::End(0))?;
            disks.push(Disk { reader, len });
        }
        let mut set = Self {
            disks,
            current: 0,
            cursor: 0,
            locked: false,
        };
        set.seek(ArchivePosition::ZERO)?;
        Ok(set)
    }

    fn disk(&mut self, disk: u32) -> &mut Disk<R> {
        &mut self.disks[disk as usize]
    }
}

impl<R: Read + Seek> VolumeSet for SplitVolumes<R> {
    fn disk_count(&self) -> u32 {
        self.disks.len() as u32
    }

    fn disk_len(&self, disk: u32) -> Option<u64> {
        self.disks.get(disk as usize).map(|d| d.len)
    }

    fn seek(&mut self, pos: ArchivePosition) -> Result<()> {
        let Some(disk_len) = self.disk_len(pos.disk) else {
            return Err(SpanZipError::bad_format(pos, "no such volume"));
        };
        if pos.offset > disk_len {
            return Err(SpanZipError::bad_format(
                pos,
                "seek target outside the volume",
            ));
        }
        self.disk(pos.disk).reader.seek(SeekFrom::Start(pos.offset))?;
        self.current = pos.disk;
        self.cursor = pos.offset;
        Ok(())
    }

    fn position(&self) -> ArchivePosition {
        ArchivePosition::new(self.current, self.cursor)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        // Advance onto the next disk when the cursor sits at a disk end.
        while self.cursor == self.disks[self.current as usize].len {
            if self.current + 1 == self.disk_count() {
                return Ok(0);
            }
            if self.locked {
                return Err(SpanZipError::fragmented(self.position(), buf.len()));
            }
            let next = self.current + 1;
            self.disk(next).reader.seek(SeekFrom::Start(0))?;
            self.current = next;
            self.cursor = 0;
        }
        let remaining = self.disks[self.current as usize].len - self.cursor;
        let take = buf.len().min(remaining as usize);
        let n = self.disk(self.current).reader.read(&mut buf[..take])?;
        self.cursor += n as u64;
        Ok(n)
    }

    fn lock_disk(&mut self) {
        self.locked = true;
    }

    fn unlock_disk(&mut self) {
        self.locked = false;
    }

    fn is_multi_volume(&self) -> bool {
        true
    }
}
