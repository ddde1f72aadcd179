//! Archive-level orchestration.
//!
//! [`Archive::open`] performs the forward structural parse: locate the
//! EOCDR, follow the ZIP64 trailer if one exists, then read the full
//! central directory. Local headers are parsed lazily per entry through
//! [`Archive::read_entry`], which seeks to the recorded position, resolves
//! the data descriptor when flagged, and cross-validates the two headers.

use crate::central::{CentralDirectory, CentralHeader};
use crate::descriptor::{DataDescriptor, ExpectedDescriptor};
use crate::eocd::EndOfCentralDirectory;
use crate::extra::ZIP64_EXTENDED_INFO_ID;
use crate::local::LocalHeader;
use crate::validate::ArchiveEntry;
use crate::zip64::{Zip64EndOfCentralDirectory, Zip64Locator};
use spanzip_core::cancel::CancelToken;
use spanzip_core::error::{Result, SpanZipError};
use spanzip_core::position::ArchivePosition;
use spanzip_core::volume::VolumeSet;

/// A structurally parsed ZIP archive.
///
/// Opening reads the trailer records and the whole central directory;
/// entry payload positions are resolved on demand. The volume set is owned
/// for the lifetime of the archive so lazy per-entry reads can seek freely.
pub struct Archive<V: VolumeSet> {
    volumes: V,
    eocdr: EndOfCentralDirectory,
    zip64: Option<Zip64EndOfCentralDirectory>,
    entries: Vec<CentralHeader>,
    cancel: CancelToken,
}

impl<V: VolumeSet> std::fmt::Debug for Archive<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive")
            .field("eocdr", &self.eocdr)
            .field("zip64", &self.zip64)
            .field("entries", &self.entries.len())
            .finish_non_exhaustive()
    }
}

impl<V: VolumeSet> Archive<V> {
    /// Open an archive without cancellation support.
    pub fn open(volumes: V) -> Result<Self> {
        Self::open_with(volumes, CancelToken::new())
    }

    /// Open an archive, checking `cancel` between archive-level steps.
    ///
    /// A [`SpanZipError::MultiVolumeAmbiguous`] outcome means the trailer
    /// references other disks while `volumes` was opened as a single file;
    /// reopen the same bytes as a volume set and call again.
    pub fn open_with(mut volumes: V, cancel: CancelToken) -> Result<Self> {
        cancel.check()?;
        let eocdr = EndOfCentralDirectory::locate(&mut volumes)?;
        let zip64 = match Zip64Locator::locate(&mut volumes, &eocdr)? {
            Some(locator) => Some(Zip64EndOfCentralDirectory::read(&mut volumes, &locator)?),
            None => None,
        };
        cancel.check()?;

        // The ZIP64 record supersedes the EOCDR wholesale.
        let (entries_total, cd_size, cd_start_disk, cd_offset, at) = match &zip64 {
            Some(z) => (
                z.entries_total,
                z.cd_size,
                z.cd_start_disk,
                z.cd_offset,
                z.position,
            ),
            None => (
                eocdr.entries_total as u64,
                eocdr.cd_size as u64,
                eocdr.cd_start_disk as u32,
                eocdr.cd_offset as u64,
                eocdr.position,
            ),
        };
        if !volumes.is_multi_volume() && cd_start_disk != 0 {
            return Err(SpanZipError::multi_volume_ambiguous(cd_start_disk));
        }
        let cd_start = volumes.resolve(cd_start_disk, cd_offset).ok_or_else(|| {
            SpanZipError::bad_format(at, "central directory start outside the volume set")
        })?;

        let entries =
            CentralDirectory::read(&mut volumes, cd_start, cd_size, entries_total, &cancel)?;
        Ok(Self {
            volumes,
            eocdr,
            zip64,
            entries,
            cancel,
        })
    }

    /// The parsed central directory, in directory order.
    pub fn entries(&self) -> &[CentralHeader] {
        &self.entries
    }

    /// Number of entries in the archive.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// The trailing archive comment, raw bytes.
    pub fn comment(&self) -> &[u8] {
        &self.eocdr.comment
    }

    /// The end-of-central-directory record.
    pub fn end_of_central_directory(&self) -> &EndOfCentralDirectory {
        &self.eocdr
    }

    /// The ZIP64 trailer record, when the archive has one.
    pub fn zip64_record(&self) -> Option<&Zip64EndOfCentralDirectory> {
        self.zip64.as_ref()
    }

    /// Whether the archive carries a ZIP64 trailer.
    pub fn is_zip64(&self) -> bool {
        self.zip64.is_some()
    }

    /// Parse and validate the local structures for one entry.
    ///
    /// Seeks to the local header, resolves the data descriptor when the
    /// entry uses one, and cross-checks the headers. Encrypted entries can
    /// be listed but fail here as unsupported.
    pub fn read_entry(&mut self, index: usize) -> Result<ArchiveEntry> {
        self.cancel.check()?;
        let central = self.entries.get(index).cloned().ok_or_else(|| {
            SpanZipError::bad_format(
                ArchivePosition::ZERO,
                format!("entry index {index} out of range"),
            )
        })?;
        if central.raw.flags.is_encrypted() || central.raw.flags.uses_strong_encryption() {
            return Err(SpanZipError::unsupported(
                central.raw.position,
                "encryption",
            ));
        }

        let local = LocalHeader::read(&mut self.volumes, &central)?;
        let descriptor = if central.has_data_descriptor() {
            Some(self.read_descriptor(&central, &local)?)
        } else {
            None
        };
        ArchiveEntry::assemble(central, local, descriptor)
    }

    fn read_descriptor(
        &mut self,
        central: &CentralHeader,
        local: &LocalHeader,
    ) -> Result<DataDescriptor> {
        // The payload may span disks; step over it in linear coordinates.
        let data_linear = self
            .volumes
            .position_to_linear(local.data_position)
            .ok_or_else(|| {
                SpanZipError::bad_format(local.position, "payload position unmappable")
            })?;
        let after = data_linear
            .checked_add(central.packed_size)
            .and_then(|end| self.volumes.linear_to_position(end))
            .ok_or_else(|| {
                SpanZipError::bad_format(
                    local.position,
                    "payload runs past the end of the archive",
                )
            })?;
        self.volumes.seek(after)?;

        let zip64 = local.extra.get(ZIP64_EXTENDED_INFO_ID).is_some()
            || central.size > u32::MAX as u64
            || central.packed_size > u32::MAX as u64;
        DataDescriptor::read(
            &mut self.volumes,
            ExpectedDescriptor {
                crc32: central.raw.crc32,
                packed_size: central.packed_size,
                size: central.size,
                zip64,
            },
        )
    }

    /// Consume the archive and return the volume set.
    pub fn into_volumes(self) -> V {
        self.volumes
    }
}
