//! # Spanzip Archive
//!
//! Structural discovery and header validation for ZIP archives, including
//! split (multi-volume) archives and the ZIP64 size extension.
//!
//! The crate parses and cross-checks the metadata skeleton of an archive —
//! trailer records, central directory, local headers, data descriptors,
//! extra fields — so that tooling above it can enumerate entries, relocate
//! payloads, and rebuild archives byte-compatibly. It deliberately does not
//! decompress or decrypt anything: compression methods are carried as typed
//! values for a codec layer to act on, and encrypted entries are reported
//! as unsupported rather than guessed at.
//!
//! ## Parse flow
//!
//! ```text
//! EOCDR locator ──► ZIP64 locator/record (optional) ──► central directory
//!                                                            │
//!                                  per entry, lazily:        ▼
//!                       local header ──► data descriptor ──► cross-check
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use spanzip_archive::Archive;
//! use spanzip_core::{SingleVolume, SpanZipError};
//! use std::fs::File;
//!
//! # fn main() -> spanzip_core::Result<()> {
//! let file = File::open("bundle.zip")?;
//! let mut archive = match Archive::open(SingleVolume::new(file)?) {
//!     Err(SpanZipError::MultiVolumeAmbiguous { disk }) => {
//!         // Reopen bundle.z01 .. bundle.zip as a SplitVolumes set.
//!         return Err(SpanZipError::multi_volume_ambiguous(disk));
//!     }
//!     other => other?,
//! };
//! for index in 0..archive.entry_count() {
//!     let entry = archive.read_entry(index)?;
//!     println!("{} ({} bytes)", String::from_utf8_lossy(entry.name()), entry.size());
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod archive;
pub mod central;
pub mod descriptor;
pub mod eocd;
pub mod extra;
pub mod fields;
pub mod local;
pub mod validate;
pub mod zip64;

pub use archive::Archive;
pub use central::{CentralHeader, RawCentralHeader};
pub use descriptor::{DataDescriptor, ExpectedDescriptor};
pub use eocd::EndOfCentralDirectory;
pub use extra::{ExtraField, ExtraFields, HeaderKind, Timestamps, ZipTimestamp};
pub use fields::{CompressionMethod, DosDateTime, GeneralPurposeFlags, HostSystem};
pub use local::LocalHeader;
pub use validate::ArchiveEntry;
pub use zip64::{Zip64EndOfCentralDirectory, Zip64Locator};
