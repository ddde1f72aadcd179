//! # Spanzip Core
//!
//! Core components for the spanzip ZIP structural parser.
//!
//! This crate provides the building blocks shared by the parsing engine:
//!
//! - [`position`]: the ordered `(disk, offset)` archive position type
//! - [`volume`]: the byte-addressable volume-stream trait and concrete
//!   single-file / split-archive implementations
//! - [`crc`]: CRC-32 checksums (entry CRCs, Unicode extra-field name CRCs)
//! - [`cancel`]: cooperative cancellation between archive-level steps
//! - [`error`]: error types
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │ spanzip-archive                                      │
//! │     EOCD/ZIP64 discovery, header parsing, extra      │
//! │     fields, cross-validation                         │
//! ├──────────────────────────────────────────────────────┤
//! │ spanzip-core (this crate)                            │
//! │     VolumeSet, ArchivePosition, Crc32, errors        │
//! └──────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod cancel;
pub mod crc;
pub mod error;
pub mod position;
pub mod volume;

// Re-exports for convenience
pub use cancel::CancelToken;
pub use crc::Crc32;
pub use error::{Result, SpanZipError};
pub use position::ArchivePosition;
pub use volume::{SingleVolume, SplitVolumes, VolumeSet};
