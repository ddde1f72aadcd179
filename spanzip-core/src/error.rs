//! Error types for spanzip operations.
//!
//! The taxonomy distinguishes four fatalities: genuinely malformed input
//! ([`SpanZipError::BadFormat`] and friends), features that are recognized
//! but not handled ([`SpanZipError::UnsupportedFeature`]), a retryable
//! single/multi-volume ambiguity ([`SpanZipError::MultiVolumeAmbiguous`]),
//! and cooperative cancellation. Structural errors always carry the
//! absolute archive position at which they were detected.

use crate::position::ArchivePosition;
use std::io;
use thiserror::Error;

/// The main error type for spanzip operations.
#[derive(Debug, Error)]
pub enum SpanZipError {
    /// I/O error from the underlying volume set.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Structurally malformed archive data.
    #[error("Bad format at {position}: {message}")]
    BadFormat {
        /// Position at which the problem was detected.
        position: ArchivePosition,
        /// Description of the problem.
        message: String,
    },

    /// A record signature did not match.
    #[error("Invalid signature at {position}: expected {expected:#010x}, found {found:#010x}")]
    InvalidSignature {
        /// Position of the signature field.
        position: ArchivePosition,
        /// Expected signature value.
        expected: u32,
        /// Signature value actually read.
        found: u32,
    },

    /// A feature the archive uses that this engine recognizes but does not
    /// handle (encryption, central-directory encryption).
    #[error("Unsupported feature at {position}: {feature}")]
    UnsupportedFeature {
        /// Position of the record declaring the feature.
        position: ArchivePosition,
        /// Name of the feature.
        feature: String,
    },

    /// The archive was opened under a single-volume assumption but its
    /// trailer records reference other disks. Not fatal: reopen the archive
    /// in multi-volume mode and retry.
    #[error("archive may be multi-volume: trailer references disk {disk}")]
    MultiVolumeAmbiguous {
        /// Disk number found in the trailer record.
        disk: u32,
    },

    /// A fixed-size header read would cross a disk boundary while the disk
    /// was locked for an atomic read.
    #[error("header fragmented across volumes at {position}: {needed} bytes needed")]
    FragmentedHeader {
        /// Position where the read started.
        position: ArchivePosition,
        /// Bytes the atomic read required.
        needed: usize,
    },

    /// The operation was cancelled between archive-level steps.
    #[error("operation cancelled")]
    Cancelled,
}

/// Result type alias for spanzip operations.
pub type Result<T> = std::result::Result<T, SpanZipError>;

impl SpanZipError {
    /// Create a bad format error.
    pub fn bad_format(position: ArchivePosition, message: impl Into<String>) -> Self {
        Self::BadFormat {
            position,
            message: message.into(),
        }
    }

    /// Create an invalid signature error.
    pub fn invalid_signature(position: ArchivePosition, expected: u32, found: u32) -> Self {
        Self::InvalidSignature {
            position,
            expected,
            found,
        }
    }

    /// Create an unsupported feature error.
    pub fn unsupported(position: ArchivePosition, feature: impl Into<String>) -> Self {
        Self::UnsupportedFeature {
            position,
            feature: feature.into(),
        }
    }

    /// Create a multi-volume ambiguity signal.
    pub fn multi_volume_ambiguous(disk: u32) -> Self {
        Self::MultiVolumeAmbiguous { disk }
    }

    /// Create a fragmented header error.
    pub fn fragmented(position: ArchivePosition, needed: usize) -> Self {
        Self::FragmentedHeader { position, needed }
    }

    /// True for structural corruption (as opposed to unsupported features,
    /// ambiguity, cancellation, or plain I/O failures).
    pub fn is_bad_format(&self) -> bool {
        matches!(self, Self::BadFormat { .. } | Self::InvalidSignature { .. })
    }

    /// True if the caller may retry by reopening under a multi-volume
    /// assumption.
    pub fn is_retryable_as_multi_volume(&self) -> bool {
        matches!(self, Self::MultiVolumeAmbiguous { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SpanZipError::invalid_signature(ArchivePosition::on_first_disk(22), 0x06054B50, 0);
        assert!(err.to_string().contains("0x06054b50"));

        let err = SpanZipError::bad_format(ArchivePosition::new(2, 0x10), "truncated record");
        assert!(err.to_string().contains("disk 2"));
        assert!(err.to_string().contains("truncated record"));

        let err = SpanZipError::unsupported(ArchivePosition::ZERO, "encryption");
        assert!(err.to_string().contains("encryption"));
    }

    #[test]
    fn test_classification() {
        assert!(SpanZipError::bad_format(ArchivePosition::ZERO, "x").is_bad_format());
        assert!(!SpanZipError::multi_volume_ambiguous(3).is_bad_format());
        assert!(SpanZipError::multi_volume_ambiguous(3).is_retryable_as_multi_volume());
        assert!(!SpanZipError::Cancelled.is_retryable_as_multi_volume());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::UnexpectedEof, "eof");
        let err: SpanZipError = io_err.into();
        assert!(matches!(err, SpanZipError::Io(_)));
    }
}
