//! Fixed-width header field types shared by the central and local headers.

/// Marker value for Zip64 (0xFFFFFFFF for 32-bit fields).
pub const ZIP64_MARKER_32: u32 = 0xFFFF_FFFF;

/// Marker value for Zip64 (0xFFFF for 16-bit fields).
pub const ZIP64_MARKER_16: u16 = 0xFFFF;

/// Host system that produced an entry, from the high byte of
/// version-made-by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostSystem {
    /// MS-DOS / OS/2 FAT.
    Dos,
    /// Amiga.
    Amiga,
    /// OpenVMS.
    OpenVms,
    /// Unix.
    Unix,
    /// VM/CMS.
    VmCms,
    /// Atari ST.
    AtariSt,
    /// OS/2 HPFS.
    Os2Hpfs,
    /// Macintosh (classic).
    Macintosh,
    /// Z-System.
    ZSystem,
    /// CP/M.
    CpM,
    /// Windows NTFS.
    WindowsNtfs,
    /// MVS (OS/390, z/OS).
    Mvs,
    /// VSE.
    Vse,
    /// Acorn RISC OS.
    AcornRisc,
    /// VFAT.
    Vfat,
    /// Alternate MVS.
    AltMvs,
    /// BeOS.
    BeOs,
    /// Tandem.
    Tandem,
    /// OS/400.
    Os400,
    /// macOS (Darwin).
    OsX,
    /// Unknown host system.
    Unknown(u8),
}

impl HostSystem {
    /// Decode from the high byte of version-made-by.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Dos,
            1 => Self::Amiga,
            2 => Self::OpenVms,
            3 => Self::Unix,
            4 => Self::VmCms,
            5 => Self::AtariSt,
            6 => Self::Os2Hpfs,
            7 => Self::Macintosh,
            8 => Self::ZSystem,
            9 => Self::CpM,
            10 => Self::WindowsNtfs,
            11 => Self::Mvs,
            12 => Self::Vse,
            13 => Self::AcornRisc,
            14 => Self::Vfat,
            15 => Self::AltMvs,
            16 => Self::BeOs,
            17 => Self::Tandem,
            18 => Self::Os400,
            19 => Self::OsX,
            other => Self::Unknown(other),
        }
    }

    /// Encode back to the version-made-by high byte.
    pub fn as_u8(&self) -> u8 {
        match self {
            Self::Dos => 0,
            Self::Amiga => 1,
            Self::OpenVms => 2,
            Self::Unix => 3,
            Self::VmCms => 4,
            Self::AtariSt => 5,
            Self::Os2Hpfs => 6,
            Self::Macintosh => 7,
            Self::ZSystem => 8,
            Self::CpM => 9,
            Self::WindowsNtfs => 10,
            Self::Mvs => 11,
            Self::Vse => 12,
            Self::AcornRisc => 13,
            Self::Vfat => 14,
            Self::AltMvs => 15,
            Self::BeOs => 16,
            Self::Tandem => 17,
            Self::Os400 => 18,
            Self::OsX => 19,
            Self::Unknown(v) => *v,
        }
    }

    /// True for hosts using FAT-style attribute conventions
    /// (backslash directory names, DOS attribute byte).
    pub fn is_fat_family(&self) -> bool {
        matches!(
            self,
            Self::Dos | Self::Os2Hpfs | Self::WindowsNtfs | Self::Vfat
        )
    }

    /// True for hosts storing Unix mode bits in the external attributes.
    pub fn is_unix_family(&self) -> bool {
        matches!(self, Self::Unix | Self::OsX | Self::BeOs)
    }
}

/// Compression method recorded in a header.
///
/// The engine never decompresses; it carries the method so callers can pick
/// a codec. Method 99 marks AE-x encrypted payloads and is reported as
/// unsupported encryption, not as an unknown codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    /// Stored (no compression).
    Stored,
    /// Deflate compression.
    Deflate,
    /// Deflate64 compression.
    Deflate64,
    /// Bzip2 compression.
    Bzip2,
    /// LZMA compression.
    Lzma,
    /// Zstandard compression.
    Zstd,
    /// AE-x encrypted payload (method 99).
    AesEncrypted,
    /// Unknown method.
    Unknown(u16),
}

impl CompressionMethod {
    /// Create from a u16 value.
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => Self::Stored,
            8 => Self::Deflate,
            9 => Self::Deflate64,
            12 => Self::Bzip2,
            14 => Self::Lzma,
            93 => Self::Zstd,
            99 => Self::AesEncrypted,
            other => Self::Unknown(other),
        }
    }

    /// Convert back to the wire value.
    pub fn as_u16(&self) -> u16 {
        match self {
            Self::Stored => 0,
            Self::Deflate => 8,
            Self::Deflate64 => 9,
            Self::Bzip2 => 12,
            Self::Lzma => 14,
            Self::Zstd => 93,
            Self::AesEncrypted => 99,
            Self::Unknown(v) => *v,
        }
    }

    /// Get the method name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Stored => "Stored",
            Self::Deflate => "Deflate",
            Self::Deflate64 => "Deflate64",
            Self::Bzip2 => "Bzip2",
            Self::Lzma => "LZMA",
            Self::Zstd => "Zstd",
            Self::AesEncrypted => "AES",
            Self::Unknown(_) => "Unknown",
        }
    }
}

impl std::fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown(id) => write!(f, "Unknown({})", id),
            _ => write!(f, "{}", self.name()),
        }
    }
}

/// General purpose bit flags from a central or local header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GeneralPurposeFlags(u16);

impl GeneralPurposeFlags {
    /// Wrap the raw flag word.
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    /// The raw flag word.
    pub const fn raw(&self) -> u16 {
        self.0
    }

    /// Bit 0: the entry payload is encrypted.
    pub const fn is_encrypted(&self) -> bool {
        self.0 & 0x0001 != 0
    }

    /// Bit 3: crc/sizes follow the payload in a data descriptor.
    pub const fn has_data_descriptor(&self) -> bool {
        self.0 & 0x0008 != 0
    }

    /// Bit 6: strong encryption.
    pub const fn uses_strong_encryption(&self) -> bool {
        self.0 & 0x0040 != 0
    }

    /// Bit 11: name and comment are UTF-8.
    pub const fn is_utf8(&self) -> bool {
        self.0 & 0x0800 != 0
    }
}

/// A DOS date/time stamp as stored in ZIP headers (2-second resolution).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DosDateTime {
    /// Raw DOS date word.
    pub date: u16,
    /// Raw DOS time word.
    pub time: u16,
}

impl DosDateTime {
    /// Create from the raw date and time words.
    pub const fn new(date: u16, time: u16) -> Self {
        Self { date, time }
    }

    /// Decode the date to (year, month, day).
    pub fn ymd(&self) -> (u16, u8, u8) {
        let day = (self.date & 0x1F) as u8;
        let month = ((self.date >> 5) & 0x0F) as u8;
        let year = ((self.date >> 9) & 0x7F) + 1980;
        (year, month, day)
    }

    /// Decode the time to (hour, minute, second).
    pub fn hms(&self) -> (u8, u8, u8) {
        let second = ((self.time & 0x1F) * 2) as u8;
        let minute = ((self.time >> 5) & 0x3F) as u8;
        let hour = ((self.time >> 11) & 0x1F) as u8;
        (hour, minute, second)
    }
}
