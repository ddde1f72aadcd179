//! End-to-end structural parsing over hand-built archives.

use spanzip_archive::Archive;
use spanzip_archive::descriptor::DATA_DESCRIPTOR_SIGNATURE;
use spanzip_core::{CancelToken, Crc32, SingleVolume, SpanZipError, SplitVolumes, VolumeSet};
use std::io::Cursor;

const LOCAL_SIG: u32 = 0x0403_4B50;
const CENTRAL_SIG: u32 = 0x0201_4B50;
const EOCDR_SIG: u32 = 0x0605_4B50;
const ZIP64_EOCDR_SIG: u32 = 0x0606_4B50;
const ZIP64_LOCATOR_SIG: u32 = 0x0706_4B50;

#[derive(Clone)]
struct EntryFixture {
    name: &'static [u8],
    data: &'static [u8],
    flags: u16,
    /// None: no descriptor. Some(true): signed form, Some(false): bare.
    descriptor: Option<bool>,
    host: u8,
    external_attributes: u32,
}

impl EntryFixture {
    fn stored(name: &'static [u8], data: &'static [u8]) -> Self {
        Self {
            name,
            data,
            flags: 0,
            descriptor: None,
            host: 3,
            external_attributes: 0o100644 << 16,
        }
    }
}

fn local_header(out: &mut Vec<u8>, e: &EntryFixture) {
    let descriptor = e.descriptor.is_some();
    let flags = e.flags | if descriptor { 0x0008 } else { 0 };
    let (crc, len) = if descriptor {
        (0, 0)
    } else {
        (Crc32::compute(e.data), e.data.len() as u32)
    };
    out.extend_from_slice(&LOCAL_SIG.to_le_bytes());
    out.extend_from_slice(&20u16.to_le_bytes());
    out.extend_from_slice(&flags.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // stored
    out.extend_from_slice(&0x6000u16.to_le_bytes()); // time
    out.extend_from_slice(&0x58CFu16.to_le_bytes()); // date
    out.extend_from_slice(&crc.to_le_bytes());
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&(e.name.len() as u16).to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(e.name);
}

fn central_header(out: &mut Vec<u8>, e: &EntryFixture, local_offset: u32) {
    let flags = e.flags | if e.descriptor.is_some() { 0x0008 } else { 0 };
    out.extend_from_slice(&CENTRAL_SIG.to_le_bytes());
    out.extend_from_slice(&[20, e.host]);
    out.extend_from_slice(&20u16.to_le_bytes());
    out.extend_from_slice(&flags.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0x6000u16.to_le_bytes());
    out.extend_from_slice(&0x58CFu16.to_le_bytes());
    out.extend_from_slice(&Crc32::compute(e.data).to_le_bytes());
    out.extend_from_slice(&(e.data.len() as u32).to_le_bytes());
    out.extend_from_slice(&(e.data.len() as u32).to_le_bytes());
    out.extend_from_slice(&(e.name.len() as u16).to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // extra
    out.extend_from_slice(&0u16.to_le_bytes()); // comment
    out.extend_from_slice(&0u16.to_le_bytes()); // disk start
    out.extend_from_slice(&0u16.to_le_bytes()); // internal
    out.extend_from_slice(&e.external_attributes.to_le_bytes());
    out.extend_from_slice(&local_offset.to_le_bytes());
    out.extend_from_slice(e.name);
}

fn eocdr(
    out: &mut Vec<u8>,
    disk_number: u16,
    cd_start_disk: u16,
    entries: u16,
    cd_size: u32,
    cd_offset: u32,
    comment: &[u8],
) {
    out.extend_from_slice(&EOCDR_SIG.to_le_bytes());
    out.extend_from_slice(&disk_number.to_le_bytes());
    out.extend_from_slice(&cd_start_disk.to_le_bytes());
    out.extend_from_slice(&entries.to_le_bytes());
    out.extend_from_slice(&entries.to_le_bytes());
    out.extend_from_slice(&cd_size.to_le_bytes());
    out.extend_from_slice(&cd_offset.to_le_bytes());
    out.extend_from_slice(&(comment.len() as u16).to_le_bytes());
    out.extend_from_slice(comment);
}

/// Build a complete single-disk archive.
fn build(entries: &[EntryFixture], comment: &[u8], zip64_trailer: bool) -> Vec<u8> {
    let mut out = Vec::new();
    let mut offsets = Vec::new();
    for e in entries {
        offsets.push(out.len() as u32);
        local_header(&mut out, e);
        out.extend_from_slice(e.data);
        if let Some(signed) = e.descriptor {
            if signed {
                out.extend_from_slice(&DATA_DESCRIPTOR_SIGNATURE.to_le_bytes());
            }
            out.extend_from_slice(&Crc32::compute(e.data).to_le_bytes());
            out.extend_from_slice(&(e.data.len() as u32).to_le_bytes());
            out.extend_from_slice(&(e.data.len() as u32).to_le_bytes());
        }
    }
    let cd_offset = out.len() as u64;
    for (e, off) in entries.iter().zip(&offsets) {
        central_header(&mut out, e, *off);
    }
    let cd_size = out.len() as u64 - cd_offset;

    if zip64_trailer {
        let zip64_at = out.len() as u64;
        out.extend_from_slice(&ZIP64_EOCDR_SIG.to_le_bytes());
        out.extend_from_slice(&44u64.to_le_bytes());
        out.extend_from_slice(&45u16.to_le_bytes());
        out.extend_from_slice(&45u16.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&(entries.len() as u64).to_le_bytes());
        out.extend_from_slice(&(entries.len() as u64).to_le_bytes());
        out.extend_from_slice(&cd_size.to_le_bytes());
        out.extend_from_slice(&cd_offset.to_le_bytes());
        out.extend_from_slice(&ZIP64_LOCATOR_SIG.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&zip64_at.to_le_bytes());
        out.extend_from_slice(&1u32.to_le_bytes());
        eocdr(&mut out, 0xFFFF, 0xFFFF, 0xFFFF, 0xFFFF_FFFF, 0xFFFF_FFFF, comment);
    } else {
        eocdr(
            &mut out,
            0,
            0,
            entries.len() as u16,
            cd_size as u32,
            cd_offset as u32,
            comment,
        );
    }
    out
}

fn open(bytes: Vec<u8>) -> Archive<SingleVolume<Cursor<Vec<u8>>>> {
    Archive::open(SingleVolume::new(Cursor::new(bytes)).unwrap()).unwrap()
}

#[test]
fn test_open_and_list_entries() {
    // The archive comment embeds a decoy EOCDR signature.
    let mut comment = b"built by ".to_vec();
    comment.extend_from_slice(&EOCDR_SIG.to_le_bytes());
    comment.extend_from_slice(b" tooling");

    let entries = [
        EntryFixture::stored(b"readme.md", b"# hello\n"),
        EntryFixture::stored(b"src/main.rs", b"fn main() {}\n"),
    ];
    let archive = open(build(&entries, &comment, false));
    assert_eq!(archive.entry_count(), 2);
    assert_eq!(archive.comment(), &comment[..]);
    assert_eq!(archive.entries()[0].name(), b"readme.md");
    assert_eq!(archive.entries()[1].name(), b"src/main.rs");
    assert_eq!(archive.entries()[1].size, 13);
    assert!(!archive.is_zip64());
}

#[test]
fn test_read_entry_cross_validates() {
    let entries = [EntryFixture::stored(b"a.txt", b"payload bytes")];
    let mut archive = open(build(&entries, b"", false));
    let entry = archive.read_entry(0).unwrap();
    assert_eq!(entry.name(), b"a.txt");
    assert_eq!(entry.size(), 13);
    assert_eq!(entry.crc32(), Crc32::compute(b"payload bytes"));
    assert!(entry.descriptor.is_none());
    assert!(!entry.is_directory());

    // The payload really is at the reported position.
    let data_position = entry.data_position();
    let mut volumes = archive.into_volumes();
    let mut payload = vec![0u8; 13];
    volumes.read_exact_at(data_position, &mut payload).unwrap();
    assert_eq!(payload, b"payload bytes");
}

#[test]
fn test_data_descriptor_both_forms() {
    for signed in [false, true] {
        let mut fixture = EntryFixture::stored(b"streamed.bin", b"abcdefgh");
        fixture.descriptor = Some(signed);
        let mut archive = open(build(&[fixture], b"", false));
        let entry = archive.read_entry(0).unwrap();
        let descriptor = entry.descriptor.expect("descriptor resolved");
        assert_eq!(descriptor.has_signature, signed);
        assert_eq!(entry.size(), 8);
        assert_eq!(entry.crc32(), Crc32::compute(b"abcdefgh"));
        // The local header carried zeros; the descriptor filled them in.
        assert_eq!(entry.local.crc32, 0);
    }
}

#[test]
fn test_archive_debug_skips_the_volume_set() {
    let archive = open(build(&[EntryFixture::stored(b"a.txt", b"1")], b"", false));
    let rendered = format!("{archive:?}");
    assert!(rendered.contains("Archive"));
    assert!(rendered.contains("entries: 1"));
}

#[test]
fn test_descriptor_seek_past_archive_end_is_fatal() {
    // A descriptor-flagged entry whose central packed size is the ZIP64
    // sentinel, resolved by the extra field to a value no archive holds.
    // Stepping over the payload must fail cleanly instead of wrapping.
    let mut fixture = EntryFixture::stored(b"big.bin", b"abcd");
    fixture.descriptor = Some(false);
    let mut out = Vec::new();
    local_header(&mut out, &fixture);
    out.extend_from_slice(fixture.data);
    out.extend_from_slice(&Crc32::compute(b"abcd").to_le_bytes());
    out.extend_from_slice(&4u32.to_le_bytes());
    out.extend_from_slice(&4u32.to_le_bytes());

    let cd_offset = out.len() as u32;
    out.extend_from_slice(&CENTRAL_SIG.to_le_bytes());
    out.extend_from_slice(&[20, 3]);
    out.extend_from_slice(&20u16.to_le_bytes());
    out.extend_from_slice(&0x0008u16.to_le_bytes()); // descriptor flag
    out.extend_from_slice(&0u16.to_le_bytes()); // stored
    out.extend_from_slice(&0x6000u16.to_le_bytes());
    out.extend_from_slice(&0x58CFu16.to_le_bytes());
    out.extend_from_slice(&Crc32::compute(b"abcd").to_le_bytes());
    out.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes()); // packed, sentinel
    out.extend_from_slice(&4u32.to_le_bytes());
    out.extend_from_slice(&7u16.to_le_bytes()); // name len
    out.extend_from_slice(&12u16.to_le_bytes()); // extra len
    out.extend_from_slice(&0u16.to_le_bytes()); // comment len
    out.extend_from_slice(&0u16.to_le_bytes()); // disk start
    out.extend_from_slice(&0u16.to_le_bytes()); // internal
    out.extend_from_slice(&(0o100644u32 << 16).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // local offset
    out.extend_from_slice(b"big.bin");
    out.extend_from_slice(&0x0001u16.to_le_bytes());
    out.extend_from_slice(&8u16.to_le_bytes());
    out.extend_from_slice(&(u64::MAX - 4).to_le_bytes());
    let cd_size = out.len() as u32 - cd_offset;
    eocdr(&mut out, 0, 0, 1, cd_size, cd_offset, b"");

    let mut archive = open(out);
    assert_eq!(archive.entries()[0].packed_size, u64::MAX - 4);
    let err = archive.read_entry(0).unwrap_err();
    assert!(err.is_bad_format());
}

#[test]
fn test_zip64_trailer_supersedes_eocdr() {
    let entries = [EntryFixture::stored(b"big.dat", b"0123456789")];
    let mut archive = open(build(&entries, b"", true));
    assert!(archive.is_zip64());
    // Every EOCDR field is a sentinel; the counts come from the ZIP64
    // record alone.
    assert_eq!(archive.entry_count(), 1);
    assert_eq!(archive.zip64_record().unwrap().entries_total, 1);
    let entry = archive.read_entry(0).unwrap();
    assert_eq!(entry.size(), 10);
}

#[test]
fn test_missing_records_fail_not_truncate() {
    let entries = [
        EntryFixture::stored(b"one", b"1"),
        EntryFixture::stored(b"two", b"2"),
    ];
    let mut bytes = build(&entries, b"", false);
    // Claim a third entry that does not exist.
    let len = bytes.len();
    bytes[len - 14..len - 12].copy_from_slice(&3u16.to_le_bytes());
    bytes[len - 12..len - 10].copy_from_slice(&3u16.to_le_bytes());
    let err = Archive::open(SingleVolume::new(Cursor::new(bytes)).unwrap()).unwrap_err();
    assert!(err.is_bad_format());
}

#[test]
fn test_split_archive_roundtrip() {
    // Disk 0 holds the entry, disk 1 the directory and trailer.
    let fixture = EntryFixture::stored(b"a.txt", b"data!");
    let mut disk0 = Vec::new();
    local_header(&mut disk0, &fixture);
    disk0.extend_from_slice(fixture.data);

    let mut disk1 = Vec::new();
    central_header(&mut disk1, &fixture, 0);
    let cd_size = disk1.len() as u32;
    eocdr(&mut disk1, 1, 1, 1, cd_size, 0, b"");

    // A single-volume read of the concatenated bytes is ambiguous, not
    // corrupt.
    let joined = [disk0.clone(), disk1.clone()].concat();
    let err = Archive::open(SingleVolume::new(Cursor::new(joined)).unwrap()).unwrap_err();
    assert!(matches!(err, SpanZipError::MultiVolumeAmbiguous { disk: 1 }));

    // The same bytes as a two-disk set parse fully.
    let set = SplitVolumes::new(vec![Cursor::new(disk0), Cursor::new(disk1)]).unwrap();
    let mut archive = Archive::open(set).unwrap();
    assert_eq!(archive.entry_count(), 1);
    let entry = archive.read_entry(0).unwrap();
    assert_eq!(entry.name(), b"a.txt");
    assert_eq!(entry.data_position().disk, 0);
}

#[test]
fn test_central_header_fragmented_across_disks() {
    let fixture = EntryFixture::stored(b"a.txt", b"data!");
    let mut full = Vec::new();
    local_header(&mut full, &fixture);
    full.extend_from_slice(fixture.data);
    let cd_at = full.len();
    central_header(&mut full, &fixture, 0);
    let cd_size = (full.len() - cd_at) as u32;
    eocdr(&mut full, 1, 0, 1, cd_size, cd_at as u32, b"");

    // Split ten bytes into the central record's fixed part.
    let (disk0, disk1) = full.split_at(cd_at + 10);
    let set = SplitVolumes::new(vec![
        Cursor::new(disk0.to_vec()),
        Cursor::new(disk1.to_vec()),
    ])
    .unwrap();
    let err = Archive::open(set).unwrap_err();
    assert!(matches!(err, SpanZipError::FragmentedHeader { .. }));
}

#[test]
fn test_encrypted_entry_lists_but_does_not_read() {
    let mut fixture = EntryFixture::stored(b"secret.txt", b"xxxx");
    fixture.flags = 0x0001;
    let mut archive = open(build(&[fixture], b"", false));
    // Listing works; the directory itself is not encrypted.
    assert_eq!(archive.entry_count(), 1);
    assert_eq!(archive.entries()[0].name(), b"secret.txt");
    let err = archive.read_entry(0).unwrap_err();
    assert!(matches!(err, SpanZipError::UnsupportedFeature { .. }));
}

#[test]
fn test_cancelled_open() {
    let entries = [EntryFixture::stored(b"a", b"1")];
    let bytes = build(&entries, b"", false);
    let token = CancelToken::new();
    token.cancel();
    let err = Archive::open_with(SingleVolume::new(Cursor::new(bytes)).unwrap(), token)
        .unwrap_err();
    assert!(matches!(err, SpanZipError::Cancelled));
}

#[test]
fn test_directory_entries() {
    let mut dir = EntryFixture::stored(b"assets/", b"");
    dir.external_attributes = 0o040755 << 16;
    let file = EntryFixture::stored(b"assets/logo.svg", b"<svg/>");
    let archive = open(build(&[dir, file], b"", false));
    assert!(archive.entries()[0].is_directory());
    assert!(!archive.entries()[1].is_directory());
}
