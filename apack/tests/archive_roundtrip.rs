// /////////////////////////////////////////////////////////////////////////////
// APACK
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! End-to-end write/read behavior: layout round-trips, ordering, random
//! access, stream mode, boundary sizes, and recovery.

mod common;

use apack::{ArchiveReader, ArchiveWriter, EntryMetadata, FileSink, StreamSink};
use apack_domain::{
    ArchiveConfig, Attribute, AttributeValue, ChunkSize, CompressionAlgorithm, CompressionLevel,
};
use common::{deterministic_bytes, providers, write_archive};
use std::io::{Cursor, Read};

#[test]
fn test_defaults_single_entry() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("single.apack");
    write_archive(&path, ArchiveConfig::default(), &[("hello.txt", b"Hello, World!")], None).unwrap();

    let mut reader = ArchiveReader::open_path(&path, providers()).unwrap();
    assert_eq!(reader.entry_count(), 1);

    let entry = reader.entry(0).unwrap();
    assert_eq!(entry.name(), "hello.txt");
    assert_eq!(entry.original_size(), 13);
    assert_eq!(entry.stored_size(), 13);
    assert_eq!(entry.chunk_count(), 1);
    assert_eq!(entry.compression(), None);
    assert_eq!(entry.encryption(), None);

    let contents = reader.open_entry(0).unwrap().read_to_vec().unwrap();
    assert_eq!(contents, b"Hello, World!");
}

#[test]
fn test_compression_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("zeros.apack");
    let config = ArchiveConfig::builder()
        .chunk_size(ChunkSize::from_kib(64).unwrap())
        .compression(CompressionAlgorithm::Zstd, CompressionLevel::Custom(6))
        .build()
        .unwrap();
    let zeros = vec![0u8; 512 * 1024];
    write_archive(&path, config, &[("zeros.bin", &zeros)], None).unwrap();

    let mut reader = ArchiveReader::open_path(&path, providers()).unwrap();
    let entry = reader.entry(0).unwrap();
    assert_eq!(entry.chunk_count(), 8);
    assert_eq!(entry.original_size(), 512 * 1024);
    assert!(entry.stored_size() < 1024, "stored {} bytes", entry.stored_size());
    assert_eq!(entry.compression(), Some(CompressionAlgorithm::Zstd));

    let contents = reader.open_entry(0).unwrap().read_to_vec().unwrap();
    assert_eq!(contents, zeros);
}

#[test]
fn test_incompressible_entry_stored_raw_with_codec_in_header() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("noise.apack");
    let config = ArchiveConfig::builder()
        .compression(CompressionAlgorithm::Lz4, CompressionLevel::Balanced)
        .build()
        .unwrap();
    let noise = deterministic_bytes(64 * 1024, 0xFEED);
    write_archive(&path, config, &[("noise.bin", &noise)], None).unwrap();

    let mut reader = ArchiveReader::open_path(&path, providers()).unwrap();
    let entry = reader.entry(0).unwrap();
    // The entry header keeps the configured codec; the per-chunk flag is
    // what cleared, so the stored bytes equal the input.
    assert_eq!(entry.compression(), Some(CompressionAlgorithm::Lz4));
    assert_eq!(entry.stored_size(), entry.original_size());
    assert_eq!(reader.open_entry(0).unwrap().read_to_vec().unwrap(), noise);
}

#[test]
fn test_many_entries_random_access() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("many.apack");
    let bodies: Vec<(String, Vec<u8>)> = (0..100)
        .map(|index| {
            (
                format!("entry_{}.txt", index),
                format!("body of entry {}", index).into_bytes(),
            )
        })
        .collect();
    let entries: Vec<(&str, &[u8])> = bodies
        .iter()
        .map(|(name, bytes)| (name.as_str(), bytes.as_slice()))
        .collect();
    write_archive(&path, ArchiveConfig::default(), &entries, None).unwrap();

    let mut reader = ArchiveReader::open_path(&path, providers()).unwrap();
    assert_eq!(reader.entry_count(), 100);
    assert_eq!(reader.file_header().entry_count, 100);

    // Insertion order end-to-end, ids equal to arrival index.
    for (index, entry) in reader.entries().enumerate() {
        assert_eq!(entry.id(), index as u64);
        assert_eq!(entry.name(), format!("entry_{}.txt", index));
    }

    // Name lookup agrees with a linear scan.
    let by_name = reader.entry_by_name("entry_42.txt").unwrap();
    let by_scan = reader.entries().find(|entry| entry.name() == "entry_42.txt").unwrap();
    assert_eq!(by_name.id(), by_scan.id());
    assert_eq!(by_name.id(), 42);
    assert!(reader.entry_by_name("entry_100.txt").is_none());

    // The trailer TOC is complete and the header points at it.
    assert!(reader.file_header().trailer_offset != 0);
    let trailer = reader.trailer().unwrap();
    assert_eq!(trailer.records.len(), 100);

    let contents = reader.open_entry(42).unwrap().read_to_vec().unwrap();
    assert_eq!(contents, b"body of entry 42");
}

#[test]
fn test_empty_archive_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.apack");
    write_archive(&path, ArchiveConfig::default(), &[], None).unwrap();

    let reader = ArchiveReader::open_path(&path, providers()).unwrap();
    assert_eq!(reader.entry_count(), 0);
    assert_eq!(reader.entries().count(), 0);
    assert_eq!(reader.trailer().unwrap().records.len(), 0);
}

#[test]
fn test_empty_entry_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty-entry.apack");
    write_archive(&path, ArchiveConfig::default(), &[("void.dat", b"")], None).unwrap();

    let mut reader = ArchiveReader::open_path(&path, providers()).unwrap();
    let entry = reader.entry(0).unwrap();
    assert_eq!(entry.original_size(), 0);
    assert_eq!(entry.chunk_count(), 0);
    assert_eq!(reader.open_entry(0).unwrap().read_to_vec().unwrap(), b"");
}

#[test]
fn test_one_byte_past_chunk_boundary_makes_two_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("boundary.apack");
    let config = ArchiveConfig::builder()
        .chunk_size(ChunkSize::from_kib(64).unwrap())
        .build()
        .unwrap();
    let body = deterministic_bytes(64 * 1024 + 1, 3);
    write_archive(&path, config, &[("boundary.bin", &body)], None).unwrap();

    let mut reader = ArchiveReader::open_path(&path, providers()).unwrap();
    assert_eq!(reader.entry(0).unwrap().chunk_count(), 2);
    assert_eq!(reader.open_entry(0).unwrap().read_to_vec().unwrap(), body);
}

#[test]
fn test_unicode_names_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("unicode.apack");
    let name = "saves/続き/スロット1.dat";
    write_archive(&path, ArchiveConfig::default(), &[(name, b"payload")], None).unwrap();

    let mut reader = ArchiveReader::open_path(&path, providers()).unwrap();
    let entry = reader.entry_by_name(name).unwrap();
    assert_eq!(entry.name(), name);
    let id = entry.id();
    assert_eq!(reader.open_entry(id).unwrap().read_to_vec().unwrap(), b"payload");
}

#[test]
fn test_mime_and_attributes_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("attrs.apack");
    let sink = FileSink::create(&path).unwrap();
    let mut writer =
        ArchiveWriter::create(sink, ArchiveConfig::default(), providers(), None).unwrap();
    let metadata = EntryMetadata::named("texture.png")
        .unwrap()
        .with_mime("image/png")
        .with_attribute(Attribute::new("mtime", AttributeValue::Int(1_700_000_000_000)).unwrap())
        .with_attribute(Attribute::new("readonly", AttributeValue::Bool(true)).unwrap());
    writer.add_entry(metadata, &mut &b"not really a png"[..]).unwrap();
    writer.close().unwrap();

    let reader = ArchiveReader::open_path(&path, providers()).unwrap();
    let entry = reader.entry(0).unwrap();
    assert_eq!(entry.mime(), "image/png");
    assert_eq!(entry.attributes().len(), 2);
    assert_eq!(entry.attributes()[0].key, "mtime");
    assert_eq!(entry.attributes()[0].value, AttributeValue::Int(1_700_000_000_000));
    assert_eq!(entry.attributes()[1].value, AttributeValue::Bool(true));
}

#[test]
fn test_stream_mode_round_trip() {
    let config = ArchiveConfig::builder().stream_mode(true).build().unwrap();
    let sink = StreamSink::new(Vec::new());
    let mut writer = ArchiveWriter::create(sink, config, providers(), None).unwrap();
    let body = deterministic_bytes(700 * 1024, 9);
    writer
        .add_entry(EntryMetadata::named("streamed.bin").unwrap(), &mut &body[..])
        .unwrap();
    writer
        .add_entry(EntryMetadata::named("tiny.txt").unwrap(), &mut &b"tail"[..])
        .unwrap();
    writer.close().unwrap();
    let bytes = writer.into_sink().into_inner();

    let mut reader = ArchiveReader::open(Cursor::new(bytes), providers()).unwrap();
    let header = reader.file_header();
    assert!(header.stream_mode);
    assert!(!header.random_access);
    assert_eq!(header.trailer_offset, 0);
    assert_eq!(header.entry_count, 0); // never back-patched

    assert_eq!(reader.entry_count(), 2);
    let trailer = reader.trailer().unwrap();
    assert_eq!(trailer.entry_count, 2);
    assert!(trailer.records.is_empty());

    assert_eq!(reader.open_entry(0).unwrap().read_to_vec().unwrap(), body);
    assert_eq!(reader.open_entry(1).unwrap().read_to_vec().unwrap(), b"tail");
}

#[test]
fn test_idempotent_close_writes_no_extra_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("close-twice.apack");
    let sink = FileSink::create(&path).unwrap();
    let mut writer =
        ArchiveWriter::create(sink, ArchiveConfig::default(), providers(), None).unwrap();
    writer
        .add_entry(EntryMetadata::named("only.txt").unwrap(), &mut &b"body"[..])
        .unwrap();
    writer.close().unwrap();
    let len_after_first = std::fs::metadata(&path).unwrap().len();
    writer.close().unwrap();
    let len_after_second = std::fs::metadata(&path).unwrap().len();
    assert_eq!(len_after_first, len_after_second);
}

#[test]
fn test_sequential_entry_streams() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sequential.apack");
    write_archive(
        &path,
        ArchiveConfig::default(),
        &[("a.txt", b"first"), ("b.txt", b"second")],
        None,
    )
    .unwrap();

    let mut reader = ArchiveReader::open_path(&path, providers()).unwrap();
    {
        let mut first = reader.open_entry(0).unwrap();
        let mut contents = String::new();
        first.read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "first");
    }
    // The previous stream is gone; the reader is free again.
    assert_eq!(reader.open_entry(1).unwrap().read_to_vec().unwrap(), b"second");
}

#[test]
fn test_recovery_from_unpatched_header() {
    use apack_domain::{ChecksumAlgorithm, FileHeader};

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("recover.apack");
    write_archive(
        &path,
        ArchiveConfig::default(),
        &[("a.txt", b"alpha"), ("b.txt", b"beta")],
        None,
    )
    .unwrap();

    // Simulate a crash before back-patching: rewrite the header with zero
    // entry count and trailer offset (and a matching self-checksum).
    let mut contents = std::fs::read(&path).unwrap();
    let original = FileHeader::decode(&contents[..64]).unwrap();
    let provisional = FileHeader {
        entry_count: 0,
        trailer_offset: 0,
        ..original
    };
    let checksum = apack::Providers::full().checksum(ChecksumAlgorithm::Xxh3_64).unwrap();
    contents[..64].copy_from_slice(&provisional.encode(checksum.as_ref()).unwrap());
    std::fs::write(&path, &contents).unwrap();

    // Explicit scan-from-end recovery rebuilds the index from the TOC.
    let file = std::fs::File::open(&path).unwrap();
    let mut reader =
        ArchiveReader::open_with_recovery(std::io::BufReader::new(file), providers(), None).unwrap();
    assert_eq!(reader.entry_count(), 2);
    assert_eq!(reader.open_entry(1).unwrap().read_to_vec().unwrap(), b"beta");
}

#[test]
fn test_entry_lookup_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lookup.apack");
    write_archive(&path, ArchiveConfig::default(), &[("only.txt", b"x")], None).unwrap();

    let mut reader = ArchiveReader::open_path(&path, providers()).unwrap();
    assert_eq!(reader.entry(7).unwrap_err().category(), "not-found");
    assert_eq!(reader.open_entry(7).unwrap_err().category(), "not-found");
    assert!(reader.entry_by_name("missing.txt").is_none());
}
