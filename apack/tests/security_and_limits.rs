// /////////////////////////////////////////////////////////////////////////////
// APACK
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Hostile-input behavior: encryption and passwords, tamper detection,
//! decompression-bomb guards, ECC repair, and verification reports.

mod common;

use apack::ArchiveReader;
use apack_domain::{
    ApackError, ArchiveConfig, ChunkSize, CompressionAlgorithm, CompressionLevel, EccConfig,
    EncryptionAlgorithm, KdfAlgorithm, KdfParams, Secret,
};
use common::{deterministic_bytes, first_chunk_header_offset, flip_bit, providers, write_archive};

const PASSWORD: &[u8] = b"correct horse battery staple";

/// Argon2id costs matching the format's recommended profile, as used by the
/// encryption scenarios.
fn encrypted_config() -> ArchiveConfig {
    ArchiveConfig::builder()
        .encryption(EncryptionAlgorithm::Aes256Gcm, KdfAlgorithm::Argon2id)
        .kdf_params(KdfParams {
            iterations: 3,
            memory_kib: 65536,
            parallelism: 4,
        })
        .build()
        .unwrap()
}

#[test]
fn test_encryption_round_trip_and_wrong_password() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("secret.apack");
    let body = deterministic_bytes(1024 * 1024, 0xC0FFEE);
    write_archive(&path, encrypted_config(), &[("vault.bin", &body)], Some(PASSWORD)).unwrap();

    // Correct password round-trips.
    let mut reader =
        ArchiveReader::open_path_with_secret(&path, providers(), Secret::Password(PASSWORD)).unwrap();
    assert!(reader.file_header().encrypted);
    assert_eq!(
        reader.entry(0).unwrap().encryption(),
        Some(EncryptionAlgorithm::Aes256Gcm)
    );
    let block = reader.encryption_block().unwrap();
    assert_eq!(block.kdf, KdfAlgorithm::Argon2id);
    assert_eq!(block.kdf_params.iterations, 3);
    assert_eq!(block.kdf_params.memory_kib, 65536);
    assert_eq!(block.kdf_params.parallelism, 4);
    assert_eq!(reader.open_entry(0).unwrap().read_to_vec().unwrap(), body);

    // Any other password is an AEAD failure with the constant message.
    let err = ArchiveReader::open_path_with_secret(&path, providers(), Secret::Password(b"wrong"))
        .unwrap_err();
    assert!(matches!(err, ApackError::Aead));
    assert_eq!(err.to_string(), "authentication failed");
}

#[test]
fn test_pass_through_mode_exposes_metadata_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("metadata-only.apack");
    write_archive(&path, encrypted_config(), &[("hidden.bin", b"secret bytes")], Some(PASSWORD))
        .unwrap();

    let mut reader = ArchiveReader::open_path(&path, providers()).unwrap();
    assert!(!reader.has_content_key());
    assert_eq!(reader.entry(0).unwrap().name(), "hidden.bin");
    assert_eq!(reader.entry(0).unwrap().original_size(), 12);

    // Content is unreachable without the key.
    let err = reader.open_entry(0).unwrap_err();
    assert_eq!(err.category(), "configuration");
}

#[test]
fn test_chunk_payload_tamper_plain_archive() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tamper-plain.apack");
    let body = deterministic_bytes(100 * 1024, 0xAB);
    write_archive(&path, ArchiveConfig::default(), &[("data.bin", &body)], None).unwrap();

    // Flip one bit at offset 80 of the first chunk's payload.
    let payload_start = first_chunk_header_offset("data.bin") + 24;
    flip_bit(&path, payload_start + 80);

    let mut reader = ArchiveReader::open_path(&path, providers()).unwrap();
    let err = reader.open_entry(0).unwrap().read_to_vec().unwrap_err();
    assert_eq!(err.category(), "integrity");
}

#[test]
fn test_chunk_payload_tamper_encrypted_archive() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tamper-enc.apack");
    let body = deterministic_bytes(100 * 1024, 0xCD);
    write_archive(&path, encrypted_config(), &[("data.bin", &body)], Some(PASSWORD)).unwrap();

    // The payload begins after the encryption block; locate it from the
    // entry's recorded layout instead of a fixed offset.
    let file_len = std::fs::metadata(&path).unwrap().len();
    flip_bit(&path, file_len / 2);

    let mut reader =
        ArchiveReader::open_path_with_secret(&path, providers(), Secret::Password(PASSWORD)).unwrap();
    let err = reader.open_entry(0).unwrap().read_to_vec().unwrap_err();
    assert_eq!(err.category(), "aead");
}

#[test]
fn test_header_tampers_never_succeed_silently() {
    let dir = tempfile::tempdir().unwrap();

    // File header bit flip.
    let path = dir.path().join("tamper-file-header.apack");
    write_archive(&path, ArchiveConfig::default(), &[("data.bin", b"payload")], None).unwrap();
    flip_bit(&path, 25); // inside entry_count
    let err = ArchiveReader::open_path(&path, providers()).unwrap_err();
    assert!(err.is_data_error(), "got {:?}", err);

    // Entry header bit flip.
    let path = dir.path().join("tamper-entry-header.apack");
    write_archive(&path, ArchiveConfig::default(), &[("data.bin", b"payload")], None).unwrap();
    flip_bit(&path, 64 + 12); // inside the entry's original_size
    let err = ArchiveReader::open_path(&path, providers()).unwrap_err();
    assert!(err.is_data_error(), "got {:?}", err);

    // Chunk header bit flip (checksum field).
    let path = dir.path().join("tamper-chunk-header.apack");
    write_archive(&path, ArchiveConfig::default(), &[("data.bin", b"payload")], None).unwrap();
    let checksum_field = first_chunk_header_offset("data.bin") + 12;
    flip_bit(&path, checksum_field);
    let mut reader = ArchiveReader::open_path(&path, providers()).unwrap();
    let err = reader.open_entry(0).unwrap().read_to_vec().unwrap_err();
    assert!(err.is_data_error(), "got {:?}", err);

    // Encryption block bit flip: opening with the right password fails as
    // if the password were wrong.
    let path = dir.path().join("tamper-encryption-block.apack");
    write_archive(&path, encrypted_config(), &[("data.bin", b"payload")], Some(PASSWORD)).unwrap();
    flip_bit(&path, 64 + 20); // inside the salt
    let err = ArchiveReader::open_path_with_secret(&path, providers(), Secret::Password(PASSWORD))
        .unwrap_err();
    assert!(err.is_data_error(), "got {:?}", err);
}

#[test]
fn test_crafted_bomb_header_rejected_before_allocation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bomb.apack");
    let config = ArchiveConfig::builder()
        .chunk_size(ChunkSize::from_kib(64).unwrap())
        .build()
        .unwrap();
    write_archive(&path, config, &[("bomb.bin", &[0u8; 32])], None).unwrap();

    // Rewrite the chunk header's original_len to 10 × chunk_size × ratio
    // while leaving stored_len at 32.
    let mut contents = std::fs::read(&path).unwrap();
    let original_len_field = (first_chunk_header_offset("bomb.bin") + 8) as usize;
    let claimed: u32 = 10 * 64 * 1024 * 100;
    contents[original_len_field..original_len_field + 4].copy_from_slice(&claimed.to_le_bytes());
    std::fs::write(&path, contents).unwrap();

    let mut reader = ArchiveReader::open_path(&path, providers()).unwrap();
    let err = reader.open_entry(0).unwrap().read_to_vec().unwrap_err();
    assert_eq!(err.category(), "bomb");
}

#[test]
fn test_ecc_repairs_chunk_damage_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ecc.apack");
    let config = ArchiveConfig::builder().ecc(EccConfig::default()).build().unwrap();
    let body = deterministic_bytes(50 * 1024, 0xECC);
    write_archive(&path, config, &[("protected.bin", &body)], None).unwrap();

    // Damage a byte inside the first data shard of the chunk payload.
    let payload_start = first_chunk_header_offset("protected.bin") + 24;
    flip_bit(&path, payload_start + 1000);

    let mut reader = ArchiveReader::open_path(&path, providers()).unwrap();
    let entry = reader.entry(0).unwrap();
    assert!(entry.has_ecc());
    let id = entry.id();
    assert_eq!(reader.open_entry(id).unwrap().read_to_vec().unwrap(), body);

    let report = reader.verify_all().unwrap();
    assert!(report.is_clean());
    assert_eq!(report.corrected_chunks, 1);
}

#[test]
fn test_verify_reports_clean_and_tampered_archives() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("verify.apack");
    let config = ArchiveConfig::builder()
        .compression(CompressionAlgorithm::Zstd, CompressionLevel::Balanced)
        .build()
        .unwrap();
    let first = deterministic_bytes(300 * 1024, 1);
    let second = deterministic_bytes(10 * 1024, 2);
    write_archive(&path, config, &[("one.bin", &first), ("two.bin", &second)], None).unwrap();

    let mut reader = ArchiveReader::open_path(&path, providers()).unwrap();
    let report = reader.verify_all().unwrap();
    assert!(report.is_clean());
    assert_eq!(report.entries_verified, 2);
    assert!(report.chunks_verified >= 2);
    drop(reader);

    // Damage entry 0 and verify again: the finding names the entry, and
    // the intact entry still verifies.
    let payload_start = first_chunk_header_offset("one.bin") + 24;
    flip_bit(&path, payload_start + 500);
    let mut reader = ArchiveReader::open_path(&path, providers()).unwrap();
    let report = reader.verify_all().unwrap();
    assert!(!report.is_clean());
    assert_eq!(report.findings.len(), 1);
    assert_eq!(report.findings[0].entry_id, 0);
    assert_eq!(report.entries_verified, 1);
}

#[test]
fn test_verify_single_entry() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("verify-one.apack");
    write_archive(
        &path,
        ArchiveConfig::default(),
        &[("a.bin", b"aaaa"), ("b.bin", b"bbbb")],
        None,
    )
    .unwrap();

    let mut reader = ArchiveReader::open_path(&path, providers()).unwrap();
    let report = reader.verify_entry(1).unwrap();
    assert!(report.is_clean());
    assert_eq!(report.chunks_verified, 1);
    assert_eq!(reader.verify_entry(9).unwrap_err().category(), "not-found");
}

#[test]
fn test_chacha20_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chacha.apack");
    let config = ArchiveConfig::builder()
        .encryption(EncryptionAlgorithm::ChaCha20Poly1305, KdfAlgorithm::Pbkdf2Sha256)
        .kdf_params(KdfParams {
            iterations: 1000,
            memory_kib: 0,
            parallelism: 1,
        })
        .compression(CompressionAlgorithm::Lz4, CompressionLevel::Fast)
        .ecc(EccConfig::default())
        .build()
        .unwrap();
    let body = deterministic_bytes(600 * 1024, 0x77);
    write_archive(&path, config, &[("full-stack.bin", &body)], Some(PASSWORD)).unwrap();

    let mut reader =
        ArchiveReader::open_path_with_secret(&path, providers(), Secret::Password(PASSWORD)).unwrap();
    assert_eq!(reader.open_entry(0).unwrap().read_to_vec().unwrap(), body);
    let report = reader.verify_all().unwrap();
    assert!(report.is_clean());
}
