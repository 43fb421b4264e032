// /////////////////////////////////////////////////////////////////////////////
// APACK
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Shared helpers for the integration suites.
#![allow(dead_code)]

use apack::{ArchiveWriter, EntryMetadata, FileSink, Providers};
use apack_domain::{ApackError, ArchiveConfig, Secret};
use std::path::Path;
use std::sync::Arc;

pub fn providers() -> Arc<Providers> {
    Arc::new(Providers::full())
}

/// Deterministic pseudo-random bytes (LCG); no RNG dependency in tests.
pub fn deterministic_bytes(len: usize, seed: u32) -> Vec<u8> {
    let mut state = seed;
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(1664525).wrapping_add(1013904223);
            (state >> 24) as u8
        })
        .collect()
}

/// Writes `entries` into a fresh archive at `path` and closes it.
pub fn write_archive(
    path: &Path,
    config: ArchiveConfig,
    entries: &[(&str, &[u8])],
    password: Option<&[u8]>,
) -> Result<(), ApackError> {
    let sink = FileSink::create(path)?;
    let secret = password.map(Secret::Password);
    let mut writer = ArchiveWriter::create(sink, config, providers(), secret)?;
    for (name, bytes) in entries {
        writer.add_entry(EntryMetadata::named(*name)?, &mut &bytes[..])?;
    }
    writer.close()
}

/// Flips one bit at `offset` in the file at `path`.
pub fn flip_bit(path: &Path, offset: u64) {
    let mut contents = std::fs::read(path).unwrap();
    contents[offset as usize] ^= 0x01;
    std::fs::write(path, contents).unwrap();
}

/// Byte offset of the first chunk header for the first entry of an archive
/// whose first entry has the given name, no MIME type, and no attributes.
pub fn first_chunk_header_offset(name: &str) -> u64 {
    // file header + entry header (fixed 32 + name + mime + attr count + checksum)
    64 + 32 + (2 + name.len() as u64) + 2 + 2 + 8
}
