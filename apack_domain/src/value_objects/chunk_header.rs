// /////////////////////////////////////////////////////////////////////////////
// APACK
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk Header
//!
//! The fixed 24-byte header preceding every chunk payload:
//!
//! ```text
//! index (u32) | stored_len (u32) | original_len (u32) |
//! checksum (u64) | flags (u16) | reserved (u16)
//! ```
//!
//! `checksum` is the checksum of the chunk's *plaintext* — the bytes before
//! any pipeline stage ran — so the reader verifies it after undoing every
//! stage. `stored_len` is the payload length as it sits on disk, after all
//! enabled stages. The flags record per-chunk truth: a chunk whose
//! compressed form would have been larger than its input is stored raw with
//! the compressed flag cleared, regardless of the entry's configured codec.

use crate::value_objects::wire::{ByteReader, ByteWriter};
use crate::ApackError;

/// Fixed size of a chunk header in bytes.
pub const CHUNK_HEADER_SIZE: usize = 24;

/// The payload was actually compressed (governs decoding of this chunk).
pub const CHUNK_FLAG_COMPRESSED: u16 = 1 << 0;

/// Reed–Solomon parity framing is present on the payload.
pub const CHUNK_FLAG_ECC_PARITY: u16 = 1 << 1;

const KNOWN_FLAGS: u16 = CHUNK_FLAG_COMPRESSED | CHUNK_FLAG_ECC_PARITY;

/// Decoded representation of a 24-byte chunk header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    /// Chunk index within its entry, strictly increasing from 0.
    pub index: u32,
    /// On-disk payload length after all pipeline stages.
    pub stored_len: u32,
    /// Plaintext length before any stage; at most the configured chunk size.
    pub original_len: u32,
    /// Checksum of the plaintext bytes.
    pub checksum: u64,
    /// Per-chunk stage flags.
    pub flags: u16,
}

impl ChunkHeader {
    pub fn is_compressed(&self) -> bool {
        self.flags & CHUNK_FLAG_COMPRESSED != 0
    }

    pub fn has_ecc_parity(&self) -> bool {
        self.flags & CHUNK_FLAG_ECC_PARITY != 0
    }

    /// Serializes to exactly [`CHUNK_HEADER_SIZE`] bytes.
    pub fn encode(&self) -> [u8; CHUNK_HEADER_SIZE] {
        let mut writer = ByteWriter::with_capacity(CHUNK_HEADER_SIZE);
        writer.put_u32(self.index);
        writer.put_u32(self.stored_len);
        writer.put_u32(self.original_len);
        writer.put_u64(self.checksum);
        writer.put_u16(self.flags);
        writer.put_u16(0);
        let body = writer.into_bytes();
        let mut bytes = [0u8; CHUNK_HEADER_SIZE];
        bytes.copy_from_slice(&body);
        bytes
    }

    /// Parses a chunk header, rejecting unknown flag bits and short buffers.
    pub fn decode(buf: &[u8]) -> Result<Self, ApackError> {
        let mut reader = ByteReader::new(buf);
        let index = reader.read_u32("chunk index")?;
        let stored_len = reader.read_u32("chunk stored length")?;
        let original_len = reader.read_u32("chunk original length")?;
        let checksum = reader.read_u64("chunk checksum")?;
        let flags = reader.read_u16("chunk flags")?;
        reader.read_u16("chunk reserved")?;
        if flags & !KNOWN_FLAGS != 0 {
            return Err(ApackError::Format(format!("unknown chunk flags 0x{:04x}", flags)));
        }
        Ok(ChunkHeader {
            index,
            stored_len,
            original_len,
            checksum,
            flags,
        })
    }
}
