// /////////////////////////////////////////////////////////////////////////////
// APACK
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # File Header
//!
//! The fixed 64-byte header at offset 0 of every APACK archive.
//!
//! ## Layout (all integers little-endian)
//!
//! ```text
//! off len field
//!   0   5 magic "APACK" (41 50 41 43 4B)
//!   5   1 format version major
//!   6   1 format version minor
//!   7   1 flags (bit0 random-access, bit1 encrypted, bit2 stream-mode)
//!   8   4 default chunk size
//!  12   1 checksum algorithm id
//!  13   3 reserved
//!  16   8 creation timestamp, ms since Unix epoch
//!  24   8 entry count
//!  32   8 trailer offset
//!  40  16 reserved
//!  56   8 self-checksum over bytes [0, 56)
//! ```
//!
//! The writer emits a provisional header with `entry_count` and
//! `trailer_offset` zero, then rewrites it at close when the sink is
//! seekable. The self-checksum uses the algorithm named by the header
//! itself, so decoding is two-phase: [`FileHeader::decode`] parses and
//! validates structure, then the caller resolves the checksum provider and
//! calls [`FileHeader::verify_checksum`].

use crate::services::{ChecksumAlgorithm, ChecksumProvider};
use crate::value_objects::wire::{ByteReader, ByteWriter};
use crate::ApackError;
use serde::Serialize;

/// Magic bytes identifying an APACK archive: `41 50 41 43 4B`.
pub const MAGIC: [u8; 5] = *b"APACK";

/// Fixed size of the file header in bytes.
pub const FILE_HEADER_SIZE: usize = 64;

/// Current format version.
pub const FORMAT_VERSION_MAJOR: u8 = 1;
pub const FORMAT_VERSION_MINOR: u8 = 0;

/// The archive carries a trailer with a table of contents.
pub const FILE_FLAG_RANDOM_ACCESS: u8 = 1 << 0;

/// An encryption block follows the header and chunk payloads are encrypted.
pub const FILE_FLAG_ENCRYPTED: u8 = 1 << 1;

/// The archive was written to a non-seekable sink.
pub const FILE_FLAG_STREAM_MODE: u8 = 1 << 2;

const KNOWN_FLAGS: u8 = FILE_FLAG_RANDOM_ACCESS | FILE_FLAG_ENCRYPTED | FILE_FLAG_STREAM_MODE;

/// Offset of the self-checksum field; the checksum covers `[0, this)`.
const CHECKSUM_OFFSET: usize = FILE_HEADER_SIZE - 8;

/// Decoded representation of the 64-byte file header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileHeader {
    pub version_major: u8,
    pub version_minor: u8,
    pub random_access: bool,
    pub encrypted: bool,
    pub stream_mode: bool,
    pub chunk_size: u32,
    pub checksum_algorithm: ChecksumAlgorithm,
    pub created_at_ms: u64,
    pub entry_count: u64,
    pub trailer_offset: u64,
}

impl FileHeader {
    /// Flag byte synthesized from the boolean fields.
    pub fn flags(&self) -> u8 {
        let mut flags = 0u8;
        if self.random_access {
            flags |= FILE_FLAG_RANDOM_ACCESS;
        }
        if self.encrypted {
            flags |= FILE_FLAG_ENCRYPTED;
        }
        if self.stream_mode {
            flags |= FILE_FLAG_STREAM_MODE;
        }
        flags
    }

    /// Serializes to exactly [`FILE_HEADER_SIZE`] bytes, computing the
    /// self-checksum with `checksum`.
    ///
    /// # Errors
    ///
    /// `ApackError::Configuration` when the provider does not match
    /// `checksum_algorithm` or the flag combination is contradictory;
    /// `ApackError::Format` when a field is out of range.
    pub fn encode(&self, checksum: &dyn ChecksumProvider) -> Result<[u8; FILE_HEADER_SIZE], ApackError> {
        if checksum.algorithm() != self.checksum_algorithm {
            return Err(ApackError::Configuration(format!(
                "header names checksum {} but provider implements {}",
                self.checksum_algorithm,
                checksum.algorithm()
            )));
        }
        if self.stream_mode && self.random_access {
            return Err(ApackError::Configuration(
                "stream mode and random access are mutually exclusive".to_string(),
            ));
        }
        if self.chunk_size == 0 {
            return Err(ApackError::Format("chunk size must not be zero".to_string()));
        }

        let mut writer = ByteWriter::with_capacity(FILE_HEADER_SIZE);
        writer.put_slice(&MAGIC);
        writer.put_u8(self.version_major);
        writer.put_u8(self.version_minor);
        writer.put_u8(self.flags());
        writer.put_u32(self.chunk_size);
        writer.put_u8(self.checksum_algorithm.id());
        writer.put_slice(&[0u8; 3]);
        writer.put_u64(self.created_at_ms);
        writer.put_u64(self.entry_count);
        writer.put_u64(self.trailer_offset);
        writer.put_slice(&[0u8; 16]);

        let mut bytes = [0u8; FILE_HEADER_SIZE];
        let body = writer.into_bytes();
        debug_assert_eq!(body.len(), CHECKSUM_OFFSET);
        bytes[..CHECKSUM_OFFSET].copy_from_slice(&body);
        let digest = checksum.compute(&bytes[..CHECKSUM_OFFSET]);
        bytes[CHECKSUM_OFFSET..].copy_from_slice(&digest.to_le_bytes());
        Ok(bytes)
    }

    /// Parses a header from `buf`, validating magic, version, flags, and
    /// structural invariants. Does not verify the self-checksum — callers
    /// resolve the provider named by the header and then call
    /// [`Self::verify_checksum`] on the same bytes.
    pub fn decode(buf: &[u8]) -> Result<Self, ApackError> {
        if buf.len() < FILE_HEADER_SIZE {
            return Err(ApackError::Format(format!(
                "file header needs {} bytes, got {}",
                FILE_HEADER_SIZE,
                buf.len()
            )));
        }
        let mut reader = ByteReader::new(&buf[..FILE_HEADER_SIZE]);
        let magic: [u8; 5] = reader.read_array("magic")?;
        if magic != MAGIC {
            return Err(ApackError::Format("bad magic: not an APACK archive".to_string()));
        }
        let version_major = reader.read_u8("version major")?;
        let version_minor = reader.read_u8("version minor")?;
        if version_major != FORMAT_VERSION_MAJOR {
            return Err(ApackError::Format(format!(
                "unsupported format version {}.{} (supported: {}.{})",
                version_major, version_minor, FORMAT_VERSION_MAJOR, FORMAT_VERSION_MINOR
            )));
        }
        let flags = reader.read_u8("flags")?;
        if flags & !KNOWN_FLAGS != 0 {
            return Err(ApackError::Format(format!("unknown header flags 0x{:02x}", flags)));
        }
        let random_access = flags & FILE_FLAG_RANDOM_ACCESS != 0;
        let stream_mode = flags & FILE_FLAG_STREAM_MODE != 0;
        if random_access && stream_mode {
            return Err(ApackError::Format(
                "header sets both random-access and stream-mode".to_string(),
            ));
        }
        let chunk_size = reader.read_u32("chunk size")?;
        if chunk_size == 0 {
            return Err(ApackError::Format("chunk size must not be zero".to_string()));
        }
        let checksum_algorithm = ChecksumAlgorithm::from_id(reader.read_u8("checksum algorithm id")?)?;
        reader.read_slice(3, "reserved")?;
        let created_at_ms = reader.read_u64("creation timestamp")?;
        let entry_count = reader.read_u64("entry count")?;
        let trailer_offset = reader.read_u64("trailer offset")?;

        Ok(FileHeader {
            version_major,
            version_minor,
            random_access,
            encrypted: flags & FILE_FLAG_ENCRYPTED != 0,
            stream_mode,
            chunk_size,
            checksum_algorithm,
            created_at_ms,
            entry_count,
            trailer_offset,
        })
    }

    /// Verifies the self-checksum of raw header bytes against the resolved
    /// provider. `buf` must be the same bytes [`Self::decode`] parsed.
    pub fn verify_checksum(buf: &[u8], checksum: &dyn ChecksumProvider) -> Result<(), ApackError> {
        if buf.len() < FILE_HEADER_SIZE {
            return Err(ApackError::Format("file header buffer too short".to_string()));
        }
        let mut stored = [0u8; 8];
        stored.copy_from_slice(&buf[CHECKSUM_OFFSET..FILE_HEADER_SIZE]);
        let computed = checksum.compute(&buf[..CHECKSUM_OFFSET]);
        if u64::from_le_bytes(stored) != computed {
            return Err(ApackError::Format("file header checksum mismatch".to_string()));
        }
        Ok(())
    }
}
