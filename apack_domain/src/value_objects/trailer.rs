// /////////////////////////////////////////////////////////////////////////////
// APACK
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Trailer and Table of Contents
//!
//! Written at close, at the offset recorded in the file header. The trailer
//! carries the TOC that gives readers O(1) random access without scanning
//! entry headers.
//!
//! ## Layout
//!
//! ```text
//! off len field
//!   0   8 magic "APACKTOC"
//!   8   8 entry count
//!  16   8 global checksum (over every chunk record in file order; 0 if absent)
//!  24   8 file header back-reference (offset of the file header)
//!  32   1 header flags copy (random-access cleared in stream mode)
//!  33   1 trailer flags (bit0: global checksum present)
//!  34   6 reserved
//!  40   … TOC records
//!   …   8 trailer checksum (over all preceding trailer bytes)
//! ```
//!
//! Each TOC record is `entry id (u64) | entry header offset (u64) |
//! original size (u64) | stored size (u64) | name (u16 len + UTF-8)`.
//!
//! After the trailer, the final 8 bytes of the file repeat the trailer
//! offset as a back-pointer so tools can recover the TOC by scanning from
//! the end even when the file header was never back-patched. Stream-mode
//! archives write the same structure with an empty TOC.

use crate::services::ChecksumProvider;
use crate::value_objects::wire::{ByteReader, ByteWriter};
use crate::ApackError;
use serde::Serialize;

/// Magic bytes opening the trailer: `41 50 41 43 4B 54 4F 43`.
pub const TRAILER_MAGIC: [u8; 8] = *b"APACKTOC";

/// Size of the end-of-file trailer-offset back-pointer.
pub const TRAILER_BACK_POINTER_SIZE: usize = 8;

const FIXED_PREFIX_LEN: usize = 40;
const TRAILER_FLAG_GLOBAL_CHECKSUM: u8 = 1 << 0;

/// One table-of-contents record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TocRecord {
    pub entry_id: u64,
    pub header_offset: u64,
    pub original_size: u64,
    pub stored_size: u64,
    pub name: String,
}

/// Decoded trailer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trailer {
    /// Number of entries in the archive. Matches `records.len()` except in
    /// stream mode, where the TOC is empty but the count is still recorded.
    pub entry_count: u64,
    /// Checksum over every chunk record (header and payload, in file
    /// order), when present. Excludes the back-patched headers so the
    /// digest is stable across finalization.
    pub global_checksum: Option<u64>,
    /// Offset of the file header this trailer belongs to.
    pub header_offset: u64,
    /// Copy of the file header flag byte, with random-access cleared when
    /// the archive was written in stream mode.
    pub header_flags: u8,
    pub records: Vec<TocRecord>,
}

impl Trailer {
    /// Serializes the trailer, computing its checksum with `checksum`. The
    /// end-of-file back-pointer is not part of this buffer — the writer
    /// appends it separately once the trailer offset is known.
    pub fn encode(&self, checksum: &dyn ChecksumProvider) -> Result<Vec<u8>, ApackError> {
        let mut writer = ByteWriter::new();
        writer.put_slice(&TRAILER_MAGIC);
        writer.put_u64(self.entry_count);
        writer.put_u64(self.global_checksum.unwrap_or(0));
        writer.put_u64(self.header_offset);
        writer.put_u8(self.header_flags);
        writer.put_u8(if self.global_checksum.is_some() {
            TRAILER_FLAG_GLOBAL_CHECKSUM
        } else {
            0
        });
        writer.put_slice(&[0u8; 6]);
        for record in &self.records {
            writer.put_u64(record.entry_id);
            writer.put_u64(record.header_offset);
            writer.put_u64(record.original_size);
            writer.put_u64(record.stored_size);
            writer.put_bytes16(record.name.as_bytes(), "TOC entry name")?;
        }
        let mut bytes = writer.into_bytes();
        let digest = checksum.compute(&bytes);
        bytes.extend_from_slice(&digest.to_le_bytes());
        Ok(bytes)
    }

    /// Parses and verifies a trailer from the front of `buf`, returning the
    /// trailer and the number of bytes consumed. Record parsing is bounded
    /// by the number of TOC records implied by the stored entry count; a
    /// trailer claiming more records than fit in `buf` is malformed.
    pub fn decode(buf: &[u8], checksum: &dyn ChecksumProvider) -> Result<(Self, usize), ApackError> {
        if buf.len() < FIXED_PREFIX_LEN + 8 {
            return Err(ApackError::Format("trailer is shorter than its fixed prefix".to_string()));
        }
        let mut reader = ByteReader::new(buf);
        let magic: [u8; 8] = reader.read_array("trailer magic")?;
        if magic != TRAILER_MAGIC {
            return Err(ApackError::Format("bad trailer magic".to_string()));
        }
        let entry_count = reader.read_u64("trailer entry count")?;
        let global_checksum_raw = reader.read_u64("global checksum")?;
        let header_offset = reader.read_u64("header back-reference")?;
        let header_flags = reader.read_u8("header flags copy")?;
        let trailer_flags = reader.read_u8("trailer flags")?;
        if trailer_flags & !TRAILER_FLAG_GLOBAL_CHECKSUM != 0 {
            return Err(ApackError::Format(format!(
                "unknown trailer flags 0x{:02x}",
                trailer_flags
            )));
        }
        reader.read_slice(6, "trailer reserved")?;

        // The TOC is either empty (stream mode) or holds one record per
        // entry. Which of the two a well-formed trailer has is decided by
        // whether anything precedes the checksum field.
        let mut records = Vec::new();
        if reader.remaining() > 8 {
            if entry_count > (buf.len() / 32) as u64 {
                return Err(ApackError::Format(format!(
                    "trailer claims {} entries but only {} bytes remain",
                    entry_count,
                    buf.len()
                )));
            }
            for _ in 0..entry_count {
                let entry_id = reader.read_u64("TOC entry id")?;
                let header_offset = reader.read_u64("TOC header offset")?;
                let original_size = reader.read_u64("TOC original size")?;
                let stored_size = reader.read_u64("TOC stored size")?;
                let name = reader.read_string16("TOC entry name")?;
                records.push(TocRecord {
                    entry_id,
                    header_offset,
                    original_size,
                    stored_size,
                    name,
                });
            }
        }

        let checksummed_len = reader.position();
        let stored = reader.read_u64("trailer checksum")?;
        let computed = checksum.compute(&buf[..checksummed_len]);
        if stored != computed {
            return Err(ApackError::Format("trailer checksum mismatch".to_string()));
        }

        if !records.is_empty() && records.len() as u64 != entry_count {
            return Err(ApackError::Format(format!(
                "trailer TOC has {} records but entry count says {}",
                records.len(),
                entry_count
            )));
        }

        Ok((
            Trailer {
                entry_count,
                global_checksum: if trailer_flags & TRAILER_FLAG_GLOBAL_CHECKSUM != 0 {
                    Some(global_checksum_raw)
                } else {
                    None
                },
                header_offset,
                header_flags,
                records,
            },
            reader.position(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::testing::TestChecksum;

    fn sample_trailer() -> Trailer {
        Trailer {
            entry_count: 2,
            global_checksum: Some(0x1234_5678_9ABC_DEF0),
            header_offset: 0,
            header_flags: 0x01,
            records: vec![
                TocRecord {
                    entry_id: 0,
                    header_offset: 64,
                    original_size: 13,
                    stored_size: 13,
                    name: "hello.txt".to_string(),
                },
                TocRecord {
                    entry_id: 1,
                    header_offset: 150,
                    original_size: 1024,
                    stored_size: 400,
                    name: "data/blob.bin".to_string(),
                },
            ],
        }
    }

    #[test]
    fn test_round_trip() {
        let checksum = TestChecksum::xxh3_64();
        let trailer = sample_trailer();
        let bytes = trailer.encode(&checksum).unwrap();
        assert!(bytes.len() >= 48);
        let (decoded, consumed) = Trailer::decode(&bytes, &checksum).unwrap();
        assert_eq!(decoded, trailer);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn test_stream_mode_trailer_round_trip() {
        let checksum = TestChecksum::xxh3_64();
        let trailer = Trailer {
            entry_count: 5,
            global_checksum: None,
            header_offset: 0,
            header_flags: 0x04,
            records: Vec::new(),
        };
        let bytes = trailer.encode(&checksum).unwrap();
        assert_eq!(bytes.len(), 48); // minimum trailer: fixed prefix + checksum
        let (decoded, _) = Trailer::decode(&bytes, &checksum).unwrap();
        assert_eq!(decoded.entry_count, 5);
        assert!(decoded.records.is_empty());
        assert_eq!(decoded.global_checksum, None);
    }

    #[test]
    fn test_bit_flip_detected() {
        let checksum = TestChecksum::xxh3_64();
        let mut bytes = sample_trailer().encode(&checksum).unwrap();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0x80;
        assert!(Trailer::decode(&bytes, &checksum).is_err());
    }

    #[test]
    fn test_bad_magic_rejected() {
        let checksum = TestChecksum::xxh3_64();
        let mut bytes = sample_trailer().encode(&checksum).unwrap();
        bytes[3] = b'!';
        let err = Trailer::decode(&bytes, &checksum).unwrap_err();
        assert!(err.to_string().contains("magic"));
    }

    #[test]
    fn test_overclaimed_entry_count_rejected() {
        let checksum = TestChecksum::xxh3_64();
        let mut trailer = sample_trailer();
        trailer.entry_count = u64::MAX;
        let bytes = trailer.encode(&checksum).unwrap();
        assert!(Trailer::decode(&bytes, &checksum).is_err());
    }
}
