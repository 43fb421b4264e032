// /////////////////////////////////////////////////////////////////////////////
// APACK
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Entry Header
//!
//! The variable-length record preceding an entry's chunks.
//!
//! ## Layout
//!
//! ```text
//! header version (u8) | flags (u8) | compression id (u8) | encryption id (u8) |
//! entry id (u64) | original size (u64) | stored size (u64) | chunk count (u32) |
//! name (u16 len + UTF-8) | MIME type (u16 len + UTF-8) |
//! attribute count (u16) + attributes | checksum (u64)
//! ```
//!
//! Flag bits are synthesized from field values at serialization time and
//! cross-checked against them when decoding: `compressed ⇔ compression id ≠
//! 0`, `encrypted ⇔ encryption id ≠ 0`, `has-attributes ⇔ attribute count ≠
//! 0`. The checksum covers every preceding header byte (checksum field
//! zeroed) with the archive's checksum algorithm.
//!
//! The numeric fields ahead of the variable section sit at fixed offsets, so
//! a seekable writer can finalize `stored size` and `chunk count` by
//! rewriting the header in place after the last chunk — the header's length
//! does not change.

use crate::services::{ChecksumProvider, CompressionAlgorithm, EncryptionAlgorithm};
use crate::value_objects::attribute::Attribute;
use crate::value_objects::wire::{ByteReader, ByteWriter};
use crate::ApackError;
use serde::Serialize;

/// Current entry header version.
pub const ENTRY_HEADER_VERSION: u8 = 1;

const FLAG_COMPRESSED: u8 = 1 << 0;
const FLAG_ENCRYPTED: u8 = 1 << 1;
const FLAG_HAS_ECC: u8 = 1 << 2;
const FLAG_HAS_ATTRIBUTES: u8 = 1 << 3;
const KNOWN_FLAGS: u8 = FLAG_COMPRESSED | FLAG_ENCRYPTED | FLAG_HAS_ECC | FLAG_HAS_ATTRIBUTES;

/// Decoded representation of an entry header.
///
/// Flag bits are not stored — they are derived from these fields when
/// encoding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryHeader {
    pub version: u8,
    /// Unique entry id, assigned monotonically from 0 in arrival order.
    pub entry_id: u64,
    /// Plaintext size of the entry in bytes.
    pub original_size: u64,
    /// Sum of the on-disk chunk payload lengths (chunk headers excluded).
    pub stored_size: u64,
    pub chunk_count: u32,
    pub compression: Option<CompressionAlgorithm>,
    pub encryption: Option<EncryptionAlgorithm>,
    /// Chunks of this entry carry Reed–Solomon parity framing.
    pub ecc: bool,
    /// Entry name: non-empty UTF-8 in lexical path form with `/` separators.
    pub name: String,
    /// MIME type; may be empty.
    pub mime: String,
    pub attributes: Vec<Attribute>,
}

impl EntryHeader {
    /// Validates an entry name: non-empty UTF-8 in lexical path form with
    /// `/` separators, no empty, `.`, or `..` segments, no backslashes, no
    /// NUL, and no leading slash.
    pub fn validate_name(name: &str) -> Result<(), ApackError> {
        if name.is_empty() {
            return Err(ApackError::Format("entry name must not be empty".to_string()));
        }
        if name.contains('\\') {
            return Err(ApackError::Format(format!(
                "entry name {:?} must use '/' separators",
                name
            )));
        }
        if name.contains('\0') {
            return Err(ApackError::Format("entry name must not contain NUL".to_string()));
        }
        if name.starts_with('/') {
            return Err(ApackError::Format(format!("entry name {:?} must be relative", name)));
        }
        for segment in name.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(ApackError::Format(format!(
                    "entry name {:?} contains invalid path segment {:?}",
                    name, segment
                )));
            }
        }
        Ok(())
    }

    /// Flag byte synthesized from the field values.
    pub fn flags(&self) -> u8 {
        let mut flags = 0u8;
        if self.compression.is_some() {
            flags |= FLAG_COMPRESSED;
        }
        if self.encryption.is_some() {
            flags |= FLAG_ENCRYPTED;
        }
        if self.ecc {
            flags |= FLAG_HAS_ECC;
        }
        if !self.attributes.is_empty() {
            flags |= FLAG_HAS_ATTRIBUTES;
        }
        flags
    }

    /// Serializes the header, computing its checksum with `checksum`.
    pub fn encode(&self, checksum: &dyn ChecksumProvider) -> Result<Vec<u8>, ApackError> {
        Self::validate_name(&self.name)?;

        let mut writer = ByteWriter::new();
        writer.put_u8(self.version);
        writer.put_u8(self.flags());
        writer.put_u8(self.compression.map_or(0, |algorithm| algorithm.id()));
        writer.put_u8(self.encryption.map_or(0, |algorithm| algorithm.id()));
        writer.put_u64(self.entry_id);
        writer.put_u64(self.original_size);
        writer.put_u64(self.stored_size);
        writer.put_u32(self.chunk_count);
        writer.put_bytes16(self.name.as_bytes(), "entry name")?;
        writer.put_bytes16(self.mime.as_bytes(), "MIME type")?;

        let count = u16::try_from(self.attributes.len()).map_err(|_| {
            ApackError::Format(format!(
                "entry has {} attributes, exceeding the 16-bit count",
                self.attributes.len()
            ))
        })?;
        writer.put_u16(count);
        for attribute in &self.attributes {
            attribute.encode_into(&mut writer)?;
        }

        let mut bytes = writer.into_bytes();
        let digest = checksum.compute(&bytes);
        bytes.extend_from_slice(&digest.to_le_bytes());
        Ok(bytes)
    }

    /// Parses and verifies a header from the front of `buf`, returning the
    /// header and the number of bytes consumed.
    pub fn decode(buf: &[u8], checksum: &dyn ChecksumProvider) -> Result<(Self, usize), ApackError> {
        let mut reader = ByteReader::new(buf);
        let version = reader.read_u8("entry header version")?;
        if version != ENTRY_HEADER_VERSION {
            return Err(ApackError::Format(format!(
                "unsupported entry header version {}",
                version
            )));
        }
        let flags = reader.read_u8("entry flags")?;
        if flags & !KNOWN_FLAGS != 0 {
            return Err(ApackError::Format(format!("unknown entry flags 0x{:02x}", flags)));
        }
        let compression = CompressionAlgorithm::from_id(reader.read_u8("compression algorithm id")?)?;
        let encryption = EncryptionAlgorithm::from_id(reader.read_u8("encryption algorithm id")?)?;
        let entry_id = reader.read_u64("entry id")?;
        let original_size = reader.read_u64("original size")?;
        let stored_size = reader.read_u64("stored size")?;
        let chunk_count = reader.read_u32("chunk count")?;
        let name = reader.read_string16("entry name")?;
        let mime = reader.read_string16("MIME type")?;
        let attribute_count = reader.read_u16("attribute count")?;
        let mut attributes = Vec::with_capacity(usize::from(attribute_count));
        for _ in 0..attribute_count {
            attributes.push(Attribute::decode_from(&mut reader)?);
        }

        let checksummed_len = reader.position();
        let stored = reader.read_u64("entry header checksum")?;
        let computed = checksum.compute(&buf[..checksummed_len]);
        if stored != computed {
            return Err(ApackError::Format(format!(
                "entry header checksum mismatch for entry {}",
                entry_id
            )));
        }

        // The stored flag bits must agree with the fields they summarize.
        if (flags & FLAG_COMPRESSED != 0) != compression.is_some() {
            return Err(ApackError::Format(format!(
                "entry {} compressed flag disagrees with compression id",
                entry_id
            )));
        }
        if (flags & FLAG_ENCRYPTED != 0) != encryption.is_some() {
            return Err(ApackError::Format(format!(
                "entry {} encrypted flag disagrees with encryption id",
                entry_id
            )));
        }
        if (flags & FLAG_HAS_ATTRIBUTES != 0) != !attributes.is_empty() {
            return Err(ApackError::Format(format!(
                "entry {} attribute flag disagrees with attribute count",
                entry_id
            )));
        }
        Self::validate_name(&name)?;

        Ok((
            EntryHeader {
                version,
                entry_id,
                original_size,
                stored_size,
                chunk_count,
                compression,
                encryption,
                ecc: flags & FLAG_HAS_ECC != 0,
                name,
                mime,
                attributes,
            },
            reader.position(),
        ))
    }
}
