// /////////////////////////////////////////////////////////////////////////////
// APACK
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Encryption Block
//!
//! Present immediately after the file header when the archive is encrypted.
//! Stores everything needed to reproduce the key-derivation step and unwrap
//! the content-encryption key:
//!
//! ```text
//! kdf id (u8) | cipher id (u8) | iterations (u32) | memory KiB (u32) |
//! parallelism (u32) | salt (u16 len + bytes, >= 16) | wrap nonce (12) |
//! wrapped CEK (u16 len + bytes) | wrapped-key tag (16) | checksum (u64)
//! ```
//!
//! The block checksum covers every preceding block byte with the checksum
//! field zeroed, using the archive's checksum algorithm. The wrapped key
//! itself is additionally protected by its AEAD tag; the checksum exists so
//! casual corruption is reported as a format error instead of surfacing as
//! a password failure.

use crate::services::{
    ChecksumProvider, EncryptionAlgorithm, KdfAlgorithm, KdfParams, NONCE_LEN, TAG_LEN,
};
use crate::value_objects::wire::{ByteReader, ByteWriter};
use crate::ApackError;
use serde::Serialize;

/// Minimum salt length accepted on either side of serialization.
pub const MIN_SALT_LEN: usize = 16;

/// Key-wrapping metadata for a password-protected archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncryptionBlock {
    pub kdf: KdfAlgorithm,
    pub cipher: EncryptionAlgorithm,
    pub kdf_params: KdfParams,
    pub salt: Vec<u8>,
    #[serde(skip)]
    pub wrap_nonce: [u8; NONCE_LEN],
    #[serde(skip)]
    pub wrapped_key: Vec<u8>,
    #[serde(skip)]
    pub wrapped_key_tag: [u8; TAG_LEN],
}

impl EncryptionBlock {
    fn validate(&self) -> Result<(), ApackError> {
        if self.salt.len() < MIN_SALT_LEN {
            return Err(ApackError::Format(format!(
                "encryption block salt is {} bytes, minimum is {}",
                self.salt.len(),
                MIN_SALT_LEN
            )));
        }
        if self.wrapped_key.is_empty() {
            return Err(ApackError::Format("encryption block wrapped key is empty".to_string()));
        }
        self.kdf_params
            .validate(self.kdf)
            .map_err(|err| ApackError::Format(err.to_string()))
    }

    /// Serializes the block, computing its checksum with `checksum`.
    pub fn encode(&self, checksum: &dyn ChecksumProvider) -> Result<Vec<u8>, ApackError> {
        self.validate()?;
        let mut writer = ByteWriter::new();
        writer.put_u8(self.kdf.id());
        writer.put_u8(self.cipher.id());
        writer.put_u32(self.kdf_params.iterations);
        writer.put_u32(self.kdf_params.memory_kib);
        writer.put_u32(self.kdf_params.parallelism);
        writer.put_bytes16(&self.salt, "encryption block salt")?;
        writer.put_slice(&self.wrap_nonce);
        writer.put_bytes16(&self.wrapped_key, "wrapped key")?;
        writer.put_slice(&self.wrapped_key_tag);

        let mut bytes = writer.into_bytes();
        let digest = checksum.compute(&bytes);
        bytes.extend_from_slice(&digest.to_le_bytes());
        Ok(bytes)
    }

    /// Parses and verifies a block from the front of `buf`, returning the
    /// block and the number of bytes consumed.
    pub fn decode(buf: &[u8], checksum: &dyn ChecksumProvider) -> Result<(Self, usize), ApackError> {
        let mut reader = ByteReader::new(buf);
        let kdf = KdfAlgorithm::from_id(reader.read_u8("KDF algorithm id")?)?;
        let cipher = EncryptionAlgorithm::from_id(reader.read_u8("cipher algorithm id")?)?
            .ok_or_else(|| ApackError::Format("encryption block names cipher id 0".to_string()))?;
        let kdf_params = KdfParams {
            iterations: reader.read_u32("KDF iterations")?,
            memory_kib: reader.read_u32("KDF memory cost")?,
            parallelism: reader.read_u32("KDF parallelism")?,
        };
        let salt = reader.read_bytes16("encryption block salt")?.to_vec();
        let wrap_nonce: [u8; NONCE_LEN] = reader.read_array("wrap nonce")?;
        let wrapped_key = reader.read_bytes16("wrapped key")?.to_vec();
        let wrapped_key_tag: [u8; TAG_LEN] = reader.read_array("wrapped key tag")?;

        let checksummed_len = reader.position();
        let stored = reader.read_u64("encryption block checksum")?;
        let computed = checksum.compute(&buf[..checksummed_len]);
        if stored != computed {
            return Err(ApackError::Format("encryption block checksum mismatch".to_string()));
        }

        let block = EncryptionBlock {
            kdf,
            cipher,
            kdf_params,
            salt,
            wrap_nonce,
            wrapped_key,
            wrapped_key_tag,
        };
        block.validate()?;
        Ok((block, reader.position()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::testing::TestChecksum;

    fn sample_block() -> EncryptionBlock {
        EncryptionBlock {
            kdf: KdfAlgorithm::Argon2id,
            cipher: EncryptionAlgorithm::Aes256Gcm,
            kdf_params: KdfParams {
                iterations: 3,
                memory_kib: 65536,
                parallelism: 4,
            },
            salt: vec![0x5A; 32],
            wrap_nonce: [0x11; NONCE_LEN],
            wrapped_key: vec![0x22; 32],
            wrapped_key_tag: [0x33; TAG_LEN],
        }
    }

    #[test]
    fn test_round_trip() {
        let checksum = TestChecksum::xxh3_64();
        let block = sample_block();
        let bytes = block.encode(&checksum).unwrap();
        let (decoded, consumed) = EncryptionBlock::decode(&bytes, &checksum).unwrap();
        assert_eq!(decoded, block);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn test_short_salt_rejected() {
        let checksum = TestChecksum::xxh3_64();
        let mut block = sample_block();
        block.salt = vec![0u8; 8];
        assert!(block.encode(&checksum).is_err());
    }

    #[test]
    fn test_bit_flip_detected() {
        let checksum = TestChecksum::xxh3_64();
        let mut bytes = sample_block().encode(&checksum).unwrap();
        bytes[6] ^= 0x04; // inside the iteration count
        let err = EncryptionBlock::decode(&bytes, &checksum).unwrap_err();
        assert_eq!(err.category(), "format");
    }

    #[test]
    fn test_trailing_bytes_not_consumed() {
        let checksum = TestChecksum::xxh3_64();
        let mut bytes = sample_block().encode(&checksum).unwrap();
        let block_len = bytes.len();
        bytes.extend_from_slice(&[0xEE; 24]); // next record begins here
        let (_, consumed) = EncryptionBlock::decode(&bytes, &checksum).unwrap();
        assert_eq!(consumed, block_len);
    }
}
