// /////////////////////////////////////////////////////////////////////////////
// APACK
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Archive Configuration
//!
//! The immutable configuration a writer is created with and a reader infers
//! from an archive's headers. All invariants are validated when the builder
//! finishes and re-checked when a writer or reader binds the configuration,
//! so a constructed `ArchiveConfig` is always internally consistent.
//!
//! Secrets are deliberately *not* part of the configuration: algorithm
//! choices and KDF cost parameters live here, while the password or raw
//! content key is handed to the writer/reader at construction and retained
//! only as the derived key. This keeps the configuration cloneable and
//! loggable without ever touching key material.

use crate::services::{
    ChecksumAlgorithm, CompressionAlgorithm, CompressionLevel, EccConfig, EncryptionAlgorithm,
    KdfAlgorithm, KdfParams,
};
use crate::value_objects::chunk_size::ChunkSize;
use crate::ApackError;
use serde::Serialize;

/// Compression choice: codec plus level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompressionSettings {
    pub algorithm: CompressionAlgorithm,
    pub level: CompressionLevel,
}

/// Encryption choice: cipher plus the KDF used to wrap the content key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EncryptionSettings {
    pub cipher: EncryptionAlgorithm,
    pub kdf: KdfAlgorithm,
    pub kdf_params: KdfParams,
}

/// Immutable archive configuration.
///
/// Construct through [`ArchiveConfig::builder`]; defaults are a 256 KiB
/// chunk size, XXH3-64 checksums, no compression, no encryption, no ECC,
/// random access on, stream mode off.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchiveConfig {
    chunk_size: ChunkSize,
    checksum: ChecksumAlgorithm,
    compression: Option<CompressionSettings>,
    encryption: Option<EncryptionSettings>,
    ecc: Option<EccConfig>,
    random_access: bool,
    stream_mode: bool,
    max_stored_chunk_len: u32,
    max_decompression_ratio: u32,
}

impl ArchiveConfig {
    /// Default cap on a single chunk's stored payload length (128 MiB).
    pub const DEFAULT_MAX_STORED_CHUNK_LEN: u32 = 128 * 1024 * 1024;

    /// Default decompressed-size ratio guard.
    pub const DEFAULT_MAX_DECOMPRESSION_RATIO: u32 = 100;

    pub fn builder() -> ArchiveConfigBuilder {
        ArchiveConfigBuilder::default()
    }

    pub fn chunk_size(&self) -> ChunkSize {
        self.chunk_size
    }

    pub fn checksum(&self) -> ChecksumAlgorithm {
        self.checksum
    }

    pub fn compression(&self) -> Option<CompressionSettings> {
        self.compression
    }

    pub fn encryption(&self) -> Option<EncryptionSettings> {
        self.encryption
    }

    pub fn ecc(&self) -> Option<EccConfig> {
        self.ecc
    }

    pub fn random_access(&self) -> bool {
        self.random_access
    }

    pub fn stream_mode(&self) -> bool {
        self.stream_mode
    }

    pub fn max_stored_chunk_len(&self) -> u32 {
        self.max_stored_chunk_len
    }

    pub fn max_decompression_ratio(&self) -> u32 {
        self.max_decompression_ratio
    }

    /// Largest decompressed chunk size the pipeline will accept.
    pub fn decompression_cap(&self) -> u64 {
        u64::from(self.chunk_size.bytes()) * u64::from(self.max_decompression_ratio)
    }

    /// Re-checks the invariants. Run by the builder and again when a writer
    /// or reader binds the configuration.
    pub fn validate(&self) -> Result<(), ApackError> {
        if self.stream_mode && self.random_access {
            return Err(ApackError::Configuration(
                "stream mode and random access are mutually exclusive".to_string(),
            ));
        }
        if self.max_decompression_ratio == 0 {
            return Err(ApackError::Configuration(
                "decompression ratio must be at least 1".to_string(),
            ));
        }
        if self.max_stored_chunk_len < self.chunk_size.bytes() {
            return Err(ApackError::Configuration(format!(
                "stored-chunk cap {} is smaller than the chunk size {}",
                self.max_stored_chunk_len, self.chunk_size
            )));
        }
        if let Some(encryption) = &self.encryption {
            encryption.kdf_params.validate(encryption.kdf)?;
        }
        if let Some(ecc) = &self.ecc {
            ecc.validate()?;
        }
        Ok(())
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        ArchiveConfig::builder().build().expect("default configuration is valid")
    }
}

/// Builder for [`ArchiveConfig`].
#[derive(Debug, Clone, Default)]
pub struct ArchiveConfigBuilder {
    chunk_size: Option<ChunkSize>,
    checksum: Option<ChecksumAlgorithm>,
    compression: Option<CompressionSettings>,
    encryption: Option<EncryptionSettings>,
    ecc: Option<EccConfig>,
    random_access: Option<bool>,
    stream_mode: bool,
    max_stored_chunk_len: Option<u32>,
    max_decompression_ratio: Option<u32>,
}

impl ArchiveConfigBuilder {
    pub fn chunk_size(mut self, chunk_size: ChunkSize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    pub fn checksum(mut self, algorithm: ChecksumAlgorithm) -> Self {
        self.checksum = Some(algorithm);
        self
    }

    pub fn compression(mut self, algorithm: CompressionAlgorithm, level: CompressionLevel) -> Self {
        self.compression = Some(CompressionSettings { algorithm, level });
        self
    }

    /// Enables encryption with the cipher and the KDF's recommended
    /// parameters. Override with [`Self::kdf`].
    pub fn encryption(mut self, cipher: EncryptionAlgorithm, kdf: KdfAlgorithm) -> Self {
        self.encryption = Some(EncryptionSettings {
            cipher,
            kdf,
            kdf_params: kdf.default_params(),
        });
        self
    }

    /// Overrides the KDF cost parameters. Only meaningful after
    /// [`Self::encryption`].
    pub fn kdf_params(mut self, params: KdfParams) -> Self {
        if let Some(encryption) = &mut self.encryption {
            encryption.kdf_params = params;
        }
        self
    }

    pub fn ecc(mut self, config: EccConfig) -> Self {
        self.ecc = Some(config);
        self
    }

    pub fn random_access(mut self, enabled: bool) -> Self {
        self.random_access = Some(enabled);
        self
    }

    /// Selects stream mode for non-seekable sinks. Stream mode overrides
    /// random access — the trailer is minimized and the TOC omitted.
    pub fn stream_mode(mut self, enabled: bool) -> Self {
        self.stream_mode = enabled;
        self
    }

    pub fn max_stored_chunk_len(mut self, bytes: u32) -> Self {
        self.max_stored_chunk_len = Some(bytes);
        self
    }

    pub fn max_decompression_ratio(mut self, ratio: u32) -> Self {
        self.max_decompression_ratio = Some(ratio);
        self
    }

    /// Finishes the builder, validating every invariant.
    pub fn build(self) -> Result<ArchiveConfig, ApackError> {
        let random_access = if self.stream_mode {
            // Stream mode implies random access is ignored.
            false
        } else {
            self.random_access.unwrap_or(true)
        };
        let config = ArchiveConfig {
            chunk_size: self.chunk_size.unwrap_or_default(),
            checksum: self.checksum.unwrap_or(ChecksumAlgorithm::Xxh3_64),
            compression: self.compression,
            encryption: self.encryption,
            ecc: self.ecc,
            random_access,
            stream_mode: self.stream_mode,
            max_stored_chunk_len: self
                .max_stored_chunk_len
                .unwrap_or(ArchiveConfig::DEFAULT_MAX_STORED_CHUNK_LEN),
            max_decompression_ratio: self
                .max_decompression_ratio
                .unwrap_or(ArchiveConfig::DEFAULT_MAX_DECOMPRESSION_RATIO),
        };
        config.validate()?;
        Ok(config)
    }
}
