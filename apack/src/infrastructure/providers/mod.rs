// /////////////////////////////////////////////////////////////////////////////
// APACK
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Provider Registry
//!
//! Explicit registry of the capability implementations a writer or reader
//! works with. The caller constructs a [`Providers`] value — usually
//! [`Providers::full`] — and passes it in; there is no service discovery,
//! no global registry, and misconfiguration surfaces at constructor time.
//!
//! Lookups are keyed by the domain algorithm enums. Asking for an algorithm
//! that was not registered is a format error, because it means an archive
//! names an algorithm this process cannot decode.

pub mod checksum;
pub mod compression;
pub mod ecc;
pub mod encryption;
pub mod key_derivation;

use apack_domain::{
    ApackError, ChecksumAlgorithm, ChecksumProvider, CompressionAlgorithm, CompressionProvider,
    EccConfig, EccProvider, EncryptionAlgorithm, EncryptionProvider, KdfAlgorithm, KdfParams,
    KeyDerivation,
};
use std::sync::Arc;

/// Capability registry handed to writers and readers.
///
/// Cloning is cheap; all slots hold shared, stateless providers.
#[derive(Clone, Default)]
pub struct Providers {
    compression: Vec<Arc<dyn CompressionProvider>>,
    encryption: Vec<Arc<dyn EncryptionProvider>>,
    checksum: Vec<Arc<dyn ChecksumProvider>>,
    kdf: Vec<Arc<dyn KeyDerivation>>,
    ecc: Option<Arc<dyn EccProvider>>,
}

impl Providers {
    /// An empty registry. Useful for metadata-only tooling that never
    /// touches chunk payloads.
    pub fn empty() -> Self {
        Providers::default()
    }

    /// Registers every implementation this crate ships: ZSTD and LZ4
    /// compression, AES-256-GCM and ChaCha20-Poly1305 encryption, XXH3-64,
    /// XXH3-128 and CRC-32 checksums, Argon2id and PBKDF2-SHA256 key
    /// derivation, and the default 4+2 Reed–Solomon geometry.
    pub fn full() -> Self {
        Providers::empty()
            .with_compression(Arc::new(compression::ZstdCompression))
            .with_compression(Arc::new(compression::Lz4Compression))
            .with_encryption(Arc::new(encryption::Aes256GcmEncryption::new()))
            .with_encryption(Arc::new(encryption::ChaCha20Poly1305Encryption::new()))
            .with_checksum(Arc::new(checksum::Xxh3_64Checksum))
            .with_checksum(Arc::new(checksum::Xxh3_128Checksum))
            .with_checksum(Arc::new(checksum::Crc32Checksum))
            .with_kdf(Arc::new(key_derivation::Argon2idKdf::default()))
            .with_kdf(Arc::new(key_derivation::Pbkdf2Sha256Kdf::default()))
            .with_ecc(Arc::new(ecc::ReedSolomonEcc::new(EccConfig::default())))
    }

    pub fn with_compression(mut self, provider: Arc<dyn CompressionProvider>) -> Self {
        self.compression.retain(|p| p.algorithm() != provider.algorithm());
        self.compression.push(provider);
        self
    }

    pub fn with_encryption(mut self, provider: Arc<dyn EncryptionProvider>) -> Self {
        self.encryption.retain(|p| p.algorithm() != provider.algorithm());
        self.encryption.push(provider);
        self
    }

    pub fn with_checksum(mut self, provider: Arc<dyn ChecksumProvider>) -> Self {
        self.checksum.retain(|p| p.algorithm() != provider.algorithm());
        self.checksum.push(provider);
        self
    }

    pub fn with_kdf(mut self, provider: Arc<dyn KeyDerivation>) -> Self {
        self.kdf.retain(|p| p.algorithm() != provider.algorithm());
        self.kdf.push(provider);
        self
    }

    pub fn with_ecc(mut self, provider: Arc<dyn EccProvider>) -> Self {
        self.ecc = Some(provider);
        self
    }

    pub fn compression(&self, algorithm: CompressionAlgorithm) -> Result<Arc<dyn CompressionProvider>, ApackError> {
        self.compression
            .iter()
            .find(|p| p.algorithm() == algorithm)
            .cloned()
            .ok_or_else(|| ApackError::Format(format!("no compression provider registered for {}", algorithm)))
    }

    pub fn encryption(&self, algorithm: EncryptionAlgorithm) -> Result<Arc<dyn EncryptionProvider>, ApackError> {
        self.encryption
            .iter()
            .find(|p| p.algorithm() == algorithm)
            .cloned()
            .ok_or_else(|| ApackError::Format(format!("no encryption provider registered for {}", algorithm)))
    }

    pub fn checksum(&self, algorithm: ChecksumAlgorithm) -> Result<Arc<dyn ChecksumProvider>, ApackError> {
        self.checksum
            .iter()
            .find(|p| p.algorithm() == algorithm)
            .cloned()
            .ok_or_else(|| ApackError::Format(format!("no checksum provider registered for {}", algorithm)))
    }

    /// Resolves a KDF provider configured with `params`. KDF instances
    /// carry their cost parameters, so the lookup constructs a provider
    /// bound to the exact parameters recorded in the encryption block.
    pub fn kdf(&self, algorithm: KdfAlgorithm, params: KdfParams) -> Result<Arc<dyn KeyDerivation>, ApackError> {
        self.kdf
            .iter()
            .find(|p| p.algorithm() == algorithm)
            .map(|_| match algorithm {
                KdfAlgorithm::Argon2id => {
                    Arc::new(key_derivation::Argon2idKdf::new(params)) as Arc<dyn KeyDerivation>
                }
                KdfAlgorithm::Pbkdf2Sha256 => {
                    Arc::new(key_derivation::Pbkdf2Sha256Kdf::new(params)) as Arc<dyn KeyDerivation>
                }
            })
            .ok_or_else(|| ApackError::Format(format!("no KDF provider registered for {}", algorithm)))
    }

    pub fn ecc(&self) -> Result<Arc<dyn EccProvider>, ApackError> {
        self.ecc
            .clone()
            .ok_or_else(|| ApackError::Format("no ECC provider registered".to_string()))
    }

    pub fn has_ecc(&self) -> bool {
        self.ecc.is_some()
    }
}
