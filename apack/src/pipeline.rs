// /////////////////////////////////////////////////////////////////////////////
// APACK
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk Pipeline
//!
//! Applies the per-chunk stages in their fixed order and undoes them in the
//! exact inverse order:
//!
//! ```text
//! write: checksum → compress → encrypt → ECC → emit
//! read:  ECC → decrypt → decompress → verify checksum
//! ```
//!
//! ## Contracts Enforced Here
//!
//! - The plaintext checksum is computed before any transformation and
//!   recorded in the chunk header; readers verify it after undoing every
//!   stage.
//! - Compression is skipped for a chunk (stored raw, compressed flag
//!   cleared) when the compressed form is at least as large as the input,
//!   bounding worst-case inflation.
//! - Encryption binds each chunk to its position with AAD
//!   `entry_id (8B LE) ‖ chunk_index (4B LE)`, so reordered or spliced
//!   chunks fail authentication.
//! - Size limits: a chunk's stored payload may not exceed the configured
//!   cap, and a chunk header claiming more plaintext than the chunk size
//!   allows is rejected before any allocation. Both are the `bomb` kind.
//!
//! The pipeline is stateless across chunks; it borrows the content key per
//! call and holds no key material itself.

use apack_domain::value_objects::{ChunkHeader, CHUNK_FLAG_COMPRESSED, CHUNK_FLAG_ECC_PARITY};
use apack_domain::{
    ApackError, ChecksumProvider, CompressionLevel, CompressionProvider, ContentKey, EccProvider,
    EncryptionProvider,
};
use std::sync::Arc;
use tracing::trace;

/// Associated data binding a chunk to its entry and position.
fn chunk_aad(entry_id: u64, chunk_index: u32) -> [u8; 12] {
    let mut aad = [0u8; 12];
    aad[..8].copy_from_slice(&entry_id.to_le_bytes());
    aad[8..].copy_from_slice(&chunk_index.to_le_bytes());
    aad
}

/// Size limits the pipeline enforces on both directions.
#[derive(Debug, Clone, Copy)]
pub struct PipelineLimits {
    /// Configured chunk size; no chunk's plaintext may exceed it.
    pub chunk_size: u32,
    /// Cap on a chunk's stored (post-pipeline) payload length.
    pub max_stored_len: u32,
    /// Decompressed-size ratio guard.
    pub max_ratio: u32,
}

impl PipelineLimits {
    /// Absolute cap on what a decompressor may be asked to produce.
    pub fn decompression_cap(&self) -> u64 {
        u64::from(self.chunk_size) * u64::from(self.max_ratio)
    }
}

/// A chunk after the write-side stages: header plus transformed payload.
#[derive(Debug, Clone)]
pub struct EncodedChunk {
    pub header: ChunkHeader,
    pub payload: Vec<u8>,
}

/// A chunk after the read-side stages.
#[derive(Debug, Clone)]
pub struct DecodedChunk {
    pub plaintext: Vec<u8>,
    /// Shards the ECC stage had to reconstruct (0 when intact or disabled).
    pub corrected_shards: usize,
}

/// Ordered composition of the per-chunk stages.
pub struct ChunkPipeline {
    checksum: Arc<dyn ChecksumProvider>,
    compression: Option<(Arc<dyn CompressionProvider>, CompressionLevel)>,
    encryption: Option<Arc<dyn EncryptionProvider>>,
    ecc: Option<Arc<dyn EccProvider>>,
    limits: PipelineLimits,
}

impl ChunkPipeline {
    pub fn new(
        checksum: Arc<dyn ChecksumProvider>,
        compression: Option<(Arc<dyn CompressionProvider>, CompressionLevel)>,
        encryption: Option<Arc<dyn EncryptionProvider>>,
        ecc: Option<Arc<dyn EccProvider>>,
        limits: PipelineLimits,
    ) -> Self {
        ChunkPipeline {
            checksum,
            compression,
            encryption,
            ecc,
            limits,
        }
    }

    pub fn limits(&self) -> PipelineLimits {
        self.limits
    }

    /// Runs the write-side stages over one chunk of plaintext.
    ///
    /// `key` is required when an encryption stage is configured.
    pub fn encode_chunk(
        &self,
        plaintext: &[u8],
        entry_id: u64,
        chunk_index: u32,
        key: Option<&ContentKey>,
    ) -> Result<EncodedChunk, ApackError> {
        if plaintext.len() > self.limits.chunk_size as usize {
            return Err(ApackError::Format(format!(
                "chunk plaintext is {} bytes, chunk size is {}",
                plaintext.len(),
                self.limits.chunk_size
            )));
        }

        let checksum = self.checksum.compute(plaintext);
        let mut flags = 0u16;
        let mut payload: Vec<u8>;

        // Stage: compression, skipped when it would not shrink the chunk.
        match &self.compression {
            Some((provider, level)) => {
                let compressed = provider.encode(plaintext, *level)?;
                if compressed.len() < plaintext.len() {
                    flags |= CHUNK_FLAG_COMPRESSED;
                    payload = compressed;
                } else {
                    trace!(
                        chunk_index,
                        original = plaintext.len(),
                        compressed = compressed.len(),
                        "storing chunk uncompressed"
                    );
                    payload = plaintext.to_vec();
                }
            }
            None => payload = plaintext.to_vec(),
        }

        // Stage: authenticated encryption, bound to entry id and index.
        if let Some(provider) = &self.encryption {
            let key = key.ok_or_else(|| {
                ApackError::Configuration("encryption configured but no content key supplied".to_string())
            })?;
            payload = provider.encrypt(&payload, key, &chunk_aad(entry_id, chunk_index))?;
        }

        // Stage: Reed-Solomon parity framing.
        if let Some(provider) = &self.ecc {
            payload = provider.encode(&payload)?;
            flags |= CHUNK_FLAG_ECC_PARITY;
        }

        let stored_len = u32::try_from(payload.len())
            .map_err(|_| ApackError::Bomb("chunk stored length exceeds 32 bits".to_string()))?;
        if stored_len > self.limits.max_stored_len {
            return Err(ApackError::Bomb(format!(
                "chunk stored length {} exceeds the configured cap {}",
                stored_len, self.limits.max_stored_len
            )));
        }

        Ok(EncodedChunk {
            header: ChunkHeader {
                index: chunk_index,
                stored_len,
                original_len: plaintext.len() as u32,
                checksum,
                flags,
            },
            payload,
        })
    }

    /// Runs the read-side stages over one stored chunk.
    ///
    /// The caller has already matched `header.index` against the expected
    /// position; this method enforces the size limits, undoes the stages in
    /// inverse order, and verifies the plaintext checksum last.
    pub fn decode_chunk(
        &self,
        header: &ChunkHeader,
        payload: &[u8],
        entry_id: u64,
        key: Option<&ContentKey>,
    ) -> Result<DecodedChunk, ApackError> {
        if payload.len() != header.stored_len as usize {
            return Err(ApackError::Format(format!(
                "chunk {} payload is {} bytes but header says {}",
                header.index,
                payload.len(),
                header.stored_len
            )));
        }
        if header.stored_len > self.limits.max_stored_len {
            return Err(ApackError::Bomb(format!(
                "chunk {} stored length {} exceeds the configured cap {}",
                header.index, header.stored_len, self.limits.max_stored_len
            )));
        }
        // Both guards precede any allocation: the ratio cap catches crafted
        // headers, the chunk-size bound catches everything milder.
        if u64::from(header.original_len) > self.limits.decompression_cap() {
            return Err(ApackError::Bomb(format!(
                "chunk {} claims {} plaintext bytes, ratio cap is {}",
                header.index,
                header.original_len,
                self.limits.decompression_cap()
            )));
        }
        if header.original_len > self.limits.chunk_size {
            return Err(ApackError::Bomb(format!(
                "chunk {} claims {} plaintext bytes, chunk size is {}",
                header.index, header.original_len, self.limits.chunk_size
            )));
        }

        // Stage: ECC verify/correct.
        let mut corrected_shards = 0;
        let mut data: Vec<u8>;
        if header.has_ecc_parity() {
            let provider = self.ecc.as_ref().ok_or_else(|| {
                ApackError::Format(format!(
                    "chunk {} carries ECC parity but no ECC provider is configured",
                    header.index
                ))
            })?;
            let outcome = provider.decode(payload)?;
            if outcome.corrected_shards > 0 {
                tracing::warn!(
                    chunk_index = header.index,
                    corrected = outcome.corrected_shards,
                    "reed-solomon corrected damaged shards"
                );
            }
            corrected_shards = outcome.corrected_shards;
            data = outcome.payload;
        } else {
            data = payload.to_vec();
        }

        // Stage: authenticated decryption.
        if let Some(provider) = &self.encryption {
            let key = key.ok_or_else(|| {
                ApackError::Configuration("entry is encrypted but no content key supplied".to_string())
            })?;
            data = provider.decrypt(&data, key, &chunk_aad(entry_id, header.index))?;
        }

        // Stage: decompression, governed by the per-chunk flag.
        if header.is_compressed() {
            let (provider, _) = self.compression.as_ref().ok_or_else(|| {
                ApackError::Format(format!(
                    "chunk {} is compressed but no compression provider is configured",
                    header.index
                ))
            })?;
            // The cap handed to the codec is the already-validated claim, so
            // a failure here means a corrupted stream, not an oversized one.
            data = provider
                .decode(&data, header.original_len as usize)
                .map_err(|err| match err {
                    ApackError::Bomb(detail) => ApackError::Integrity(format!(
                        "chunk {} decompression failed: {}",
                        header.index, detail
                    )),
                    other => other,
                })?;
        }

        // Stage: plaintext verification, last so it covers every stage.
        if data.len() != header.original_len as usize {
            return Err(ApackError::Integrity(format!(
                "chunk {} decoded to {} bytes, header says {}",
                header.index,
                data.len(),
                header.original_len
            )));
        }
        let computed = self.checksum.compute(&data);
        if computed != header.checksum {
            return Err(ApackError::Integrity(format!(
                "chunk {} checksum mismatch",
                header.index
            )));
        }

        Ok(DecodedChunk {
            plaintext: data,
            corrected_shards,
        })
    }
}
