// /////////////////////////////////////////////////////////////////////////////
// APACK
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Compression Providers
//!
//! ZSTD (levels 1–22) and LZ4 block compression behind the domain's
//! `CompressionProvider` contract. Decompression is capped by the caller's
//! `max_output`: both codecs bound their output buffer and fail instead of
//! growing past it, which is what makes crafted-chunk decompression bombs a
//! cheap rejection rather than an allocation.
//!
//! The LZ4 block codec has a single speed profile; the level argument is
//! accepted for interface uniformity and ignored.

use apack_domain::{ApackError, CompressionAlgorithm, CompressionLevel, CompressionProvider};

/// ZSTD codec. Named levels map onto the codec's 1–22 range.
#[derive(Debug)]
pub struct ZstdCompression;

impl ZstdCompression {
    fn numeric_level(level: CompressionLevel) -> i32 {
        match level {
            CompressionLevel::Fastest => 1,
            CompressionLevel::Fast => 3,
            CompressionLevel::Balanced => 6,
            CompressionLevel::Best => 19,
            CompressionLevel::Custom(value) => value.clamp(1, 22) as i32,
        }
    }
}

impl CompressionProvider for ZstdCompression {
    fn algorithm(&self) -> CompressionAlgorithm {
        CompressionAlgorithm::Zstd
    }

    fn encode(&self, data: &[u8], level: CompressionLevel) -> Result<Vec<u8>, ApackError> {
        zstd::bulk::compress(data, Self::numeric_level(level))
            .map_err(|err| ApackError::Io(format!("zstd compression failed: {}", err)))
    }

    fn decode(&self, data: &[u8], max_output: usize) -> Result<Vec<u8>, ApackError> {
        zstd::bulk::decompress(data, max_output).map_err(|err| {
            ApackError::Bomb(format!(
                "zstd decompression failed or exceeded {} bytes: {}",
                max_output, err
            ))
        })
    }
}

/// LZ4 block codec.
#[derive(Debug)]
pub struct Lz4Compression;

impl CompressionProvider for Lz4Compression {
    fn algorithm(&self) -> CompressionAlgorithm {
        CompressionAlgorithm::Lz4
    }

    fn encode(&self, data: &[u8], _level: CompressionLevel) -> Result<Vec<u8>, ApackError> {
        Ok(lz4_flex::block::compress(data))
    }

    fn decode(&self, data: &[u8], max_output: usize) -> Result<Vec<u8>, ApackError> {
        lz4_flex::block::decompress(data, max_output).map_err(|err| {
            ApackError::Bomb(format!(
                "lz4 decompression failed or exceeded {} bytes: {}",
                max_output, err
            ))
        })
    }
}
