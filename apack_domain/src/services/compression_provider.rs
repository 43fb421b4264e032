// /////////////////////////////////////////////////////////////////////////////
// APACK
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Compression Provider Contract
//!
//! Per-chunk compression for the archive pipeline. Compression is optional
//! and per-archive; the chosen codec's id is recorded in each entry header,
//! and a per-chunk flag records whether the chunk was actually compressed
//! (the pipeline stores a chunk raw when compression would inflate it).
//!
//! ## Decompression Bombs
//!
//! `decode` takes a hard `max_output` cap and must fail rather than produce
//! more bytes. The pipeline derives the cap from the configured chunk size
//! and decompression ratio, so a crafted chunk cannot force a large
//! allocation.

use crate::ApackError;
use serde::{Deserialize, Serialize};

/// Compression codecs recognized by the archive format.
///
/// The id space is closed: `{0: none, 1: zstd, 2: lz4}`. Id 0 is represented
/// as the absence of a codec (`Option<CompressionAlgorithm>`) rather than a
/// variant, so a present algorithm is always a real codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompressionAlgorithm {
    Zstd,
    Lz4,
}

impl CompressionAlgorithm {
    /// The on-disk algorithm id.
    pub fn id(&self) -> u8 {
        match self {
            CompressionAlgorithm::Zstd => 1,
            CompressionAlgorithm::Lz4 => 2,
        }
    }

    /// Resolves an on-disk id. Id 0 means "no compression" and yields
    /// `None`; unknown ids fail with a format error.
    pub fn from_id(id: u8) -> Result<Option<Self>, ApackError> {
        match id {
            0 => Ok(None),
            1 => Ok(Some(CompressionAlgorithm::Zstd)),
            2 => Ok(Some(CompressionAlgorithm::Lz4)),
            other => Err(ApackError::Format(format!(
                "unknown compression algorithm id {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for CompressionAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompressionAlgorithm::Zstd => write!(f, "zstd"),
            CompressionAlgorithm::Lz4 => write!(f, "lz4"),
        }
    }
}

/// Compression level settings balancing speed against ratio.
///
/// The named levels map onto codec-specific numeric levels inside each
/// provider; `Custom` passes a raw level through, clamped to the codec's
/// supported range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompressionLevel {
    /// Minimal compression, maximum speed.
    Fastest,
    /// Light compression with good speed.
    Fast,
    /// Balanced speed and ratio. The default.
    Balanced,
    /// Maximum ratio, slower processing.
    Best,
    /// Codec-specific raw level.
    Custom(u32),
}

impl Default for CompressionLevel {
    fn default() -> Self {
        CompressionLevel::Balanced
    }
}

/// Per-chunk compression codec.
///
/// Implementations are stateless and thread-safe; both directions operate on
/// whole chunk buffers. Streaming variants are an implementation detail the
/// pipeline does not require.
pub trait CompressionProvider: Send + Sync + std::fmt::Debug {
    /// The codec this provider implements.
    fn algorithm(&self) -> CompressionAlgorithm;

    /// Compresses `data` at the given level.
    fn encode(&self, data: &[u8], level: CompressionLevel) -> Result<Vec<u8>, ApackError>;

    /// Decompresses `data`, producing at most `max_output` bytes.
    ///
    /// Exceeding the cap — whether claimed up front or discovered while
    /// decoding — must fail with the `bomb` error kind before an oversized
    /// buffer is materialized.
    fn decode(&self, data: &[u8], max_output: usize) -> Result<Vec<u8>, ApackError>;
}
