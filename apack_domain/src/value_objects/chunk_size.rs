// /////////////////////////////////////////////////////////////////////////////
// APACK
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk Size Value Object
//!
//! Type-safe representation of the archive's chunk size. Chunks are the unit
//! of the processing pipeline — each carries its own header and checksum —
//! so the size bounds below bound both per-chunk memory use and the blast
//! radius of a corrupted chunk.
//!
//! ## Constraints
//!
//! - **Minimum**: 1 KiB. Smaller chunks make the fixed 24-byte chunk header
//!   dominate the payload.
//! - **Maximum**: 64 MiB. Chunks are buffered whole through the pipeline.
//! - **Default**: 256 KiB, a reasonable balance for asset and save-file
//!   workloads.

use crate::ApackError;
use serde::{Deserialize, Serialize};

/// Validated chunk size.
///
/// Immutable once constructed; two chunk sizes are equal when their byte
/// counts are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChunkSize {
    bytes: u32,
}

impl ChunkSize {
    /// Minimum chunk size (1 KiB).
    pub const MIN_SIZE: u32 = 1024;

    /// Maximum chunk size (64 MiB).
    pub const MAX_SIZE: u32 = 64 * 1024 * 1024;

    /// Default chunk size (256 KiB).
    pub const DEFAULT_SIZE: u32 = 256 * 1024;

    /// Creates a chunk size, validating the bounds.
    ///
    /// # Errors
    ///
    /// Returns `ApackError::Configuration` when `bytes` is below
    /// [`Self::MIN_SIZE`] or above [`Self::MAX_SIZE`].
    pub fn new(bytes: u32) -> Result<Self, ApackError> {
        if bytes < Self::MIN_SIZE {
            return Err(ApackError::Configuration(format!(
                "chunk size {} is below the minimum of {} bytes",
                bytes,
                Self::MIN_SIZE
            )));
        }
        if bytes > Self::MAX_SIZE {
            return Err(ApackError::Configuration(format!(
                "chunk size {} exceeds the maximum of {} bytes",
                bytes,
                Self::MAX_SIZE
            )));
        }
        Ok(ChunkSize { bytes })
    }

    /// Creates a chunk size from kibibytes.
    pub fn from_kib(kib: u32) -> Result<Self, ApackError> {
        kib.checked_mul(1024)
            .ok_or_else(|| {
                ApackError::Configuration(format!("chunk size {} KiB overflows a 32-bit byte count", kib))
            })
            .and_then(Self::new)
    }

    /// Creates a chunk size from mebibytes.
    pub fn from_mib(mib: u32) -> Result<Self, ApackError> {
        mib.checked_mul(1024 * 1024)
            .ok_or_else(|| {
                ApackError::Configuration(format!("chunk size {} MiB overflows a 32-bit byte count", mib))
            })
            .and_then(Self::new)
    }

    /// The size in bytes.
    pub fn bytes(&self) -> u32 {
        self.bytes
    }

    /// The size in bytes as a `usize`, for buffer sizing.
    pub fn as_usize(&self) -> usize {
        self.bytes as usize
    }

    /// Number of chunks an entry of `entry_size` bytes splits into.
    /// Zero-byte entries have zero chunks.
    pub fn chunks_needed(&self, entry_size: u64) -> u64 {
        if entry_size == 0 {
            return 0;
        }
        entry_size.div_ceil(u64::from(self.bytes))
    }
}

impl Default for ChunkSize {
    fn default() -> Self {
        ChunkSize {
            bytes: Self::DEFAULT_SIZE,
        }
    }
}

impl std::fmt::Display for ChunkSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.bytes % (1024 * 1024) == 0 {
            write!(f, "{}MiB", self.bytes / (1024 * 1024))
        } else {
            write!(f, "{}KiB", self.bytes / 1024)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_enforced() {
        assert!(ChunkSize::new(1024).is_ok());
        assert!(ChunkSize::new(64 * 1024 * 1024).is_ok());
        assert!(ChunkSize::new(1023).is_err());
        assert!(ChunkSize::new(64 * 1024 * 1024 + 1).is_err());
        assert!(ChunkSize::new(0).is_err());
    }

    #[test]
    fn test_default_is_256_kib() {
        assert_eq!(ChunkSize::default().bytes(), 256 * 1024);
    }

    #[test]
    fn test_unit_constructors() {
        assert_eq!(ChunkSize::from_kib(64).unwrap().bytes(), 64 * 1024);
        assert_eq!(ChunkSize::from_mib(1).unwrap().bytes(), 1024 * 1024);
        assert!(ChunkSize::from_mib(65).is_err());
        assert!(ChunkSize::from_kib(u32::MAX).is_err());
    }

    #[test]
    fn test_chunks_needed() {
        let size = ChunkSize::from_kib(64).unwrap();
        assert_eq!(size.chunks_needed(0), 0);
        assert_eq!(size.chunks_needed(1), 1);
        assert_eq!(size.chunks_needed(64 * 1024), 1);
        // One byte past the boundary needs a second chunk.
        assert_eq!(size.chunks_needed(64 * 1024 + 1), 2);
        assert_eq!(size.chunks_needed(512 * 1024), 8);
    }

    #[test]
    fn test_display() {
        assert_eq!(ChunkSize::from_kib(256).unwrap().to_string(), "256KiB");
        assert_eq!(ChunkSize::from_mib(2).unwrap().to_string(), "2MiB");
    }
}
