// /////////////////////////////////////////////////////////////////////////////
// APACK
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Checksum Provider Contract
//!
//! Checksums protect every header and every chunk payload in an APACK
//! archive. The archive stores which algorithm is in use as a one-byte id in
//! the file header; all header self-checksums and chunk plaintext checksums
//! in that archive use the same algorithm.
//!
//! Output is always presented as a `u64` regardless of the underlying digest
//! width: CRC-32 is zero-extended, XXH3-64 is used as-is, and XXH3-128 is
//! folded by XOR of its high and low halves so it fits the fixed 8-byte
//! checksum slots of the on-disk layouts.

use crate::ApackError;
use serde::{Deserialize, Serialize};

/// Checksum algorithms recognized by the archive format.
///
/// The id space is closed: `{0: crc-32, 1: xxh3-64, 2: xxh3-128}`. Unknown
/// ids encountered while parsing fail with a format error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChecksumAlgorithm {
    Crc32,
    Xxh3_64,
    Xxh3_128,
}

impl ChecksumAlgorithm {
    /// The on-disk algorithm id.
    pub fn id(&self) -> u8 {
        match self {
            ChecksumAlgorithm::Crc32 => 0,
            ChecksumAlgorithm::Xxh3_64 => 1,
            ChecksumAlgorithm::Xxh3_128 => 2,
        }
    }

    /// Resolves an on-disk id, rejecting ids outside the closed enumeration.
    pub fn from_id(id: u8) -> Result<Self, ApackError> {
        match id {
            0 => Ok(ChecksumAlgorithm::Crc32),
            1 => Ok(ChecksumAlgorithm::Xxh3_64),
            2 => Ok(ChecksumAlgorithm::Xxh3_128),
            other => Err(ApackError::Format(format!("unknown checksum algorithm id {}", other))),
        }
    }
}

impl std::fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChecksumAlgorithm::Crc32 => write!(f, "crc-32"),
            ChecksumAlgorithm::Xxh3_64 => write!(f, "xxh3-64"),
            ChecksumAlgorithm::Xxh3_128 => write!(f, "xxh3-128"),
        }
    }
}

/// Single-use streaming checksum state.
///
/// Obtained from [`ChecksumProvider::begin`]; fed with `update` and consumed
/// by `finalize`. Instances are never reused.
pub trait ChecksumHasher {
    fn update(&mut self, data: &[u8]);
    fn finalize(self: Box<Self>) -> u64;
}

/// Stateless checksum factory.
///
/// Implementations must be deterministic and endian-neutral in their output
/// representation: the same bytes always produce the same `u64` on every
/// platform.
pub trait ChecksumProvider: Send + Sync {
    /// The algorithm this provider implements.
    fn algorithm(&self) -> ChecksumAlgorithm;

    /// Starts a fresh single-use hasher.
    fn begin(&self) -> Box<dyn ChecksumHasher>;

    /// One-shot convenience over `begin`/`update`/`finalize`.
    fn compute(&self, data: &[u8]) -> u64 {
        let mut hasher = self.begin();
        hasher.update(data);
        hasher.finalize()
    }
}
