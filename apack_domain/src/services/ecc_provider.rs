// /////////////////////////////////////////////////////////////////////////////
// APACK
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Error-Correction Provider Contract
//!
//! Optional forward error correction for chunk payloads. When enabled, the
//! final write stage of the pipeline frames the (possibly compressed and
//! encrypted) payload with Reed–Solomon parity so that localized on-disk
//! damage can be repaired on read.
//!
//! Correction is a single best-effort attempt per chunk: either the decode
//! step returns the intact payload (possibly after reconstructing damaged
//! shards), or it fails with the `integrity` error kind. It is never
//! retried.

use crate::ApackError;
use serde::{Deserialize, Serialize};

/// Reed–Solomon geometry: how many data shards a payload is split into and
/// how many parity shards are appended.
///
/// Up to `parity_shards` damaged shards per chunk can be reconstructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EccConfig {
    pub data_shards: u16,
    pub parity_shards: u16,
}

impl EccConfig {
    /// Validates the shard geometry.
    pub fn validate(&self) -> Result<(), ApackError> {
        if self.data_shards == 0 {
            return Err(ApackError::Configuration(
                "ECC data shard count must be at least 1".to_string(),
            ));
        }
        if self.parity_shards == 0 {
            return Err(ApackError::Configuration(
                "ECC parity shard count must be at least 1".to_string(),
            ));
        }
        if self.parity_shards > self.data_shards {
            return Err(ApackError::Configuration(format!(
                "ECC parity shard count {} exceeds data shard count {}",
                self.parity_shards, self.data_shards
            )));
        }
        Ok(())
    }
}

impl Default for EccConfig {
    fn default() -> Self {
        EccConfig {
            data_shards: 4,
            parity_shards: 2,
        }
    }
}

/// Result of an ECC decode: the recovered payload and how many shards had to
/// be reconstructed to produce it (zero when the stored bytes were intact).
#[derive(Debug, Clone)]
pub struct EccOutcome {
    pub payload: Vec<u8>,
    pub corrected_shards: usize,
}

/// Forward error correction stage.
pub trait EccProvider: Send + Sync + std::fmt::Debug {
    /// The shard geometry this provider encodes with.
    fn config(&self) -> EccConfig;

    /// Frames `payload` with parity and location metadata.
    fn encode(&self, payload: &[u8]) -> Result<Vec<u8>, ApackError>;

    /// Recovers the original payload from a framed buffer, reconstructing up
    /// to `parity_shards` damaged shards. Uncorrectable damage is an
    /// `integrity` error.
    fn decode(&self, framed: &[u8]) -> Result<EccOutcome, ApackError>;
}
