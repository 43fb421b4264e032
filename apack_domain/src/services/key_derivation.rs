// /////////////////////////////////////////////////////////////////////////////
// APACK
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Key Derivation Contract
//!
//! Password-based archives derive a key-encryption key (KEK) from the
//! caller's password with a deliberately slow KDF. The KDF's parameters are
//! part of the provider's state so they can be serialized into the
//! encryption block and reproduced exactly on open.

use crate::ApackError;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// Key derivation functions recognized by the archive format.
///
/// The id space is closed: `{1: argon2id, 2: pbkdf2-sha256}`. There is no
/// id 0 — an unencrypted archive simply has no encryption block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KdfAlgorithm {
    Argon2id,
    Pbkdf2Sha256,
}

impl KdfAlgorithm {
    /// The on-disk algorithm id.
    pub fn id(&self) -> u8 {
        match self {
            KdfAlgorithm::Argon2id => 1,
            KdfAlgorithm::Pbkdf2Sha256 => 2,
        }
    }

    /// Resolves an on-disk id, rejecting ids outside the closed enumeration.
    pub fn from_id(id: u8) -> Result<Self, ApackError> {
        match id {
            1 => Ok(KdfAlgorithm::Argon2id),
            2 => Ok(KdfAlgorithm::Pbkdf2Sha256),
            other => Err(ApackError::Format(format!("unknown KDF algorithm id {}", other))),
        }
    }

    /// Recommended parameters for this function.
    pub fn default_params(&self) -> KdfParams {
        match self {
            KdfAlgorithm::Argon2id => KdfParams {
                iterations: 3,
                memory_kib: 65536,
                parallelism: 4,
            },
            // Memory and parallelism are meaningless for PBKDF2; stored as
            // zero/one so the encryption block round-trips losslessly.
            KdfAlgorithm::Pbkdf2Sha256 => KdfParams {
                iterations: 600_000,
                memory_kib: 0,
                parallelism: 1,
            },
        }
    }
}

impl std::fmt::Display for KdfAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KdfAlgorithm::Argon2id => write!(f, "argon2id"),
            KdfAlgorithm::Pbkdf2Sha256 => write!(f, "pbkdf2-sha256"),
        }
    }
}

/// Tunable cost parameters, serialized into the encryption block so the
/// derivation step is reproducible on open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Iteration count (time cost).
    pub iterations: u32,
    /// Memory cost in KiB. Zero for functions without a memory parameter.
    pub memory_kib: u32,
    /// Parallelism (lanes/threads).
    pub parallelism: u32,
}

impl KdfParams {
    /// Checks the parameters are usable for the given function.
    pub fn validate(&self, algorithm: KdfAlgorithm) -> Result<(), ApackError> {
        if self.iterations == 0 {
            return Err(ApackError::Configuration(
                "KDF iteration count must be at least 1".to_string(),
            ));
        }
        if algorithm == KdfAlgorithm::Argon2id {
            if self.memory_kib < 8 {
                return Err(ApackError::Configuration(format!(
                    "argon2id memory cost {} KiB is below the minimum of 8 KiB",
                    self.memory_kib
                )));
            }
            if self.parallelism == 0 {
                return Err(ApackError::Configuration(
                    "argon2id parallelism must be at least 1".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Slow hash from a password to key material.
///
/// An instance carries its cost parameters; `derive` must be fully
/// deterministic given password, salt, and those parameters.
pub trait KeyDerivation: Send + Sync {
    /// The function this provider implements.
    fn algorithm(&self) -> KdfAlgorithm;

    /// The cost parameters this instance was constructed with.
    fn params(&self) -> KdfParams;

    /// Derives `out_len` bytes of key material.
    ///
    /// The result is zeroized when dropped.
    fn derive(&self, password: &[u8], salt: &[u8], out_len: usize) -> Result<Zeroizing<Vec<u8>>, ApackError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_round_trip() {
        assert_eq!(KdfAlgorithm::from_id(1).unwrap(), KdfAlgorithm::Argon2id);
        assert_eq!(KdfAlgorithm::from_id(2).unwrap(), KdfAlgorithm::Pbkdf2Sha256);
        assert_eq!(KdfAlgorithm::from_id(0).unwrap_err().category(), "format");
        assert_eq!(KdfAlgorithm::from_id(3).unwrap_err().category(), "format");
    }

    #[test]
    fn test_default_params_validate() {
        for algorithm in [KdfAlgorithm::Argon2id, KdfAlgorithm::Pbkdf2Sha256] {
            algorithm.default_params().validate(algorithm).unwrap();
        }
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let params = KdfParams {
            iterations: 0,
            memory_kib: 65536,
            parallelism: 4,
        };
        assert!(params.validate(KdfAlgorithm::Argon2id).is_err());
        assert!(params.validate(KdfAlgorithm::Pbkdf2Sha256).is_err());
    }

    #[test]
    fn test_argon2_memory_floor() {
        let params = KdfParams {
            iterations: 3,
            memory_kib: 4,
            parallelism: 1,
        };
        assert!(params.validate(KdfAlgorithm::Argon2id).is_err());
        // PBKDF2 ignores the memory parameter entirely.
        assert!(params.validate(KdfAlgorithm::Pbkdf2Sha256).is_ok());
    }
}
