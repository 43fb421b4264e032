// /////////////////////////////////////////////////////////////////////////////
// APACK
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Key Derivation Providers
//!
//! Argon2id and PBKDF2-HMAC-SHA256. Instances are bound to their cost
//! parameters so the encryption block can round-trip the exact derivation
//! recipe: the reader reconstructs a provider from the stored parameters and
//! must arrive at the same key-encryption key.

use apack_domain::{ApackError, KdfAlgorithm, KdfParams, KeyDerivation};
use argon2::{Algorithm, Argon2, Params, Version};
use zeroize::Zeroizing;

/// Argon2id with explicit memory/time/parallelism costs.
pub struct Argon2idKdf {
    params: KdfParams,
}

impl Argon2idKdf {
    pub fn new(params: KdfParams) -> Self {
        Argon2idKdf { params }
    }
}

impl Default for Argon2idKdf {
    fn default() -> Self {
        Argon2idKdf::new(KdfAlgorithm::Argon2id.default_params())
    }
}

impl KeyDerivation for Argon2idKdf {
    fn algorithm(&self) -> KdfAlgorithm {
        KdfAlgorithm::Argon2id
    }

    fn params(&self) -> KdfParams {
        self.params
    }

    fn derive(&self, password: &[u8], salt: &[u8], out_len: usize) -> Result<Zeroizing<Vec<u8>>, ApackError> {
        self.params.validate(self.algorithm())?;
        let params = Params::new(
            self.params.memory_kib,
            self.params.iterations,
            self.params.parallelism,
            Some(out_len),
        )
        .map_err(|err| ApackError::Configuration(format!("argon2id parameters rejected: {}", err)))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let mut output = Zeroizing::new(vec![0u8; out_len]);
        argon2
            .hash_password_into(password, salt, &mut output)
            .map_err(|err| ApackError::Configuration(format!("argon2id derivation failed: {}", err)))?;
        Ok(output)
    }
}

/// PBKDF2-HMAC-SHA256 with an explicit iteration count.
pub struct Pbkdf2Sha256Kdf {
    params: KdfParams,
}

impl Pbkdf2Sha256Kdf {
    pub fn new(params: KdfParams) -> Self {
        Pbkdf2Sha256Kdf { params }
    }
}

impl Default for Pbkdf2Sha256Kdf {
    fn default() -> Self {
        Pbkdf2Sha256Kdf::new(KdfAlgorithm::Pbkdf2Sha256.default_params())
    }
}

impl KeyDerivation for Pbkdf2Sha256Kdf {
    fn algorithm(&self) -> KdfAlgorithm {
        KdfAlgorithm::Pbkdf2Sha256
    }

    fn params(&self) -> KdfParams {
        self.params
    }

    fn derive(&self, password: &[u8], salt: &[u8], out_len: usize) -> Result<Zeroizing<Vec<u8>>, ApackError> {
        self.params.validate(self.algorithm())?;
        let mut output = Zeroizing::new(vec![0u8; out_len]);
        pbkdf2::pbkdf2_hmac::<sha2::Sha256>(password, salt, self.params.iterations, &mut output);
        Ok(output)
    }
}
