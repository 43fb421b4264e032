// /////////////////////////////////////////////////////////////////////////////
// APACK
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Encryption Providers
//!
//! AES-256-GCM and ChaCha20-Poly1305 behind the domain's AEAD contract.
//! Every encryption draws a fresh 96-bit nonce from the system CSPRNG and
//! frames the result as `nonce ‖ ciphertext ‖ tag`, so the payload is
//! self-contained and nonce reuse under one key cannot happen.
//!
//! Authentication failures surface as the bare `aead` error kind with no
//! detail: a wrong password, a flipped ciphertext bit, and mismatched
//! associated data all look identical to the caller.

use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use apack_domain::{
    ApackError, ContentKey, EncryptionAlgorithm, EncryptionProvider, NONCE_LEN, TAG_LEN,
};
use chacha20poly1305::{ChaCha20Poly1305, Key as ChaChaKey, Nonce as ChaChaNonce};
use ring::rand::{SecureRandom, SystemRandom};

fn fresh_nonce(rng: &SystemRandom) -> Result<[u8; NONCE_LEN], ApackError> {
    let mut nonce = [0u8; NONCE_LEN];
    rng.fill(&mut nonce)
        .map_err(|_| ApackError::Io("system CSPRNG failed to produce a nonce".to_string()))?;
    Ok(nonce)
}

fn split_framed(data: &[u8]) -> Result<(&[u8], &[u8]), ApackError> {
    // Minimum framing: nonce plus the tag of an empty plaintext.
    if data.len() < NONCE_LEN + TAG_LEN {
        return Err(ApackError::Aead);
    }
    Ok(data.split_at(NONCE_LEN))
}

/// AES-256-GCM provider.
pub struct Aes256GcmEncryption {
    rng: SystemRandom,
}

impl Aes256GcmEncryption {
    pub fn new() -> Self {
        Aes256GcmEncryption {
            rng: SystemRandom::new(),
        }
    }
}

impl Default for Aes256GcmEncryption {
    fn default() -> Self {
        Self::new()
    }
}

impl EncryptionProvider for Aes256GcmEncryption {
    fn algorithm(&self) -> EncryptionAlgorithm {
        EncryptionAlgorithm::Aes256Gcm
    }

    fn encrypt(&self, plaintext: &[u8], key: &ContentKey, aad: &[u8]) -> Result<Vec<u8>, ApackError> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
        let nonce = fresh_nonce(&self.rng)?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), Payload { msg: plaintext, aad })
            .map_err(|_| ApackError::Aead)?;
        let mut framed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        framed.extend_from_slice(&nonce);
        framed.extend_from_slice(&ciphertext);
        Ok(framed)
    }

    fn decrypt(&self, data: &[u8], key: &ContentKey, aad: &[u8]) -> Result<Vec<u8>, ApackError> {
        let (nonce, ciphertext) = split_framed(data)?;
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
        cipher
            .decrypt(Nonce::from_slice(nonce), Payload { msg: ciphertext, aad })
            .map_err(|_| ApackError::Aead)
    }
}

/// ChaCha20-Poly1305 provider.
pub struct ChaCha20Poly1305Encryption {
    rng: SystemRandom,
}

impl ChaCha20Poly1305Encryption {
    pub fn new() -> Self {
        ChaCha20Poly1305Encryption {
            rng: SystemRandom::new(),
        }
    }
}

impl Default for ChaCha20Poly1305Encryption {
    fn default() -> Self {
        Self::new()
    }
}

impl EncryptionProvider for ChaCha20Poly1305Encryption {
    fn algorithm(&self) -> EncryptionAlgorithm {
        EncryptionAlgorithm::ChaCha20Poly1305
    }

    fn encrypt(&self, plaintext: &[u8], key: &ContentKey, aad: &[u8]) -> Result<Vec<u8>, ApackError> {
        let cipher = ChaCha20Poly1305::new(ChaChaKey::from_slice(key.as_bytes()));
        let nonce = fresh_nonce(&self.rng)?;
        let ciphertext = cipher
            .encrypt(ChaChaNonce::from_slice(&nonce), Payload { msg: plaintext, aad })
            .map_err(|_| ApackError::Aead)?;
        let mut framed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        framed.extend_from_slice(&nonce);
        framed.extend_from_slice(&ciphertext);
        Ok(framed)
    }

    fn decrypt(&self, data: &[u8], key: &ContentKey, aad: &[u8]) -> Result<Vec<u8>, ApackError> {
        let (nonce, ciphertext) = split_framed(data)?;
        let cipher = ChaCha20Poly1305::new(ChaChaKey::from_slice(key.as_bytes()));
        cipher
            .decrypt(ChaChaNonce::from_slice(nonce), Payload { msg: ciphertext, aad })
            .map_err(|_| ApackError::Aead)
    }
}
