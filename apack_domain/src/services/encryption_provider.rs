// /////////////////////////////////////////////////////////////////////////////
// APACK
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Encryption Provider Contract
//!
//! Authenticated encryption (AEAD) for chunk payloads and for wrapping the
//! content-encryption key. Both supported ciphers use 256-bit keys, 96-bit
//! nonces, and 128-bit tags; ciphertext is framed as `nonce ‖ ciphertext ‖
//! tag` so a chunk payload is self-contained.
//!
//! ## Security Properties
//!
//! - Every `encrypt` call draws a fresh random nonce from a CSPRNG; nonces
//!   are never reused under one key.
//! - The associated data binds each chunk to its entry id and chunk index,
//!   so chunks cannot be reordered or spliced across entries undetected.
//! - Decryption failure is the dedicated `aead` error kind and yields no
//!   plaintext bytes. Wrong passwords and tampering surface identically.
//!
//! ## Key Material
//!
//! [`ContentKey`] holds the 256-bit content-encryption key (CEK). It is
//! zeroized on drop; the archive never writes it to disk unwrapped and never
//! copies caller passwords into long-lived storage.

use crate::ApackError;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// AEAD key length in bytes (256-bit keys).
pub const KEY_LEN: usize = 32;

/// AEAD nonce length in bytes (96-bit nonces).
pub const NONCE_LEN: usize = 12;

/// AEAD authentication tag length in bytes (128-bit tags).
pub const TAG_LEN: usize = 16;

/// Encryption algorithms recognized by the archive format.
///
/// The id space is closed: `{0: none, 1: aes-256-gcm, 2: chacha20-poly1305}`.
/// Id 0 is represented as the absence of a cipher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EncryptionAlgorithm {
    Aes256Gcm,
    ChaCha20Poly1305,
}

impl EncryptionAlgorithm {
    /// The on-disk algorithm id.
    pub fn id(&self) -> u8 {
        match self {
            EncryptionAlgorithm::Aes256Gcm => 1,
            EncryptionAlgorithm::ChaCha20Poly1305 => 2,
        }
    }

    /// Resolves an on-disk id. Id 0 means "no encryption" and yields `None`;
    /// unknown ids fail with a format error.
    pub fn from_id(id: u8) -> Result<Option<Self>, ApackError> {
        match id {
            0 => Ok(None),
            1 => Ok(Some(EncryptionAlgorithm::Aes256Gcm)),
            2 => Ok(Some(EncryptionAlgorithm::ChaCha20Poly1305)),
            other => Err(ApackError::Format(format!(
                "unknown encryption algorithm id {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for EncryptionAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncryptionAlgorithm::Aes256Gcm => write!(f, "aes-256-gcm"),
            EncryptionAlgorithm::ChaCha20Poly1305 => write!(f, "chacha20-poly1305"),
        }
    }
}

/// The 256-bit content-encryption key.
///
/// Lives only in process memory and is wiped on drop. The on-disk
/// representation is always the wrapped form stored in the encryption block.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ContentKey([u8; KEY_LEN]);

impl ContentKey {
    /// Key length in bytes.
    pub const LEN: usize = KEY_LEN;

    /// Wraps raw key bytes. The caller is responsible for having sourced
    /// them from a CSPRNG or an unwrap step.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        ContentKey(bytes)
    }

    /// Builds a key from a slice, rejecting wrong lengths.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ApackError> {
        if bytes.len() != KEY_LEN {
            return Err(ApackError::Configuration(format!(
                "content key must be {} bytes, got {}",
                KEY_LEN,
                bytes.len()
            )));
        }
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(bytes);
        Ok(ContentKey(key))
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key bytes.
        write!(f, "ContentKey(..)")
    }
}

/// Caller-supplied secret used to bind a writer or reader to an encrypted
/// archive.
///
/// `Password` borrows the caller's buffer; the core derives what it needs
/// and retains only the [`ContentKey`]. The caller keeps ownership of (and
/// responsibility for zeroizing) the password itself.
pub enum Secret<'a> {
    /// A password to run through the archive's KDF.
    Password(&'a [u8]),
    /// A content-encryption key obtained from a prior unwrap step.
    Key(ContentKey),
}

impl std::fmt::Debug for Secret<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Secret::Password(_) => write!(f, "Secret::Password(..)"),
            Secret::Key(_) => write!(f, "Secret::Key(..)"),
        }
    }
}

/// Authenticated encryption service.
///
/// Implementations are stateless apart from their CSPRNG handle and are safe
/// to share across writers and readers.
pub trait EncryptionProvider: Send + Sync {
    /// The cipher this provider implements.
    fn algorithm(&self) -> EncryptionAlgorithm;

    /// Encrypts `plaintext`, authenticating `aad` alongside it.
    ///
    /// Returns `nonce ‖ ciphertext ‖ tag` with a nonce freshly drawn from
    /// the provider's CSPRNG.
    fn encrypt(&self, plaintext: &[u8], key: &ContentKey, aad: &[u8]) -> Result<Vec<u8>, ApackError>;

    /// Decrypts and authenticates `data` (framed as produced by `encrypt`).
    ///
    /// Any authentication failure is [`ApackError::Aead`] and yields no
    /// partial plaintext.
    fn decrypt(&self, data: &[u8], key: &ContentKey, aad: &[u8]) -> Result<Vec<u8>, ApackError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_round_trip() {
        assert_eq!(EncryptionAlgorithm::from_id(0).unwrap(), None);
        assert_eq!(
            EncryptionAlgorithm::from_id(1).unwrap(),
            Some(EncryptionAlgorithm::Aes256Gcm)
        );
        assert_eq!(
            EncryptionAlgorithm::from_id(2).unwrap(),
            Some(EncryptionAlgorithm::ChaCha20Poly1305)
        );
    }

    #[test]
    fn test_unknown_id_is_format_error() {
        assert_eq!(EncryptionAlgorithm::from_id(0xFF).unwrap_err().category(), "format");
    }

    #[test]
    fn test_content_key_from_slice_length() {
        assert!(ContentKey::from_slice(&[0u8; 32]).is_ok());
        let err = ContentKey::from_slice(&[0u8; 16]).unwrap_err();
        assert_eq!(err.category(), "configuration");
    }

    #[test]
    fn test_key_debug_is_redacted() {
        let key = ContentKey::from_bytes([0xAB; 32]);
        let rendered = format!("{:?}", key);
        assert!(!rendered.contains("AB"));
        assert!(!rendered.contains("171"));
    }
}
