// /////////////////////////////////////////////////////////////////////////////
// APACK
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Key Wrapping
//!
//! Two-tier key hierarchy for password-protected archives:
//!
//! 1. A random 256-bit **content-encryption key (CEK)** is generated once at
//!    archive creation and encrypts every chunk.
//! 2. A **key-encryption key (KEK)** is derived from the password and a
//!    fresh salt by the configured KDF.
//! 3. The CEK is wrapped (AEAD-encrypted) under the KEK; nonce, ciphertext,
//!    and tag land in the encryption block.
//!
//! Opening inverts the process. A tag mismatch during unwrap is the bare
//! `aead` error — a wrong password and a tampered block are deliberately
//! indistinguishable. The KEK lives only for the duration of the wrap or
//! unwrap call; the CEK lives as long as its writer or reader and both are
//! zeroized on drop.
//!
//! Wrapping the CEK rather than using the password-derived key directly
//! means a password change rewrites one small block instead of re-encrypting
//! every chunk, and leaves room for multi-recipient wrapping later.

use apack_domain::{
    ApackError, ContentKey, EncryptionBlock, EncryptionProvider, KeyDerivation, KEY_LEN, NONCE_LEN,
    TAG_LEN,
};
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroize;

/// Associated data binding the wrapped key to its role and format version.
const CEK_WRAP_AAD: &[u8] = b"APACK/CEK/v1";

/// Salt length written into new encryption blocks.
const SALT_LEN: usize = 32;

/// Generates a fresh random content-encryption key.
pub fn generate_content_key() -> Result<ContentKey, ApackError> {
    let mut bytes = [0u8; KEY_LEN];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| ApackError::Io("system CSPRNG failed to produce a key".to_string()))?;
    let key = ContentKey::from_bytes(bytes);
    bytes.zeroize();
    Ok(key)
}

/// Derives the KEK and wraps `cek` under it, producing the encryption block
/// to be written after the file header.
pub fn wrap_content_key(
    cek: &ContentKey,
    password: &[u8],
    kdf: &dyn KeyDerivation,
    cipher: &dyn EncryptionProvider,
) -> Result<EncryptionBlock, ApackError> {
    let mut salt = vec![0u8; SALT_LEN];
    SystemRandom::new()
        .fill(&mut salt)
        .map_err(|_| ApackError::Io("system CSPRNG failed to produce a salt".to_string()))?;

    let kek_bytes = kdf.derive(password, &salt, KEY_LEN)?;
    let kek = ContentKey::from_slice(&kek_bytes)?;

    let framed = cipher.encrypt(cek.as_bytes(), &kek, CEK_WRAP_AAD)?;
    debug_assert_eq!(framed.len(), NONCE_LEN + KEY_LEN + TAG_LEN);

    let mut wrap_nonce = [0u8; NONCE_LEN];
    wrap_nonce.copy_from_slice(&framed[..NONCE_LEN]);
    let mut wrapped_key_tag = [0u8; TAG_LEN];
    wrapped_key_tag.copy_from_slice(&framed[framed.len() - TAG_LEN..]);

    Ok(EncryptionBlock {
        kdf: kdf.algorithm(),
        cipher: cipher.algorithm(),
        kdf_params: kdf.params(),
        salt,
        wrap_nonce,
        wrapped_key: framed[NONCE_LEN..framed.len() - TAG_LEN].to_vec(),
        wrapped_key_tag,
    })
}

/// Re-derives the KEK from `password` and the block's stored salt and
/// parameters, then unwraps the CEK.
///
/// # Errors
///
/// [`ApackError::Aead`] when the tag does not verify — wrong password and
/// tampering look identical.
pub fn unwrap_content_key(
    block: &EncryptionBlock,
    password: &[u8],
    kdf: &dyn KeyDerivation,
    cipher: &dyn EncryptionProvider,
) -> Result<ContentKey, ApackError> {
    let kek_bytes = kdf.derive(password, &block.salt, KEY_LEN)?;
    let kek = ContentKey::from_slice(&kek_bytes)?;

    let mut framed = Vec::with_capacity(NONCE_LEN + block.wrapped_key.len() + TAG_LEN);
    framed.extend_from_slice(&block.wrap_nonce);
    framed.extend_from_slice(&block.wrapped_key);
    framed.extend_from_slice(&block.wrapped_key_tag);

    let mut plain = cipher.decrypt(&framed, &kek, CEK_WRAP_AAD)?;
    let cek = ContentKey::from_slice(&plain).map_err(|_| ApackError::Aead);
    plain.zeroize();
    cek
}
