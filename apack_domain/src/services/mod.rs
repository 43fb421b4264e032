// /////////////////////////////////////////////////////////////////////////////
// APACK
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Provider Contracts
//!
//! Capability traits the archive core consumes. Implementations are injected
//! by the caller through an explicit provider registry; there is no service
//! discovery and no global state. Each capability carries a small integer id
//! that forms the on-disk algorithm namespace — the id enumerations are
//! closed, and unknown ids fail parsing with a format error.
//!
//! All traits are synchronous: the archive core owns a single cursor and
//! executes the pipeline on the calling thread.

mod checksum_provider;
mod compression_provider;
mod ecc_provider;
mod encryption_provider;
mod key_derivation;

pub use checksum_provider::{ChecksumAlgorithm, ChecksumHasher, ChecksumProvider};
pub use compression_provider::{CompressionAlgorithm, CompressionLevel, CompressionProvider};
pub use ecc_provider::{EccConfig, EccOutcome, EccProvider};
pub use encryption_provider::{
    ContentKey, EncryptionAlgorithm, EncryptionProvider, Secret, KEY_LEN, NONCE_LEN, TAG_LEN,
};
pub use key_derivation::{KdfAlgorithm, KdfParams, KeyDerivation};
