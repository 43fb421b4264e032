// /////////////////////////////////////////////////////////////////////////////
// APACK
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # APACK Domain Layer
//!
//! Domain layer for the APACK archive format: a seekable, chunked binary
//! container with an integrated per-chunk processing pipeline (checksum,
//! optional compression, optional authenticated encryption, optional forward
//! error correction).
//!
//! ## Overview
//!
//! This crate contains everything the format *is*, with no I/O:
//!
//! - **Format primitives**: bit-exact little-endian layouts for the file
//!   header, encryption block, entry headers, chunk headers, and the trailer
//!   with its table of contents. Serialization is total — every encode has a
//!   decode that rejects malformed input with a specific error kind.
//! - **Provider contracts**: traits for checksum, compression, AEAD
//!   encryption, key derivation, and error-correction capabilities, together
//!   with the closed numeric id namespaces the format stores on disk.
//! - **Value objects**: validated chunk sizes, entry attributes, and the
//!   immutable archive configuration.
//! - **Error system**: the [`ApackError`] taxonomy shared by every layer.
//!
//! ## Architecture
//!
//! Concrete codecs, ciphers, KDFs, and the writer/reader machinery live in
//! the `apack` crate; this crate is deliberately dependency-light so the
//! format definition can be audited in isolation.

pub mod error;
pub mod services;
pub mod value_objects;

pub use error::ApackError;
pub use services::{
    ChecksumAlgorithm, ChecksumHasher, ChecksumProvider, CompressionAlgorithm, CompressionLevel,
    CompressionProvider, ContentKey, EccConfig, EccOutcome, EccProvider, EncryptionAlgorithm,
    EncryptionProvider, KdfAlgorithm, KdfParams, KeyDerivation, Secret, KEY_LEN, NONCE_LEN, TAG_LEN,
};
pub use value_objects::{
    ArchiveConfig, ArchiveConfigBuilder, Attribute, AttributeValue, ChunkHeader, ChunkSize,
    CompressionSettings, EncryptionBlock, EncryptionSettings, EntryHeader, FileHeader, TocRecord,
    Trailer,
};
