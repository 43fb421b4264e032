// /////////////////////////////////////////////////////////////////////////////
// APACK
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Archive Error System
//!
//! This module provides the error taxonomy for the APACK archive format.
//! Every failure in the format layer, the chunk pipeline, and the
//! writer/reader machinery maps onto exactly one of these kinds.
//!
//! ## Error Kinds
//!
//! - **Io**: the underlying read or write failed; surfaced unchanged.
//! - **Format**: magic/version mismatch, malformed record, unknown
//!   algorithm id. Terminal for the operation.
//! - **Integrity**: checksum mismatch with no ECC, or with ECC that could
//!   not correct the damage.
//! - **Aead**: authentication tag mismatch. Wrong passwords and tampering
//!   are reported identically — the variant carries no detail.
//! - **Bomb**: a decompression ratio or chunk-size limit was exceeded.
//! - **Configuration**: invalid configuration (out-of-range chunk size,
//!   missing key, conflicting flags). Prevents construction.
//! - **NotFound**: entry id or name unknown to this archive.
//! - **Closed**: operation on a writer or reader past its terminal state.
//! - **Busy**: second concurrent entry stream on one reader. The library's
//!   borrow discipline makes this unrepresentable in safe Rust; the kind is
//!   retained for bindings that erase lifetimes.
//!
//! ## Propagation Policy
//!
//! Transient I/O errors are surfaced unchanged; format, integrity, AEAD, and
//! bomb errors abort the current entry; configuration errors prevent
//! construction. Nothing in the core retries automatically.

use thiserror::Error;

/// Domain-specific errors for the APACK archive system.
///
/// Each variant represents one kind from the format's error taxonomy.
/// Message-carrying variants include enough context to locate the failing
/// record; the [`ApackError::Aead`] variant deliberately carries none.
#[derive(Error, Debug, Clone)]
pub enum ApackError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("format error: {0}")]
    Format(String),

    #[error("integrity check failed: {0}")]
    Integrity(String),

    /// Authentication failed. Emitted for wrong passwords and for tampered
    /// ciphertext alike; callers cannot tell the two apart from this error.
    #[error("authentication failed")]
    Aead,

    #[error("decompression limit exceeded: {0}")]
    Bomb(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("archive is closed: {0}")]
    Closed(String),

    #[error("reader is busy: {0}")]
    Busy(String),
}

impl ApackError {
    /// Stable lower-case name of the error kind, matching the taxonomy used
    /// in the format documentation and in verify reports.
    pub fn category(&self) -> &'static str {
        match self {
            ApackError::Io(_) => "io",
            ApackError::Format(_) => "format",
            ApackError::Integrity(_) => "integrity",
            ApackError::Aead => "aead",
            ApackError::Bomb(_) => "bomb",
            ApackError::Configuration(_) => "configuration",
            ApackError::NotFound(_) => "not-found",
            ApackError::Closed(_) => "closed",
            ApackError::Busy(_) => "busy",
        }
    }

    /// Whether this error indicates damaged or forged archive data rather
    /// than an operational problem. Used for exit-code mapping: data errors
    /// exit with 2, operational failures with 1.
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            ApackError::Format(_) | ApackError::Integrity(_) | ApackError::Aead | ApackError::Bomb(_)
        )
    }
}

impl From<std::io::Error> for ApackError {
    fn from(err: std::io::Error) -> Self {
        ApackError::Io(err.to_string())
    }
}

impl From<ApackError> for std::io::Error {
    fn from(err: ApackError) -> Self {
        // Wrap rather than stringify so `Read` consumers can downcast back
        // to the original error and its category.
        std::io::Error::new(std::io::ErrorKind::InvalidData, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories_match_taxonomy() {
        assert_eq!(ApackError::Io("x".into()).category(), "io");
        assert_eq!(ApackError::Format("x".into()).category(), "format");
        assert_eq!(ApackError::Integrity("x".into()).category(), "integrity");
        assert_eq!(ApackError::Aead.category(), "aead");
        assert_eq!(ApackError::Bomb("x".into()).category(), "bomb");
        assert_eq!(ApackError::Configuration("x".into()).category(), "configuration");
        assert_eq!(ApackError::NotFound("x".into()).category(), "not-found");
        assert_eq!(ApackError::Closed("x".into()).category(), "closed");
        assert_eq!(ApackError::Busy("x".into()).category(), "busy");
    }

    #[test]
    fn test_aead_message_is_constant() {
        // Wrong password and tampering must be indistinguishable by message.
        assert_eq!(ApackError::Aead.to_string(), "authentication failed");
    }

    #[test]
    fn test_data_error_classification() {
        assert!(ApackError::Format("bad magic".into()).is_data_error());
        assert!(ApackError::Integrity("chunk 3".into()).is_data_error());
        assert!(ApackError::Aead.is_data_error());
        assert!(ApackError::Bomb("ratio".into()).is_data_error());
        assert!(!ApackError::Io("disk".into()).is_data_error());
        assert!(!ApackError::Configuration("chunk size".into()).is_data_error());
        assert!(!ApackError::NotFound("entry 9".into()).is_data_error());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short read");
        let err: ApackError = io.into();
        assert_eq!(err.category(), "io");
        assert!(err.to_string().contains("short read"));
    }
}
