// /////////////////////////////////////////////////////////////////////////////
// APACK
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # APACK
//!
//! Seekable, chunked binary archive format with an integrated per-chunk
//! processing pipeline: checksum verification, optional compression,
//! optional authenticated encryption, and optional Reed–Solomon forward
//! error correction. Designed for game assets, save files, and similar bulk
//! storage where random access, integrity, and confidentiality all matter.
//!
//! ## Overview
//!
//! - [`ArchiveWriter`] lays an archive out in one forward pass, streaming
//!   each entry through the pipeline in configurable chunks, and finalizes
//!   the trailer (back-patching the file header on seekable sinks).
//! - [`ArchiveReader`] parses the format, indexes entries by id and by name
//!   hash, and opens streaming per-entry decode sources.
//! - [`Providers`] is the explicit registry of codec, cipher, checksum,
//!   KDF, and ECC implementations; nothing is discovered at runtime.
//! - Password-protected archives use a two-tier key hierarchy: a random
//!   content-encryption key wraps the data, and a password-derived
//!   key-encryption key wraps the content key (see [`key_wrapping`]).
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use apack::{ArchiveReader, ArchiveWriter, EntryMetadata, FileSink, Providers};
//! use apack_domain::ArchiveConfig;
//!
//! # fn main() -> Result<(), apack_domain::ApackError> {
//! let providers = Arc::new(Providers::full());
//! let sink = FileSink::create("assets.apack")?;
//! let mut writer = ArchiveWriter::create(sink, ArchiveConfig::default(), providers.clone(), None)?;
//! writer.add_entry(
//!     EntryMetadata::named("hello.txt")?,
//!     &mut "Hello, World!".as_bytes(),
//! )?;
//! writer.close()?;
//!
//! let mut reader = ArchiveReader::open_path("assets.apack", providers)?;
//! let entry_id = reader.entry_by_name("hello.txt").unwrap().id();
//! let mut source = reader.open_entry(entry_id)?;
//! let mut contents = Vec::new();
//! std::io::Read::read_to_end(&mut source, &mut contents)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency Model
//!
//! All operations are synchronous and run on the calling thread. A writer
//! or reader owns its sink/source cursor and is used from one thread at a
//! time; independent readers over separate file handles are safe. The
//! decode stream returned by [`ArchiveReader::open_entry`] borrows the
//! reader exclusively, so a second live stream is a compile error rather
//! than interleaved reads.

pub mod infrastructure;
pub mod io;
pub mod key_wrapping;
pub mod pipeline;
pub mod presentation;
pub mod reader;
pub mod writer;

pub use infrastructure::providers::Providers;
pub use io::{ByteSink, FileSink, StreamSink};
pub use pipeline::ChunkPipeline;
pub use reader::{ArchiveReader, Entry, EntryReader, VerifyFinding, VerifyReport};
pub use writer::{ArchiveWriter, EntryMetadata};

pub use apack_domain::{ApackError, ArchiveConfig, Secret};
