// /////////////////////////////////////////////////////////////////////////////
// APACK
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Archive Writer
//!
//! Lays an archive out in one forward pass: provisional file header,
//! optional encryption block, then per entry an entry header followed by its
//! chunk records, and finally the trailer. On seekable sinks the file header
//! and each entry header are rewritten in place once their final values are
//! known; on non-seekable sinks (stream mode) an entry's chunk records are
//! staged in memory so the entry header can be emitted already-final.
//!
//! ## State Machine
//!
//! `Fresh → Open → Closed`. [`ArchiveWriter::create`] performs the
//! `Fresh → Open` transition; [`ArchiveWriter::close`] is idempotent; any
//! operation after `Closed` fails with the `closed` kind. An I/O or pipeline
//! error during [`ArchiveWriter::add_entry`] is fatal: the writer poisons
//! itself to `Closed` and the on-disk file is considered incomplete —
//! callers are expected to delete it. Partial entries are not recoverable.
//!
//! ## Integrity Accounting
//!
//! Besides the per-record checksums, the writer maintains a running global
//! checksum over every chunk record (header and payload, in file order).
//! The digest is stored in the trailer, giving `verify` a whole-archive
//! check that is stable under header back-patching.

use crate::infrastructure::providers::Providers;
use crate::io::ByteSink;
use crate::key_wrapping;
use crate::pipeline::{ChunkPipeline, PipelineLimits};
use apack_domain::value_objects::{ENTRY_HEADER_VERSION, FORMAT_VERSION_MAJOR, FORMAT_VERSION_MINOR};
use apack_domain::{
    ApackError, ArchiveConfig, Attribute, ChecksumHasher, ChecksumProvider, ContentKey, EntryHeader,
    FileHeader, Secret, TocRecord, Trailer,
};
use std::io::{Read, Write};
use std::sync::Arc;
use tracing::debug;

/// Caller-supplied metadata for a new entry.
#[derive(Debug, Clone)]
pub struct EntryMetadata {
    name: String,
    mime: String,
    attributes: Vec<Attribute>,
}

impl EntryMetadata {
    /// Creates metadata with the given entry name.
    ///
    /// # Errors
    ///
    /// `ApackError::Configuration` when the name is not a valid lexical
    /// path (non-empty, `/`-separated, no `.`/`..`/empty segments).
    pub fn named(name: impl Into<String>) -> Result<Self, ApackError> {
        let name = name.into();
        EntryHeader::validate_name(&name).map_err(|err| ApackError::Configuration(err.to_string()))?;
        Ok(EntryMetadata {
            name,
            mime: String::new(),
            attributes: Vec::new(),
        })
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = mime.into();
        self
    }

    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Open,
    Closed,
}

/// One-pass archive writer over a [`ByteSink`].
pub struct ArchiveWriter<S: ByteSink> {
    sink: S,
    config: ArchiveConfig,
    checksum: Arc<dyn ChecksumProvider>,
    pipeline: ChunkPipeline,
    cek: Option<ContentKey>,
    header: FileHeader,
    toc: Vec<TocRecord>,
    next_entry_id: u64,
    state: WriterState,
    /// Running checksum over all chunk records, finalized into the trailer.
    chunk_hasher: Option<Box<dyn ChecksumHasher>>,
}

impl<S: ByteSink> std::fmt::Debug for ArchiveWriter<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveWriter")
            .field("header", &self.header)
            .field("toc_len", &self.toc.len())
            .field("next_entry_id", &self.next_entry_id)
            .field("state", &self.state)
            .finish()
    }
}

impl<S: ByteSink> ArchiveWriter<S> {
    /// Creates a writer, emitting the provisional file header and, for
    /// encrypted archives, the encryption block.
    ///
    /// Encrypted archives require `secret` to be a password: the writer
    /// generates a fresh content-encryption key and wraps it under the
    /// password-derived key. Random access requires a seekable sink —
    /// requesting it on a stream sink is a configuration error rather than
    /// a silent downgrade.
    pub fn create(
        mut sink: S,
        config: ArchiveConfig,
        providers: Arc<Providers>,
        secret: Option<Secret<'_>>,
    ) -> Result<Self, ApackError> {
        config.validate()?;
        if config.random_access() && !sink.is_seekable() {
            return Err(ApackError::Configuration(
                "random access requires a seekable sink; request stream mode instead".to_string(),
            ));
        }
        if !sink.is_seekable() && !config.stream_mode() {
            return Err(ApackError::Configuration(
                "non-seekable sinks require stream mode".to_string(),
            ));
        }

        let checksum = providers.checksum(config.checksum())?;

        // Bind the secret: encryption configured ⇔ a secret is presented.
        let mut encryption_block = None;
        let cek = match (config.encryption(), secret) {
            (Some(settings), Some(Secret::Password(password))) => {
                let kdf = providers.kdf(settings.kdf, settings.kdf_params)?;
                let cipher = providers.encryption(settings.cipher)?;
                let cek = key_wrapping::generate_content_key()?;
                encryption_block = Some(key_wrapping::wrap_content_key(
                    &cek,
                    password,
                    kdf.as_ref(),
                    cipher.as_ref(),
                )?);
                Some(cek)
            }
            (Some(_), Some(Secret::Key(_))) => {
                return Err(ApackError::Configuration(
                    "writing an encrypted archive requires a password to wrap the content key".to_string(),
                ));
            }
            (Some(_), None) => {
                return Err(ApackError::Configuration(
                    "encryption is configured but no secret was supplied".to_string(),
                ));
            }
            (None, Some(_)) => {
                return Err(ApackError::Configuration(
                    "a secret was supplied but encryption is not configured".to_string(),
                ));
            }
            (None, None) => None,
        };

        let compression = match config.compression() {
            Some(settings) => Some((providers.compression(settings.algorithm)?, settings.level)),
            None => None,
        };
        let encryption = match config.encryption() {
            Some(settings) => Some(providers.encryption(settings.cipher)?),
            None => None,
        };
        let ecc = match config.ecc() {
            Some(_) => Some(providers.ecc()?),
            None => None,
        };
        let pipeline = ChunkPipeline::new(
            checksum.clone(),
            compression,
            encryption,
            ecc,
            PipelineLimits {
                chunk_size: config.chunk_size().bytes(),
                max_stored_len: config.max_stored_chunk_len(),
                max_ratio: config.max_decompression_ratio(),
            },
        );

        let header = FileHeader {
            version_major: FORMAT_VERSION_MAJOR,
            version_minor: FORMAT_VERSION_MINOR,
            random_access: config.random_access(),
            encrypted: config.encryption().is_some(),
            stream_mode: config.stream_mode(),
            chunk_size: config.chunk_size().bytes(),
            checksum_algorithm: config.checksum(),
            created_at_ms: chrono::Utc::now().timestamp_millis() as u64,
            entry_count: 0,
            trailer_offset: 0,
        };

        sink.write_all(&header.encode(checksum.as_ref())?)
            .map_err(ApackError::from)?;
        if let Some(block) = &encryption_block {
            sink.write_all(&block.encode(checksum.as_ref())?)
                .map_err(ApackError::from)?;
        }

        debug!(
            chunk_size = header.chunk_size,
            encrypted = header.encrypted,
            random_access = header.random_access,
            "archive writer opened"
        );

        let chunk_hasher = checksum.begin();
        Ok(ArchiveWriter {
            sink,
            config,
            checksum,
            pipeline,
            cek,
            header,
            toc: Vec::new(),
            next_entry_id: 0,
            state: WriterState::Open,
            chunk_hasher: Some(chunk_hasher),
        })
    }

    /// Number of entries added so far.
    pub fn entry_count(&self) -> u64 {
        self.next_entry_id
    }

    /// Consumes the writer and returns the sink, e.g. to recover the buffer
    /// behind a [`crate::StreamSink`]. Call [`Self::close`] first; an
    /// unclosed archive is incomplete.
    pub fn into_sink(self) -> S {
        self.sink
    }

    fn ensure_open(&self, operation: &str) -> Result<(), ApackError> {
        if self.state == WriterState::Closed {
            return Err(ApackError::Closed(format!("{} on a closed writer", operation)));
        }
        Ok(())
    }

    /// Streams `source` to its end and appends it as the next entry.
    ///
    /// The entry id is assigned strictly monotonically from 0 and returned.
    /// `source` is read to exhaustion but not closed. Errors are fatal: the
    /// writer transitions to `Closed` and the archive is incomplete.
    pub fn add_entry(&mut self, metadata: EntryMetadata, source: &mut dyn Read) -> Result<u64, ApackError> {
        self.ensure_open("add_entry")?;
        match self.add_entry_inner(metadata, source) {
            Ok(entry_id) => Ok(entry_id),
            Err(err) => {
                // Poison: a half-written entry cannot be recovered.
                self.state = WriterState::Closed;
                Err(err)
            }
        }
    }

    fn add_entry_inner(&mut self, metadata: EntryMetadata, source: &mut dyn Read) -> Result<u64, ApackError> {
        let entry_id = self.next_entry_id;
        let header_offset = self.sink.position()?;

        let provisional = EntryHeader {
            version: ENTRY_HEADER_VERSION,
            entry_id,
            original_size: 0,
            stored_size: 0,
            chunk_count: 0,
            compression: self.config.compression().map(|settings| settings.algorithm),
            encryption: self.config.encryption().map(|settings| settings.cipher),
            ecc: self.config.ecc().is_some(),
            name: metadata.name.clone(),
            mime: metadata.mime.clone(),
            attributes: metadata.attributes.clone(),
        };

        let (original_size, stored_size, chunk_count) = if self.sink.is_seekable() {
            self.write_entry_streaming(&provisional, header_offset, source)?
        } else {
            self.write_entry_staged(&provisional, source)?
        };

        self.toc.push(TocRecord {
            entry_id,
            header_offset,
            original_size,
            stored_size,
            name: metadata.name.clone(),
        });
        self.next_entry_id += 1;

        debug!(
            entry_id,
            name = %metadata.name,
            original_size,
            stored_size,
            chunk_count,
            "entry written"
        );
        Ok(entry_id)
    }

    /// Seekable path: provisional header, streamed chunks, header rewritten
    /// in place with the final sizes.
    fn write_entry_streaming(
        &mut self,
        provisional: &EntryHeader,
        header_offset: u64,
        source: &mut dyn Read,
    ) -> Result<(u64, u64, u32), ApackError> {
        let provisional_bytes = provisional.encode(self.checksum.as_ref())?;
        self.sink.write_all(&provisional_bytes).map_err(ApackError::from)?;

        let mut original_size = 0u64;
        let mut stored_size = 0u64;
        let mut chunk_index = 0u32;
        let chunk_size = self.config.chunk_size().as_usize();
        let mut buffer = vec![0u8; chunk_size];

        loop {
            let filled = read_up_to(source, &mut buffer)?;
            if filled == 0 {
                break;
            }
            let chunk = self
                .pipeline
                .encode_chunk(&buffer[..filled], provisional.entry_id, chunk_index, self.cek.as_ref())?;
            self.emit_chunk(&chunk.header.encode(), &chunk.payload)?;
            original_size += filled as u64;
            stored_size += u64::from(chunk.header.stored_len);
            chunk_index += 1;
            if filled < chunk_size {
                break;
            }
        }

        // Same layout, final numbers: the numeric fields sit ahead of the
        // variable section, so the rewritten header has the same length.
        let mut final_header = provisional.clone();
        final_header.original_size = original_size;
        final_header.stored_size = stored_size;
        final_header.chunk_count = chunk_index;
        let final_bytes = final_header.encode(self.checksum.as_ref())?;
        debug_assert_eq!(final_bytes.len(), provisional_bytes.len());

        let end_position = self.sink.position()?;
        self.sink.seek_to(header_offset)?;
        self.sink.write_all(&final_bytes).map_err(ApackError::from)?;
        self.sink.seek_to(end_position)?;

        Ok((original_size, stored_size, chunk_index))
    }

    /// Non-seekable path: chunk records are staged in memory so the entry
    /// header can be emitted already-final ahead of them.
    fn write_entry_staged(
        &mut self,
        provisional: &EntryHeader,
        source: &mut dyn Read,
    ) -> Result<(u64, u64, u32), ApackError> {
        let mut original_size = 0u64;
        let mut stored_size = 0u64;
        let mut chunk_index = 0u32;
        let chunk_size = self.config.chunk_size().as_usize();
        let mut buffer = vec![0u8; chunk_size];
        let mut staged = Vec::new();

        loop {
            let filled = read_up_to(source, &mut buffer)?;
            if filled == 0 {
                break;
            }
            let chunk = self
                .pipeline
                .encode_chunk(&buffer[..filled], provisional.entry_id, chunk_index, self.cek.as_ref())?;
            original_size += filled as u64;
            stored_size += u64::from(chunk.header.stored_len);
            chunk_index += 1;
            staged.push(chunk);
            if filled < chunk_size {
                break;
            }
        }

        let mut final_header = provisional.clone();
        final_header.original_size = original_size;
        final_header.stored_size = stored_size;
        final_header.chunk_count = chunk_index;
        self.sink
            .write_all(&final_header.encode(self.checksum.as_ref())?)
            .map_err(ApackError::from)?;
        for chunk in &staged {
            self.emit_chunk(&chunk.header.encode(), &chunk.payload)?;
        }

        Ok((original_size, stored_size, chunk_index))
    }

    fn emit_chunk(&mut self, header_bytes: &[u8], payload: &[u8]) -> Result<(), ApackError> {
        self.sink.write_all(header_bytes).map_err(ApackError::from)?;
        self.sink.write_all(payload).map_err(ApackError::from)?;
        if let Some(hasher) = self.chunk_hasher.as_mut() {
            hasher.update(header_bytes);
            hasher.update(payload);
        }
        Ok(())
    }

    /// Finalizes the archive: writes the trailer and its end-of-file
    /// back-pointer, and on seekable sinks rewrites the file header with the
    /// final entry count and trailer offset.
    ///
    /// Idempotent: a second call is a no-op and writes no bytes.
    pub fn close(&mut self) -> Result<(), ApackError> {
        if self.state == WriterState::Closed {
            return Ok(());
        }
        self.state = WriterState::Closed;

        let trailer_offset = self.sink.position()?;
        let global_checksum = self.chunk_hasher.take().map(|hasher| hasher.finalize());

        let trailer = Trailer {
            entry_count: self.next_entry_id,
            global_checksum,
            header_offset: 0,
            header_flags: self.header.flags(),
            records: if self.config.random_access() {
                std::mem::take(&mut self.toc)
            } else {
                Vec::new()
            },
        };
        self.sink
            .write_all(&trailer.encode(self.checksum.as_ref())?)
            .map_err(ApackError::from)?;
        self.sink
            .write_all(&trailer_offset.to_le_bytes())
            .map_err(ApackError::from)?;

        if self.sink.is_seekable() {
            self.header.entry_count = self.next_entry_id;
            self.header.trailer_offset = trailer_offset;
            let end_position = self.sink.position()?;
            self.sink.seek_to(0)?;
            self.sink
                .write_all(&self.header.encode(self.checksum.as_ref())?)
                .map_err(ApackError::from)?;
            self.sink.seek_to(end_position)?;
        }

        self.sink.flush().map_err(ApackError::from)?;
        // The content key is not needed past this point.
        self.cek = None;

        debug!(
            entries = self.next_entry_id,
            trailer_offset, "archive writer closed"
        );
        Ok(())
    }
}

/// Fills `buffer` from `source`, tolerating short reads; returns the number
/// of bytes read (0 at end of stream).
fn read_up_to(source: &mut dyn Read, buffer: &mut [u8]) -> Result<usize, ApackError> {
    let mut filled = 0;
    while filled < buffer.len() {
        match source.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(count) => filled += count,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        }
    }
    Ok(filled)
}
