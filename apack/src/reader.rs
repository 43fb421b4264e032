// /////////////////////////////////////////////////////////////////////////////
// APACK
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Archive Reader
//!
//! Parses the file header, the optional encryption block, the entry headers
//! and (when present) the trailer, then serves random access over the
//! entries.
//!
//! ## Index Building
//!
//! When the header carries a valid trailer offset the index comes from the
//! trailer's TOC: each recorded entry header is parsed at its offset. For
//! stream-mode archives the reader scans forward from the end of the header
//! region, skipping chunk payloads via their stored lengths. Two lookup
//! maps are built: by entry id, and by XXH3-64 hash of the UTF-8 name with
//! same-hash entries probed linearly.
//!
//! ## Pass-Through Mode
//!
//! An encrypted archive opened without a secret exposes metadata only:
//! entries enumerate and look up normally, but opening or verifying an
//! encrypted entry is a configuration error until a key is available.
//!
//! ## Exclusive Decode Streams
//!
//! [`ArchiveReader::open_entry`] borrows the reader mutably, so a second
//! live [`EntryReader`] cannot exist — the `busy` policy of the format is
//! enforced by the borrow checker instead of a runtime flag, and
//! interleaved reads of the shared source cursor are impossible.
//!
//! ## Recovery
//!
//! [`ArchiveReader::open_with_recovery`] is the explicit scan-from-end
//! operation: it trusts the 8-byte trailer back-pointer at end of file,
//! validates the trailer there, and rebuilds the index from its TOC even
//! when the file header was never back-patched. It is never applied
//! implicitly.

use crate::infrastructure::providers::Providers;
use crate::pipeline::{ChunkPipeline, PipelineLimits};
use apack_domain::value_objects::{
    ChunkHeader, CHUNK_HEADER_SIZE, FILE_HEADER_SIZE, TRAILER_BACK_POINTER_SIZE, TRAILER_MAGIC,
};
use apack_domain::{
    ApackError, ArchiveConfig, Attribute, ChecksumProvider, CompressionAlgorithm, CompressionLevel,
    ContentKey, EncryptionAlgorithm, EncryptionBlock, EntryHeader, FileHeader, Secret, Trailer,
};
use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};
use xxhash_rust::xxh3::xxh3_64;

/// Upper bound on the encryption block: every field is fixed-width or
/// 16-bit length-prefixed, so the block cannot legitimately exceed this.
const MAX_ENCRYPTION_BLOCK_LEN: u64 = 192 * 1024;

/// Initial buffer for parsing a variable-length entry header.
const ENTRY_HEADER_PROBE_LEN: usize = 4096;

fn is_truncation(err: &ApackError) -> bool {
    matches!(err, ApackError::Format(message) if message.starts_with("truncated record"))
}

fn name_hash(name: &str) -> u64 {
    xxh3_64(name.as_bytes())
}

#[derive(Debug, Clone)]
struct EntryRecord {
    header: EntryHeader,
    header_offset: u64,
    data_offset: u64,
}

/// Read-only view of one entry, tied to its originating reader.
#[derive(Debug, Clone, Copy)]
pub struct Entry<'a> {
    record: &'a EntryRecord,
}

impl<'a> Entry<'a> {
    pub fn id(&self) -> u64 {
        self.record.header.entry_id
    }

    pub fn name(&self) -> &'a str {
        &self.record.header.name
    }

    pub fn mime(&self) -> &'a str {
        &self.record.header.mime
    }

    pub fn original_size(&self) -> u64 {
        self.record.header.original_size
    }

    pub fn stored_size(&self) -> u64 {
        self.record.header.stored_size
    }

    pub fn chunk_count(&self) -> u32 {
        self.record.header.chunk_count
    }

    pub fn compression(&self) -> Option<CompressionAlgorithm> {
        self.record.header.compression
    }

    pub fn encryption(&self) -> Option<EncryptionAlgorithm> {
        self.record.header.encryption
    }

    pub fn has_ecc(&self) -> bool {
        self.record.header.ecc
    }

    pub fn attributes(&self) -> &'a [Attribute] {
        &self.record.header.attributes
    }

    pub fn header(&self) -> &'a EntryHeader {
        &self.record.header
    }
}

/// One problem found by `verify`.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyFinding {
    pub entry_id: u64,
    pub chunk_index: Option<u32>,
    pub kind: String,
    pub detail: String,
}

/// Outcome of a verification pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VerifyReport {
    pub entries_verified: u64,
    pub chunks_verified: u64,
    /// Chunks the ECC stage repaired during verification.
    pub corrected_chunks: u64,
    pub findings: Vec<VerifyFinding>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

/// Random-access archive reader over any `Read + Seek` source.
pub struct ArchiveReader<R: Read + Seek> {
    source: R,
    file_len: u64,
    header: FileHeader,
    encryption_block: Option<EncryptionBlock>,
    trailer: Option<Trailer>,
    checksum: Arc<dyn ChecksumProvider>,
    providers: Arc<Providers>,
    cek: Option<ContentKey>,
    entries: Vec<EntryRecord>,
    by_id: HashMap<u64, usize>,
    by_name_hash: HashMap<u64, Vec<usize>>,
}

impl<R: Read + Seek> std::fmt::Debug for ArchiveReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveReader")
            .field("file_len", &self.file_len)
            .field("header", &self.header)
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl ArchiveReader<BufReader<File>> {
    /// Opens an archive file without a secret (pass-through mode if it is
    /// encrypted).
    pub fn open_path(path: impl AsRef<Path>, providers: Arc<Providers>) -> Result<Self, ApackError> {
        let file = File::open(path)?;
        Self::open(BufReader::new(file), providers)
    }

    /// Opens an archive file with a password or content key.
    pub fn open_path_with_secret(
        path: impl AsRef<Path>,
        providers: Arc<Providers>,
        secret: Secret<'_>,
    ) -> Result<Self, ApackError> {
        let file = File::open(path)?;
        Self::open_with_secret(BufReader::new(file), providers, secret)
    }
}

impl<R: Read + Seek> ArchiveReader<R> {
    /// Opens an archive. Encrypted archives open in pass-through mode:
    /// metadata is available, entry contents are not.
    pub fn open(source: R, providers: Arc<Providers>) -> Result<Self, ApackError> {
        Self::open_internal(source, providers, None, false)
    }

    /// Opens an archive, unwrapping the content key from `secret`.
    ///
    /// A wrong password surfaces as the `aead` kind, indistinguishable from
    /// a tampered encryption block.
    pub fn open_with_secret(
        source: R,
        providers: Arc<Providers>,
        secret: Secret<'_>,
    ) -> Result<Self, ApackError> {
        Self::open_internal(source, providers, Some(secret), false)
    }

    /// Explicit scan-from-end recovery: rebuilds the index from the trailer
    /// named by the end-of-file back-pointer, for archives whose file
    /// header was never back-patched.
    pub fn open_with_recovery(
        source: R,
        providers: Arc<Providers>,
        secret: Option<Secret<'_>>,
    ) -> Result<Self, ApackError> {
        Self::open_internal(source, providers, secret, true)
    }

    fn open_internal(
        mut source: R,
        providers: Arc<Providers>,
        secret: Option<Secret<'_>>,
        recovery: bool,
    ) -> Result<Self, ApackError> {
        let file_len = source.seek(SeekFrom::End(0))?;
        if file_len < FILE_HEADER_SIZE as u64 {
            return Err(ApackError::Format(format!(
                "file is {} bytes, smaller than the {}-byte header",
                file_len, FILE_HEADER_SIZE
            )));
        }

        source.seek(SeekFrom::Start(0))?;
        let mut header_bytes = [0u8; FILE_HEADER_SIZE];
        source.read_exact(&mut header_bytes)?;
        let header = FileHeader::decode(&header_bytes)?;
        let checksum = providers.checksum(header.checksum_algorithm)?;
        FileHeader::verify_checksum(&header_bytes, checksum.as_ref())?;

        // Encryption block, immediately after the header.
        let mut entries_start = FILE_HEADER_SIZE as u64;
        let mut encryption_block = None;
        if header.encrypted {
            let available = (file_len - entries_start).min(MAX_ENCRYPTION_BLOCK_LEN) as usize;
            let mut block_bytes = vec![0u8; available];
            source.read_exact(&mut block_bytes)?;
            let (block, consumed) = EncryptionBlock::decode(&block_bytes, checksum.as_ref())?;
            entries_start += consumed as u64;
            encryption_block = Some(block);
        }

        // Bind the secret to the archive's key hierarchy.
        let cek = match (&encryption_block, secret) {
            (Some(block), Some(Secret::Password(password))) => {
                let kdf = providers.kdf(block.kdf, block.kdf_params)?;
                let cipher = providers.encryption(block.cipher)?;
                Some(crate::key_wrapping::unwrap_content_key(
                    block,
                    password,
                    kdf.as_ref(),
                    cipher.as_ref(),
                )?)
            }
            (Some(_), Some(Secret::Key(key))) => Some(key),
            (Some(_), None) => {
                debug!("encrypted archive opened without a secret; pass-through mode");
                None
            }
            (None, Some(_)) => {
                return Err(ApackError::Configuration(
                    "a secret was supplied but the archive is not encrypted".to_string(),
                ));
            }
            (None, None) => None,
        };

        let mut reader = ArchiveReader {
            source,
            file_len,
            header,
            encryption_block,
            trailer: None,
            checksum,
            providers,
            cek,
            entries: Vec::new(),
            by_id: HashMap::new(),
            by_name_hash: HashMap::new(),
        };
        reader.build_index(entries_start, recovery)?;
        debug!(
            entries = reader.entries.len(),
            random_access = reader.header.random_access,
            "archive reader opened"
        );
        Ok(reader)
    }

    fn read_at(&mut self, offset: u64, len: usize, what: &str) -> Result<Vec<u8>, ApackError> {
        if offset.checked_add(len as u64).map_or(true, |end| end > self.file_len) {
            return Err(ApackError::Format(format!("{} overruns the file", what)));
        }
        self.source.seek(SeekFrom::Start(offset))?;
        let mut buffer = vec![0u8; len];
        self.source.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    fn read_back_pointer(&mut self) -> Result<u64, ApackError> {
        let offset = self.file_len - TRAILER_BACK_POINTER_SIZE as u64;
        let bytes = self.read_at(offset, TRAILER_BACK_POINTER_SIZE, "trailer back-pointer")?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&bytes);
        Ok(u64::from_le_bytes(raw))
    }

    fn read_trailer_at(&mut self, trailer_offset: u64) -> Result<Trailer, ApackError> {
        let region_end = self.file_len - TRAILER_BACK_POINTER_SIZE as u64;
        if trailer_offset >= region_end || trailer_offset < FILE_HEADER_SIZE as u64 {
            return Err(ApackError::Format(format!(
                "trailer offset {} is out of range",
                trailer_offset
            )));
        }
        let bytes = self.read_at(trailer_offset, (region_end - trailer_offset) as usize, "trailer")?;
        let checksum = self.checksum.clone();
        let (trailer, consumed) = Trailer::decode(&bytes, checksum.as_ref())?;
        if consumed != bytes.len() {
            return Err(ApackError::Format(
                "unexpected bytes between trailer and back-pointer".to_string(),
            ));
        }
        Ok(trailer)
    }

    /// Parses a variable-length entry header at `offset`, growing the probe
    /// buffer until the record fits.
    fn read_entry_header_at(&mut self, offset: u64) -> Result<(EntryHeader, usize), ApackError> {
        let available = self
            .file_len
            .checked_sub(offset)
            .ok_or_else(|| ApackError::Format("entry header offset past end of file".to_string()))?
            as usize;
        let mut probe_len = ENTRY_HEADER_PROBE_LEN.min(available);
        loop {
            let bytes = self.read_at(offset, probe_len, "entry header")?;
            let checksum = self.checksum.clone();
            match EntryHeader::decode(&bytes, checksum.as_ref()) {
                Ok(parsed) => return Ok(parsed),
                Err(err) if is_truncation(&err) && probe_len < available => {
                    probe_len = (probe_len * 4).min(available);
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn build_index(&mut self, entries_start: u64, recovery: bool) -> Result<(), ApackError> {
        if recovery {
            let trailer_offset = self.read_back_pointer()?;
            let trailer = self.read_trailer_at(trailer_offset)?;
            warn!(
                entries = trailer.entry_count,
                trailer_offset, "index recovered from end-of-file back-pointer"
            );
            if trailer.records.is_empty() {
                self.scan_entries(entries_start, trailer_offset)?;
            } else {
                self.load_toc_entries(&trailer)?;
            }
            self.trailer = Some(trailer);
        } else if self.header.random_access && self.header.trailer_offset != 0 {
            let trailer = self.read_trailer_at(self.header.trailer_offset)?;
            let back_pointer = self.read_back_pointer()?;
            if back_pointer != self.header.trailer_offset {
                return Err(ApackError::Format(format!(
                    "trailer back-pointer {} disagrees with header offset {}",
                    back_pointer, self.header.trailer_offset
                )));
            }
            if trailer.entry_count != self.header.entry_count {
                return Err(ApackError::Format(format!(
                    "trailer says {} entries, header says {}",
                    trailer.entry_count, self.header.entry_count
                )));
            }
            self.load_toc_entries(&trailer)?;
            self.trailer = Some(trailer);
        } else {
            let scan_end = self.scan_entries_to_trailer(entries_start)?;
            if let Some(trailer_offset) = scan_end {
                let trailer = self.read_trailer_at(trailer_offset)?;
                self.trailer = Some(trailer);
            }
        }

        // Lookup maps; ids must be unique and strictly increasing.
        let mut previous_id: Option<u64> = None;
        for (index, record) in self.entries.iter().enumerate() {
            let id = record.header.entry_id;
            if let Some(previous) = previous_id {
                if id <= previous {
                    return Err(ApackError::Format(format!(
                        "entry ids are not strictly increasing ({} after {})",
                        id, previous
                    )));
                }
            }
            previous_id = Some(id);
            self.by_id.insert(id, index);
            self.by_name_hash
                .entry(name_hash(&record.header.name))
                .or_default()
                .push(index);
        }
        Ok(())
    }

    fn load_toc_entries(&mut self, trailer: &Trailer) -> Result<(), ApackError> {
        for record in &trailer.records {
            let (header, consumed) = self.read_entry_header_at(record.header_offset)?;
            if header.entry_id != record.entry_id {
                return Err(ApackError::Format(format!(
                    "TOC names entry {} at offset {}, found entry {}",
                    record.entry_id, record.header_offset, header.entry_id
                )));
            }
            if header.original_size != record.original_size || header.stored_size != record.stored_size {
                return Err(ApackError::Format(format!(
                    "TOC sizes for entry {} disagree with its header",
                    record.entry_id
                )));
            }
            self.entries.push(EntryRecord {
                data_offset: record.header_offset + consumed as u64,
                header_offset: record.header_offset,
                header,
            });
        }
        Ok(())
    }

    /// Forward scan for archives without a usable TOC. Stops at the trailer
    /// magic (returning its offset) or at the back-pointer region.
    fn scan_entries_to_trailer(&mut self, entries_start: u64) -> Result<Option<u64>, ApackError> {
        let region_end = self.file_len - TRAILER_BACK_POINTER_SIZE as u64;
        let mut position = entries_start;
        while position < region_end {
            let probe = self.read_at(
                position,
                TRAILER_MAGIC.len().min((region_end - position) as usize),
                "record probe",
            )?;
            if probe == TRAILER_MAGIC {
                return Ok(Some(position));
            }
            position = self.scan_one_entry(position)?;
        }
        Ok(None)
    }

    fn scan_entries(&mut self, entries_start: u64, scan_end: u64) -> Result<(), ApackError> {
        let mut position = entries_start;
        while position < scan_end {
            position = self.scan_one_entry(position)?;
        }
        Ok(())
    }

    /// Parses the entry header at `position` and skips its chunk records,
    /// returning the offset just past the entry.
    fn scan_one_entry(&mut self, position: u64) -> Result<u64, ApackError> {
        let (header, consumed) = self.read_entry_header_at(position)?;
        let data_offset = position + consumed as u64;
        let mut cursor = data_offset;
        for _ in 0..header.chunk_count {
            let header_bytes = self.read_at(cursor, CHUNK_HEADER_SIZE, "chunk header")?;
            let chunk = ChunkHeader::decode(&header_bytes)?;
            cursor = cursor
                .checked_add(CHUNK_HEADER_SIZE as u64 + u64::from(chunk.stored_len))
                .ok_or_else(|| ApackError::Format("chunk record overruns the file".to_string()))?;
            if cursor > self.file_len {
                return Err(ApackError::Format(format!(
                    "chunk record of entry {} overruns the file",
                    header.entry_id
                )));
            }
        }
        self.entries.push(EntryRecord {
            header,
            header_offset: position,
            data_offset,
        });
        Ok(cursor)
    }

    pub fn file_header(&self) -> &FileHeader {
        &self.header
    }

    pub fn encryption_block(&self) -> Option<&EncryptionBlock> {
        self.encryption_block.as_ref()
    }

    pub fn trailer(&self) -> Option<&Trailer> {
        self.trailer.as_ref()
    }

    /// Whether a content key is bound (false in pass-through mode).
    pub fn has_content_key(&self) -> bool {
        self.cek.is_some()
    }

    pub fn entry_count(&self) -> u64 {
        self.entries.len() as u64
    }

    /// Entries in archive (arrival) order. Restartable and finite.
    pub fn entries(&self) -> impl Iterator<Item = Entry<'_>> {
        self.entries.iter().map(|record| Entry { record })
    }

    /// O(1) lookup by entry id.
    pub fn entry(&self, id: u64) -> Result<Entry<'_>, ApackError> {
        self.by_id
            .get(&id)
            .map(|&index| Entry {
                record: &self.entries[index],
            })
            .ok_or_else(|| ApackError::NotFound(format!("entry id {}", id)))
    }

    /// O(1) average lookup by name (XXH3-64 of the UTF-8 bytes, same-hash
    /// entries probed linearly). The first match in archive order wins.
    pub fn entry_by_name(&self, name: &str) -> Option<Entry<'_>> {
        self.by_name_hash.get(&name_hash(name)).and_then(|indices| {
            indices
                .iter()
                .map(|&index| &self.entries[index])
                .find(|record| record.header.name == name)
                .map(|record| Entry { record })
        })
    }

    fn pipeline_for(&self, header: &EntryHeader) -> Result<ChunkPipeline, ApackError> {
        let compression = match header.compression {
            Some(algorithm) => Some((self.providers.compression(algorithm)?, CompressionLevel::default())),
            None => None,
        };
        let encryption = match header.encryption {
            Some(algorithm) => Some(self.providers.encryption(algorithm)?),
            None => None,
        };
        let ecc = if header.ecc { Some(self.providers.ecc()?) } else { None };
        Ok(ChunkPipeline::new(
            self.checksum.clone(),
            compression,
            encryption,
            ecc,
            PipelineLimits {
                chunk_size: self.header.chunk_size,
                max_stored_len: ArchiveConfig::DEFAULT_MAX_STORED_CHUNK_LEN,
                max_ratio: ArchiveConfig::DEFAULT_MAX_DECOMPRESSION_RATIO,
            },
        ))
    }

    /// Opens a single-use decoded byte source over one entry.
    ///
    /// The returned stream borrows this reader exclusively for its
    /// lifetime; drop it before opening another entry. Encrypted entries
    /// require the reader to hold a content key.
    pub fn open_entry(&mut self, id: u64) -> Result<EntryReader<'_, R>, ApackError> {
        let record = {
            let entry = self.entry(id)?;
            entry.record.clone()
        };
        if record.header.encryption.is_some() && self.cek.is_none() {
            return Err(ApackError::Configuration(format!(
                "entry {} is encrypted but the archive was opened without a key",
                id
            )));
        }
        let pipeline = self.pipeline_for(&record.header)?;
        self.source.seek(SeekFrom::Start(record.data_offset))?;
        Ok(EntryReader {
            cek: self.cek.clone(),
            archive: self,
            pipeline,
            entry_id: record.header.entry_id,
            chunk_count: record.header.chunk_count,
            original_size: record.header.original_size,
            next_index: 0,
            produced: 0,
            buffer: Vec::new(),
            buffer_pos: 0,
        })
    }

    /// Verifies one entry: reads every chunk through the full pipeline,
    /// attempting ECC correction where enabled, and records mismatches.
    pub fn verify_entry(&mut self, id: u64) -> Result<VerifyReport, ApackError> {
        let index = *self
            .by_id
            .get(&id)
            .ok_or_else(|| ApackError::NotFound(format!("entry id {}", id)))?;
        let mut report = VerifyReport::default();
        self.verify_record(index, &mut report)?;
        Ok(report)
    }

    /// Verifies every entry, then cross-checks the trailer's global
    /// checksum when the archive is otherwise clean. The raw-byte global
    /// comparison is skipped when ECC repaired any chunk: the stored bytes
    /// are known to be damaged even though every entry decoded intact.
    pub fn verify_all(&mut self) -> Result<VerifyReport, ApackError> {
        let mut report = VerifyReport::default();
        for index in 0..self.entries.len() {
            self.verify_record(index, &mut report)?;
        }
        if report.is_clean() && report.corrected_chunks == 0 {
            self.verify_global_checksum(&mut report)?;
        }
        Ok(report)
    }

    fn verify_record(&mut self, index: usize, report: &mut VerifyReport) -> Result<(), ApackError> {
        let record = self.entries[index].clone();
        let entry_id = record.header.entry_id;

        if record.header.encryption.is_some() && self.cek.is_none() {
            report.findings.push(VerifyFinding {
                entry_id,
                chunk_index: None,
                kind: "configuration".to_string(),
                detail: "entry is encrypted and no key is available".to_string(),
            });
            return Ok(());
        }

        let pipeline = self.pipeline_for(&record.header)?;
        let cek = self.cek.clone();
        let mut cursor = record.data_offset;
        let mut produced = 0u64;

        for expected_index in 0..record.header.chunk_count {
            let outcome: Result<usize, ApackError> = (|| {
                let header_bytes = self.read_at(cursor, CHUNK_HEADER_SIZE, "chunk header")?;
                let chunk = ChunkHeader::decode(&header_bytes)?;
                if chunk.index != expected_index {
                    return Err(ApackError::Format(format!(
                        "chunk {} appears where chunk {} was expected",
                        chunk.index, expected_index
                    )));
                }
                if chunk.stored_len > pipeline.limits().max_stored_len {
                    return Err(ApackError::Bomb(format!(
                        "chunk {} stored length {} exceeds the cap",
                        chunk.index, chunk.stored_len
                    )));
                }
                let payload = self.read_at(
                    cursor + CHUNK_HEADER_SIZE as u64,
                    chunk.stored_len as usize,
                    "chunk payload",
                )?;
                cursor += CHUNK_HEADER_SIZE as u64 + u64::from(chunk.stored_len);
                let decoded = pipeline.decode_chunk(&chunk, &payload, entry_id, cek.as_ref())?;
                report.chunks_verified += 1;
                report.corrected_chunks += u64::from(decoded.corrected_shards > 0);
                Ok(decoded.plaintext.len())
            })();
            match outcome {
                Ok(plaintext_len) => produced += plaintext_len as u64,
                Err(err) => {
                    // Terminal for this entry; move on to the next one.
                    report.findings.push(VerifyFinding {
                        entry_id,
                        chunk_index: Some(expected_index),
                        kind: err.category().to_string(),
                        detail: err.to_string(),
                    });
                    return Ok(());
                }
            }
        }

        if produced != record.header.original_size {
            report.findings.push(VerifyFinding {
                entry_id,
                chunk_index: None,
                kind: "integrity".to_string(),
                detail: format!(
                    "entry decoded to {} bytes, header says {}",
                    produced, record.header.original_size
                ),
            });
            return Ok(());
        }
        report.entries_verified += 1;
        Ok(())
    }

    /// Recomputes the running checksum over every chunk record in file
    /// order and compares it with the trailer's global checksum.
    fn verify_global_checksum(&mut self, report: &mut VerifyReport) -> Result<(), ApackError> {
        let Some(expected) = self.trailer.as_ref().and_then(|trailer| trailer.global_checksum) else {
            return Ok(());
        };
        let mut hasher = self.checksum.begin();
        for index in 0..self.entries.len() {
            let record = self.entries[index].clone();
            let mut cursor = record.data_offset;
            for _ in 0..record.header.chunk_count {
                let header_bytes = self.read_at(cursor, CHUNK_HEADER_SIZE, "chunk header")?;
                let chunk = ChunkHeader::decode(&header_bytes)?;
                let payload = self.read_at(
                    cursor + CHUNK_HEADER_SIZE as u64,
                    chunk.stored_len as usize,
                    "chunk payload",
                )?;
                hasher.update(&header_bytes);
                hasher.update(&payload);
                cursor += CHUNK_HEADER_SIZE as u64 + u64::from(chunk.stored_len);
            }
        }
        let computed = hasher.finalize();
        if computed != expected {
            report.findings.push(VerifyFinding {
                entry_id: u64::MAX,
                chunk_index: None,
                kind: "integrity".to_string(),
                detail: "global checksum mismatch over chunk records".to_string(),
            });
        }
        Ok(())
    }
}

/// Single-use decoded byte source for one entry.
///
/// Yields the entry's plaintext through `std::io::Read`; the underlying
/// chunk records are decoded one at a time, with strict index ordering.
pub struct EntryReader<'r, R: Read + Seek> {
    archive: &'r mut ArchiveReader<R>,
    pipeline: ChunkPipeline,
    cek: Option<ContentKey>,
    entry_id: u64,
    chunk_count: u32,
    original_size: u64,
    next_index: u32,
    produced: u64,
    buffer: Vec<u8>,
    buffer_pos: usize,
}

impl<R: Read + Seek> std::fmt::Debug for EntryReader<'_, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryReader")
            .field("entry_id", &self.entry_id)
            .field("chunk_count", &self.chunk_count)
            .field("original_size", &self.original_size)
            .field("next_index", &self.next_index)
            .field("produced", &self.produced)
            .finish()
    }
}

impl<R: Read + Seek> EntryReader<'_, R> {
    /// Decodes the next chunk into the internal buffer. Returns false at
    /// end of entry.
    fn next_chunk(&mut self) -> Result<bool, ApackError> {
        if self.next_index == self.chunk_count {
            if self.produced != self.original_size {
                return Err(ApackError::Integrity(format!(
                    "entry {} decoded to {} bytes, header says {}",
                    self.entry_id, self.produced, self.original_size
                )));
            }
            return Ok(false);
        }

        let mut header_bytes = [0u8; CHUNK_HEADER_SIZE];
        self.archive
            .source
            .read_exact(&mut header_bytes)
            .map_err(|err| match err.kind() {
                std::io::ErrorKind::UnexpectedEof => {
                    ApackError::Format(format!("entry {} is truncated mid-chunk", self.entry_id))
                }
                _ => ApackError::from(err),
            })?;
        let chunk = ChunkHeader::decode(&header_bytes)?;
        if chunk.index != self.next_index {
            return Err(ApackError::Format(format!(
                "chunk {} appears where chunk {} was expected",
                chunk.index, self.next_index
            )));
        }
        if chunk.stored_len > self.pipeline.limits().max_stored_len {
            return Err(ApackError::Bomb(format!(
                "chunk {} stored length {} exceeds the cap",
                chunk.index, chunk.stored_len
            )));
        }

        let mut payload = vec![0u8; chunk.stored_len as usize];
        self.archive
            .source
            .read_exact(&mut payload)
            .map_err(|err| match err.kind() {
                std::io::ErrorKind::UnexpectedEof => {
                    ApackError::Format(format!("entry {} is truncated mid-chunk", self.entry_id))
                }
                _ => ApackError::from(err),
            })?;

        let decoded = self
            .pipeline
            .decode_chunk(&chunk, &payload, self.entry_id, self.cek.as_ref())?;
        self.produced += decoded.plaintext.len() as u64;
        self.buffer = decoded.plaintext;
        self.buffer_pos = 0;
        self.next_index += 1;
        Ok(true)
    }

    /// Reads the remainder of the entry into a buffer, preserving the
    /// archive-level error kinds (`std::io::Read` flattens them into
    /// `io::Error`).
    pub fn read_to_vec(&mut self) -> Result<Vec<u8>, ApackError> {
        let mut out = Vec::new();
        loop {
            if self.buffer_pos < self.buffer.len() {
                out.extend_from_slice(&self.buffer[self.buffer_pos..]);
                self.buffer_pos = self.buffer.len();
            }
            if !self.next_chunk()? {
                return Ok(out);
            }
        }
    }
}

impl<R: Read + Seek> Read for EntryReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            if self.buffer_pos < self.buffer.len() {
                let available = &self.buffer[self.buffer_pos..];
                let count = available.len().min(buf.len());
                buf[..count].copy_from_slice(&available[..count]);
                self.buffer_pos += count;
                return Ok(count);
            }
            if !self.next_chunk()? {
                return Ok(0);
            }
        }
    }
}
