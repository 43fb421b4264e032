// /////////////////////////////////////////////////////////////////////////////
// APACK
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Byte Sinks
//!
//! The writer targets a [`ByteSink`]: a `Write` with an explicit
//! `is_seekable` capability. Random access requires seeking (the file
//! header and entry headers are rewritten at close), so the writer refuses
//! a random-access configuration on a non-seekable sink instead of silently
//! degrading — callers opt into stream mode.
//!
//! [`FileSink`] wraps a buffered file and supports back-patching.
//! [`StreamSink`] wraps any `Write` (a socket, a pipe, a compressor) and
//! only counts its position.

use apack_domain::ApackError;
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

/// Destination for archive bytes.
///
/// `position` reports the logical write offset from the start of the
/// archive; on seekable sinks `seek_to` repositions the cursor for
/// back-patching.
pub trait ByteSink: Write {
    /// Whether `seek_to` works. Decided once at construction; the writer
    /// checks it against the configuration at create time.
    fn is_seekable(&self) -> bool;

    /// Current write offset from the start of the archive.
    fn position(&mut self) -> Result<u64, ApackError>;

    /// Repositions the cursor. Fails with an I/O error on non-seekable
    /// sinks.
    fn seek_to(&mut self, offset: u64) -> Result<(), ApackError>;
}

/// Buffered, seekable file sink.
pub struct FileSink {
    inner: BufWriter<File>,
}

impl FileSink {
    /// Creates (or truncates) the file at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, ApackError> {
        let file = File::create(path)?;
        Ok(FileSink {
            inner: BufWriter::new(file),
        })
    }

    /// Wraps an already-open file positioned at offset 0.
    pub fn from_file(file: File) -> Self {
        FileSink {
            inner: BufWriter::new(file),
        }
    }

    /// Flushes buffers and hands the file back.
    pub fn into_file(self) -> Result<File, ApackError> {
        self.inner
            .into_inner()
            .map_err(|err| ApackError::Io(err.to_string()))
    }
}

impl Write for FileSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl ByteSink for FileSink {
    fn is_seekable(&self) -> bool {
        true
    }

    fn position(&mut self) -> Result<u64, ApackError> {
        Ok(self.inner.stream_position()?)
    }

    fn seek_to(&mut self, offset: u64) -> Result<(), ApackError> {
        self.inner.seek(SeekFrom::Start(offset))?;
        Ok(())
    }
}

/// Forward-only sink over any `Write`; tracks its position by counting.
pub struct StreamSink<W: Write> {
    inner: W,
    position: u64,
}

impl<W: Write> StreamSink<W> {
    pub fn new(inner: W) -> Self {
        StreamSink { inner, position: 0 }
    }

    /// Unwraps the inner writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for StreamSink<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.position += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write> ByteSink for StreamSink<W> {
    fn is_seekable(&self) -> bool {
        false
    }

    fn position(&mut self) -> Result<u64, ApackError> {
        Ok(self.position)
    }

    fn seek_to(&mut self, _offset: u64) -> Result<(), ApackError> {
        Err(ApackError::Io("sink does not support seeking".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_sink_counts_position() {
        let mut sink = StreamSink::new(Vec::new());
        assert!(!sink.is_seekable());
        assert_eq!(sink.position().unwrap(), 0);
        sink.write_all(b"hello").unwrap();
        sink.write_all(b" world").unwrap();
        assert_eq!(sink.position().unwrap(), 11);
        assert!(sink.seek_to(0).is_err());
        assert_eq!(sink.into_inner(), b"hello world");
    }

    #[test]
    fn test_file_sink_back_patching() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patch.bin");
        let mut sink = FileSink::create(&path).unwrap();
        assert!(sink.is_seekable());
        sink.write_all(&[0u8; 8]).unwrap();
        sink.write_all(b"payload").unwrap();
        let end = sink.position().unwrap();
        sink.seek_to(0).unwrap();
        sink.write_all(b"PATCHED!").unwrap();
        sink.seek_to(end).unwrap();
        sink.flush().unwrap();
        drop(sink);
        let contents = std::fs::read(&path).unwrap();
        assert_eq!(&contents[..8], b"PATCHED!");
        assert_eq!(&contents[8..], b"payload");
    }
}
