// /////////////////////////////////////////////////////////////////////////////
// APACK
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Command-Line Interface
//!
//! Thin presentation layer over the archive core:
//!
//! ```bash
//! apack create save.apack assets/ --compress zstd --encrypt aes256-gcm --password-env APACK_PW
//! apack list save.apack
//! apack info save.apack --json
//! apack extract save.apack --out restored/ --password-env APACK_PW
//! apack verify save.apack
//! ```
//!
//! Exit conventions: 0 success, 1 operational failure (I/O, configuration,
//! unknown entry), 2 format/corruption/authentication failure.

use crate::infrastructure::providers::Providers;
use crate::io::FileSink;
use crate::reader::ArchiveReader;
use crate::writer::{ArchiveWriter, EntryMetadata};
use apack_domain::{
    ApackError, ArchiveConfig, ChecksumAlgorithm, ChunkSize, CompressionAlgorithm, CompressionLevel,
    EccConfig, EncryptionAlgorithm, KdfAlgorithm, Secret,
};
use byte_unit::{Byte, UnitType};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "apack", version, about = "Chunked archive tool with integrity, compression, encryption, and error correction")]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum CompressArg {
    Zstd,
    Lz4,
}

#[derive(Clone, Copy, ValueEnum)]
enum EncryptArg {
    #[value(name = "aes256-gcm")]
    Aes256Gcm,
    #[value(name = "chacha20-poly1305")]
    ChaCha20Poly1305,
}

#[derive(Clone, Copy, ValueEnum)]
enum KdfArg {
    Argon2id,
    #[value(name = "pbkdf2-sha256")]
    Pbkdf2Sha256,
}

#[derive(Clone, Copy, ValueEnum)]
enum ChecksumArg {
    #[value(name = "crc-32")]
    Crc32,
    #[value(name = "xxh3-64")]
    Xxh3_64,
    #[value(name = "xxh3-128")]
    Xxh3_128,
}

#[derive(Subcommand)]
enum Command {
    /// Create an archive from files.
    Create {
        /// Output archive path.
        archive: PathBuf,
        /// Input files, stored under their file names.
        inputs: Vec<PathBuf>,
        /// Chunk size in KiB (default 256).
        #[arg(long)]
        chunk_size_kib: Option<u32>,
        /// Checksum algorithm (default xxh3-64).
        #[arg(long, value_enum)]
        checksum: Option<ChecksumArg>,
        /// Compression codec.
        #[arg(long, value_enum)]
        compress: Option<CompressArg>,
        /// Raw compression level for the chosen codec.
        #[arg(long, requires = "compress")]
        level: Option<u32>,
        /// Encryption cipher.
        #[arg(long, value_enum)]
        encrypt: Option<EncryptArg>,
        /// Key derivation function for the password (default argon2id).
        #[arg(long, value_enum, requires = "encrypt")]
        kdf: Option<KdfArg>,
        /// Environment variable holding the password.
        #[arg(long, requires = "encrypt")]
        password_env: Option<String>,
        /// Append Reed-Solomon parity to every chunk.
        #[arg(long)]
        ecc: bool,
    },
    /// List entries.
    List {
        archive: PathBuf,
    },
    /// Show archive metadata.
    Info {
        archive: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Extract entries (all by default).
    Extract {
        archive: PathBuf,
        /// Specific entry names; everything when empty.
        entries: Vec<String>,
        /// Destination directory.
        #[arg(long, default_value = ".")]
        out: PathBuf,
        /// Environment variable holding the password.
        #[arg(long)]
        password_env: Option<String>,
    },
    /// Verify every chunk of the archive.
    Verify {
        archive: PathBuf,
        #[arg(long)]
        password_env: Option<String>,
        #[arg(long)]
        json: bool,
    },
}

/// Parses arguments, runs the command, and maps the outcome to the exit
/// convention: 0 success, 1 operational failure, 2 data failure.
pub fn run() -> i32 {
    let cli = Cli::parse();
    match execute(cli.command) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err);
            if err.is_data_error() {
                2
            } else {
                1
            }
        }
    }
}

fn password_from_env(var: &Option<String>) -> Result<Option<Vec<u8>>, ApackError> {
    match var {
        Some(name) => std::env::var(name)
            .map(|value| Some(value.into_bytes()))
            .map_err(|_| ApackError::Configuration(format!("environment variable {} is not set", name))),
        None => Ok(None),
    }
}

fn open_reader(
    archive: &Path,
    providers: Arc<Providers>,
    password: Option<&[u8]>,
) -> Result<ArchiveReader<std::io::BufReader<File>>, ApackError> {
    match password {
        Some(password) => {
            ArchiveReader::open_path_with_secret(archive, providers, Secret::Password(password))
        }
        None => ArchiveReader::open_path(archive, providers),
    }
}

fn execute(command: Command) -> Result<(), ApackError> {
    let providers = Arc::new(Providers::full());
    match command {
        Command::Create {
            archive,
            inputs,
            chunk_size_kib,
            checksum,
            compress,
            level,
            encrypt,
            kdf,
            password_env,
            ecc,
        } => {
            let mut builder = ArchiveConfig::builder();
            if let Some(kib) = chunk_size_kib {
                builder = builder.chunk_size(ChunkSize::from_kib(kib)?);
            }
            if let Some(algorithm) = checksum {
                builder = builder.checksum(match algorithm {
                    ChecksumArg::Crc32 => ChecksumAlgorithm::Crc32,
                    ChecksumArg::Xxh3_64 => ChecksumAlgorithm::Xxh3_64,
                    ChecksumArg::Xxh3_128 => ChecksumAlgorithm::Xxh3_128,
                });
            }
            if let Some(codec) = compress {
                let codec = match codec {
                    CompressArg::Zstd => CompressionAlgorithm::Zstd,
                    CompressArg::Lz4 => CompressionAlgorithm::Lz4,
                };
                let level = level.map_or(CompressionLevel::Balanced, CompressionLevel::Custom);
                builder = builder.compression(codec, level);
            }
            if let Some(cipher) = encrypt {
                let cipher = match cipher {
                    EncryptArg::Aes256Gcm => EncryptionAlgorithm::Aes256Gcm,
                    EncryptArg::ChaCha20Poly1305 => EncryptionAlgorithm::ChaCha20Poly1305,
                };
                let kdf = match kdf.unwrap_or(KdfArg::Argon2id) {
                    KdfArg::Argon2id => KdfAlgorithm::Argon2id,
                    KdfArg::Pbkdf2Sha256 => KdfAlgorithm::Pbkdf2Sha256,
                };
                builder = builder.encryption(cipher, kdf);
            }
            if ecc {
                builder = builder.ecc(EccConfig::default());
            }
            let config = builder.build()?;

            let password = password_from_env(&password_env)?;
            if config.encryption().is_some() && password.is_none() {
                return Err(ApackError::Configuration(
                    "--encrypt requires --password-env".to_string(),
                ));
            }

            let sink = FileSink::create(&archive)?;
            let secret = password.as_deref().map(Secret::Password);
            let mut writer = ArchiveWriter::create(sink, config, providers, secret)?;
            for input in &inputs {
                let name = input
                    .file_name()
                    .and_then(|name| name.to_str())
                    .ok_or_else(|| {
                        ApackError::Configuration(format!("{} has no usable file name", input.display()))
                    })?;
                let mut file = File::open(input)?;
                let id = writer.add_entry(EntryMetadata::named(name)?, &mut file)?;
                info!(id, name, "added entry");
            }
            writer.close()?;
            println!("created {} with {} entries", archive.display(), writer.entry_count());
            Ok(())
        }

        Command::List { archive } => {
            let reader = ArchiveReader::open_path(&archive, providers)?;
            for entry in reader.entries() {
                let size = Byte::from_u64(entry.original_size()).get_appropriate_unit(UnitType::Binary);
                println!("{:>6}  {:>12}  {}", entry.id(), format!("{:.1}", size), entry.name());
            }
            Ok(())
        }

        Command::Info { archive, json } => {
            let reader = ArchiveReader::open_path(&archive, providers)?;
            let summary = InfoSummary::collect(&reader);
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&summary)
                        .map_err(|err| ApackError::Format(err.to_string()))?
                );
            } else {
                summary.print();
            }
            Ok(())
        }

        Command::Extract {
            archive,
            entries,
            out,
            password_env,
        } => {
            let password = password_from_env(&password_env)?;
            let mut reader = open_reader(&archive, providers, password.as_deref())?;
            let targets: Vec<u64> = if entries.is_empty() {
                reader.entries().map(|entry| entry.id()).collect()
            } else {
                entries
                    .iter()
                    .map(|name| {
                        reader
                            .entry_by_name(name)
                            .map(|entry| entry.id())
                            .ok_or_else(|| ApackError::NotFound(format!("entry {:?}", name)))
                    })
                    .collect::<Result<_, _>>()?
            };
            for id in targets {
                let name = reader.entry(id)?.name().to_string();
                // Entry names are validated relative paths; join stays in `out`.
                let destination = out.join(&name);
                if let Some(parent) = destination.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                let mut source = reader.open_entry(id)?;
                let mut file = File::create(&destination)?;
                std::io::copy(&mut source, &mut file)?;
                println!("extracted {}", name);
            }
            Ok(())
        }

        Command::Verify {
            archive,
            password_env,
            json,
        } => {
            let password = password_from_env(&password_env)?;
            let mut reader = open_reader(&archive, providers, password.as_deref())?;
            let report = reader.verify_all()?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&report)
                        .map_err(|err| ApackError::Format(err.to_string()))?
                );
            } else {
                println!(
                    "{} entries, {} chunks verified, {} chunks corrected",
                    report.entries_verified, report.chunks_verified, report.corrected_chunks
                );
                for finding in &report.findings {
                    println!(
                        "  entry {} chunk {}: [{}] {}",
                        finding.entry_id,
                        finding
                            .chunk_index
                            .map_or_else(|| "-".to_string(), |index| index.to_string()),
                        finding.kind,
                        finding.detail
                    );
                }
            }
            if report.is_clean() {
                Ok(())
            } else {
                Err(ApackError::Integrity(format!(
                    "{} problems found",
                    report.findings.len()
                )))
            }
        }
    }
}

#[derive(Serialize)]
struct EntrySummary {
    id: u64,
    name: String,
    mime: String,
    original_size: u64,
    stored_size: u64,
    chunk_count: u32,
    compression: Option<String>,
    encryption: Option<String>,
    ecc: bool,
}

#[derive(Serialize)]
struct InfoSummary {
    format_version: String,
    random_access: bool,
    encrypted: bool,
    stream_mode: bool,
    chunk_size: u32,
    checksum: String,
    created_at: Option<String>,
    entry_count: u64,
    trailer_offset: u64,
    kdf: Option<String>,
    cipher: Option<String>,
    salt_hex: Option<String>,
    entries: Vec<EntrySummary>,
}

impl InfoSummary {
    fn collect<R: std::io::Read + std::io::Seek>(reader: &ArchiveReader<R>) -> Self {
        let header = reader.file_header();
        let created_at = chrono::DateTime::from_timestamp_millis(header.created_at_ms as i64)
            .map(|timestamp| timestamp.to_rfc3339());
        InfoSummary {
            format_version: format!("{}.{}", header.version_major, header.version_minor),
            random_access: header.random_access,
            encrypted: header.encrypted,
            stream_mode: header.stream_mode,
            chunk_size: header.chunk_size,
            checksum: header.checksum_algorithm.to_string(),
            created_at,
            entry_count: reader.entry_count(),
            trailer_offset: header.trailer_offset,
            kdf: reader.encryption_block().map(|block| block.kdf.to_string()),
            cipher: reader.encryption_block().map(|block| block.cipher.to_string()),
            salt_hex: reader.encryption_block().map(|block| hex::encode(&block.salt)),
            entries: reader
                .entries()
                .map(|entry| EntrySummary {
                    id: entry.id(),
                    name: entry.name().to_string(),
                    mime: entry.mime().to_string(),
                    original_size: entry.original_size(),
                    stored_size: entry.stored_size(),
                    chunk_count: entry.chunk_count(),
                    compression: entry.compression().map(|algorithm| algorithm.to_string()),
                    encryption: entry.encryption().map(|algorithm| algorithm.to_string()),
                    ecc: entry.has_ecc(),
                })
                .collect(),
        }
    }

    fn print(&self) {
        println!("format version : {}", self.format_version);
        println!("random access  : {}", self.random_access);
        println!("encrypted      : {}", self.encrypted);
        println!("stream mode    : {}", self.stream_mode);
        println!(
            "chunk size     : {:.1}",
            Byte::from_u64(u64::from(self.chunk_size)).get_appropriate_unit(UnitType::Binary)
        );
        println!("checksum       : {}", self.checksum);
        if let Some(created_at) = &self.created_at {
            println!("created        : {}", created_at);
        }
        if let (Some(kdf), Some(cipher)) = (&self.kdf, &self.cipher) {
            println!("key wrapping   : {} + {}", kdf, cipher);
        }
        println!("entries        : {}", self.entry_count);
        for entry in &self.entries {
            let size = Byte::from_u64(entry.original_size).get_appropriate_unit(UnitType::Binary);
            println!(
                "  [{}] {} ({:.1}, {} chunks)",
                entry.id, entry.name, size, entry.chunk_count
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_create_args_parse() {
        let cli = Cli::try_parse_from([
            "apack",
            "create",
            "out.apack",
            "a.txt",
            "b.txt",
            "--compress",
            "zstd",
            "--level",
            "6",
            "--ecc",
        ])
        .unwrap();
        match cli.command {
            Command::Create {
                inputs,
                compress,
                level,
                ecc,
                ..
            } => {
                assert_eq!(inputs.len(), 2);
                assert!(matches!(compress, Some(CompressArg::Zstd)));
                assert_eq!(level, Some(6));
                assert!(ecc);
            }
            _ => panic!("expected create"),
        }
    }

    #[test]
    fn test_level_requires_compress() {
        assert!(Cli::try_parse_from(["apack", "create", "out.apack", "a.txt", "--level", "6"]).is_err());
    }
}
