// /////////////////////////////////////////////////////////////////////////////
// APACK
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Checksum Providers
//!
//! XXH3-64 (the archive default), XXH3-128, and CRC-32. All providers
//! present their digest as a `u64` for the fixed 8-byte checksum slots:
//! CRC-32 is zero-extended and XXH3-128 is folded by XOR of its high and
//! low halves.

use apack_domain::{ChecksumAlgorithm, ChecksumHasher, ChecksumProvider};
use xxhash_rust::xxh3::Xxh3;

/// XXH3 with a 64-bit digest. The format default.
pub struct Xxh3_64Checksum;

struct Xxh3_64State(Xxh3);

impl ChecksumHasher for Xxh3_64State {
    fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    fn finalize(self: Box<Self>) -> u64 {
        self.0.digest()
    }
}

impl ChecksumProvider for Xxh3_64Checksum {
    fn algorithm(&self) -> ChecksumAlgorithm {
        ChecksumAlgorithm::Xxh3_64
    }

    fn begin(&self) -> Box<dyn ChecksumHasher> {
        Box::new(Xxh3_64State(Xxh3::new()))
    }
}

/// XXH3 with a 128-bit digest, folded to 64 bits for storage.
pub struct Xxh3_128Checksum;

struct Xxh3_128State(Xxh3);

impl ChecksumHasher for Xxh3_128State {
    fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    fn finalize(self: Box<Self>) -> u64 {
        let digest = self.0.digest128();
        (digest as u64) ^ ((digest >> 64) as u64)
    }
}

impl ChecksumProvider for Xxh3_128Checksum {
    fn algorithm(&self) -> ChecksumAlgorithm {
        ChecksumAlgorithm::Xxh3_128
    }

    fn begin(&self) -> Box<dyn ChecksumHasher> {
        Box::new(Xxh3_128State(Xxh3::new()))
    }
}

/// CRC-32 (IEEE), zero-extended to 64 bits.
pub struct Crc32Checksum;

struct Crc32State(crc32fast::Hasher);

impl ChecksumHasher for Crc32State {
    fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    fn finalize(self: Box<Self>) -> u64 {
        u64::from(self.0.finalize())
    }
}

impl ChecksumProvider for Crc32Checksum {
    fn algorithm(&self) -> ChecksumAlgorithm {
        ChecksumAlgorithm::Crc32
    }

    fn begin(&self) -> Box<dyn ChecksumHasher> {
        Box::new(Crc32State(crc32fast::Hasher::new()))
    }
}
