// /////////////////////////////////////////////////////////////////////////////
// APACK
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Deterministic checksum stand-in for format-layer tests.
//!
//! The real providers live in the infrastructure crate; the domain tests
//! only need *a* deterministic hash to exercise the checksum-zeroing rules,
//! so this uses FNV-1a while claiming whatever algorithm id the test asks
//! for.

use crate::services::{ChecksumAlgorithm, ChecksumHasher, ChecksumProvider};

pub(crate) struct TestChecksum {
    algorithm: ChecksumAlgorithm,
}

impl TestChecksum {
    pub fn xxh3_64() -> Self {
        TestChecksum {
            algorithm: ChecksumAlgorithm::Xxh3_64,
        }
    }

    #[allow(dead_code)]
    pub fn with_algorithm(algorithm: ChecksumAlgorithm) -> Self {
        TestChecksum { algorithm }
    }
}

struct Fnv64 {
    state: u64,
}

impl ChecksumHasher for Fnv64 {
    fn update(&mut self, data: &[u8]) {
        for byte in data {
            self.state ^= u64::from(*byte);
            self.state = self.state.wrapping_mul(0x0000_0100_0000_01B3);
        }
    }

    fn finalize(self: Box<Self>) -> u64 {
        self.state
    }
}

impl ChecksumProvider for TestChecksum {
    fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    fn begin(&self) -> Box<dyn ChecksumHasher> {
        Box::new(Fnv64 {
            state: 0xCBF2_9CE4_8422_2325,
        })
    }
}
