// /////////////////////////////////////////////////////////////////////////////
// APACK
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Property tests for the format primitives: whatever encodes must decode
//! to a bit-identical value, for arbitrary field contents.

use apack_domain::{
    Attribute, AttributeValue, ChecksumAlgorithm, ChecksumHasher, ChecksumProvider, ChunkHeader,
    CompressionAlgorithm, EncryptionAlgorithm, EntryHeader,
};
use proptest::prelude::*;

/// Deterministic FNV-1a checksum; the property under test is the layout, not
/// the hash function.
struct Fnv64;

struct Fnv64State(u64);

impl ChecksumHasher for Fnv64State {
    fn update(&mut self, data: &[u8]) {
        for byte in data {
            self.0 ^= u64::from(*byte);
            self.0 = self.0.wrapping_mul(0x0000_0100_0000_01B3);
        }
    }

    fn finalize(self: Box<Self>) -> u64 {
        self.0
    }
}

impl ChecksumProvider for Fnv64 {
    fn algorithm(&self) -> ChecksumAlgorithm {
        ChecksumAlgorithm::Xxh3_64
    }

    fn begin(&self) -> Box<dyn ChecksumHasher> {
        Box::new(Fnv64State(0xCBF2_9CE4_8422_2325))
    }
}

fn name_strategy() -> impl Strategy<Value = String> {
    proptest::collection::vec("[a-zA-Z0-9_.-]{1,12}", 1..4)
        .prop_map(|segments| segments.join("/"))
        .prop_filter("no . or .. segments", |name| {
            name.split('/').all(|segment| segment != "." && segment != "..")
        })
}

fn attribute_strategy() -> impl Strategy<Value = Attribute> {
    let value = prop_oneof![
        ".{0,64}".prop_map(AttributeValue::String),
        any::<i64>().prop_map(AttributeValue::Int),
        any::<bool>().prop_map(AttributeValue::Bool),
        proptest::collection::vec(any::<u8>(), 0..256).prop_map(AttributeValue::Bytes),
    ];
    ("[a-z][a-z0-9_]{0,15}", value).prop_map(|(key, value)| Attribute::new(key, value).unwrap())
}

proptest! {
    #[test]
    fn prop_chunk_header_round_trip(
        index in any::<u32>(),
        stored_len in any::<u32>(),
        original_len in any::<u32>(),
        checksum in any::<u64>(),
        compressed in any::<bool>(),
        ecc in any::<bool>(),
    ) {
        let mut flags = 0u16;
        if compressed {
            flags |= apack_domain::value_objects::CHUNK_FLAG_COMPRESSED;
        }
        if ecc {
            flags |= apack_domain::value_objects::CHUNK_FLAG_ECC_PARITY;
        }
        let header = ChunkHeader { index, stored_len, original_len, checksum, flags };
        let bytes = header.encode();
        let decoded = ChunkHeader::decode(&bytes).unwrap();
        prop_assert_eq!(decoded, header);
    }

    #[test]
    fn prop_entry_header_round_trip(
        entry_id in any::<u64>(),
        original_size in any::<u64>(),
        stored_size in any::<u64>(),
        chunk_count in any::<u32>(),
        compression in prop_oneof![
            Just(None),
            Just(Some(CompressionAlgorithm::Zstd)),
            Just(Some(CompressionAlgorithm::Lz4)),
        ],
        encryption in prop_oneof![
            Just(None),
            Just(Some(EncryptionAlgorithm::Aes256Gcm)),
            Just(Some(EncryptionAlgorithm::ChaCha20Poly1305)),
        ],
        ecc in any::<bool>(),
        name in name_strategy(),
        mime in "[a-z]{0,10}(/[a-z0-9.+-]{1,20})?",
        attributes in proptest::collection::vec(attribute_strategy(), 0..4),
    ) {
        let checksum = Fnv64;
        let header = EntryHeader {
            version: apack_domain::value_objects::ENTRY_HEADER_VERSION,
            entry_id,
            original_size,
            stored_size,
            chunk_count,
            compression,
            encryption,
            ecc,
            name,
            mime,
            attributes,
        };
        let bytes = header.encode(&checksum).unwrap();
        let (decoded, consumed) = EntryHeader::decode(&bytes, &checksum).unwrap();
        prop_assert_eq!(consumed, bytes.len());
        prop_assert_eq!(decoded, header);
    }

    #[test]
    fn prop_entry_header_rejects_truncation(
        name in name_strategy(),
        cut in 1usize..40,
    ) {
        let checksum = Fnv64;
        let header = EntryHeader {
            version: apack_domain::value_objects::ENTRY_HEADER_VERSION,
            entry_id: 1,
            original_size: 10,
            stored_size: 10,
            chunk_count: 1,
            compression: None,
            encryption: None,
            ecc: false,
            name,
            mime: String::new(),
            attributes: Vec::new(),
        };
        let bytes = header.encode(&checksum).unwrap();
        let cut = cut.min(bytes.len() - 1);
        let result = EntryHeader::decode(&bytes[..bytes.len() - cut], &checksum);
        prop_assert!(result.is_err());
    }
}
