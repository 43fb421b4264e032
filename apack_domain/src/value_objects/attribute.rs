// /////////////////////////////////////////////////////////////////////////////
// APACK
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Entry Attributes
//!
//! Key/value metadata attached to an entry header. Values are a tagged
//! union of string, signed 64-bit integer, boolean, and raw bytes. Keys use
//! a 16-bit length prefix; string and byte values use a 32-bit prefix so
//! they may exceed 64 KiB.
//!
//! Wire layout per attribute:
//! `key (u16 len + UTF-8) | tag (u8) | value`, with tags
//! `0: string, 1: i64, 2: bool, 3: bytes`.

use crate::value_objects::wire::{ByteReader, ByteWriter};
use crate::ApackError;
use serde::{Deserialize, Serialize};

const TAG_STRING: u8 = 0;
const TAG_INT: u8 = 1;
const TAG_BOOL: u8 = 2;
const TAG_BYTES: u8 = 3;

/// Attribute value: a closed tagged union.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttributeValue {
    String(String),
    Int(i64),
    Bool(bool),
    Bytes(Vec<u8>),
}

/// A single entry attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub key: String,
    pub value: AttributeValue,
}

impl Attribute {
    /// Creates an attribute, rejecting empty keys.
    pub fn new(key: impl Into<String>, value: AttributeValue) -> Result<Self, ApackError> {
        let key = key.into();
        if key.is_empty() {
            return Err(ApackError::Format("attribute key must not be empty".to_string()));
        }
        Ok(Attribute { key, value })
    }

    pub(crate) fn encode_into(&self, writer: &mut ByteWriter) -> Result<(), ApackError> {
        if self.key.is_empty() {
            return Err(ApackError::Format("attribute key must not be empty".to_string()));
        }
        writer.put_bytes16(self.key.as_bytes(), "attribute key")?;
        match &self.value {
            AttributeValue::String(text) => {
                writer.put_u8(TAG_STRING);
                writer.put_bytes32(text.as_bytes(), "attribute string value")?;
            }
            AttributeValue::Int(value) => {
                writer.put_u8(TAG_INT);
                writer.put_i64(*value);
            }
            AttributeValue::Bool(value) => {
                writer.put_u8(TAG_BOOL);
                writer.put_u8(u8::from(*value));
            }
            AttributeValue::Bytes(bytes) => {
                writer.put_u8(TAG_BYTES);
                writer.put_bytes32(bytes, "attribute byte value")?;
            }
        }
        Ok(())
    }

    pub(crate) fn decode_from(reader: &mut ByteReader<'_>) -> Result<Self, ApackError> {
        let key = reader.read_string16("attribute key")?;
        if key.is_empty() {
            return Err(ApackError::Format("attribute key must not be empty".to_string()));
        }
        let tag = reader.read_u8("attribute tag")?;
        let value = match tag {
            TAG_STRING => AttributeValue::String(reader.read_string32("attribute string value")?),
            TAG_INT => AttributeValue::Int(reader.read_i64("attribute integer value")?),
            TAG_BOOL => match reader.read_u8("attribute boolean value")? {
                0 => AttributeValue::Bool(false),
                1 => AttributeValue::Bool(true),
                other => {
                    return Err(ApackError::Format(format!(
                        "attribute boolean value must be 0 or 1, got {}",
                        other
                    )))
                }
            },
            TAG_BYTES => AttributeValue::Bytes(reader.read_bytes32("attribute byte value")?.to_vec()),
            other => return Err(ApackError::Format(format!("unknown attribute tag {}", other))),
        };
        Ok(Attribute { key, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(attribute: &Attribute) -> Attribute {
        let mut writer = ByteWriter::new();
        attribute.encode_into(&mut writer).unwrap();
        let bytes = writer.into_bytes();
        let mut reader = ByteReader::new(&bytes);
        let decoded = Attribute::decode_from(&mut reader).unwrap();
        assert_eq!(reader.remaining(), 0);
        decoded
    }

    #[test]
    fn test_round_trip_all_variants() {
        let cases = vec![
            Attribute::new("author", AttributeValue::String("unit test".into())).unwrap(),
            Attribute::new("mtime", AttributeValue::Int(-1_620_000_000_123)).unwrap(),
            Attribute::new("readonly", AttributeValue::Bool(true)).unwrap(),
            Attribute::new("thumbnail", AttributeValue::Bytes(vec![0xDE, 0xAD, 0xBE, 0xEF])).unwrap(),
        ];
        for attribute in &cases {
            assert_eq!(&round_trip(attribute), attribute);
        }
    }

    #[test]
    fn test_large_value_uses_u32_prefix() {
        let attribute = Attribute::new("blob", AttributeValue::Bytes(vec![7u8; 80_000])).unwrap();
        assert_eq!(round_trip(&attribute), attribute);
    }

    #[test]
    fn test_empty_key_rejected() {
        assert!(Attribute::new("", AttributeValue::Bool(false)).is_err());
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let mut writer = ByteWriter::new();
        writer.put_bytes16(b"key", "attribute key").unwrap();
        writer.put_u8(0x7F);
        let bytes = writer.into_bytes();
        let err = Attribute::decode_from(&mut ByteReader::new(&bytes)).unwrap_err();
        assert_eq!(err.category(), "format");
    }

    #[test]
    fn test_malformed_bool_rejected() {
        let mut writer = ByteWriter::new();
        writer.put_bytes16(b"flag", "attribute key").unwrap();
        writer.put_u8(TAG_BOOL);
        writer.put_u8(2);
        let bytes = writer.into_bytes();
        let err = Attribute::decode_from(&mut ByteReader::new(&bytes)).unwrap_err();
        assert_eq!(err.category(), "format");
    }
}
