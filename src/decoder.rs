//! Log Decoder
//!
//! Decodes raw on-chain logs (32-byte topic words plus a concatenated data
//! blob) into typed field maps using the schema attached to each event kind.
//! Decoding is purely positional and fails closed: short topics or a truncated
//! data blob yield an error and the log is skipped, never a panic.

use std::collections::HashMap;

use alloy::primitives::{Address, B256, U256};
use thiserror::Error;

use crate::registry::EventKind;

/// Errors that can occur while decoding one log
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("log has no topics")]
    MissingTopics,

    #[error("too few topics: schema needs {expected}, log has {actual}")]
    TooFewTopics { expected: usize, actual: usize },

    #[error("data blob too short: schema needs {expected} bytes, log has {actual}")]
    DataTooShort { expected: usize, actual: usize },

    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("decoded event missing field '{0}'")]
    MissingField(&'static str),

    #[error("field '{name}' is not {expected}")]
    FieldType { name: &'static str, expected: &'static str },
}

/// The fixed-width parameter types used by the upstream contracts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Address,
    Bytes32,
    Bool,
    Uint8,
    Uint256,
}

/// One named parameter in an event schema
#[derive(Debug, Clone, Copy)]
pub struct Param {
    pub name: &'static str,
    pub ty: ParamType,
}

/// Decoding schema: indexed parameters ride in topic words 1..N, non-indexed
/// parameters are packed as sequential 32-byte slots in the data blob.
#[derive(Debug, Clone, Copy)]
pub struct EventSchema {
    pub indexed: &'static [Param],
    pub data: &'static [Param],
}

/// A decoded parameter value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Address(Address),
    Word(B256),
    Bool(bool),
    Uint(U256),
}

/// The typed output of the decoder for one log. Transient: consumed
/// immediately by a handler, never persisted as such.
#[derive(Debug, Clone)]
pub struct DecodedEvent {
    pub kind: EventKind,
    pub fields: HashMap<&'static str, FieldValue>,
}

impl DecodedEvent {
    fn field(&self, name: &'static str) -> Result<&FieldValue, DecodeError> {
        self.fields.get(name).ok_or(DecodeError::MissingField(name))
    }

    /// Get an address field.
    pub fn address(&self, name: &'static str) -> Result<Address, DecodeError> {
        match self.field(name)? {
            FieldValue::Address(addr) => Ok(*addr),
            _ => Err(DecodeError::FieldType { name, expected: "address" }),
        }
    }

    /// Get an address field as a lowercase 0x-prefixed string, the normalized
    /// form stored in every document.
    pub fn address_string(&self, name: &'static str) -> Result<String, DecodeError> {
        Ok(format_address(self.address(name)?))
    }

    /// Get a raw 32-byte identifier field.
    pub fn word(&self, name: &'static str) -> Result<B256, DecodeError> {
        match self.field(name)? {
            FieldValue::Word(word) => Ok(*word),
            _ => Err(DecodeError::FieldType { name, expected: "bytes32" }),
        }
    }

    /// Get a 32-byte identifier field as a lowercase 0x-prefixed string.
    pub fn word_string(&self, name: &'static str) -> Result<String, DecodeError> {
        Ok(format!("{:#x}", self.word(name)?))
    }

    /// Get an unsigned integer field.
    pub fn uint(&self, name: &'static str) -> Result<U256, DecodeError> {
        match self.field(name)? {
            FieldValue::Uint(value) => Ok(*value),
            _ => Err(DecodeError::FieldType { name, expected: "uint" }),
        }
    }

    /// Get a small enumerated integer field, rejecting values above u8 range.
    pub fn uint_u8(&self, name: &'static str) -> Result<u8, DecodeError> {
        let value = self.uint(name)?;
        u8::try_from(value).map_err(|_| DecodeError::FieldType { name, expected: "uint8" })
    }

    /// Get an integer field narrowed to u64, for block-style timestamps.
    pub fn uint_u64(&self, name: &'static str) -> Result<u64, DecodeError> {
        let value = self.uint(name)?;
        u64::try_from(value).map_err(|_| DecodeError::FieldType { name, expected: "uint64" })
    }

    /// Get a boolean field.
    pub fn boolean(&self, name: &'static str) -> Result<bool, DecodeError> {
        match self.field(name)? {
            FieldValue::Bool(flag) => Ok(*flag),
            _ => Err(DecodeError::FieldType { name, expected: "bool" }),
        }
    }
}

/// Decode one 32-byte word as the given parameter type.
fn decode_word(ty: ParamType, word: &[u8]) -> FieldValue {
    debug_assert_eq!(word.len(), 32);
    match ty {
        // Addresses occupy the low 20 bytes; the high 12 are zero padding.
        ParamType::Address => FieldValue::Address(Address::from_slice(&word[12..])),
        ParamType::Bytes32 => FieldValue::Word(B256::from_slice(word)),
        // All-zero word is false; a word ending in a 1 bit is true.
        ParamType::Bool => FieldValue::Bool(word[31] & 1 == 1),
        ParamType::Uint8 | ParamType::Uint256 => FieldValue::Uint(U256::from_be_slice(word)),
    }
}

/// Decode a raw log against a schema.
///
/// Topic word 0 is the signature hash and is never passed to type decoding;
/// each subsequent topic word maps, in order, to one indexed parameter. The
/// data blob holds the non-indexed parameters as sequential 32-byte slots.
pub fn decode_log(
    kind: EventKind,
    topics: &[B256],
    data: &[u8],
    schema: &EventSchema,
) -> Result<DecodedEvent, DecodeError> {
    if topics.is_empty() {
        return Err(DecodeError::MissingTopics);
    }

    let expected_topics = schema.indexed.len() + 1;
    if topics.len() < expected_topics {
        return Err(DecodeError::TooFewTopics {
            expected: expected_topics,
            actual: topics.len(),
        });
    }

    let expected_data = schema.data.len() * 32;
    if data.len() < expected_data {
        return Err(DecodeError::DataTooShort {
            expected: expected_data,
            actual: data.len(),
        });
    }

    let mut fields = HashMap::with_capacity(schema.indexed.len() + schema.data.len());

    for (i, param) in schema.indexed.iter().enumerate() {
        fields.insert(param.name, decode_word(param.ty, topics[i + 1].as_slice()));
    }

    for (i, param) in schema.data.iter().enumerate() {
        let slot = &data[i * 32..(i + 1) * 32];
        fields.insert(param.name, decode_word(param.ty, slot));
    }

    Ok(DecodedEvent { kind, fields })
}

/// Decode a raw log using the schema registered for its kind.
pub fn decode_event(
    kind: EventKind,
    topics: &[B256],
    data: &[u8],
) -> Result<DecodedEvent, DecodeError> {
    decode_log(kind, topics, data, kind.schema())
}

/// Format an address in the normalized document form: lowercase 0x-hex.
pub fn format_address(address: Address) -> String {
    format!("{:#x}", address)
}

/// Parse a hex string to bytes (with or without 0x prefix)
pub fn hex_to_bytes(hex_str: &str) -> Result<Vec<u8>, DecodeError> {
    let hex_str = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    hex::decode(hex_str).map_err(|e| DecodeError::InvalidHex(e.to_string()))
}

/// Parse a 0x-prefixed hex string as one 32-byte topic word.
pub fn parse_topic(hex_str: &str) -> Result<B256, DecodeError> {
    let bytes = hex_to_bytes(hex_str)?;
    if bytes.len() != 32 {
        return Err(DecodeError::InvalidHex(format!(
            "topic must be 32 bytes, got {}",
            bytes.len()
        )));
    }
    Ok(B256::from_slice(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    fn word_from_address(addr: Address) -> B256 {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(addr.as_slice());
        B256::from(word)
    }

    fn slot_from_u256(value: U256) -> [u8; 32] {
        value.to_be_bytes()
    }

    // ==================== decode_log tests ====================

    #[test]
    fn test_decode_contribution_log() {
        let kind = EventKind::ContributionReceived;
        let campaign = B256::repeat_byte(0xaa);
        let contributor = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
        let token = address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2");

        let topics = vec![
            kind.signature_hash(),
            campaign,
            word_from_address(contributor),
            word_from_address(token),
        ];
        let mut data = Vec::new();
        data.extend_from_slice(&slot_from_u256(U256::from(1000u64)));
        data.extend_from_slice(&slot_from_u256(U256::from(1_700_000_000u64)));

        let decoded = decode_event(kind, &topics, &data).unwrap();
        assert_eq!(decoded.kind, kind);
        assert_eq!(decoded.word("campaignId").unwrap(), campaign);
        assert_eq!(decoded.address("contributor").unwrap(), contributor);
        assert_eq!(decoded.address("token").unwrap(), token);
        assert_eq!(decoded.uint("amount").unwrap(), U256::from(1000u64));
        assert_eq!(decoded.uint_u64("timestamp").unwrap(), 1_700_000_000);
    }

    #[test]
    fn test_decode_empty_topics_fails() {
        let result = decode_event(EventKind::ContributionReceived, &[], &[]);
        assert!(matches!(result, Err(DecodeError::MissingTopics)));
    }

    #[test]
    fn test_decode_too_few_topics_fails() {
        let topics = vec![
            EventKind::ContributionReceived.signature_hash(),
            B256::repeat_byte(0xaa),
        ];
        let result = decode_event(EventKind::ContributionReceived, &topics, &[0u8; 64]);
        assert!(matches!(
            result,
            Err(DecodeError::TooFewTopics { expected: 4, actual: 2 })
        ));
    }

    #[test]
    fn test_decode_truncated_data_fails() {
        let topics = vec![
            EventKind::ContributionReceived.signature_hash(),
            B256::repeat_byte(0xaa),
            word_from_address(Address::ZERO),
            word_from_address(Address::ZERO),
        ];
        // Schema needs 64 bytes of data, only 32 supplied.
        let result = decode_event(EventKind::ContributionReceived, &topics, &[0u8; 32]);
        assert!(matches!(
            result,
            Err(DecodeError::DataTooShort { expected: 64, actual: 32 })
        ));
    }

    #[test]
    fn test_decode_extra_data_is_tolerated() {
        let topics = vec![
            EventKind::PlatformAdminOperation.signature_hash(),
            word_from_address(Address::ZERO),
        ];
        // 64 bytes where 32 are needed; trailing bytes are ignored.
        let decoded = decode_event(EventKind::PlatformAdminOperation, &topics, &[0u8; 64]).unwrap();
        assert_eq!(decoded.uint_u8("opCode").unwrap(), 0);
    }

    // ==================== indexed parameter decoding ====================

    #[test]
    fn test_decode_indexed_bool_true_and_false() {
        let kind = EventKind::AdminOverrideSet;
        let mut true_word = [0u8; 32];
        true_word[31] = 1;

        let topics = vec![
            kind.signature_hash(),
            B256::repeat_byte(0xaa),
            word_from_address(Address::ZERO),
            B256::from(true_word),
        ];
        let decoded = decode_event(kind, &topics, &[]).unwrap();
        assert!(decoded.boolean("enabled").unwrap());

        let topics = vec![
            kind.signature_hash(),
            B256::repeat_byte(0xaa),
            word_from_address(Address::ZERO),
            B256::ZERO,
        ];
        let decoded = decode_event(kind, &topics, &[]).unwrap();
        assert!(!decoded.boolean("enabled").unwrap());
    }

    #[test]
    fn test_address_roundtrips_through_word_encoding() {
        // Slot encoding round-trip: address -> padded word -> address.
        let addr = address!("7a250d5630B4cF539739dF2C5dAcb4c659F2488D");
        let word = word_from_address(addr);
        assert_eq!(word.as_slice()[..12], [0u8; 12]);
        match decode_word(ParamType::Address, word.as_slice()) {
            FieldValue::Address(decoded) => assert_eq!(decoded, addr),
            other => panic!("expected address, got {:?}", other),
        }
    }

    #[test]
    fn test_uint_roundtrips_through_slot_encoding() {
        for value in [
            U256::ZERO,
            U256::from(u64::MAX),
            U256::from(u64::MAX) + U256::from(1u8),
            U256::from_str_radix("340282366920938463463374607431768211456", 10).unwrap(), // 2^128
            U256::MAX,
        ] {
            let slot = slot_from_u256(value);
            match decode_word(ParamType::Uint256, &slot) {
                FieldValue::Uint(decoded) => assert_eq!(decoded, value),
                other => panic!("expected uint, got {:?}", other),
            }
        }
    }

    // ==================== field accessor tests ====================

    #[test]
    fn test_missing_field_errors() {
        let decoded = DecodedEvent {
            kind: EventKind::ContributionReceived,
            fields: HashMap::new(),
        };
        assert!(matches!(
            decoded.uint("amount"),
            Err(DecodeError::MissingField("amount"))
        ));
    }

    #[test]
    fn test_field_type_mismatch_errors() {
        let mut fields = HashMap::new();
        fields.insert("amount", FieldValue::Bool(true));
        let decoded = DecodedEvent {
            kind: EventKind::ContributionReceived,
            fields,
        };
        assert!(matches!(decoded.uint("amount"), Err(DecodeError::FieldType { .. })));
    }

    #[test]
    fn test_uint_u8_rejects_large_values() {
        let mut fields = HashMap::new();
        fields.insert("opCode", FieldValue::Uint(U256::from(300u64)));
        let decoded = DecodedEvent {
            kind: EventKind::CollectorOperation,
            fields,
        };
        assert!(matches!(decoded.uint_u8("opCode"), Err(DecodeError::FieldType { .. })));
    }

    #[test]
    fn test_address_string_is_lowercase() {
        let mut fields = HashMap::new();
        fields.insert(
            "token",
            FieldValue::Address(address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2")),
        );
        let decoded = DecodedEvent {
            kind: EventKind::TokenRegistryOperation,
            fields,
        };
        assert_eq!(
            decoded.address_string("token").unwrap(),
            "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2"
        );
    }

    // ==================== hex helper tests ====================

    #[test]
    fn test_hex_to_bytes_with_prefix() {
        assert_eq!(hex_to_bytes("0x38ed1739").unwrap(), vec![0x38, 0xed, 0x17, 0x39]);
    }

    #[test]
    fn test_hex_to_bytes_without_prefix() {
        assert_eq!(hex_to_bytes("38ed1739").unwrap(), vec![0x38, 0xed, 0x17, 0x39]);
    }

    #[test]
    fn test_hex_to_bytes_empty() {
        assert_eq!(hex_to_bytes("").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_hex_to_bytes_invalid() {
        assert!(hex_to_bytes("0xGGGG").is_err());
    }

    #[test]
    fn test_parse_topic_valid() {
        let topic = parse_topic(&format!("0x{}", "aa".repeat(32))).unwrap();
        assert_eq!(topic, B256::repeat_byte(0xaa));
    }

    #[test]
    fn test_parse_topic_wrong_length() {
        assert!(matches!(parse_topic("0x1234"), Err(DecodeError::InvalidHex(_))));
    }
}
