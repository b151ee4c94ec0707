//! Binary serialization and deserialization of compiled grammars.
//!
//! This module provides a stable binary format for persisting a
//! [`CompiledGrammar`](crate::CompiledGrammar). The format consists of a
//! 32-byte fixed header followed by a bincode-encoded payload.
//!
//! ## Wire Format
//!
//! ```text
//! Offset  Size  Field
//! 0       4     Magic bytes: b"TMPL"
//! 4       2     Format version (u16, little-endian)
//! 6       2     Engine version (u16, little-endian)
//! 8       4     Flags (u32, reserved)
//! 12      4     Payload length in bytes (u32, little-endian)
//! 16      16    BLAKE3 hash of the payload (truncated to 16 bytes)
//! 32..    var   Bincode-encoded payload
//! ```
//!
//! ## Versioning
//!
//! The format version in the header must match exactly. If it does not,
//! deserialization fails immediately with [`DeserializeError::IncompatibleVersion`].
//! The engine version is informational only.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{
    CompiledAlternative, CompiledBody, CompiledRule, CompiledSegment, CompiledSlot, Target,
};
use crate::{CompiledGrammar, Modifier, RuleHandle, ScalarKind};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const MAGIC: &[u8; 4] = b"TMPL";
const FORMAT_VERSION: u16 = 1;
const ENGINE_VERSION: u16 = 1;
const HEADER_SIZE: usize = 32;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur when serializing a [`CompiledGrammar`](crate::CompiledGrammar).
#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("failed to encode grammar: {0}")]
    Encode(#[from] bincode::error::EncodeError),
}

/// Errors that can occur when deserializing a [`CompiledGrammar`](crate::CompiledGrammar).
#[derive(Debug, Error)]
pub enum DeserializeError {
    #[error("not a grammar cache: invalid magic bytes")]
    BadMagic,

    #[error("incompatible format version: blob is v{blob}, engine supports v{supported}")]
    IncompatibleVersion { blob: u16, supported: u16 },

    #[error("integrity check failed: BLAKE3 checksum mismatch")]
    ChecksumMismatch,

    #[error("payload length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: u32, actual: usize },

    #[error("failed to decode payload: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("validation failed: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// Serialized type hierarchy
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct SerializedGrammar {
    metadata: GrammarMetadata,
    rules: Vec<SerializedRule>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GrammarMetadata {
    rule_count: usize,
    recursive_count: usize,
    source_digest: Option<[u8; 32]>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SerializedRule {
    name: String,
    body: SerializedBody,
}

#[derive(Debug, Serialize, Deserialize)]
enum SerializedBody {
    Alternatives(Vec<Vec<SerializedSegment>>),
    Constant(String),
}

#[derive(Debug, Serialize, Deserialize)]
enum SerializedSegment {
    Literal(String),
    Slot {
        name: Option<String>,
        target: SerializedTarget,
        modifier: SerializedModifier,
    },
}

#[derive(Debug, Serialize, Deserialize)]
enum SerializedTarget {
    Primitive(String),
    Rule(usize),
}

#[derive(Debug, Serialize, Deserialize)]
enum SerializedModifier {
    Once,
    Optional,
    ZeroOrMore,
    OneOrMore,
    Separated { separator: String, allow_empty: bool },
}

// ---------------------------------------------------------------------------
// Modifier conversion
// ---------------------------------------------------------------------------

fn serialize_modifier(modifier: &Modifier) -> SerializedModifier {
    match modifier {
        Modifier::Once => SerializedModifier::Once,
        Modifier::Optional => SerializedModifier::Optional,
        Modifier::ZeroOrMore => SerializedModifier::ZeroOrMore,
        Modifier::OneOrMore => SerializedModifier::OneOrMore,
        Modifier::OneOrMoreSeparated {
            separator,
            allow_empty,
        } => SerializedModifier::Separated {
            separator: separator.clone(),
            allow_empty: *allow_empty,
        },
    }
}

fn deserialize_modifier(modifier: SerializedModifier) -> Modifier {
    match modifier {
        SerializedModifier::Once => Modifier::Once,
        SerializedModifier::Optional => Modifier::Optional,
        SerializedModifier::ZeroOrMore => Modifier::ZeroOrMore,
        SerializedModifier::OneOrMore => Modifier::OneOrMore,
        SerializedModifier::Separated {
            separator,
            allow_empty,
        } => Modifier::OneOrMoreSeparated {
            separator,
            allow_empty,
        },
    }
}

// ---------------------------------------------------------------------------
// CompiledGrammar -> SerializedGrammar
// ---------------------------------------------------------------------------

fn serialize_segment(segment: &CompiledSegment) -> SerializedSegment {
    match segment {
        CompiledSegment::Literal(text) => SerializedSegment::Literal(text.clone()),
        CompiledSegment::Slot(slot) => SerializedSegment::Slot {
            name: slot.name.clone(),
            target: match &slot.target {
                Target::Primitive(kind) => SerializedTarget::Primitive(kind.to_string()),
                Target::Rule(handle) => SerializedTarget::Rule(handle.0),
            },
            modifier: serialize_modifier(&slot.modifier),
        },
    }
}

fn grammar_to_serialized(grammar: &CompiledGrammar, source_text: Option<&str>) -> SerializedGrammar {
    let source_digest = source_text.map(|s| *blake3::hash(s.as_bytes()).as_bytes());

    let rules = grammar
        .rules
        .iter()
        .map(|r| SerializedRule {
            name: r.name.clone(),
            body: match &r.body {
                CompiledBody::Constant(text) => SerializedBody::Constant(text.clone()),
                CompiledBody::Alternatives(alts) => SerializedBody::Alternatives(
                    alts.iter()
                        .map(|alt| alt.segments.iter().map(serialize_segment).collect())
                        .collect(),
                ),
            },
        })
        .collect();

    SerializedGrammar {
        metadata: GrammarMetadata {
            rule_count: grammar.rules.len(),
            recursive_count: grammar.recursive.iter().filter(|r| **r).count(),
            source_digest,
        },
        rules,
    }
}

// ---------------------------------------------------------------------------
// SerializedGrammar -> CompiledGrammar
// ---------------------------------------------------------------------------

fn deserialize_segment(segment: SerializedSegment) -> Result<CompiledSegment, DeserializeError> {
    Ok(match segment {
        SerializedSegment::Literal(text) => CompiledSegment::Literal(text),
        SerializedSegment::Slot {
            name,
            target,
            modifier,
        } => CompiledSegment::Slot(CompiledSlot {
            name,
            target: match target {
                SerializedTarget::Primitive(kind) => {
                    Target::Primitive(ScalarKind::from_target(&kind).map_err(|e| {
                        DeserializeError::Validation(format!("invalid regex target '{kind}': {e}"))
                    })?)
                }
                SerializedTarget::Rule(idx) => Target::Rule(RuleHandle(idx)),
            },
            modifier: deserialize_modifier(modifier),
        }),
    })
}

fn serialized_to_grammar(ser: SerializedGrammar) -> Result<CompiledGrammar, DeserializeError> {
    validate(&ser)?;
    let recursive_count = ser.metadata.recursive_count;

    let rules: Vec<CompiledRule> = ser
        .rules
        .into_iter()
        .map(|sr| {
            let body = match sr.body {
                SerializedBody::Constant(text) => CompiledBody::Constant(text),
                SerializedBody::Alternatives(alts) => CompiledBody::Alternatives(
                    alts.into_iter()
                        .map(|segments| {
                            Ok(CompiledAlternative {
                                segments: segments
                                    .into_iter()
                                    .map(deserialize_segment)
                                    .collect::<Result<_, _>>()?,
                            })
                        })
                        .collect::<Result<_, DeserializeError>>()?,
                ),
            };
            Ok(CompiledRule {
                name: sr.name,
                body,
            })
        })
        .collect::<Result<_, DeserializeError>>()?;

    let rule_indices: HashMap<String, usize> = rules
        .iter()
        .enumerate()
        .map(|(i, r)| (r.name.clone(), i))
        .collect();

    let recursive = crate::compile::find_recursive(&rules);
    let found = recursive.iter().filter(|r| **r).count();
    if found != recursive_count {
        return Err(DeserializeError::Validation(format!(
            "metadata says {recursive_count} recursive rules but payload has {found}"
        )));
    }

    Ok(CompiledGrammar {
        rules,
        rule_indices,
        recursive,
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(ser: &SerializedGrammar) -> Result<(), DeserializeError> {
    let rule_count = ser.rules.len();

    if ser.metadata.rule_count != rule_count {
        return Err(DeserializeError::Validation(format!(
            "metadata says {} rules but payload has {}",
            ser.metadata.rule_count, rule_count
        )));
    }

    let mut seen = HashMap::with_capacity(rule_count);
    for (i, rule) in ser.rules.iter().enumerate() {
        if let Some(prev) = seen.insert(rule.name.as_str(), i) {
            return Err(DeserializeError::Validation(format!(
                "rule name '{}' appears at indices {prev} and {i}",
                rule.name
            )));
        }
        if let SerializedBody::Alternatives(alts) = &rule.body {
            validate_alternatives(&rule.name, alts, rule_count)?;
        }
    }
    Ok(())
}

fn validate_alternatives(
    name: &str,
    alts: &[Vec<SerializedSegment>],
    rule_count: usize,
) -> Result<(), DeserializeError> {
    if alts.is_empty() {
        return Err(DeserializeError::Validation(format!(
            "rule '{name}' has no alternatives"
        )));
    }
    for segment in alts.iter().flatten() {
        if let SerializedSegment::Slot {
            target: SerializedTarget::Rule(idx),
            ..
        } = segment
            && *idx >= rule_count
        {
            return Err(DeserializeError::Validation(format!(
                "rule ref {idx} in '{name}' out of bounds (max {rule_count})"
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Header I/O
// ---------------------------------------------------------------------------

fn write_header(buf: &mut Vec<u8>, payload: &[u8]) {
    let hash = blake3::hash(payload);
    let hash_bytes = hash.as_bytes();

    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    buf.extend_from_slice(&ENGINE_VERSION.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes()); // flags (reserved)
    #[allow(clippy::cast_possible_truncation)] // payload will never exceed 4 GiB
    let payload_len = payload.len() as u32;
    buf.extend_from_slice(&payload_len.to_le_bytes());
    buf.extend_from_slice(&hash_bytes[..16]);
}

#[allow(clippy::cast_possible_truncation)] // HEADER_SIZE is 32, always fits in u32
fn read_header(bytes: &[u8]) -> Result<(u16, u32, [u8; 16]), DeserializeError> {
    if bytes.len() < HEADER_SIZE {
        return Err(DeserializeError::LengthMismatch {
            expected: HEADER_SIZE as u32,
            actual: bytes.len(),
        });
    }

    if &bytes[0..4] != MAGIC {
        return Err(DeserializeError::BadMagic);
    }

    let format_version = u16::from_le_bytes([bytes[4], bytes[5]]);
    // bytes[6..8] is engine_version, bytes[8..12] is flags
    let payload_len = u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);

    let mut hash = [0u8; 16];
    hash.copy_from_slice(&bytes[16..32]);

    Ok((format_version, payload_len, hash))
}

/// Check the header and checksum, returning the payload slice.
fn payload(bytes: &[u8]) -> Result<&[u8], DeserializeError> {
    let (format_version, payload_len, stored_hash) = read_header(bytes)?;

    if format_version != FORMAT_VERSION {
        return Err(DeserializeError::IncompatibleVersion {
            blob: format_version,
            supported: FORMAT_VERSION,
        });
    }

    let payload_end = HEADER_SIZE + payload_len as usize;
    if bytes.len() < payload_end {
        return Err(DeserializeError::LengthMismatch {
            expected: payload_len,
            actual: bytes.len() - HEADER_SIZE,
        });
    }
    let payload = &bytes[HEADER_SIZE..payload_end];

    if blake3::hash(payload).as_bytes()[..16] != stored_hash {
        return Err(DeserializeError::ChecksumMismatch);
    }
    Ok(payload)
}

fn decode_payload(bytes: &[u8]) -> Result<SerializedGrammar, DeserializeError> {
    let (serialized, _): (SerializedGrammar, usize) =
        bincode::serde::decode_from_slice(payload(bytes)?, bincode::config::standard())?;
    Ok(serialized)
}

// ---------------------------------------------------------------------------
// Public encode/decode
// ---------------------------------------------------------------------------

pub(crate) fn encode(
    grammar: &CompiledGrammar,
    source_text: Option<&str>,
) -> Result<Vec<u8>, SerializeError> {
    let serialized = grammar_to_serialized(grammar, source_text);
    let payload = bincode::serde::encode_to_vec(&serialized, bincode::config::standard())?;

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    write_header(&mut buf, &payload);
    buf.extend_from_slice(&payload);
    tracing::debug!(
        rules = serialized.metadata.rule_count,
        bytes = buf.len(),
        "encoded grammar cache"
    );
    Ok(buf)
}

pub(crate) fn decode(bytes: &[u8]) -> Result<CompiledGrammar, DeserializeError> {
    serialized_to_grammar(decode_payload(bytes)?)
}

pub(crate) fn source_digest(bytes: &[u8]) -> Result<Option<[u8; 32]>, DeserializeError> {
    Ok(decode_payload(bytes)?.metadata.source_digest)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(name: &str, alts: Vec<Vec<SerializedSegment>>) -> SerializedRule {
        SerializedRule {
            name: name.into(),
            body: SerializedBody::Alternatives(alts),
        }
    }

    fn grammar(rules: Vec<SerializedRule>) -> SerializedGrammar {
        SerializedGrammar {
            metadata: GrammarMetadata {
                rule_count: rules.len(),
                recursive_count: 0,
                source_digest: None,
            },
            rules,
        }
    }

    fn rule_slot(idx: usize) -> SerializedSegment {
        SerializedSegment::Slot {
            name: Some("x".into()),
            target: SerializedTarget::Rule(idx),
            modifier: SerializedModifier::Once,
        }
    }

    #[test]
    fn modifier_round_trip() {
        let modifiers = [
            Modifier::Once,
            Modifier::Optional,
            Modifier::ZeroOrMore,
            Modifier::OneOrMore,
            Modifier::separated(", "),
            Modifier::separated_nonempty(";"),
        ];
        for m in modifiers {
            assert_eq!(deserialize_modifier(serialize_modifier(&m)), m);
        }
    }

    #[test]
    fn custom_primitive_survives() {
        let segment = deserialize_segment(SerializedSegment::Slot {
            name: None,
            target: SerializedTarget::Primitive("path".into()),
            modifier: SerializedModifier::Once,
        })
        .unwrap();
        match segment {
            CompiledSegment::Slot(slot) => {
                assert_eq!(slot.target, Target::Primitive(ScalarKind::Custom("path".into())));
            }
            other => panic!("expected slot, got {other:?}"),
        }
    }

    #[test]
    fn inline_targets_survive() {
        let grammar = CompiledGrammar::from_source(
            "R: <kw[return]> <v:s/[0-9]+/> <sym[->]>\n~~~",
        )
        .unwrap();
        let restored = decode(&encode(&grammar, None).unwrap()).unwrap();
        let value = crate::RenderValue::record().set("v", "42");
        assert_eq!(restored.render("R", &value).unwrap(), "return42->");
        let bad = crate::RenderValue::record().set("v", "x");
        assert!(restored.render("R", &bad).is_err());
    }

    #[test]
    fn invalid_regex_target_is_rejected() {
        let result = deserialize_segment(SerializedSegment::Slot {
            name: Some("v".into()),
            target: SerializedTarget::Primitive("s/(/".into()),
            modifier: SerializedModifier::Once,
        });
        assert!(matches!(result, Err(DeserializeError::Validation(msg)) if msg.contains("regex")));
    }

    // -- Header --

    #[test]
    fn header_round_trip() {
        let payload = b"test payload data";
        let mut buf = Vec::new();
        write_header(&mut buf, payload);
        assert_eq!(buf.len(), HEADER_SIZE);

        let (format_version, payload_len, hash) = read_header(&buf).unwrap();
        assert_eq!(format_version, FORMAT_VERSION);
        assert_eq!(payload_len as usize, payload.len());
        assert_eq!(&hash, &blake3::hash(payload).as_bytes()[..16]);
    }

    #[test]
    fn header_bad_magic() {
        let mut buf = vec![0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(b"BAAD");
        assert!(matches!(read_header(&buf), Err(DeserializeError::BadMagic)));
    }

    #[test]
    fn header_too_short() {
        let buf = vec![0u8; 10];
        assert!(matches!(
            read_header(&buf),
            Err(DeserializeError::LengthMismatch { .. })
        ));
    }

    // -- Validation --

    #[test]
    fn validate_rule_ref_oob() {
        let ser = grammar(vec![rule("A", vec![vec![rule_slot(3)]])]);
        assert!(matches!(validate(&ser), Err(DeserializeError::Validation(_))));
    }

    #[test]
    fn validate_empty_alternatives() {
        let ser = grammar(vec![rule("A", vec![])]);
        assert!(matches!(validate(&ser), Err(DeserializeError::Validation(_))));
    }

    #[test]
    fn validate_duplicate_names() {
        let lit = || vec![vec![SerializedSegment::Literal("a".into())]];
        let ser = grammar(vec![rule("A", lit()), rule("A", lit())]);
        assert!(matches!(validate(&ser), Err(DeserializeError::Validation(_))));
    }

    #[test]
    fn validate_metadata_count() {
        let mut ser = grammar(vec![rule("A", vec![vec![rule_slot(0)]])]);
        ser.metadata.rule_count = 2;
        assert!(matches!(validate(&ser), Err(DeserializeError::Validation(_))));
    }

    #[test]
    fn recursive_count_is_checked() {
        // A references itself but the metadata claims no recursion.
        let ser = grammar(vec![rule("A", vec![vec![rule_slot(0)]])]);
        assert!(matches!(
            serialized_to_grammar(ser),
            Err(DeserializeError::Validation(msg)) if msg.contains("recursive")
        ));
    }
}
