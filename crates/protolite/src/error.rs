use crate::wire::WireType;
use thiserror::Error;

/// Decode failures.
///
/// Encoding is total and has no error path. Unknown fields are skipped and
/// never reported here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The buffer ended before a field's declared content was available.
    #[error("Truncated input: need {need} bytes, got {got}")]
    TruncatedInput { need: usize, got: usize },

    /// A length prefix (or the enclosing frame it lives in) is inconsistent
    /// with the bytes actually present.
    #[error("Malformed length: prefix says {length} bytes, {remaining} remaining")]
    MalformedLength { length: u64, remaining: usize },

    #[error("Malformed varint: more than 10 bytes or overflows u64")]
    MalformedVarint,

    #[error("Invalid field tag: {0}")]
    InvalidTag(u64),

    #[error("Invalid wire type {wire_type} for field {tag}")]
    InvalidWireType { tag: u64, wire_type: u8 },

    #[error("Wire type mismatch for field {tag}: expected {expected}, got {got}")]
    WireTypeMismatch {
        tag: u32,
        expected: WireType,
        got: WireType,
    },

    #[error("Message nesting exceeds depth limit of {limit}")]
    RecursionLimitExceeded { limit: usize },

    #[error("Unknown message type: {0}")]
    UnknownMessage(String),

    /// A schema `string` field whose payload is not UTF-8
    #[error("Invalid UTF-8 in string field {tag}")]
    InvalidUtf8 { tag: u32 },
}

impl CodecError {
    /// True when the input simply ran out, as opposed to being structurally
    /// invalid. Callers use this to tell a short file from a corrupted one.
    pub fn is_truncation(&self) -> bool {
        matches!(self, CodecError::TruncatedInput { .. })
    }
}

pub type CodecResult<T> = Result<T, CodecError>;
