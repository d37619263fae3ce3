//! Descriptor-Driven Encoder/Decoder
//!
//! ## Encode
//!
//! For each field in `M::DESCRIPTOR` order: `[key][payload]`. Every field is
//! written, defaults included, so the output is a pure function of the field
//! values. A first pass records the length of every nested message in
//! pre-order; the write pass consumes them in the same order, so each subtree
//! is measured once.
//!
//! ## Decode
//!
//! Read a key, look the tag up in the destination descriptor, dispatch on the
//! field kind, repeat until the input is exhausted. Unknown tags are skipped
//! by wire type. Because the encoder writes every field, input that ends
//! before each descriptor field has appeared was cut short and is rejected.
//! Each call starts from a fresh reader; nothing is carried between calls.

use crate::descriptor::MessageDescriptor;
use crate::error::{CodecError, CodecResult};
use crate::message::Message;
use crate::wire::{make_key, put_key, varint_len, WireReader};

/// Default ceiling for a single length-delimited payload (16MB)
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Default ceiling for message nesting
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Limits applied while decoding untrusted bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Deepest nested message accepted; the root message is depth 0
    pub max_depth: usize,
    /// Largest length prefix accepted for bytes and nested messages
    pub max_length: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_length: MAX_PAYLOAD_SIZE,
        }
    }
}

/// Nested message lengths measured by the length pass, in pre-order.
///
/// `field_len` reserves a slot before measuring a nested message's fields and
/// fills it afterwards; `encode_field` takes the slots back in the same order.
#[derive(Debug, Default)]
pub struct NestedLengths {
    lengths: Vec<usize>,
    next: usize,
}

impl NestedLengths {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the slot for the nested message about to be measured
    pub fn reserve(&mut self) -> usize {
        self.lengths.push(0);
        self.lengths.len() - 1
    }

    pub fn set(&mut self, slot: usize, len: usize) {
        if let Some(entry) = self.lengths.get_mut(slot) {
            *entry = len;
        }
    }

    /// Length of the next nested message in write order
    pub fn take_next(&mut self) -> Option<usize> {
        let len = self.lengths.get(self.next).copied()?;
        self.next += 1;
        Some(len)
    }
}

/// Encode a message into a new buffer sized exactly for it
pub fn encode<M: Message>(message: &M) -> Vec<u8> {
    let mut lengths = NestedLengths::new();
    let len = message_len(message, &mut lengths);
    let mut buf = Vec::with_capacity(len);
    write_message(message, &mut buf, &mut lengths);
    buf
}

/// Append the encoding of `message` to `buf`
pub fn encode_into<M: Message>(message: &M, buf: &mut Vec<u8>) {
    let mut lengths = NestedLengths::new();
    buf.reserve(message_len(message, &mut lengths));
    write_message(message, buf, &mut lengths);
}

/// Exact number of bytes `encode` will produce
pub fn encoded_len<M: Message>(message: &M) -> usize {
    message_len(message, &mut NestedLengths::new())
}

/// Length pass: sum of every field record, recording nested lengths
pub fn message_len<M: Message>(message: &M, lengths: &mut NestedLengths) -> usize {
    M::DESCRIPTOR
        .fields()
        .iter()
        .map(|field| {
            varint_len(make_key(field.tag, field.kind.wire_type()))
                + message.field_len(field, lengths)
        })
        .sum()
}

/// Write pass: every field record, reading nested lengths from `lengths`
pub fn write_message<M: Message>(message: &M, buf: &mut Vec<u8>, lengths: &mut NestedLengths) {
    for field in M::DESCRIPTOR.fields() {
        put_key(buf, field.tag, field.kind.wire_type());
        message.encode_field(field, buf, lengths);
    }
}

/// Decode a message with default limits
///
/// ## Example
/// ```
/// use protolite::{decode, encode, PlaybackHeader};
///
/// let header = PlaybackHeader::new(1010, 1.234, 5.678);
/// let bytes = encode(&header);
/// let decoded: PlaybackHeader = decode(&bytes).unwrap();
/// assert_eq!(decoded.magic(), 1010);
/// ```
pub fn decode<M: Message>(bytes: &[u8]) -> CodecResult<M> {
    decode_with(bytes, &DecodeOptions::default())
}

pub fn decode_with<M: Message>(bytes: &[u8], options: &DecodeOptions) -> CodecResult<M> {
    let mut message = M::default();
    let mut reader = WireReader::with_options(bytes, options);
    merge_message(&mut message, &mut reader)?;
    Ok(message)
}

/// Decode into an existing instance, replacing whatever it held.
///
/// `out` is reset to its default before reading, so nothing from a previous
/// value survives. On failure it is left at its default so a failed decode
/// can never be mistaken for a complete one. Use [`merge_message`] to layer a
/// stream over existing values instead.
pub fn decode_into<M: Message>(bytes: &[u8], out: &mut M) -> CodecResult<()> {
    decode_into_with(bytes, out, &DecodeOptions::default())
}

pub fn decode_into_with<M: Message>(
    bytes: &[u8],
    out: &mut M,
    options: &DecodeOptions,
) -> CodecResult<()> {
    *out = M::default();
    let mut reader = WireReader::with_options(bytes, options);
    let result = merge_message(out, &mut reader);
    if let Err(err) = &result {
        tracing::trace!(
            message = M::DESCRIPTOR.name(),
            position = reader.position(),
            error = %err,
            "decode failed, discarding partial message"
        );
        *out = M::default();
    }
    result
}

/// Read field records until `reader` is exhausted, writing known fields
/// into `message` over its current values.
///
/// Every field of `M` must appear at least once; a stream that ends first
/// is reported through [`WireReader::missing_field`].
pub fn merge_message<M: Message>(message: &mut M, reader: &mut WireReader<'_>) -> CodecResult<()> {
    let descriptor = M::DESCRIPTOR;
    let mut seen = SeenFields::default();
    while !reader.is_empty() {
        let (tag, wire_type) = reader.read_key()?;
        match descriptor.field_index(tag) {
            Some(index) => {
                let field = &descriptor.fields()[index];
                let expected = field.kind.wire_type();
                if wire_type != expected {
                    return Err(CodecError::WireTypeMismatch {
                        tag,
                        expected,
                        got: wire_type,
                    });
                }
                message.merge_field(field, reader)?;
                seen.insert(index);
            }
            None => {
                let skipped = reader.skip_field(wire_type)?;
                tracing::debug!(
                    message = descriptor.name(),
                    tag,
                    wire_type = %wire_type,
                    len = skipped.len(),
                    "skipping unknown field"
                );
            }
        }
    }
    check_complete(descriptor, &seen, reader)?;
    tracing::trace!(message = descriptor.name(), depth = reader.depth(), "decoded message");
    Ok(())
}

fn check_complete(
    descriptor: &MessageDescriptor,
    seen: &SeenFields,
    reader: &WireReader<'_>,
) -> CodecResult<()> {
    let missing = descriptor
        .fields()
        .iter()
        .enumerate()
        .find(|(index, _)| !seen.contains(*index));
    match missing {
        Some((_, field)) => {
            tracing::trace!(
                message = descriptor.name(),
                tag = field.tag,
                field = field.name,
                "input ended before field"
            );
            Err(reader.missing_field(field.min_record_len()))
        }
        None => Ok(()),
    }
}

/// Positions in a field table that a decode has seen
#[derive(Debug, Default)]
pub(crate) struct SeenFields {
    low: u64,
    high: Vec<u64>,
}

impl SeenFields {
    pub(crate) fn insert(&mut self, index: usize) {
        if index < 64 {
            self.low |= 1u64 << index;
            return;
        }
        let word = index / 64 - 1;
        if self.high.len() <= word {
            self.high.resize(word + 1, 0);
        }
        self.high[word] |= 1u64 << (index % 64);
    }

    pub(crate) fn contains(&self, index: usize) -> bool {
        if index < 64 {
            return self.low & (1u64 << index) != 0;
        }
        self.high
            .get(index / 64 - 1)
            .is_some_and(|word| word & (1u64 << (index % 64)) != 0)
    }
}
