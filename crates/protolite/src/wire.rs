//! Wire primitives
//!
//! Every field record on the wire is a key followed by a payload:
//! ```text
//! ┌──────────────────────────────┬──────────────────────────────────┐
//! │ Key (varint)                 │ Payload                          │
//! │ (tag << 3) | wire_type       │ fixed32 / fixed64 / len + bytes  │
//! └──────────────────────────────┴──────────────────────────────────┘
//! ```
//!
//! Wire type numbers and key layout match protobuf. `int32` is written as a
//! fixed 4-byte value, which protobuf calls `sfixed32`; `float`, `double`,
//! `bytes` and nested messages match their protobuf namesakes. The wire type
//! alone tells a reader how many bytes to consume, which is what lets
//! decoders skip fields they do not know.

use crate::codec::DecodeOptions;
use crate::error::{CodecError, CodecResult};
use std::fmt;

/// Largest encodable field tag (29 bits, the rest of the key is the wire type)
pub const MAX_TAG: u32 = (1 << 29) - 1;

/// A u64 varint never needs more than 10 bytes
pub const MAX_VARINT_LEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WireType {
    Varint = 0,
    Fixed64 = 1,
    LengthDelimited = 2,
    Fixed32 = 5,
}

impl WireType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(WireType::Varint),
            1 => Some(WireType::Fixed64),
            2 => Some(WireType::LengthDelimited),
            5 => Some(WireType::Fixed32),
            _ => None,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            WireType::Varint => "varint",
            WireType::Fixed64 => "fixed64",
            WireType::LengthDelimited => "length-delimited",
            WireType::Fixed32 => "fixed32",
        }
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[inline]
pub const fn make_key(tag: u32, wire_type: WireType) -> u64 {
    ((tag as u64) << 3) | wire_type as u64
}

/// Number of bytes `value` occupies as a varint
#[inline]
pub const fn varint_len(value: u64) -> usize {
    let bits = 64 - (value | 1).leading_zeros() as usize;
    (bits + 6) / 7
}

/// Smallest record a field of this tag and wire type can occupy: its key plus
/// a fixed payload or a one-byte length prefix
pub const fn min_record_len(tag: u32, wire_type: WireType) -> usize {
    let payload = match wire_type {
        WireType::Fixed32 => 4,
        WireType::Fixed64 => 8,
        WireType::Varint | WireType::LengthDelimited => 1,
    };
    varint_len(make_key(tag, wire_type)) + payload
}

#[inline]
pub fn put_varint(buf: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        buf.push((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

#[inline]
pub fn put_key(buf: &mut Vec<u8>, tag: u32, wire_type: WireType) {
    put_varint(buf, make_key(tag, wire_type));
}

#[inline]
pub fn put_fixed32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

#[inline]
pub fn put_fixed64(buf: &mut Vec<u8>, value: u64) {
    buf.extend_from_slice(&value.to_le_bytes());
}

#[inline]
pub fn put_length_delimited(buf: &mut Vec<u8>, data: &[u8]) {
    put_varint(buf, data.len() as u64);
    buf.extend_from_slice(data);
}

/// Bounds-checked reader over one message's bytes.
///
/// A root reader covers the whole input; running off its end means the input
/// was cut short (`TruncatedInput`). A framed reader covers a nested message
/// whose length prefix was already satisfied, so running off its end means
/// the frame length disagrees with its content (`MalformedLength`).
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
    framed: bool,
    depth: usize,
    max_depth: usize,
    max_length: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self::with_options(buf, &DecodeOptions::default())
    }

    pub fn with_options(buf: &'a [u8], options: &DecodeOptions) -> Self {
        Self {
            buf,
            pos: 0,
            framed: false,
            depth: 0,
            max_depth: options.max_depth,
            max_length: options.max_length,
        }
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Nesting depth of this reader; the root message is depth 0
    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    fn overrun(&self, need: usize) -> CodecError {
        if self.framed {
            CodecError::MalformedLength {
                length: need as u64,
                remaining: self.remaining(),
            }
        } else {
            CodecError::TruncatedInput {
                need,
                got: self.remaining(),
            }
        }
    }

    /// Error for a reader that ran dry before every declared field appeared.
    ///
    /// `need` is the smallest record the first missing field could occupy.
    pub fn missing_field(&self, need: usize) -> CodecError {
        self.overrun(need)
    }

    fn take(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        if len > self.remaining() {
            return Err(self.overrun(len));
        }
        let start = self.pos;
        self.pos += len;
        Ok(&self.buf[start..self.pos])
    }

    pub fn read_varint(&mut self) -> CodecResult<u64> {
        let mut value = 0u64;
        for i in 0..MAX_VARINT_LEN {
            let Some(&byte) = self.buf.get(self.pos + i) else {
                return Err(self.overrun(i + 1));
            };
            // The tenth byte only has room for the top bit of a u64
            if i == MAX_VARINT_LEN - 1 && byte > 1 {
                return Err(CodecError::MalformedVarint);
            }
            value |= u64::from(byte & 0x7F) << (7 * i);
            if byte & 0x80 == 0 {
                self.pos += i + 1;
                return Ok(value);
            }
        }
        Err(CodecError::MalformedVarint)
    }

    /// Read a field key, returning `(tag, wire_type)`
    pub fn read_key(&mut self) -> CodecResult<(u32, WireType)> {
        let key = self.read_varint()?;
        let tag = key >> 3;
        if tag == 0 || tag > u64::from(MAX_TAG) {
            return Err(CodecError::InvalidTag(tag));
        }
        let raw_type = (key & 0x07) as u8;
        let wire_type = WireType::from_u8(raw_type).ok_or(CodecError::InvalidWireType {
            tag,
            wire_type: raw_type,
        })?;
        Ok((tag as u32, wire_type))
    }

    pub fn read_fixed32(&mut self) -> CodecResult<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_fixed64(&mut self) -> CodecResult<u64> {
        let bytes = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(raw))
    }

    /// Read a varint length prefix and the payload it covers
    pub fn read_length_delimited(&mut self) -> CodecResult<&'a [u8]> {
        let length = self.read_varint()?;
        if length > self.max_length as u64 {
            return Err(CodecError::MalformedLength {
                length,
                remaining: self.remaining(),
            });
        }
        self.take(length as usize)
    }

    /// Read a length-delimited payload and return a framed reader over it
    pub fn read_nested(&mut self) -> CodecResult<WireReader<'a>> {
        let depth = self.depth + 1;
        if depth > self.max_depth {
            return Err(CodecError::RecursionLimitExceeded {
                limit: self.max_depth,
            });
        }
        let buf = self.read_length_delimited()?;
        Ok(WireReader {
            buf,
            pos: 0,
            framed: true,
            depth,
            max_depth: self.max_depth,
            max_length: self.max_length,
        })
    }

    /// Consume one payload of the given wire type and return its raw bytes.
    ///
    /// For length-delimited payloads the prefix is not included.
    pub fn skip_field(&mut self, wire_type: WireType) -> CodecResult<&'a [u8]> {
        match wire_type {
            WireType::Varint => {
                let start = self.pos;
                self.read_varint()?;
                Ok(&self.buf[start..self.pos])
            }
            WireType::Fixed32 => self.take(4),
            WireType::Fixed64 => self.take(8),
            WireType::LengthDelimited => self.read_length_delimited(),
        }
    }
}
