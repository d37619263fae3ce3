//! Schema-driven decoding without compile-time types
//!
//! `DynamicMessage` reads any stream described by a [`Schema`] and keeps the
//! records it does not recognize, so a dump tool can show everything that was
//! on the wire and re-emit it unchanged. It applies the same rules as typed
//! decoding: every declared field must appear.

use crate::codec::{DecodeOptions, SeenFields};
use crate::error::{CodecError, CodecResult};
use crate::schema::{FieldType, MessageSchema, Schema};
use crate::wire::{
    make_key, min_record_len, put_fixed32, put_fixed64, put_key, put_length_delimited,
    put_varint, varint_len, WireReader, WireType,
};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int32(i32),
    Float32(f32),
    Float64(f64),
    Bytes(Vec<u8>),
    /// A schema `string` field; same wire form as `Bytes`
    String(String),
    Message(DynamicMessage),
}

impl Value {
    pub fn wire_type(&self) -> WireType {
        match self {
            Value::Int32(_) | Value::Float32(_) => WireType::Fixed32,
            Value::Float64(_) => WireType::Fixed64,
            Value::Bytes(_) | Value::String(_) | Value::Message(_) => WireType::LengthDelimited,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::Float32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float64(v) => Some(*v),
            _ => None,
        }
    }

    /// Raw payload of a `bytes` or `string` field
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(v) => Some(v),
            Value::String(v) => Some(v.as_bytes()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_message(&self) -> Option<&DynamicMessage> {
        match self {
            Value::Message(v) => Some(v),
            _ => None,
        }
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        match self {
            Value::Int32(v) => put_fixed32(buf, *v as u32),
            Value::Float32(v) => put_fixed32(buf, v.to_bits()),
            Value::Float64(v) => put_fixed64(buf, v.to_bits()),
            Value::Bytes(data) => put_length_delimited(buf, data),
            Value::String(text) => put_length_delimited(buf, text.as_bytes()),
            Value::Message(message) => {
                put_varint(buf, message.encoded_len() as u64);
                message.encode_into(buf);
            }
        }
    }

    fn encoded_len(&self) -> usize {
        match self {
            Value::Int32(_) | Value::Float32(_) => 4,
            Value::Float64(_) => 8,
            Value::Bytes(data) => varint_len(data.len() as u64) + data.len(),
            Value::String(text) => varint_len(text.len() as u64) + text.len(),
            Value::Message(message) => {
                let len = message.encoded_len();
                varint_len(len as u64) + len
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DynamicField {
    pub tag: u32,
    pub name: String,
    pub value: Value,
}

/// A record whose tag the schema does not declare, kept verbatim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownField {
    pub tag: u32,
    pub wire_type: WireType,
    /// Payload bytes; for length-delimited records the prefix is not included
    pub data: Vec<u8>,
}

impl UnknownField {
    fn encoded_len(&self) -> usize {
        let payload = match self.wire_type {
            WireType::LengthDelimited => varint_len(self.data.len() as u64) + self.data.len(),
            _ => self.data.len(),
        };
        varint_len(make_key(self.tag, self.wire_type)) + payload
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DynamicMessage {
    name: String,
    fields: Vec<DynamicField>,
    unknown: Vec<UnknownField>,
}

impl DynamicMessage {
    /// Decode `bytes` as the message named `root` in `schema`
    pub fn decode(schema: &Schema, root: &str, bytes: &[u8]) -> CodecResult<Self> {
        Self::decode_with(schema, root, bytes, &DecodeOptions::default())
    }

    pub fn decode_with(
        schema: &Schema,
        root: &str,
        bytes: &[u8],
        options: &DecodeOptions,
    ) -> CodecResult<Self> {
        let message = schema
            .message(root)
            .ok_or_else(|| CodecError::UnknownMessage(root.to_string()))?;
        let mut reader = WireReader::with_options(bytes, options);
        decode_message(schema, message, &mut reader)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Known fields in wire order, one entry per record
    pub fn fields(&self) -> &[DynamicField] {
        &self.fields
    }

    pub fn unknown_fields(&self) -> &[UnknownField] {
        &self.unknown
    }

    /// Value of the last record for `name`, matching the last-wins rule of
    /// typed decoding
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .rev()
            .find(|field| field.name == name)
            .map(|field| &field.value)
    }

    pub fn get_by_tag(&self, tag: u32) -> Option<&Value> {
        self.fields
            .iter()
            .rev()
            .find(|field| field.tag == tag)
            .map(|field| &field.value)
    }

    /// Re-encode known fields in stored order, then unknown fields verbatim
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode_into(&mut buf);
        buf
    }

    pub fn encoded_len(&self) -> usize {
        let known: usize = self
            .fields
            .iter()
            .map(|field| {
                varint_len(make_key(field.tag, field.value.wire_type())) + field.value.encoded_len()
            })
            .sum();
        let unknown: usize = self.unknown.iter().map(UnknownField::encoded_len).sum();
        known + unknown
    }

    fn encode_into(&self, buf: &mut Vec<u8>) {
        for field in &self.fields {
            put_key(buf, field.tag, field.value.wire_type());
            field.value.encode(buf);
        }
        for field in &self.unknown {
            put_key(buf, field.tag, field.wire_type);
            match field.wire_type {
                WireType::LengthDelimited => put_length_delimited(buf, &field.data),
                _ => buf.extend_from_slice(&field.data),
            }
        }
    }

    fn write_indented(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        writeln!(f, "{} {{", self.name)?;
        let pad = indent + 2;
        for field in &self.fields {
            write!(f, "{:pad$}{} ({}): ", "", field.name, field.tag)?;
            match &field.value {
                Value::Message(nested) => nested.write_indented(f, pad)?,
                other => writeln!(f, "{other}")?,
            }
        }
        for field in &self.unknown {
            write!(f, "{:pad$}[unknown {} {}]: ", "", field.tag, field.wire_type)?;
            write_hex(f, &field.data)?;
            writeln!(f)?;
        }
        writeln!(f, "{:indent$}}}", "")
    }
}

impl fmt::Display for DynamicMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 0)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int32(v) => write!(f, "{v}"),
            Value::Float32(v) => write!(f, "{v}"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::Bytes(data) => write_hex(f, data),
            Value::String(text) => write!(f, "{text:?}"),
            Value::Message(message) => write!(f, "{message}"),
        }
    }
}

fn write_hex(f: &mut fmt::Formatter<'_>, data: &[u8]) -> fmt::Result {
    f.write_str("[")?;
    for (i, byte) in data.iter().enumerate() {
        if i > 0 {
            f.write_str(" ")?;
        }
        write!(f, "{byte:02x}")?;
    }
    f.write_str("]")
}

fn decode_message(
    schema: &Schema,
    message: &MessageSchema,
    reader: &mut WireReader<'_>,
) -> CodecResult<DynamicMessage> {
    let mut out = DynamicMessage {
        name: message.name.clone(),
        fields: Vec::new(),
        unknown: Vec::new(),
    };

    let mut seen = SeenFields::default();
    while !reader.is_empty() {
        let (tag, wire_type) = reader.read_key()?;
        let Some(index) = message.fields.iter().position(|field| field.tag == tag) else {
            let data = reader.skip_field(wire_type)?;
            tracing::debug!(
                message = %message.name,
                tag,
                wire_type = %wire_type,
                len = data.len(),
                "retaining unknown field"
            );
            out.unknown.push(UnknownField {
                tag,
                wire_type,
                data: data.to_vec(),
            });
            continue;
        };

        let field = &message.fields[index];
        let expected = field.field_type.wire_type();
        if wire_type != expected {
            return Err(CodecError::WireTypeMismatch {
                tag,
                expected,
                got: wire_type,
            });
        }

        let value = match &field.field_type {
            FieldType::Int32 => Value::Int32(reader.read_fixed32()? as i32),
            FieldType::Float => Value::Float32(f32::from_bits(reader.read_fixed32()?)),
            FieldType::Double => Value::Float64(f64::from_bits(reader.read_fixed64()?)),
            FieldType::Bytes => Value::Bytes(reader.read_length_delimited()?.to_vec()),
            FieldType::String => {
                let data = reader.read_length_delimited()?;
                let text =
                    std::str::from_utf8(data).map_err(|_| CodecError::InvalidUtf8 { tag })?;
                Value::String(text.to_string())
            }
            FieldType::Message(name) => {
                let nested_schema = schema
                    .message(name)
                    .ok_or_else(|| CodecError::UnknownMessage(name.clone()))?;
                let mut nested = reader.read_nested()?;
                Value::Message(decode_message(schema, nested_schema, &mut nested)?)
            }
        };

        out.fields.push(DynamicField {
            tag,
            name: field.name.clone(),
            value,
        });
        seen.insert(index);
    }

    let missing = message
        .fields
        .iter()
        .enumerate()
        .find(|(index, _)| !seen.contains(*index));
    if let Some((_, field)) = missing {
        let need = min_record_len(field.tag, field.field_type.wire_type());
        return Err(reader.missing_field(need));
    }

    Ok(out)
}
