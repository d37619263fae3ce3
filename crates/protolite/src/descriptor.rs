//! Compile-time message descriptors
//!
//! A descriptor is the authoritative, ordered field table for one message
//! type. Descriptors are `'static` constants built by `const fn`, so a table
//! with a duplicate or out-of-range tag fails the build instead of failing at
//! runtime.

use crate::schema::{FieldSchema, FieldType, MessageSchema, Schema, SchemaError, SchemaResult};
use crate::wire::{min_record_len, WireType, MAX_TAG};

/// Closed set of field kinds
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    Int32,
    Float32,
    Float64,
    Bytes,
    Message(&'static MessageDescriptor),
}

impl FieldKind {
    pub const fn wire_type(&self) -> WireType {
        match self {
            FieldKind::Int32 | FieldKind::Float32 => WireType::Fixed32,
            FieldKind::Float64 => WireType::Fixed64,
            FieldKind::Bytes | FieldKind::Message(_) => WireType::LengthDelimited,
        }
    }

    /// Payload width for fixed-width kinds, `None` for length-delimited ones
    pub const fn fixed_width(&self) -> Option<usize> {
        match self {
            FieldKind::Int32 | FieldKind::Float32 => Some(4),
            FieldKind::Float64 => Some(8),
            FieldKind::Bytes | FieldKind::Message(_) => None,
        }
    }

    /// Schema-language name of the kind (`int32`, `float`, ..., or the
    /// nested message's name)
    pub const fn type_name(&self) -> &'static str {
        match self {
            FieldKind::Int32 => "int32",
            FieldKind::Float32 => "float",
            FieldKind::Float64 => "double",
            FieldKind::Bytes => "bytes",
            FieldKind::Message(descriptor) => descriptor.name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldDescriptor {
    pub tag: u32,
    pub kind: FieldKind,
    /// Field name, used for diagnostics and schema export
    pub name: &'static str,
}

impl FieldDescriptor {
    /// Fewest bytes an encoded record of this field occupies
    pub const fn min_record_len(&self) -> usize {
        min_record_len(self.tag, self.kind.wire_type())
    }
}

#[derive(Debug, PartialEq)]
pub struct MessageDescriptor {
    name: &'static str,
    fields: &'static [FieldDescriptor],
}

impl MessageDescriptor {
    /// Build a descriptor, rejecting tag 0, tags above `MAX_TAG`, duplicate
    /// tags and duplicate field names.
    ///
    /// Panics, which in a `const` context is a compile error.
    pub const fn new(name: &'static str, fields: &'static [FieldDescriptor]) -> Self {
        let mut i = 0;
        while i < fields.len() {
            let tag = fields[i].tag;
            if tag == 0 {
                panic!("field tag 0 is reserved");
            }
            if tag > MAX_TAG {
                panic!("field tag exceeds MAX_TAG");
            }
            let mut j = i + 1;
            while j < fields.len() {
                if fields[j].tag == tag {
                    panic!("duplicate field tag in message descriptor");
                }
                if str_eq(fields[j].name, fields[i].name) {
                    panic!("duplicate field name in message descriptor");
                }
                j += 1;
            }
            i += 1;
        }
        Self { name, fields }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Fields in canonical encode order
    pub const fn fields(&self) -> &'static [FieldDescriptor] {
        self.fields
    }

    pub fn field(&self, tag: u32) -> Option<&'static FieldDescriptor> {
        self.fields.iter().find(|field| field.tag == tag)
    }

    /// Position of `tag` in the field table
    pub fn field_index(&self, tag: u32) -> Option<usize> {
        self.fields.iter().position(|field| field.tag == tag)
    }

    pub fn field_by_name(&self, name: &str) -> Option<&'static FieldDescriptor> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Export this descriptor and every message it nests as an owned schema.
    ///
    /// Messages are listed dependencies first, the way a schema file declares
    /// them. Two different descriptors sharing a name (the same struct name in
    /// two modules) cannot both be expressed in one schema and yield
    /// `SchemaError::DuplicateMessage`.
    pub fn to_schema(&'static self) -> SchemaResult<Schema> {
        let mut ordered: Vec<&'static MessageDescriptor> = Vec::new();
        collect_post_order(self, &mut ordered)?;

        let messages = ordered
            .into_iter()
            .map(|descriptor| MessageSchema {
                name: descriptor.name.to_string(),
                fields: descriptor
                    .fields
                    .iter()
                    .map(|field| FieldSchema {
                        name: field.name.to_string(),
                        tag: field.tag,
                        field_type: match field.kind {
                            FieldKind::Int32 => FieldType::Int32,
                            FieldKind::Float32 => FieldType::Float,
                            FieldKind::Float64 => FieldType::Double,
                            FieldKind::Bytes => FieldType::Bytes,
                            FieldKind::Message(nested) => FieldType::Message(nested.name.to_string()),
                        },
                    })
                    .collect(),
            })
            .collect();

        Ok(Schema::from_validated(messages))
    }
}

/// Descriptors are compared by value: a `const` may be instantiated at more
/// than one address, so pointer identity cannot tell one type from another.
fn collect_post_order(
    descriptor: &'static MessageDescriptor,
    out: &mut Vec<&'static MessageDescriptor>,
) -> SchemaResult<()> {
    if let Some(seen) = out.iter().find(|seen| seen.name == descriptor.name) {
        if *seen != descriptor {
            return Err(SchemaError::DuplicateMessage(descriptor.name.to_string()));
        }
        return Ok(());
    }
    for field in descriptor.fields {
        if let FieldKind::Message(nested) = field.kind {
            collect_post_order(nested, out)?;
        }
    }
    out.push(descriptor);
    Ok(())
}

const fn str_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    let mut i = 0;
    while i < a.len() {
        if a[i] != b[i] {
            return false;
        }
        i += 1;
    }
    true
}
