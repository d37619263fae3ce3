//! Protolite - Reflection-Free Message Codec
//!
//! Messages are plain structs paired with a compile-time descriptor table
//! (tag, kind, name). The encoder and decoder walk that table; nothing is
//! looked up at runtime and there is no global registry.
//!
//! ```
//! use protolite::{define_message, Message};
//!
//! define_message! {
//!     pub struct Point {
//!         x: int32 = 1,
//!         y: int32 = 2,
//!         label: bytes = 3,
//!     }
//! }
//!
//! let mut p = Point::default();
//! p.set_x(3);
//! p.set_y(-4);
//! p.set_label("origin");
//!
//! let bytes = p.encode_to_vec();
//! let decoded = Point::decode(&bytes).unwrap();
//! assert_eq!(decoded, p);
//! ```

pub mod codec;
pub mod descriptor;
pub mod dynamic;
pub mod error;
pub mod field;
pub mod message;
pub mod messages;
pub mod schema;
pub mod schema_compat;
pub mod wire;

pub use codec::{
    decode, decode_into, decode_into_with, decode_with, encode, encode_into, encoded_len,
    merge_message, DecodeOptions, NestedLengths, DEFAULT_MAX_DEPTH, MAX_PAYLOAD_SIZE,
};
pub use descriptor::{FieldDescriptor, FieldKind, MessageDescriptor};
pub use dynamic::{DynamicField, DynamicMessage, UnknownField, Value};
pub use error::{CodecError, CodecResult};
pub use field::{Bytes, FieldCodec, Float32, Float64, Int32, Nested};
pub use message::Message;
pub use messages::{PlaybackFile, PlaybackHeader, PLAYBACK_SCHEMA};
pub use schema::{
    parse_messages, parse_schema, FieldSchema, FieldType, MessageSchema, Schema, SchemaError,
    SchemaResult,
};
pub use schema_compat::{
    check_compatibility, CompatibilityIssue, CompatibilityLevel, CompatibilityReport,
};
pub use wire::{WireReader, WireType, MAX_TAG};

#[doc(hidden)]
pub use paste::paste as __paste;
