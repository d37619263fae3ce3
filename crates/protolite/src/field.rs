//! Field value model
//!
//! One zero-sized marker type per field kind. Each marker fixes the Rust
//! value type, its default, its `FieldKind` and how the payload is written
//! and read. `define_message!` maps schema keywords onto these markers:
//!
//! | keyword      | marker         | value     | wire type        |
//! |--------------|----------------|-----------|------------------|
//! | `int32`      | [`Int32`]      | `i32`     | fixed32          |
//! | `float`      | [`Float32`]    | `f32`     | fixed32          |
//! | `double`     | [`Float64`]    | `f64`     | fixed64          |
//! | `bytes`      | [`Bytes`]      | `Vec<u8>` | length-delimited |
//! | `message<M>` | [`Nested<M>`]  | `M`       | length-delimited |

use crate::codec::{merge_message, message_len, write_message, NestedLengths};
use crate::descriptor::FieldKind;
use crate::error::CodecResult;
use crate::message::Message;
use crate::wire::{put_fixed32, put_fixed64, put_length_delimited, put_varint, varint_len, WireReader};
use std::fmt::Debug;
use std::marker::PhantomData;

pub trait FieldCodec {
    type Value: Default + Clone + PartialEq + Debug + Send + Sync + 'static;

    const KIND: FieldKind;

    /// Write the payload (length prefix included, key excluded).
    ///
    /// Nested messages take their length prefix from `lengths`, filled by a
    /// prior `encoded_len` over the same value.
    fn encode(value: &Self::Value, buf: &mut Vec<u8>, lengths: &mut NestedLengths);

    /// Length of what `encode` writes, recording nested lengths as it goes
    fn encoded_len(value: &Self::Value, lengths: &mut NestedLengths) -> usize;

    /// Read one payload and merge it into `value`
    fn merge(value: &mut Self::Value, reader: &mut WireReader<'_>) -> CodecResult<()>;
}

pub struct Int32;

impl FieldCodec for Int32 {
    type Value = i32;
    const KIND: FieldKind = FieldKind::Int32;

    #[inline]
    fn encode(value: &i32, buf: &mut Vec<u8>, _: &mut NestedLengths) {
        put_fixed32(buf, *value as u32);
    }

    #[inline]
    fn encoded_len(_: &i32, _: &mut NestedLengths) -> usize {
        4
    }

    #[inline]
    fn merge(value: &mut i32, reader: &mut WireReader<'_>) -> CodecResult<()> {
        *value = reader.read_fixed32()? as i32;
        Ok(())
    }
}

/// IEEE-754 single precision, carried as raw bits so NaN payloads survive
pub struct Float32;

impl FieldCodec for Float32 {
    type Value = f32;
    const KIND: FieldKind = FieldKind::Float32;

    #[inline]
    fn encode(value: &f32, buf: &mut Vec<u8>, _: &mut NestedLengths) {
        put_fixed32(buf, value.to_bits());
    }

    #[inline]
    fn encoded_len(_: &f32, _: &mut NestedLengths) -> usize {
        4
    }

    #[inline]
    fn merge(value: &mut f32, reader: &mut WireReader<'_>) -> CodecResult<()> {
        *value = f32::from_bits(reader.read_fixed32()?);
        Ok(())
    }
}

pub struct Float64;

impl FieldCodec for Float64 {
    type Value = f64;
    const KIND: FieldKind = FieldKind::Float64;

    #[inline]
    fn encode(value: &f64, buf: &mut Vec<u8>, _: &mut NestedLengths) {
        put_fixed64(buf, value.to_bits());
    }

    #[inline]
    fn encoded_len(_: &f64, _: &mut NestedLengths) -> usize {
        8
    }

    #[inline]
    fn merge(value: &mut f64, reader: &mut WireReader<'_>) -> CodecResult<()> {
        *value = f64::from_bits(reader.read_fixed64()?);
        Ok(())
    }
}

/// Raw byte string; text is stored as its UTF-8 bytes
pub struct Bytes;

impl FieldCodec for Bytes {
    type Value = Vec<u8>;
    const KIND: FieldKind = FieldKind::Bytes;

    fn encode(value: &Vec<u8>, buf: &mut Vec<u8>, _: &mut NestedLengths) {
        put_length_delimited(buf, value);
    }

    fn encoded_len(value: &Vec<u8>, _: &mut NestedLengths) -> usize {
        varint_len(value.len() as u64) + value.len()
    }

    fn merge(value: &mut Vec<u8>, reader: &mut WireReader<'_>) -> CodecResult<()> {
        let data = reader.read_length_delimited()?;
        value.clear();
        value.extend_from_slice(data);
        Ok(())
    }
}

/// Nested message, owned by value
pub struct Nested<M>(PhantomData<M>);

impl<M: Message> FieldCodec for Nested<M> {
    type Value = M;
    const KIND: FieldKind = FieldKind::Message(M::DESCRIPTOR);

    fn encode(value: &M, buf: &mut Vec<u8>, lengths: &mut NestedLengths) {
        let len = match lengths.take_next() {
            Some(len) => len,
            None => message_len(value, &mut NestedLengths::new()),
        };
        put_varint(buf, len as u64);
        write_message(value, buf, lengths);
    }

    fn encoded_len(value: &M, lengths: &mut NestedLengths) -> usize {
        let slot = lengths.reserve();
        let len = message_len(value, lengths);
        lengths.set(slot, len);
        varint_len(len as u64) + len
    }

    fn merge(value: &mut M, reader: &mut WireReader<'_>) -> CodecResult<()> {
        let mut nested = reader.read_nested()?;
        merge_message(value, &mut nested)
    }
}
