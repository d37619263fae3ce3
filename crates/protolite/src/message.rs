use crate::codec::{self, NestedLengths};
use crate::descriptor::{FieldDescriptor, MessageDescriptor};
use crate::error::CodecResult;
use crate::wire::WireReader;
use std::fmt::Debug;

/// Core trait for all protolite messages.
///
/// Implementations are generated by [`define_message!`](crate::define_message):
/// a `'static` descriptor table plus per-field dispatch. The codec drives
/// everything from the descriptor; these methods only move one field's value
/// in or out.
pub trait Message: Default + Clone + PartialEq + Debug + Send + Sync + 'static {
    /// Field table, in canonical encode order
    const DESCRIPTOR: &'static MessageDescriptor;

    /// Write the payload of `field` (key excluded)
    fn encode_field(&self, field: &FieldDescriptor, buf: &mut Vec<u8>, lengths: &mut NestedLengths);

    /// Length of the payload `encode_field` writes; nested message lengths
    /// are recorded in `lengths` for the write pass
    fn field_len(&self, field: &FieldDescriptor, lengths: &mut NestedLengths) -> usize;

    /// Read one payload for `field` and merge it into `self`
    fn merge_field(&mut self, field: &FieldDescriptor, reader: &mut WireReader<'_>)
        -> CodecResult<()>;

    fn encode_to_vec(&self) -> Vec<u8> {
        codec::encode(self)
    }

    fn encoded_len(&self) -> usize {
        codec::encoded_len(self)
    }

    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        codec::decode(bytes)
    }
}

/// Declare a message struct together with its descriptor and accessors.
///
/// Each field is `name: kind = tag`, where kind is one of `int32`, `float`,
/// `double`, `bytes` or `message<Type>`. Fields are private; the macro
/// generates `name()`, `set_name(..)` and, for `bytes` and nested messages,
/// `name_mut()`.
///
/// ```
/// use protolite::{define_message, Message};
///
/// define_message! {
///     /// A sensor sample
///     pub struct Sample {
///         sensor_id: int32 = 1,
///         reading: double = 2,
///     }
/// }
///
/// define_message! {
///     pub struct Batch {
///         first: message<Sample> = 1,
///         source: bytes = 2,
///     }
/// }
///
/// let mut batch = Batch::default();
/// batch.first_mut().set_sensor_id(7);
/// batch.set_source("rack-3");
/// assert_eq!(Batch::DESCRIPTOR.fields().len(), 2);
/// assert_eq!(Batch::decode(&batch.encode_to_vec()).unwrap(), batch);
/// ```
#[macro_export]
macro_rules! define_message {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field:ident : $kind:ident $(<$nested:ty>)? = $tag:literal
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq)]
        $vis struct $name {
            $(
                $field: <$crate::__field_codec!($kind $(<$nested>)?) as $crate::FieldCodec>::Value,
            )*
        }

        #[allow(dead_code)]
        impl $name {
            $crate::__paste! {
                $(
                    $crate::__field_accessors!(
                        $(#[$field_meta])*
                        $field, [<set_ $field>], [<$field _mut>], $kind $(<$nested>)?
                    );
                )*
            }
        }

        impl $crate::Message for $name {
            const DESCRIPTOR: &'static $crate::MessageDescriptor = &$crate::MessageDescriptor::new(
                ::core::stringify!($name),
                &[
                    $(
                        $crate::FieldDescriptor {
                            tag: $tag,
                            kind: <$crate::__field_codec!($kind $(<$nested>)?) as $crate::FieldCodec>::KIND,
                            name: ::core::stringify!($field),
                        },
                    )*
                ],
            );

            #[allow(unused_variables)]
            fn encode_field(
                &self,
                field: &$crate::FieldDescriptor,
                buf: &mut ::std::vec::Vec<u8>,
                lengths: &mut $crate::NestedLengths,
            ) {
                match field.tag {
                    $(
                        $tag => <$crate::__field_codec!($kind $(<$nested>)?) as $crate::FieldCodec>::encode(&self.$field, buf, lengths),
                    )*
                    _ => {}
                }
            }

            #[allow(unused_variables)]
            fn field_len(&self, field: &$crate::FieldDescriptor, lengths: &mut $crate::NestedLengths) -> usize {
                match field.tag {
                    $(
                        $tag => <$crate::__field_codec!($kind $(<$nested>)?) as $crate::FieldCodec>::encoded_len(&self.$field, lengths),
                    )*
                    _ => 0,
                }
            }

            fn merge_field(
                &mut self,
                field: &$crate::FieldDescriptor,
                reader: &mut $crate::WireReader<'_>,
            ) -> $crate::CodecResult<()> {
                match field.tag {
                    $(
                        $tag => <$crate::__field_codec!($kind $(<$nested>)?) as $crate::FieldCodec>::merge(&mut self.$field, reader),
                    )*
                    _ => reader.skip_field(field.kind.wire_type()).map(|_| ()),
                }
            }
        }

        // Evaluate the descriptor at build time so tag errors fail compilation
        const _: &$crate::MessageDescriptor = <$name as $crate::Message>::DESCRIPTOR;
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __field_codec {
    (int32) => { $crate::Int32 };
    (float) => { $crate::Float32 };
    (double) => { $crate::Float64 };
    (bytes) => { $crate::Bytes };
    (message<$nested:ty>) => { $crate::Nested<$nested> };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __field_accessors {
    ($(#[$meta:meta])* $field:ident, $set:ident, $get_mut:ident, int32) => {
        $(#[$meta])*
        #[inline]
        pub fn $field(&self) -> i32 {
            self.$field
        }

        #[inline]
        pub fn $set(&mut self, value: i32) {
            self.$field = value;
        }
    };
    ($(#[$meta:meta])* $field:ident, $set:ident, $get_mut:ident, float) => {
        $(#[$meta])*
        #[inline]
        pub fn $field(&self) -> f32 {
            self.$field
        }

        #[inline]
        pub fn $set(&mut self, value: f32) {
            self.$field = value;
        }
    };
    ($(#[$meta:meta])* $field:ident, $set:ident, $get_mut:ident, double) => {
        $(#[$meta])*
        #[inline]
        pub fn $field(&self) -> f64 {
            self.$field
        }

        #[inline]
        pub fn $set(&mut self, value: f64) {
            self.$field = value;
        }
    };
    ($(#[$meta:meta])* $field:ident, $set:ident, $get_mut:ident, bytes) => {
        $(#[$meta])*
        #[inline]
        pub fn $field(&self) -> &[u8] {
            &self.$field
        }

        #[inline]
        pub fn $set(&mut self, value: impl ::core::convert::Into<::std::vec::Vec<u8>>) {
            self.$field = value.into();
        }

        #[inline]
        pub fn $get_mut(&mut self) -> &mut ::std::vec::Vec<u8> {
            &mut self.$field
        }
    };
    ($(#[$meta:meta])* $field:ident, $set:ident, $get_mut:ident, message<$nested:ty>) => {
        $(#[$meta])*
        #[inline]
        pub fn $field(&self) -> &$nested {
            &self.$field
        }

        #[inline]
        pub fn $set(&mut self, value: $nested) {
            self.$field = value;
        }

        #[inline]
        pub fn $get_mut(&mut self) -> &mut $nested {
            &mut self.$field
        }
    };
}
