//! Destination shape check.
//!
//! Runs a type's `Deserialize` impl against a deserializer that answers every
//! request with the kind that was asked for. This tells records apart from
//! scalars and sequences without touching any remote object.

use crate::error::{Result, WmiError};
use crate::types::DATETIME_TOKEN;
use serde::de::{self, DeserializeOwned, Visitor};
use std::fmt;

#[derive(Debug)]
enum Shape {
    Record,
    Other(&'static str),
    Unknown,
}

#[derive(Debug)]
struct Found(Shape);

impl fmt::Display for Found {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "destination shape: {:?}", self.0)
    }
}

impl std::error::Error for Found {}

impl de::Error for Found {
    fn custom<T: fmt::Display>(_msg: T) -> Self {
        Found(Shape::Unknown)
    }
}

struct ShapeDeserializer;

macro_rules! answer {
    ($($method:ident => $shape:expr;)*) => {
        $(
            fn $method<V: Visitor<'de>>(self, _visitor: V) -> std::result::Result<V::Value, Found> {
                Err(Found($shape))
            }
        )*
    };
}

impl<'de> de::Deserializer<'de> for ShapeDeserializer {
    type Error = Found;

    answer! {
        deserialize_any => Shape::Record;
        deserialize_map => Shape::Record;
        deserialize_bool => Shape::Other("bool");
        deserialize_i8 => Shape::Other("i8");
        deserialize_i16 => Shape::Other("i16");
        deserialize_i32 => Shape::Other("i32");
        deserialize_i64 => Shape::Other("i64");
        deserialize_u8 => Shape::Other("u8");
        deserialize_u16 => Shape::Other("u16");
        deserialize_u32 => Shape::Other("u32");
        deserialize_u64 => Shape::Other("u64");
        deserialize_f32 => Shape::Other("f32");
        deserialize_f64 => Shape::Other("f64");
        deserialize_char => Shape::Other("char");
        deserialize_str => Shape::Other("str");
        deserialize_string => Shape::Other("String");
        deserialize_bytes => Shape::Other("bytes");
        deserialize_byte_buf => Shape::Other("bytes");
        deserialize_unit => Shape::Other("()");
        deserialize_seq => Shape::Other("sequence");
        deserialize_identifier => Shape::Other("identifier");
        deserialize_ignored_any => Shape::Unknown;
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> std::result::Result<V::Value, Found> {
        visitor.visit_some(self)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        visitor: V,
    ) -> std::result::Result<V::Value, Found> {
        if name == DATETIME_TOKEN {
            return Err(Found(Shape::Other("WmiDateTime")));
        }
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        _visitor: V,
    ) -> std::result::Result<V::Value, Found> {
        Err(Found(Shape::Record))
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _visitor: V,
    ) -> std::result::Result<V::Value, Found> {
        Err(Found(Shape::Other("unit struct")))
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        _visitor: V,
    ) -> std::result::Result<V::Value, Found> {
        Err(Found(Shape::Other("tuple")))
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        _visitor: V,
    ) -> std::result::Result<V::Value, Found> {
        Err(Found(Shape::Other("tuple struct")))
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        _visitor: V,
    ) -> std::result::Result<V::Value, Found> {
        // Variants are picked by object class.
        Err(Found(Shape::Record))
    }
}

/// Check that `T` is a record, a boxed record or an optional record.
///
/// Types whose `Deserialize` impl fails without asking for anything are
/// let through; decoding will report on them.
pub(crate) fn ensure_record<T: DeserializeOwned>() -> Result<()> {
    match T::deserialize(ShapeDeserializer) {
        Err(Found(Shape::Other(found))) => Err(WmiError::InvalidDestination(format!(
            "{} is not a record (found {})",
            std::any::type_name::<T>(),
            found
        ))),
        Err(Found(Shape::Record)) | Err(Found(Shape::Unknown)) | Ok(_) => Ok(()),
    }
}
