//! serde deserializers over dynamic objects and their property values.

use super::zero::ZeroDeserializer;
use super::Decoder;
use crate::error::{FieldMismatch, Result, WmiError};
use crate::object::DynamicObject;
use crate::types::{Variant, DATETIME_TOKEN};
use serde::de::value::{StrDeserializer, StringDeserializer};
use serde::de::{
    self, DeserializeOwned, DeserializeSeed, EnumAccess, Error as _, IntoDeserializer, MapAccess,
    SeqAccess, VariantAccess, Visitor,
};
use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

/// Outcome of fetching one property.
pub(crate) enum Slot {
    Missing,
    Failed(WmiError),
    Present(Variant),
}

fn reason(msg: impl fmt::Display) -> WmiError {
    WmiError::custom(msg)
}

fn not_a_record(found: &str) -> WmiError {
    WmiError::InvalidDestination(format!("expected a record, found {}", found))
}

/// System property naming the class of an object.
const CLASS_PROPERTY: &str = "__CLASS";

/// Class used to pick an enum variant: the `__CLASS` property, else the
/// class the backend reports.
fn class_of(object: &dyn DynamicObject) -> Result<String> {
    if let Some(Variant::String(class)) = object.property(CLASS_PROPERTY)? {
        return Ok(class);
    }
    object
        .class_name()
        .map(str::to_string)
        .ok_or_else(|| reason("object has no class to select a variant"))
}

/// Fetch a property into a [`Slot`].
fn fetch(object: &dyn DynamicObject, name: &str) -> Slot {
    match object.property(name) {
        Ok(Some(value)) => Slot::Present(value),
        Ok(None) => Slot::Missing,
        Err(err) => Slot::Failed(err),
    }
}

/// Decode one field and attribute any failure to its property.
fn decode_field<'de, S>(decoder: &Decoder, property: &str, slot: Slot, seed: S) -> Result<S::Value>
where
    S: DeserializeSeed<'de>,
{
    let field_type = Cell::new("unknown");
    seed.deserialize(ValueDeserializer::new(decoder, slot, &field_type))
        .map_err(|err| {
            FieldMismatch {
                field_type: field_type.get().to_string(),
                property: property.to_string(),
                reason: err.to_string(),
            }
            .into()
        })
}

/// Decode a lone property value as if it were a field.
pub(crate) fn decode_value<T: DeserializeOwned>(
    decoder: &Decoder,
    property: &str,
    value: Variant,
) -> Result<T> {
    decode_field(decoder, property, Slot::Present(value), PhantomData::<T>)
}

// --- Records ---

/// Deserializes a destination record from a whole object.
pub(crate) struct ObjectDeserializer<'a> {
    decoder: &'a Decoder,
    object: &'a dyn DynamicObject,
}

impl<'a> ObjectDeserializer<'a> {
    pub(crate) fn new(decoder: &'a Decoder, object: &'a dyn DynamicObject) -> Self {
        Self { decoder, object }
    }
}

macro_rules! reject_non_record {
    ($($method:ident => $found:expr;)*) => {
        $(
            fn $method<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value> {
                Err(not_a_record($found))
            }
        )*
    };
}

impl<'de, 'a> de::Deserializer<'de> for ObjectDeserializer<'a> {
    type Error = WmiError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_map(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_map(PropertyAccess::new(self.decoder, self.object)?)
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_map(FieldAccess::new(self.decoder, self.object, fields))
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_some(self)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        if name == DATETIME_TOKEN {
            return Err(not_a_record("WmiDateTime"));
        }
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        _visitor: V,
    ) -> Result<V::Value> {
        Err(not_a_record(name))
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, _len: usize, _visitor: V) -> Result<V::Value> {
        Err(not_a_record("tuple"))
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        _len: usize,
        _visitor: V,
    ) -> Result<V::Value> {
        Err(not_a_record(name))
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_enum(ClassAccess::new(self.decoder, self.object))
    }

    reject_non_record! {
        deserialize_bool => "bool";
        deserialize_i8 => "i8";
        deserialize_i16 => "i16";
        deserialize_i32 => "i32";
        deserialize_i64 => "i64";
        deserialize_u8 => "u8";
        deserialize_u16 => "u16";
        deserialize_u32 => "u32";
        deserialize_u64 => "u64";
        deserialize_f32 => "f32";
        deserialize_f64 => "f64";
        deserialize_char => "char";
        deserialize_str => "str";
        deserialize_string => "String";
        deserialize_bytes => "bytes";
        deserialize_byte_buf => "bytes";
        deserialize_unit => "()";
        deserialize_seq => "sequence";
        deserialize_identifier => "identifier";
    }
}

/// Walks the declared fields of a record, fetching each distinct property
/// name once. Repeated names resolve to the first field that declared them.
pub(crate) struct FieldAccess<'a> {
    decoder: &'a Decoder,
    object: &'a dyn DynamicObject,
    fields: std::slice::Iter<'static, &'static str>,
    seen: Vec<&'static str>,
    pending: Option<(&'static str, Slot)>,
}

impl<'a> FieldAccess<'a> {
    pub(crate) fn new(
        decoder: &'a Decoder,
        object: &'a dyn DynamicObject,
        fields: &'static [&'static str],
    ) -> Self {
        Self {
            decoder,
            object,
            fields: fields.iter(),
            seen: Vec::with_capacity(fields.len()),
            pending: None,
        }
    }
}

impl<'de, 'a> MapAccess<'de> for FieldAccess<'a> {
    type Error = WmiError;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>> {
        while let Some(&name) = self.fields.next() {
            if self.seen.contains(&name) {
                continue;
            }
            self.seen.push(name);
            self.pending = Some((name, fetch(self.object, name)));
            let key: StrDeserializer<'static, WmiError> = name.into_deserializer();
            return seed.deserialize(key).map(Some);
        }
        Ok(None)
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value> {
        let (name, slot) = self
            .pending
            .take()
            .ok_or_else(|| reason("field value requested before its name"))?;
        decode_field(self.decoder, name, slot, seed)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.fields.len())
    }
}

/// Selects an enum variant by object class and decodes the variant's
/// fields straight from the object.
pub(crate) struct ClassAccess<'a> {
    decoder: &'a Decoder,
    object: &'a dyn DynamicObject,
}

impl<'a> ClassAccess<'a> {
    pub(crate) fn new(decoder: &'a Decoder, object: &'a dyn DynamicObject) -> Self {
        Self { decoder, object }
    }
}

impl<'de, 'a> EnumAccess<'de> for ClassAccess<'a> {
    type Error = WmiError;
    type Variant = Self;

    fn variant_seed<S: DeserializeSeed<'de>>(self, seed: S) -> Result<(S::Value, Self)> {
        let class: StringDeserializer<WmiError> = class_of(self.object)?.into_deserializer();
        let variant = seed.deserialize(class)?;
        Ok((variant, self))
    }
}

impl<'de, 'a> VariantAccess<'de> for ClassAccess<'a> {
    type Error = WmiError;

    fn unit_variant(self) -> Result<()> {
        Ok(())
    }

    fn newtype_variant_seed<S: DeserializeSeed<'de>>(self, seed: S) -> Result<S::Value> {
        seed.deserialize(ObjectDeserializer::new(self.decoder, self.object))
    }

    fn tuple_variant<V: Visitor<'de>>(self, _len: usize, _visitor: V) -> Result<V::Value> {
        Err(not_a_record("tuple variant"))
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_map(FieldAccess::new(self.decoder, self.object, fields))
    }
}

/// Walks every property of an object, for map-shaped and self-describing
/// destinations.
pub(crate) struct PropertyAccess<'a> {
    decoder: &'a Decoder,
    object: &'a dyn DynamicObject,
    names: std::vec::IntoIter<String>,
    pending: Option<(String, Slot)>,
}

impl<'a> PropertyAccess<'a> {
    pub(crate) fn new(decoder: &'a Decoder, object: &'a dyn DynamicObject) -> Result<Self> {
        let names = object.property_names()?;
        Ok(Self {
            decoder,
            object,
            names: names.into_iter(),
            pending: None,
        })
    }
}

impl<'de, 'a> MapAccess<'de> for PropertyAccess<'a> {
    type Error = WmiError;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>> {
        let Some(name) = self.names.next() else {
            return Ok(None);
        };
        let slot = fetch(self.object, &name);
        let key: StringDeserializer<WmiError> = name.clone().into_deserializer();
        self.pending = Some((name, slot));
        seed.deserialize(key).map(Some)
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value> {
        let (name, slot) = self
            .pending
            .take()
            .ok_or_else(|| reason("property value requested before its name"))?;
        decode_field(self.decoder, &name, slot, seed)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.names.len())
    }
}

// --- Property values ---

/// Deserializes one property value into one destination field.
///
/// The requested destination kind drives the conversion. Every method
/// records its kind in `field_type` so failures can name it.
pub(crate) struct ValueDeserializer<'a> {
    decoder: &'a Decoder,
    slot: Slot,
    field_type: &'a Cell<&'static str>,
    in_array: bool,
}

impl<'a> ValueDeserializer<'a> {
    fn new(decoder: &'a Decoder, slot: Slot, field_type: &'a Cell<&'static str>) -> Self {
        Self {
            decoder,
            slot,
            field_type,
            in_array: false,
        }
    }

    /// Resolve the slot for a non-optional field. `None` means the field
    /// takes its zero value.
    fn take(self, field_type: &'static str) -> Result<Option<Variant>> {
        self.field_type.set(field_type);
        match self.slot {
            Slot::Failed(err) => Err(err),
            Slot::Missing if self.decoder.allow_missing_fields => Ok(None),
            Slot::Missing => Err(reason("no such result field")),
            Slot::Present(Variant::Null) => Ok(None),
            Slot::Present(Variant::Empty) if self.decoder.non_ptr_zero => Ok(None),
            Slot::Present(Variant::Empty) => Err(reason("unsupported type (<nil>)")),
            Slot::Present(value) => Ok(Some(value)),
        }
    }

    fn reject_in_array(&self, what: &str) -> Result<()> {
        if self.in_array {
            return Err(reason(format!("{} elements are not supported", what)));
        }
        Ok(())
    }
}

fn unsupported(value: &Variant) -> WmiError {
    reason(format!("unsupported type ({})", value.kind()))
}

/// Fit an integer-family or numeric-string value into `T`.
fn coerce_integer<T>(value: &Variant) -> Result<T>
where
    T: TryFrom<i64> + TryFrom<u64> + FromStr,
    <T as FromStr>::Err: fmt::Display,
{
    if let Some(v) = value.as_i64() {
        return <T as TryFrom<i64>>::try_from(v)
            .map_err(|_| reason(format!("integer {} is out of range", v)));
    }
    if let Some(v) = value.as_u64() {
        return <T as TryFrom<u64>>::try_from(v)
            .map_err(|_| reason(format!("integer {} is out of range", v)));
    }
    match value {
        Variant::String(s) => s.parse::<T>().map_err(|e| reason(format!("{:?}: {}", s, e))),
        _ => Err(reason("not an integer class")),
    }
}

fn visit_variant<'de, V: Visitor<'de>>(
    decoder: &Decoder,
    value: Variant,
    visitor: V,
) -> Result<V::Value> {
    match value {
        Variant::Empty | Variant::Null => visitor.visit_unit(),
        Variant::I1(v) => visitor.visit_i8(v),
        Variant::I2(v) => visitor.visit_i16(v),
        Variant::I4(v) => visitor.visit_i32(v),
        Variant::I8(v) => visitor.visit_i64(v),
        Variant::UI1(v) => visitor.visit_u8(v),
        Variant::UI2(v) => visitor.visit_u16(v),
        Variant::UI4(v) => visitor.visit_u32(v),
        Variant::UI8(v) => visitor.visit_u64(v),
        Variant::Bool(v) => visitor.visit_bool(v),
        Variant::R4(v) => visitor.visit_f32(v),
        Variant::String(v) => visitor.visit_string(v),
        Variant::Object(object) => visitor.visit_map(PropertyAccess::new(decoder, &*object)?),
        Variant::Array(items) => visitor.visit_seq(ArrayAccess::new(decoder, items)),
    }
}

macro_rules! deserialize_integer {
    ($($method:ident => $ty:ident, $visit:ident;)*) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
                match self.take(stringify!($ty))? {
                    None => visitor.$visit(0),
                    Some(value) => visitor.$visit(coerce_integer::<$ty>(&value)?),
                }
            }
        )*
    };
}

impl<'de, 'a> de::Deserializer<'de> for ValueDeserializer<'a> {
    type Error = WmiError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.slot {
            Slot::Failed(err) => Err(err),
            Slot::Missing if self.decoder.allow_missing_fields => visitor.visit_unit(),
            Slot::Missing => Err(reason("no such result field")),
            Slot::Present(value) => visit_variant(self.decoder, value, visitor),
        }
    }

    deserialize_integer! {
        deserialize_i8 => i8, visit_i8;
        deserialize_i16 => i16, visit_i16;
        deserialize_i32 => i32, visit_i32;
        deserialize_i64 => i64, visit_i64;
        deserialize_u8 => u8, visit_u8;
        deserialize_u16 => u16, visit_u16;
        deserialize_u32 => u32, visit_u32;
        deserialize_u64 => u64, visit_u64;
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.take("bool")? {
            None => visitor.visit_bool(false),
            Some(Variant::Bool(v)) => visitor.visit_bool(v),
            Some(_) => Err(reason("not a bool")),
        }
    }

    fn deserialize_f32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.take("f32")? {
            None => visitor.visit_f32(0.0),
            Some(Variant::R4(v)) => visitor.visit_f32(v),
            Some(_) => Err(reason("not a float32")),
        }
    }

    fn deserialize_f64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.take("f64")? {
            None => visitor.visit_f64(0.0),
            Some(value) => Err(unsupported(&value)),
        }
    }

    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.take("char")? {
            None => visitor.visit_char('\0'),
            Some(value) => Err(unsupported(&value)),
        }
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_string(visitor)
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.take("String")? {
            None => visitor.visit_str(""),
            Some(Variant::String(v)) => visitor.visit_string(v),
            Some(_) => Err(reason("not a string")),
        }
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_byte_buf(visitor)
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.take("bytes")? {
            None => visitor.visit_bytes(&[]),
            Some(Variant::Array(items)) => {
                let bytes = items
                    .iter()
                    .map(coerce_integer::<u8>)
                    .collect::<Result<Vec<u8>>>()
                    .map_err(|e| reason(format!("unsupported slice type ({})", e)))?;
                visitor.visit_byte_buf(bytes)
            }
            Some(value) => Err(unsupported(&value)),
        }
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.field_type.set("Option");
        match self.slot {
            Slot::Failed(err) => Err(err),
            Slot::Missing if self.decoder.allow_missing_fields => visitor.visit_none(),
            Slot::Missing => Err(reason("no such result field")),
            Slot::Present(Variant::Null) => visitor.visit_none(),
            Slot::Present(Variant::Empty) if self.decoder.ptr_nil => visitor.visit_none(),
            Slot::Present(Variant::Empty) => visitor.visit_some(ZeroDeserializer),
            slot => visitor.visit_some(ValueDeserializer { slot, ..self }),
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.take("()")? {
            None => visitor.visit_unit(),
            Some(value) => Err(unsupported(&value)),
        }
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        match self.take(name)? {
            None => visitor.visit_unit(),
            Some(value) => Err(unsupported(&value)),
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        if name != DATETIME_TOKEN {
            return visitor.visit_newtype_struct(self);
        }
        match self.take("WmiDateTime")? {
            None => visitor.visit_unit(),
            Some(Variant::String(v)) => visitor.visit_str(&v),
            Some(value) => Err(unsupported(&value)),
        }
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.reject_in_array("array")?;
        let decoder = self.decoder;
        match self.take("Vec")? {
            None => de::Deserializer::deserialize_seq(ZeroDeserializer, visitor),
            Some(Variant::Array(items)) => visitor.visit_seq(ArrayAccess::new(decoder, items)),
            Some(value) => Err(unsupported(&value)),
        }
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.reject_in_array("object")?;
        let decoder = self.decoder;
        match self.take("map")? {
            None => de::Deserializer::deserialize_map(ZeroDeserializer, visitor),
            Some(Variant::Object(object)) => {
                visitor.visit_map(PropertyAccess::new(decoder, &*object)?)
            }
            Some(value) => Err(unsupported(&value)),
        }
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        self.reject_in_array("object")?;
        let decoder = self.decoder;
        match self.take(name)? {
            None => de::Deserializer::deserialize_struct(ZeroDeserializer, name, fields, visitor),
            Some(Variant::Object(object)) => {
                visitor.visit_map(FieldAccess::new(decoder, &*object, fields))
            }
            Some(Variant::String(_)) => Err(reason(format!(
                "can't deserialize string into struct {}",
                name
            ))),
            Some(value) => Err(reason(format!("not an object ({})", value.kind()))),
        }
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        let decoder = self.decoder;
        let in_array = self.in_array;
        match self.take(name)? {
            None => Err(reason(format!("enum {} has no zero value", name))),
            Some(Variant::String(v)) => {
                let access: StringDeserializer<WmiError> = v.into_deserializer();
                visitor.visit_enum(access)
            }
            Some(Variant::Object(_)) if in_array => {
                Err(reason("object elements are not supported"))
            }
            Some(Variant::Object(object)) => {
                visitor.visit_enum(ClassAccess::new(decoder, &*object))
            }
            Some(value) => Err(unsupported(&value)),
        }
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_string(visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_unit()
    }
}

/// Elements of an array-valued property.
struct ArrayAccess<'a> {
    decoder: &'a Decoder,
    items: std::vec::IntoIter<Variant>,
    element_type: Cell<&'static str>,
}

impl<'a> ArrayAccess<'a> {
    fn new(decoder: &'a Decoder, items: Vec<Variant>) -> Self {
        Self {
            decoder,
            items: items.into_iter(),
            element_type: Cell::new("unknown"),
        }
    }
}

impl<'de, 'a> SeqAccess<'de> for ArrayAccess<'a> {
    type Error = WmiError;

    fn next_element_seed<T: DeserializeSeed<'de>>(&mut self, seed: T) -> Result<Option<T::Value>> {
        let Some(item) = self.items.next() else {
            return Ok(None);
        };
        let element = ValueDeserializer {
            decoder: self.decoder,
            slot: Slot::Present(item),
            field_type: &self.element_type,
            in_array: true,
        };
        seed.deserialize(element)
            .map(Some)
            .map_err(|e| reason(format!("unsupported slice type ({})", e)))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.items.len())
    }
}
