//! Core value types: property variants and CIM datetimes.

use crate::error::{Result, WmiError};
use crate::object::DynamicObject;
use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::de::{self, Deserialize, Deserializer, Visitor};
use serde::{Serialize, Serializer};
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;
use std::sync::Arc;

/// A single property value as delivered by the remote object model.
#[derive(Clone, Debug)]
pub enum Variant {
    /// No value at all (`VT_EMPTY`), distinct from an explicit null.
    Empty,
    /// Explicit null (`VT_NULL`).
    Null,
    I1(i8),
    I2(i16),
    I4(i32),
    I8(i64),
    UI1(u8),
    UI2(u16),
    UI4(u32),
    UI8(u64),
    Bool(bool),
    R4(f32),
    String(String),
    /// Embedded or referenced object.
    Object(Arc<dyn DynamicObject>),
    Array(Vec<Variant>),
}

/// Kind tag of a [`Variant`], used in error reasons.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VariantKind {
    Empty,
    Null,
    I1,
    I2,
    I4,
    I8,
    UI1,
    UI2,
    UI4,
    UI8,
    Bool,
    R4,
    String,
    Object,
    Array,
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VariantKind::Empty | VariantKind::Null => "<nil>",
            VariantKind::I1 => "int8",
            VariantKind::I2 => "int16",
            VariantKind::I4 => "int32",
            VariantKind::I8 => "int64",
            VariantKind::UI1 => "uint8",
            VariantKind::UI2 => "uint16",
            VariantKind::UI4 => "uint32",
            VariantKind::UI8 => "uint64",
            VariantKind::Bool => "bool",
            VariantKind::R4 => "float32",
            VariantKind::String => "string",
            VariantKind::Object => "object",
            VariantKind::Array => "array",
        };
        f.write_str(name)
    }
}

impl Variant {
    pub fn kind(&self) -> VariantKind {
        match self {
            Variant::Empty => VariantKind::Empty,
            Variant::Null => VariantKind::Null,
            Variant::I1(_) => VariantKind::I1,
            Variant::I2(_) => VariantKind::I2,
            Variant::I4(_) => VariantKind::I4,
            Variant::I8(_) => VariantKind::I8,
            Variant::UI1(_) => VariantKind::UI1,
            Variant::UI2(_) => VariantKind::UI2,
            Variant::UI4(_) => VariantKind::UI4,
            Variant::UI8(_) => VariantKind::UI8,
            Variant::Bool(_) => VariantKind::Bool,
            Variant::R4(_) => VariantKind::R4,
            Variant::String(_) => VariantKind::String,
            Variant::Object(_) => VariantKind::Object,
            Variant::Array(_) => VariantKind::Array,
        }
    }

    /// Create an object variant.
    pub fn object(object: impl DynamicObject + 'static) -> Self {
        Variant::Object(Arc::new(object))
    }

    /// Signed value of an integer variant that fits in `i64`.
    pub(crate) fn as_i64(&self) -> Option<i64> {
        match *self {
            Variant::I1(v) => Some(v.into()),
            Variant::I2(v) => Some(v.into()),
            Variant::I4(v) => Some(v.into()),
            Variant::I8(v) => Some(v),
            _ => None,
        }
    }

    /// Value of an unsigned integer variant.
    pub(crate) fn as_u64(&self) -> Option<u64> {
        match *self {
            Variant::UI1(v) => Some(v.into()),
            Variant::UI2(v) => Some(v.into()),
            Variant::UI4(v) => Some(v.into()),
            Variant::UI8(v) => Some(v),
            _ => None,
        }
    }
}

macro_rules! variant_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Variant {
                fn from(v: $ty) -> Self {
                    Variant::$variant(v)
                }
            }
        )*
    };
}

variant_from! {
    i8 => I1,
    i16 => I2,
    i32 => I4,
    i64 => I8,
    u8 => UI1,
    u16 => UI2,
    u32 => UI4,
    u64 => UI8,
    bool => Bool,
    f32 => R4,
    String => String,
}

impl From<&str> for Variant {
    fn from(v: &str) -> Self {
        Variant::String(v.to_string())
    }
}

impl<T: Into<Variant>> From<Vec<T>> for Variant {
    fn from(items: Vec<T>) -> Self {
        Variant::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Variant>> From<Option<T>> for Variant {
    fn from(v: Option<T>) -> Self {
        v.map_or(Variant::Null, Into::into)
    }
}

/// Newtype token that identifies [`WmiDateTime`] to the decoder.
pub(crate) const DATETIME_TOKEN: &str = "$wmi_client::private::DateTime";

/// Layout of a normalized CIM datetime without its offset.
const CIM_LAYOUT: &str = "%Y%m%d%H%M%S%.6f";

/// Parse a CIM datetime (`YYYYMMDDHHMMSS.ffffff±UUU`).
///
/// The last three digits are a UTC offset in minutes. The `±HHMM` form is
/// accepted as well.
pub fn parse_cim_datetime(value: &str) -> Result<DateTime<FixedOffset>> {
    let invalid = |reason: String| WmiError::InvalidDateTime {
        value: value.to_string(),
        reason,
    };

    let normalized = if value.len() == 25 && value.is_ascii() {
        let offset = &value[22..];
        if !offset.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid(format!("bad minute offset {:?}", offset)));
        }
        let minutes: u32 = offset.parse().map_err(|e| invalid(format!("{}", e)))?;
        format!("{}{:02}{:02}", &value[..22], minutes / 60, minutes % 60)
    } else {
        value.to_string()
    };

    DateTime::parse_from_str(&normalized, &format!("{}%z", CIM_LAYOUT))
        .map_err(|e| invalid(e.to_string()))
}

/// Timestamp property, decoded from a CIM datetime string.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WmiDateTime(pub DateTime<FixedOffset>);

impl WmiDateTime {
    /// Format back into the CIM layout with a minute offset.
    pub fn to_cim_string(&self) -> String {
        let offset = self.0.offset().local_minus_utc() / 60;
        let sign = if offset < 0 { '-' } else { '+' };
        format!(
            "{}{}{:03}",
            self.0.format(CIM_LAYOUT),
            sign,
            offset.unsigned_abs()
        )
    }

    /// The instant in UTC.
    pub fn to_utc(&self) -> DateTime<Utc> {
        self.0.with_timezone(&Utc)
    }
}

impl Default for WmiDateTime {
    /// The Unix epoch in UTC.
    fn default() -> Self {
        WmiDateTime(DateTime::<Utc>::default().with_timezone(&Utc.fix()))
    }
}

impl Deref for WmiDateTime {
    type Target = DateTime<FixedOffset>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromStr for WmiDateTime {
    type Err = WmiError;

    fn from_str(s: &str) -> Result<Self> {
        parse_cim_datetime(s).map(WmiDateTime)
    }
}

impl fmt::Debug for WmiDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WmiDateTime({})", self.0.to_rfc3339())
    }
}

impl fmt::Display for WmiDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl Serialize for WmiDateTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_cim_string())
    }
}

impl<'de> Deserialize<'de> for WmiDateTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_newtype_struct(DATETIME_TOKEN, DateTimeVisitor)
    }
}

struct DateTimeVisitor;

impl<'de> Visitor<'de> for DateTimeVisitor {
    type Value = WmiDateTime;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a CIM datetime string")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<WmiDateTime, E> {
        v.parse().map_err(E::custom)
    }

    /// Zero value.
    fn visit_unit<E: de::Error>(self) -> std::result::Result<WmiDateTime, E> {
        Ok(WmiDateTime::default())
    }

    fn visit_newtype_struct<D: Deserializer<'de>>(
        self,
        deserializer: D,
    ) -> std::result::Result<WmiDateTime, D::Error> {
        deserializer.deserialize_str(self)
    }
}
