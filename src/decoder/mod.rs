//! Type-directed decoding of dynamic objects into records.
//!
//! Destination records derive [`serde::Deserialize`]. Each declared field is
//! bound to one property:
//!
//! - `#[serde(rename = "ProcessId")]` reads property `ProcessId`
//! - `#[serde(skip)]` never reads anything (the field keeps its `Default`)
//! - otherwise the field name is the property name
//!
//! Property values are converted by destination kind. Integers fit across
//! widths and signedness, numeric strings parse into integer fields, CIM
//! datetime strings parse into [`WmiDateTime`](crate::WmiDateTime), nested
//! objects decode into nested records, arrays into `Vec`s of primitives.
//! `Option<T>` fields are the pointer-like fields that may stay empty.
//!
//! An enum destination picks its variant from the object's class: the
//! `__CLASS` property, else the class the backend reports. Struct and newtype
//! variants then decode from the object with the same field walk, so every
//! rule above applies to them. Internally tagged enums (`#[serde(tag = ..)]`)
//! also work, but serde buffers the object for them and they see raw values
//! only.
//!
//! A type that needs more than that writes its own `Deserialize` impl or uses
//! `#[serde(from = "...")]`. Errors from such impls are returned as they are.
//!
//! # Example
//!
//! ```ignore
//! #[derive(Deserialize)]
//! struct Process {
//!     #[serde(rename = "ProcessId")]
//!     pid: u32,
//!     #[serde(rename = "Name")]
//!     name: String,
//!     #[serde(rename = "CreationDate")]
//!     created: Option<WmiDateTime>,
//!     #[serde(skip)]
//!     note: String,
//! }
//!
//! let process: Process = Decoder::new().decode(&*object)?;
//! ```

mod collection;
mod de;
mod shape;
mod zero;

pub(crate) use shape::ensure_record;

use crate::error::{Result, WmiError};
use crate::object::DynamicObject;
use crate::types::Variant;
use de::ObjectDeserializer;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Decoder configuration.
///
/// The decoder holds no other state; one value can be shared freely.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Decoder {
    /// A "no value" property sets a non-`Option` field to its zero value
    /// instead of failing.
    pub non_ptr_zero: bool,

    /// A "no value" property leaves an `Option` field as `None`. When
    /// unset the field becomes `Some` of the zero value.
    pub ptr_nil: bool,

    /// Fields whose property is absent keep their zero value instead of
    /// failing with "no such result field".
    pub allow_missing_fields: bool,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_non_ptr_zero(mut self, enabled: bool) -> Self {
        self.non_ptr_zero = enabled;
        self
    }

    pub fn with_ptr_nil(mut self, enabled: bool) -> Self {
        self.ptr_nil = enabled;
        self
    }

    pub fn with_allow_missing_fields(mut self, enabled: bool) -> Self {
        self.allow_missing_fields = enabled;
        self
    }

    /// Decode one object into a new `T`.
    ///
    /// Field failures come back as [`WmiError::FieldMismatch`]. A panic
    /// raised while walking the destination is returned as
    /// [`WmiError::Panic`].
    pub fn decode<T: DeserializeOwned>(&self, src: &dyn DynamicObject) -> Result<T> {
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            T::deserialize(ObjectDeserializer::new(self, src))
        }));
        result.unwrap_or_else(|payload| {
            let message = panic_message(payload.as_ref());
            tracing::error!(
                destination = std::any::type_name::<T>(),
                %message,
                "Panic while decoding object"
            );
            Err(WmiError::Panic(message))
        })
    }

    /// Decode one object into caller-owned storage.
    ///
    /// `dst` is only overwritten when decoding succeeds.
    pub fn decode_into<T: DeserializeOwned>(
        &self,
        src: &dyn DynamicObject,
        dst: &mut T,
    ) -> Result<()> {
        *dst = self.decode(src)?;
        Ok(())
    }

    /// Decode a single property value, e.g. one fetched by hand.
    pub fn decode_value<T: DeserializeOwned>(
        &self,
        property: &str,
        value: Variant,
    ) -> Result<T> {
        de::decode_value(self, property, value)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
