//! Error types for decoding, queries and subscriptions.

use crate::object::WBEM_E_TIMED_OUT;
use std::fmt;
use thiserror::Error;

/// A single field could not be loaded from its property.
///
/// Raised when the property is missing (and missing fields are not allowed),
/// when the property value has a kind the field cannot hold, or when a nested
/// record failed to decode.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("wmi: cannot load field {property:?} into a {field_type:?}: {reason}")]
pub struct FieldMismatch {
    /// Type of the destination field.
    pub field_type: String,
    /// Resolved property name.
    pub property: String,
    /// Human-readable reason.
    pub reason: String,
}

/// Field mismatches collected across the elements of a result set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldMismatches(pub Vec<FieldMismatch>);

impl FieldMismatches {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldMismatch> {
        self.0.iter()
    }
}

impl fmt::Display for FieldMismatches {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} field mismatch(es)", self.0.len())?;
        for (i, mismatch) in self.0.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{}{}", sep, mismatch)?;
        }
        Ok(())
    }
}

/// Main error type.
#[derive(Debug, Error)]
pub enum WmiError {
    #[error(transparent)]
    FieldMismatch(#[from] FieldMismatch),

    #[error("{0}")]
    FieldMismatches(FieldMismatches),

    #[error("Invalid destination type: {0}")]
    InvalidDestination(String),

    #[error("Invalid datetime {value:?}: {reason}")]
    InvalidDateTime { value: String, reason: String },

    #[error("Remote call failed (0x{code:08X}): {message}")]
    Remote { code: u32, message: String },

    #[error("Wait for the next event timed out")]
    TimedOut,

    #[error("Connection has been closed")]
    ConnectionClosed,

    #[error("Already running")]
    AlreadyRunning,

    #[error("Runtime panic: {0}")]
    Panic(String),

    /// Raised by a destination type's own `Deserialize` impl.
    #[error("{0}")]
    Custom(String),
}

impl WmiError {
    /// Create a remote failure with a WBEM status code.
    pub fn remote(code: u32, message: impl Into<String>) -> Self {
        WmiError::Remote {
            code,
            message: message.into(),
        }
    }

    /// True for a shape mismatch (single field or accumulated list).
    pub fn is_field_mismatch(&self) -> bool {
        matches!(
            self,
            WmiError::FieldMismatch(_) | WmiError::FieldMismatches(_)
        )
    }

    /// True when a bounded wait exceeded its deadline.
    pub fn is_timeout(&self) -> bool {
        match self {
            WmiError::TimedOut => true,
            WmiError::Remote { code, .. } => *code == WBEM_E_TIMED_OUT,
            _ => false,
        }
    }

    /// All field mismatches carried by this error, if any.
    pub fn field_mismatches(&self) -> Vec<&FieldMismatch> {
        match self {
            WmiError::FieldMismatch(m) => vec![m],
            WmiError::FieldMismatches(list) => list.iter().collect(),
            _ => Vec::new(),
        }
    }
}

impl serde::de::Error for WmiError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        WmiError::Custom(msg.to_string())
    }
}

/// Result type for this crate.
pub type Result<T> = std::result::Result<T, WmiError>;
