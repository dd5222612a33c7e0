//! # WMI Client
//!
//! Decodes dynamic, property-bag objects from a WMI-style object model into
//! plain Rust records.
//!
//! ## Core Concepts
//!
//! - **Decoder**: Walks a record's declared fields and fills each from the
//!   property of the same (or renamed) name, converting by field kind
//! - **Collections**: Materializes a whole result set, keeping the elements
//!   that decode and reporting the ones that don't
//! - **Subscriptions**: Runs a notification query and delivers decoded events
//!   on a channel until stopped
//! - **Backends**: Sessions and objects come from [`Connector`]
//!   implementations; [`memory`] provides one over plain values
//!
//! ## Example
//!
//! ```ignore
//! use wmi_client::{Client, Decoder};
//!
//! #[derive(Deserialize)]
//! struct Service {
//!     #[serde(rename = "Name")]
//!     name: String,
//!     #[serde(rename = "ProcessId")]
//!     pid: u32,
//! }
//!
//! let client = Client::new(connector).with_decoder(Decoder::new().with_ptr_nil(true));
//!
//! let mut services: Vec<Service> = Vec::new();
//! client.query("SELECT * FROM Win32_Service", &mut services)?;
//! ```

pub mod connection;
pub mod decoder;
pub mod error;
pub mod memory;
pub mod object;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use connection::{Client, Connection};
pub use decoder::Decoder;
pub use error::{FieldMismatch, FieldMismatches, Result, WmiError};
pub use object::{
    Connector, DynamicObject, EventSource, ResultSet, Session, DEFAULT_NAMESPACE,
    WBEM_E_INVALID_NAMESPACE, WBEM_E_INVALID_QUERY, WBEM_E_NOT_FOUND, WBEM_E_SHUTTING_DOWN,
    WBEM_E_TIMED_OUT,
};
pub use subscriptions::{
    NotificationConfig, NotificationQuery, SubscriptionState, DEFAULT_NOTIFICATION_TIMEOUT,
};
pub use types::{parse_cim_datetime, Variant, VariantKind, WmiDateTime};
