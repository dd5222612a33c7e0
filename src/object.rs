//! Collaborator traits for the remote object model.
//!
//! The decoder only ever sees these traits. A backend (COM on Windows, a
//! remote WBEM bridge, or the in-memory [`crate::memory`] module) provides
//! the implementations. Handles returned by a backend are released when the
//! owning value is dropped, so every fetched property or sub-object is
//! returned to the backend at the end of the scope that fetched it.

use crate::error::Result;
use crate::types::Variant;
use std::fmt;
use std::time::Duration;

/// `WBEM_E_NOT_FOUND`
pub const WBEM_E_NOT_FOUND: u32 = 0x8004_1002;
/// `WBEM_E_INVALID_NAMESPACE`
pub const WBEM_E_INVALID_NAMESPACE: u32 = 0x8004_100E;
/// `WBEM_E_INVALID_QUERY`
pub const WBEM_E_INVALID_QUERY: u32 = 0x8004_1017;
/// `WBEM_E_SHUTTING_DOWN`
pub const WBEM_E_SHUTTING_DOWN: u32 = 0x8004_1033;
/// `WBEM_E_TIMED_OUT`, returned by a notification wait that ran out of time.
pub const WBEM_E_TIMED_OUT: u32 = 0x8004_3001;

/// Default namespace used when none is given.
pub const DEFAULT_NAMESPACE: &str = r"root\cimv2";

/// A property bag whose values are typed only at read time.
pub trait DynamicObject: Send + Sync + fmt::Debug {
    /// Fetch a property by name.
    ///
    /// `Ok(None)` means the object has no such property.
    fn property(&self, name: &str) -> Result<Option<Variant>>;

    /// Names of all properties, in the backend's order.
    fn property_names(&self) -> Result<Vec<String>>;

    /// Class of the object, if the backend knows it.
    fn class_name(&self) -> Option<&str> {
        None
    }
}

/// An enumerable query result.
pub trait ResultSet: Send {
    /// Reported element count. A sizing hint, not a bound.
    fn count(&self) -> Result<usize>;

    /// Next element, or `None` when the set is exhausted.
    fn next_object(&mut self) -> Result<Option<Box<dyn DynamicObject>>>;
}

/// Source of event objects for a notification query.
pub trait EventSource: Send {
    /// Wait for the next event.
    ///
    /// `None` waits indefinitely. Running out of time must be reported as an
    /// error for which [`crate::WmiError::is_timeout`] is true.
    fn next_event(&mut self, timeout: Option<Duration>) -> Result<Box<dyn DynamicObject>>;
}

/// An open session to one namespace.
pub trait Session: Send {
    /// Execute a query. The query text is passed through unmodified.
    fn exec_query(&mut self, query: &str) -> Result<Box<dyn ResultSet>>;

    /// Fetch a single object by its reference path.
    fn get_object(&mut self, path: &str) -> Result<Box<dyn DynamicObject>>;

    /// Subscribe to events matching a notification query.
    fn exec_notification_query(&mut self, query: &str) -> Result<Box<dyn EventSource>>;

    /// Release the session.
    fn close(&mut self) -> Result<()>;
}

/// Opens sessions.
pub trait Connector: Send + Sync {
    /// Open a session, optionally scoped to a namespace.
    fn connect(&self, namespace: Option<&str>) -> Result<Box<dyn Session>>;
}
