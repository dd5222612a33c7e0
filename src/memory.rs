//! In-memory object model.
//!
//! Implements every collaborator trait over plain Rust values, so decoding,
//! result sets, sessions and subscriptions can run without a remote system.

use crate::error::{Result, WmiError};
use crate::object::{
    Connector, DynamicObject, EventSource, ResultSet, Session, DEFAULT_NAMESPACE,
    WBEM_E_INVALID_NAMESPACE, WBEM_E_INVALID_QUERY, WBEM_E_NOT_FOUND, WBEM_E_SHUTTING_DOWN,
    WBEM_E_TIMED_OUT,
};
use crate::types::Variant;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A property bag held in memory. Properties keep insertion order.
#[derive(Clone, Debug, Default)]
pub struct MemoryObject {
    class: Option<String>,
    properties: Vec<(String, Variant)>,
}

impl MemoryObject {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: Some(class.into()),
            properties: Vec::new(),
        }
    }

    /// Set a property, replacing any previous value.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Variant>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Variant>) {
        let name = name.into();
        let value = value.into();
        match self.properties.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.properties.push((name, value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Variant> {
        let pos = self.properties.iter().position(|(n, _)| n == name)?;
        Some(self.properties.remove(pos).1)
    }
}

impl DynamicObject for MemoryObject {
    fn property(&self, name: &str) -> Result<Option<Variant>> {
        Ok(self
            .properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone()))
    }

    fn property_names(&self) -> Result<Vec<String>> {
        Ok(self.properties.iter().map(|(n, _)| n.clone()).collect())
    }

    fn class_name(&self) -> Option<&str> {
        self.class.as_deref()
    }
}

impl From<MemoryObject> for Variant {
    fn from(object: MemoryObject) -> Self {
        Variant::object(object)
    }
}

/// A result set over prepared objects, optionally with injected failures.
pub struct MemoryResultSet {
    items: VecDeque<Result<Box<dyn DynamicObject>>>,
    count: usize,
}

impl MemoryResultSet {
    pub fn new(objects: Vec<MemoryObject>) -> Self {
        Self::from_boxed(
            objects
                .into_iter()
                .map(|o| Box::new(o) as Box<dyn DynamicObject>)
                .collect(),
        )
    }

    /// Result set over arbitrary object implementations.
    pub fn from_boxed(objects: Vec<Box<dyn DynamicObject>>) -> Self {
        let count = objects.len();
        Self {
            items: objects.into_iter().map(Ok).collect(),
            count,
        }
    }

    /// Append an enumeration failure after the current elements.
    pub fn with_error(mut self, err: WmiError) -> Self {
        self.items.push_back(Err(err));
        self
    }

    /// Override the reported count.
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    /// Elements (and failures) not yet enumerated.
    pub fn remaining(&self) -> usize {
        self.items.len()
    }
}

impl ResultSet for MemoryResultSet {
    fn count(&self) -> Result<usize> {
        Ok(self.count)
    }

    fn next_object(&mut self) -> Result<Option<Box<dyn DynamicObject>>> {
        self.items.pop_front().transpose()
    }
}

/// Event source fed through a channel.
///
/// Dropping every sender ends the source with `WBEM_E_SHUTTING_DOWN`.
pub struct MemoryEventSource {
    events: Receiver<Result<MemoryObject>>,
}

impl MemoryEventSource {
    pub fn new(events: Receiver<Result<MemoryObject>>) -> Self {
        Self { events }
    }
}

impl EventSource for MemoryEventSource {
    fn next_event(&mut self, timeout: Option<Duration>) -> Result<Box<dyn DynamicObject>> {
        let received = match timeout {
            Some(timeout) => self.events.recv_timeout(timeout).map_err(|e| match e {
                RecvTimeoutError::Timeout => WmiError::remote(WBEM_E_TIMED_OUT, "NextEvent timed out"),
                RecvTimeoutError::Disconnected => shut_down(),
            })?,
            None => self.events.recv().map_err(|_| shut_down())?,
        };
        received.map(|object| Box::new(object) as Box<dyn DynamicObject>)
    }
}

fn shut_down() -> WmiError {
    WmiError::remote(WBEM_E_SHUTTING_DOWN, "event source closed")
}

/// Contents of one namespace.
#[derive(Clone, Debug, Default)]
pub struct MemoryNamespace {
    queries: HashMap<String, Vec<MemoryObject>>,
    objects: HashMap<String, MemoryObject>,
    notifications: HashMap<String, Receiver<Result<MemoryObject>>>,
}

impl MemoryNamespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `query` (matched verbatim) with `objects`.
    pub fn with_query(mut self, query: impl Into<String>, objects: Vec<MemoryObject>) -> Self {
        self.queries.insert(query.into(), objects);
        self
    }

    /// Make `object` reachable by its reference `path`.
    pub fn with_object(mut self, path: impl Into<String>, object: MemoryObject) -> Self {
        self.objects.insert(path.into(), object);
        self
    }

    /// Feed notification `query` from `events`.
    pub fn with_notifications(
        mut self,
        query: impl Into<String>,
        events: Receiver<Result<MemoryObject>>,
    ) -> Self {
        self.notifications.insert(query.into(), events);
        self
    }
}

/// Opens sessions over registered namespaces.
///
/// Namespace names are matched case-insensitively.
#[derive(Clone, Debug, Default)]
pub struct MemoryConnector {
    namespaces: Arc<RwLock<HashMap<String, MemoryNamespace>>>,
    open_sessions: Arc<AtomicUsize>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `contents` under the default namespace.
    pub fn with_default(self, contents: MemoryNamespace) -> Self {
        self.with_namespace(DEFAULT_NAMESPACE, contents)
    }

    pub fn with_namespace(self, name: &str, contents: MemoryNamespace) -> Self {
        self.insert_namespace(name, contents);
        self
    }

    /// Register or replace a namespace; later sessions see the new contents.
    pub fn insert_namespace(&self, name: &str, contents: MemoryNamespace) {
        self.namespaces
            .write()
            .insert(name.to_ascii_lowercase(), contents);
    }

    /// Sessions opened and not yet closed.
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }
}

impl Connector for MemoryConnector {
    fn connect(&self, namespace: Option<&str>) -> Result<Box<dyn Session>> {
        let name = namespace.unwrap_or(DEFAULT_NAMESPACE);
        let contents = self
            .namespaces
            .read()
            .get(&name.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| {
                WmiError::remote(WBEM_E_INVALID_NAMESPACE, format!("invalid namespace {}", name))
            })?;

        self.open_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySession {
            contents,
            open_sessions: Arc::clone(&self.open_sessions),
            closed: false,
        }))
    }
}

/// Session over a snapshot of one namespace.
struct MemorySession {
    contents: MemoryNamespace,
    open_sessions: Arc<AtomicUsize>,
    closed: bool,
}

impl MemorySession {
    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(WmiError::ConnectionClosed);
        }
        Ok(())
    }
}

impl Session for MemorySession {
    fn exec_query(&mut self, query: &str) -> Result<Box<dyn ResultSet>> {
        self.ensure_open()?;
        let objects = self.contents.queries.get(query).cloned().ok_or_else(|| {
            WmiError::remote(WBEM_E_INVALID_QUERY, format!("unknown query {:?}", query))
        })?;
        Ok(Box::new(MemoryResultSet::new(objects)))
    }

    fn get_object(&mut self, path: &str) -> Result<Box<dyn DynamicObject>> {
        self.ensure_open()?;
        let object = self.contents.objects.get(path).cloned().ok_or_else(|| {
            WmiError::remote(WBEM_E_NOT_FOUND, format!("object {:?} not found", path))
        })?;
        Ok(Box::new(object))
    }

    fn exec_notification_query(&mut self, query: &str) -> Result<Box<dyn EventSource>> {
        self.ensure_open()?;
        let events = self.contents.notifications.get(query).cloned().ok_or_else(|| {
            WmiError::remote(WBEM_E_INVALID_QUERY, format!("unknown notification query {:?}", query))
        })?;
        Ok(Box::new(MemoryEventSource::new(events)))
    }

    fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.open_sessions.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
