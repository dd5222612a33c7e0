//! Client entry points and reusable connections.
//!
//! [`Client`] opens a session per call and closes it before returning.
//! [`Connection`] keeps one session open across calls until closed.

use crate::decoder::{ensure_record, Decoder};
use crate::error::{Result, WmiError};
use crate::object::{Connector, Session};
use crate::subscriptions::{NotificationConfig, NotificationQuery};
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;

/// Entry point for queries, object lookups and subscriptions.
#[derive(Clone)]
pub struct Client {
    decoder: Decoder,
    connector: Arc<dyn Connector>,
}

impl Client {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            decoder: Decoder::default(),
            connector,
        }
    }

    pub fn with_decoder(mut self, decoder: Decoder) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    /// Run `query` in the default namespace and decode the results into `dst`.
    pub fn query<T: DeserializeOwned>(&self, query: &str, dst: &mut Vec<T>) -> Result<()> {
        self.query_namespace(query, dst, None)
    }

    /// Run `query` in `namespace` and decode the results into `dst`.
    ///
    /// See [`Decoder::decode_all`] for how partial failures are reported.
    pub fn query_namespace<T: DeserializeOwned>(
        &self,
        query: &str,
        dst: &mut Vec<T>,
        namespace: Option<&str>,
    ) -> Result<()> {
        ensure_record::<T>()?;
        let connection = self.connect(namespace)?;
        let result = connection.query(query, dst);
        finish(result, connection.close())
    }

    /// Fetch the object at `path` in the default namespace.
    pub fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        ensure_record::<T>()?;
        let connection = self.connect(None)?;
        let result = connection.get(path);
        finish(result, connection.close())
    }

    /// Open a connection that stays open until [`Connection::close`].
    pub fn connect(&self, namespace: Option<&str>) -> Result<Connection> {
        let session = self.connector.connect(namespace)?;
        tracing::debug!(namespace = namespace.unwrap_or_default(), "Opened connection");
        Ok(Connection::new(session, self.decoder))
    }

    /// Create a subscription sharing this client's connector and decoder.
    pub fn notification_query<T: DeserializeOwned + Send + 'static>(
        &self,
        events: Sender<T>,
        query: impl Into<String>,
    ) -> Result<NotificationQuery<T>> {
        self.notification_query_with_config(events, query, NotificationConfig::default())
    }

    /// Like [`Client::notification_query`]; `config.decoder` is replaced by
    /// the client's decoder.
    pub fn notification_query_with_config<T: DeserializeOwned + Send + 'static>(
        &self,
        events: Sender<T>,
        query: impl Into<String>,
        config: NotificationConfig,
    ) -> Result<NotificationQuery<T>> {
        NotificationQuery::with_config(
            Arc::clone(&self.connector),
            events,
            query,
            config.with_decoder(self.decoder),
        )
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("decoder", &self.decoder)
            .finish_non_exhaustive()
    }
}

/// The call's own error wins; a close failure is only returned on success.
fn finish<T>(result: Result<T>, closed: Result<()>) -> Result<T> {
    match (result, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(err)) => Err(err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(close_err)) => {
            tracing::warn!(error = %close_err, "Failed to close session");
            Err(err)
        }
    }
}

/// A session kept open across calls.
pub struct Connection {
    decoder: Decoder,
    session: Mutex<Option<Box<dyn Session>>>,
}

impl Connection {
    pub fn new(session: Box<dyn Session>, decoder: Decoder) -> Self {
        Self {
            decoder,
            session: Mutex::new(Some(session)),
        }
    }

    /// Run `query` and decode the results into `dst`.
    pub fn query<T: DeserializeOwned>(&self, query: &str, dst: &mut Vec<T>) -> Result<()> {
        let mut guard = self.session.lock();
        let session = guard.as_mut().ok_or(WmiError::ConnectionClosed)?;
        ensure_record::<T>()?;

        let mut results = session.exec_query(query)?;
        self.decoder.decode_all(results.as_mut(), dst)
    }

    /// Fetch and decode the object at `path`.
    pub fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let mut guard = self.session.lock();
        let session = guard.as_mut().ok_or(WmiError::ConnectionClosed)?;
        ensure_record::<T>()?;

        let object = session.get_object(path)?;
        self.decoder.decode(&*object)
    }

    /// Release the session. Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        let Some(mut session) = self.session.lock().take() else {
            return Ok(());
        };
        session.close()
    }

    pub fn is_closed(&self) -> bool {
        self.session.lock().is_none()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("decoder", &self.decoder)
            .field("closed", &self.is_closed())
            .finish()
    }
}
