//! Notification query controller.

use super::types::{decode_timeout, encode_timeout, NotificationConfig, SubscriptionState};
use crate::decoder::{ensure_record, Decoder};
use crate::error::{Result, WmiError};
use crate::object::{Connector, Session};
use crossbeam_channel::{bounded, select, Receiver, Sender};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// A running or runnable event subscription.
///
/// `start` runs the receive loop on the calling thread; `stop` may be called
/// from any other thread and returns once the loop has acknowledged it, or
/// straight away if the loop already ended on its own. Decoded events are
/// sent on the channel given at construction in the order they arrived.
pub struct NotificationQuery<T> {
    query: String,
    connector: Arc<dyn Connector>,
    namespace: Option<String>,
    decoder: Decoder,
    events: Sender<T>,

    state: Mutex<SubscriptionState>,
    timeout: AtomicU64,

    // Rendezvous channel: a send only completes while `stop` is waiting.
    done_tx: Sender<()>,
    done_rx: Receiver<()>,

    // Posted once when the loop returns for any reason.
    exited_tx: Sender<()>,
    exited_rx: Receiver<()>,
    // Set when the loop returns, even if the state lock was busy.
    exited: AtomicBool,
}

impl<T: DeserializeOwned + Send + 'static> NotificationQuery<T> {
    /// Create a subscription with the default configuration.
    pub fn new(
        connector: Arc<dyn Connector>,
        events: Sender<T>,
        query: impl Into<String>,
    ) -> Result<Self> {
        Self::with_config(connector, events, query, NotificationConfig::default())
    }

    /// Create a subscription.
    ///
    /// Fails with [`WmiError::InvalidDestination`] if `T` is not a record.
    pub fn with_config(
        connector: Arc<dyn Connector>,
        events: Sender<T>,
        query: impl Into<String>,
        config: NotificationConfig,
    ) -> Result<Self> {
        ensure_record::<T>()?;

        let (done_tx, done_rx) = bounded(0);
        let (exited_tx, exited_rx) = bounded(1);

        Ok(Self {
            query: query.into(),
            connector,
            namespace: config.namespace,
            decoder: config.decoder,
            events,
            state: Mutex::new(SubscriptionState::NotStarted),
            timeout: AtomicU64::new(encode_timeout(config.timeout)),
            done_tx,
            done_rx,
            exited_tx,
            exited_rx,
            exited: AtomicBool::new(false),
        })
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn state(&self) -> SubscriptionState {
        let mut state = self.state.lock();
        self.settle(&mut state);
        *state
    }

    /// Record an exit the loop could not write under the lock.
    fn settle(&self, state: &mut SubscriptionState) {
        if *state == SubscriptionState::Started && self.exited.load(Ordering::Acquire) {
            *state = SubscriptionState::Stopped;
        }
    }

    /// Current bound on each wait for an event.
    pub fn timeout(&self) -> Option<Duration> {
        decode_timeout(self.timeout.load(Ordering::Acquire))
    }

    /// Change the bound on each wait for an event. `None` waits
    /// indefinitely. Takes effect at the next wait.
    pub fn set_timeout(&self, timeout: Option<Duration>) {
        self.timeout.store(encode_timeout(timeout), Ordering::Release);
    }

    /// Run the receive loop on the calling thread.
    ///
    /// Returns `Ok(())` once stopped (or immediately if already stopped),
    /// [`WmiError::AlreadyRunning`] if another call is running the loop, or
    /// the first error that ended the loop.
    pub fn start(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            self.settle(&mut state);
            match *state {
                SubscriptionState::Started => return Err(WmiError::AlreadyRunning),
                SubscriptionState::Stopped => return Ok(()),
                SubscriptionState::NotStarted => *state = SubscriptionState::Started,
            }
        }

        let _exit = ExitGuard(self);
        tracing::debug!(query = %self.query, "Starting notification query");

        let result = self.run();
        match &result {
            Ok(()) => tracing::debug!(query = %self.query, "Notification query stopped"),
            Err(err) => tracing::warn!(
                query = %self.query,
                error = %err,
                "Notification query terminated"
            ),
        }
        result
    }

    /// Run the receive loop on a new thread.
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<Result<()>> {
        let query = Arc::clone(self);
        thread::spawn(move || query.start())
    }

    /// Stop the subscription.
    ///
    /// Blocks until the loop acknowledges, which takes at most one wait
    /// timeout. Safe to call before `start`, more than once, or after the
    /// loop ended with an error.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        self.settle(&mut state);
        if *state == SubscriptionState::Started {
            select! {
                recv(self.done_rx) -> _ => {}
                recv(self.exited_rx) -> _ => {}
            }
        }
        *state = SubscriptionState::Stopped;
    }

    fn run(&self) -> Result<()> {
        let mut session = self.connector.connect(self.namespace.as_deref())?;
        let result = self.poll(session.as_mut());
        if let Err(err) = session.close() {
            tracing::warn!(error = %err, "Failed to close notification session");
        }
        result
    }

    fn poll(&self, session: &mut dyn Session) -> Result<()> {
        let mut source = session.exec_notification_query(&self.query)?;

        loop {
            if self.done_tx.try_send(()).is_ok() {
                return Ok(());
            }

            let event = match source.next_event(self.timeout()) {
                Ok(event) => event,
                Err(err) if err.is_timeout() => continue,
                Err(err) => return Err(err),
            };

            let decoded: T = self.decoder.decode(&*event)?;
            drop(event);

            select! {
                send(self.events, decoded) -> res => {
                    if res.is_err() {
                        tracing::debug!(query = %self.query, "Event receiver dropped");
                        return Ok(());
                    }
                }
                send(self.done_tx, ()) -> _ => return Ok(()),
            }
        }
    }
}

impl<T> fmt::Debug for NotificationQuery<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationQuery")
            .field("query", &self.query)
            .field("namespace", &self.namespace)
            .field("state", &self.state.try_lock().map(|state| *state))
            .finish_non_exhaustive()
    }
}

/// Marks the loop as exited, whichever way it returned.
struct ExitGuard<'a, T>(&'a NotificationQuery<T>);

impl<T> Drop for ExitGuard<'_, T> {
    fn drop(&mut self) {
        self.0.exited.store(true, Ordering::Release);
        // Whoever holds the lock settles the state from the flag.
        if let Some(mut state) = self.0.state.try_lock() {
            *state = SubscriptionState::Stopped;
        }
        let _ = self.0.exited_tx.try_send(());
    }
}
