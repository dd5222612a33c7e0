//! Subscription configuration and state.

use crate::decoder::Decoder;
use std::time::Duration;

/// How long a wait for the next event may block before the loop re-checks
/// for a stop request.
pub const DEFAULT_NOTIFICATION_TIMEOUT: Duration = Duration::from_secs(1);

/// Configuration for a notification query.
#[derive(Clone, Debug)]
pub struct NotificationConfig {
    /// Bound on each wait for the next event. `None` waits indefinitely,
    /// so a stop request is only seen between events.
    /// Default: 1s
    pub timeout: Option<Duration>,

    /// Namespace to connect to (None = default namespace).
    pub namespace: Option<String>,

    /// Decoder applied to every event.
    pub decoder: Decoder,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_NOTIFICATION_TIMEOUT),
            namespace: None,
            decoder: Decoder::default(),
        }
    }
}

impl NotificationConfig {
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_decoder(mut self, decoder: Decoder) -> Self {
        self.decoder = decoder;
        self
    }
}

/// Lifecycle of a notification query. Transitions only move forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscriptionState {
    NotStarted,
    Started,
    Stopped,
}

/// Wait timeout packed into an atomic. `u64::MAX` means no bound.
pub(crate) const NO_TIMEOUT: u64 = u64::MAX;

pub(crate) fn encode_timeout(timeout: Option<Duration>) -> u64 {
    match timeout {
        Some(t) => u64::try_from(t.as_micros()).unwrap_or(NO_TIMEOUT - 1).min(NO_TIMEOUT - 1),
        None => NO_TIMEOUT,
    }
}

pub(crate) fn decode_timeout(micros: u64) -> Option<Duration> {
    if micros == NO_TIMEOUT {
        None
    } else {
        Some(Duration::from_micros(micros))
    }
}
