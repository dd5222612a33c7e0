//! Event subscriptions.
//!
//! A [`NotificationQuery`] runs a notification query against its own session
//! and delivers every event, decoded into the caller's record type, on a
//! channel until it is stopped.
//!
//! # Example
//!
//! ```ignore
//! #[derive(Deserialize)]
//! struct ProcessStarted {
//!     #[serde(rename = "ProcessName")]
//!     name: String,
//!     #[serde(rename = "ProcessID")]
//!     pid: u32,
//! }
//!
//! let (tx, rx) = crossbeam_channel::unbounded();
//! let query = Arc::new(NotificationQuery::<ProcessStarted>::new(
//!     connector,
//!     tx,
//!     "SELECT * FROM Win32_ProcessStartTrace",
//! )?);
//! let worker = query.spawn();
//!
//! for event in rx.iter().take(10) {
//!     println!("{} started as {}", event.name, event.pid);
//! }
//!
//! query.stop();
//! worker.join().unwrap()?;
//! ```

mod notification;
mod types;

pub use notification::NotificationQuery;
pub use types::{NotificationConfig, SubscriptionState, DEFAULT_NOTIFICATION_TIMEOUT};
