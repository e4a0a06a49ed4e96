//! fleetscale-notify — operator notifications.
//!
//! Notification is observability only. A [`Notifier`] never returns an
//! error: delivery failures are logged and dropped, and nothing is retried.

pub mod sink;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use sink::{Credentials, MemoryNotifier, Notifier, TelegramNotifier};
