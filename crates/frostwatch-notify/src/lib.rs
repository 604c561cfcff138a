//! Frost alert notifications.
//!
//! Delivery is best-effort: a failed notification is logged by the caller
//! and never retried.

pub mod message;
pub mod notifier;
pub mod webhook;

pub use message::{FrostNotification, NOTIFICATION_VERSION};
pub use notifier::{build_notifier, LogNotifier, Notifier};
pub use webhook::WebhookNotifier;
