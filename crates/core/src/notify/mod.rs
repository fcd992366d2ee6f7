//! User-facing notifications.
//!
//! The orchestrator reports validation rejections, submission failures and
//! terminal outcomes through a [`NotificationSink`]. It never owns the
//! sink's lifecycle; a sink that drops messages is acceptable.

mod sinks;
mod types;

pub use sinks::{ChannelNotifier, CompositeNotifier, TracingNotifier};
pub use types::{Notification, NotificationSink, Severity};
