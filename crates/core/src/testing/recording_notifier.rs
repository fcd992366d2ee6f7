//! Notification sink that records everything it receives.

use std::sync::Mutex;

use crate::notify::{Notification, NotificationSink, Severity};

/// Records notifications for test assertions.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    received: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything received so far, in order.
    pub fn notifications(&self) -> Vec<Notification> {
        self.lock().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.lock().iter().map(|n| n.message.clone()).collect()
    }

    /// How many notifications of `severity` were received.
    pub fn count(&self, severity: Severity) -> usize {
        self.lock().iter().filter(|n| n.severity == severity).count()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Notification>> {
        self.received
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.lock().push(notification);
    }
}
