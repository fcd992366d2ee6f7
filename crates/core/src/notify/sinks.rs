//! Built-in notification sinks.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{error, info, warn};

use super::types::{Notification, NotificationSink, Severity};

/// Logs every notification at a level matching its severity.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
    fn notify(&self, n: Notification) {
        let file_id = n.file_id.map(|id| id.to_string()).unwrap_or_default();
        match n.severity {
            Severity::Info | Severity::Success => {
                info!(severity = n.severity.as_str(), file_id = %file_id, "{}", n.message)
            }
            Severity::Warning => warn!(file_id = %file_id, "{}", n.message),
            Severity::Error => error!(file_id = %file_id, "{}", n.message),
        }
    }
}

/// Publishes notifications on a broadcast channel.
///
/// Sending with no subscribers is not an error; the message is dropped.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: broadcast::Sender<Notification>,
}

impl ChannelNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl NotificationSink for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        let _ = self.tx.send(notification);
    }
}

/// Fans every notification out to several sinks, in order.
#[derive(Default, Clone)]
pub struct CompositeNotifier {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl CompositeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl NotificationSink for CompositeNotifier {
    fn notify(&self, notification: Notification) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.notify(notification.clone());
            }
            last.notify(notification);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::FileId;
    use crate::testing::RecordingNotifier;

    #[tokio::test]
    async fn test_channel_notifier_delivers_to_subscribers() {
        let notifier = ChannelNotifier::new(8);
        let mut rx = notifier.subscribe();

        let file_id = FileId::new();
        notifier.notify(Notification::new(Severity::Success, "done").for_file(file_id));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.message, "done");
        assert_eq!(received.file_id, Some(file_id));
    }

    #[test]
    fn test_channel_notifier_without_subscribers() {
        let notifier = ChannelNotifier::new(8);
        notifier.notify(Notification::new(Severity::Info, "nobody listening"));
        assert_eq!(notifier.receiver_count(), 0);
    }

    #[test]
    fn test_composite_fans_out() {
        let a = Arc::new(RecordingNotifier::new());
        let b = Arc::new(RecordingNotifier::new());
        let composite = CompositeNotifier::new()
            .with(Arc::new(TracingNotifier))
            .with(a.clone())
            .with(b.clone());

        composite.notify(Notification::new(Severity::Warning, "careful"));

        assert_eq!(a.messages(), vec!["careful".to_string()]);
        assert_eq!(b.messages(), vec!["careful".to_string()]);
    }

    #[test]
    fn test_severity_serialization() {
        let json = serde_json::to_string(&Severity::Success).unwrap();
        assert_eq!(json, "\"success\"");
    }
}
