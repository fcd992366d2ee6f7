//! HTTP surface for the transmute conversion orchestrator.

pub mod api;
pub mod metrics;
pub mod state;

use std::sync::Arc;

use tracing::info;
use transmute_core::{
    ChannelNotifier, CompositeNotifier, Config, ConfigError, ConversionService, TracingNotifier,
};

use api::WsBroadcaster;
use state::AppState;

/// Wire orchestrators, notification sinks and the WebSocket relay together.
///
/// Must be called inside a tokio runtime: relay tasks are spawned here and
/// live as long as their source channels.
pub fn build_state(
    config: Config,
    service: Arc<dyn ConversionService>,
) -> Result<Arc<AppState>, ConfigError> {
    let capacity = config.notifications.channel_capacity;
    let ws_broadcaster = WsBroadcaster::new(capacity);

    let channel = ChannelNotifier::new(capacity);
    ws_broadcaster.forward_notifications(channel.subscribe());
    let notifier = CompositeNotifier::new()
        .with(Arc::new(TracingNotifier))
        .with(Arc::new(channel));

    let state = AppState::new(config, service, Arc::new(notifier), ws_broadcaster)?;
    for orchestrator in state.orchestrators() {
        state
            .ws_broadcaster()
            .forward_queue_events(orchestrator.subscribe());
        info!(kind = %orchestrator.kind(), "Converter enabled");
    }

    Ok(Arc::new(state))
}
