use std::collections::BTreeMap;
use std::sync::Arc;

use transmute_core::{
    Config, ConfigError, ConversionOrchestrator, ConversionService, ConverterKind,
    NotificationSink, OrchestratorConfig, SanitizedConfig,
};

use crate::api::WsBroadcaster;

/// Extra room on top of the largest file limit for multipart framing.
const UPLOAD_HEADROOM_BYTES: usize = 1024 * 1024;

/// Orchestrator type shared by every handler.
pub type Orchestrator = ConversionOrchestrator<dyn ConversionService>;

/// Shared application state
pub struct AppState {
    config: Config,
    orchestrators: BTreeMap<ConverterKind, Arc<Orchestrator>>,
    ws_broadcaster: WsBroadcaster,
}

impl AppState {
    /// Build one orchestrator per enabled converter kind.
    pub fn new(
        config: Config,
        service: Arc<dyn ConversionService>,
        notifier: Arc<dyn NotificationSink>,
        ws_broadcaster: WsBroadcaster,
    ) -> Result<Self, ConfigError> {
        let mut orchestrators = BTreeMap::new();
        for kind in config.converters.enabled_kinds() {
            let orchestrator_config = OrchestratorConfig::from_config(&config, kind)?;
            let orchestrator = ConversionOrchestrator::new(
                orchestrator_config,
                Arc::clone(&service),
                Arc::clone(&notifier),
            );
            orchestrators.insert(kind, Arc::new(orchestrator));
        }

        Ok(Self {
            config,
            orchestrators,
            ws_broadcaster,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    /// The orchestrator for `kind`, if that kind is enabled.
    pub fn orchestrator(&self, kind: ConverterKind) -> Option<&Arc<Orchestrator>> {
        self.orchestrators.get(&kind)
    }

    pub fn orchestrators(&self) -> impl Iterator<Item = &Arc<Orchestrator>> {
        self.orchestrators.values()
    }

    pub fn ws_broadcaster(&self) -> &WsBroadcaster {
        &self.ws_broadcaster
    }

    /// Request body limit for uploads: the largest enabled file limit plus headroom.
    pub fn upload_limit_bytes(&self) -> usize {
        let largest = self
            .orchestrators
            .values()
            .map(|o| o.rules().max_size_bytes)
            .max()
            .unwrap_or(0);

        usize::try_from(largest)
            .unwrap_or(usize::MAX)
            .saturating_add(UPLOAD_HEADROOM_BYTES)
    }
}
