//! Orchestrator configuration.

use reqwest::Url;

use crate::config::{Config, ConfigError};
use crate::converter::ConverterKind;
use crate::poller::RetryPolicy;
use crate::validator::ValidationRules;

const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Effective settings for one converter kind's orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub kind: ConverterKind,
    /// Rules applied to dropped files.
    pub rules: ValidationRules,
    /// Poll schedule and budgets.
    pub policy: RetryPolicy,
    /// Base for relative artifact references.
    pub download_base_url: Url,
    /// Buffer size of the queue event channel.
    pub event_capacity: usize,
}

impl OrchestratorConfig {
    /// Kind defaults, with artifacts resolved against `download_base_url`.
    pub fn for_kind(kind: ConverterKind, download_base_url: Url) -> Self {
        Self {
            kind,
            rules: kind.default_rules(),
            policy: kind.default_policy(),
            download_base_url,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    /// Settings for `kind` with per-kind overrides from the application config.
    pub fn from_config(config: &Config, kind: ConverterKind) -> Result<Self, ConfigError> {
        let base = config.service.artifact_base_url();
        let download_base_url = Url::parse(base).map_err(|e| {
            ConfigError::ValidationError(format!("invalid download base URL {}: {}", base, e))
        })?;

        Ok(Self {
            kind,
            rules: config.converters.rules(kind),
            policy: config.converters.policy(kind),
            download_base_url,
            event_capacity: config.notifications.channel_capacity,
        })
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_rules(mut self, rules: ValidationRules) -> Self {
        self.rules = rules;
        self
    }
}
