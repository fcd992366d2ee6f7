use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};

use crate::converter::ConverterKind;
use crate::poller::RetryPolicy;
use crate::validator::ValidationRules;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub service: ServiceConfig,
    #[serde(default)]
    pub converters: ConvertersConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// Remote conversion service
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Service root, e.g. "https://convert.example.com"
    pub base_url: String,
    /// Base for relative artifact references (defaults to `base_url`)
    #[serde(default)]
    pub download_base_url: Option<String>,
    /// Sent as a bearer token when set
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Per-request timeout in seconds (default: 60)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl ServiceConfig {
    /// Base URL that relative artifact references are resolved against.
    pub fn artifact_base_url(&self) -> &str {
        self.download_base_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or(&self.base_url)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9000".to_string(),
            download_base_url: None,
            api_key: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    60
}

/// Per-kind overrides. Unset fields fall back to the kind's defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConverterOverrides {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_extensions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_consecutive_transport_failures: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_delay_ms: Option<u64>,
}

impl Default for ConverterOverrides {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            allowed_extensions: None,
            max_size_bytes: None,
            poll_interval_ms: None,
            max_attempts: None,
            max_consecutive_transport_failures: None,
            initial_delay_ms: None,
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// Converter kinds
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConvertersConfig {
    #[serde(default)]
    pub video: ConverterOverrides,
    #[serde(default)]
    pub audio: ConverterOverrides,
    #[serde(default)]
    pub document: ConverterOverrides,
    #[serde(default)]
    pub pdf_protect: ConverterOverrides,
}

impl ConvertersConfig {
    pub fn get(&self, kind: ConverterKind) -> &ConverterOverrides {
        match kind {
            ConverterKind::Video => &self.video,
            ConverterKind::Audio => &self.audio,
            ConverterKind::Document => &self.document,
            ConverterKind::PdfProtect => &self.pdf_protect,
        }
    }

    pub fn is_enabled(&self, kind: ConverterKind) -> bool {
        self.get(kind).enabled
    }

    pub fn enabled_kinds(&self) -> Vec<ConverterKind> {
        ConverterKind::ALL
            .into_iter()
            .filter(|kind| self.is_enabled(*kind))
            .collect()
    }

    /// Effective validation rules for `kind`.
    pub fn rules(&self, kind: ConverterKind) -> ValidationRules {
        let overrides = self.get(kind);
        let defaults = kind.default_rules();
        let max_size_bytes = overrides.max_size_bytes.unwrap_or(defaults.max_size_bytes);

        match &overrides.allowed_extensions {
            Some(extensions) => ValidationRules::new(extensions.iter(), max_size_bytes),
            None => ValidationRules {
                max_size_bytes,
                ..defaults
            },
        }
    }

    /// Effective retry policy for `kind`.
    pub fn policy(&self, kind: ConverterKind) -> RetryPolicy {
        let overrides = self.get(kind);
        let defaults = kind.default_policy();

        RetryPolicy {
            max_attempts: overrides.max_attempts.unwrap_or(defaults.max_attempts),
            max_consecutive_transport_failures: overrides
                .max_consecutive_transport_failures
                .unwrap_or(defaults.max_consecutive_transport_failures),
            poll_interval_ms: overrides
                .poll_interval_ms
                .unwrap_or(defaults.poll_interval_ms),
            initial_delay_ms: overrides
                .initial_delay_ms
                .unwrap_or(defaults.initial_delay_ms),
        }
    }
}

/// Notification and event channels
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_channel_capacity() -> usize {
    256
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub service: SanitizedServiceConfig,
    pub converters: ConvertersConfig,
    pub notifications: NotificationsConfig,
}

/// Sanitized service config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedServiceConfig {
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_base_url: Option<String>,
    pub api_key_configured: bool,
    pub request_timeout_secs: u64,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            service: SanitizedServiceConfig {
                base_url: config.service.base_url.clone(),
                download_base_url: config.service.download_base_url.clone(),
                api_key_configured: config
                    .service
                    .api_key
                    .as_deref()
                    .is_some_and(|k| !k.is_empty()),
                request_timeout_secs: config.service.request_timeout_secs,
            },
            converters: config.converters.clone(),
            notifications: config.notifications.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal_config() {
        let toml = r#"
[service]
base_url = "https://convert.example.com"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.service.request_timeout_secs, 60);
        assert_eq!(config.notifications.channel_capacity, 256);
        assert_eq!(config.converters.enabled_kinds(), ConverterKind::ALL.to_vec());
    }

    #[test]
    fn test_deserialize_missing_service_fails() {
        let toml = r#"
[server]
port = 8080
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_disabled_converter() {
        let toml = r#"
[service]
base_url = "https://convert.example.com"

[converters.video]
enabled = false
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(!config.converters.is_enabled(ConverterKind::Video));
        assert_eq!(config.converters.enabled_kinds().len(), 3);
    }

    #[test]
    fn test_effective_rules_and_policy() {
        let toml = r#"
[service]
base_url = "https://convert.example.com"

[converters.document]
max_size_bytes = 1024
poll_interval_ms = 250
"#;
        let config: Config = toml::from_str(toml).unwrap();

        let rules = config.converters.rules(ConverterKind::Document);
        assert_eq!(rules.max_size_bytes, 1024);
        assert!(rules.allows_extension("docx"));

        let policy = config.converters.policy(ConverterKind::Document);
        assert_eq!(policy.poll_interval_ms, 250);
        assert_eq!(policy.max_attempts, 120);

        let untouched = config.converters.policy(ConverterKind::Video);
        assert_eq!(untouched, ConverterKind::Video.default_policy());
    }

    #[test]
    fn test_artifact_base_url_fallback() {
        let mut service = ServiceConfig {
            base_url: "https://convert.example.com".to_string(),
            ..Default::default()
        };
        assert_eq!(service.artifact_base_url(), "https://convert.example.com");

        service.download_base_url = Some("https://cdn.example.com".to_string());
        assert_eq!(service.artifact_base_url(), "https://cdn.example.com");
    }

    #[test]
    fn test_sanitized_config_hides_api_key() {
        let toml = r#"
[service]
base_url = "https://convert.example.com"
api_key = "secret-key"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let sanitized = SanitizedConfig::from(&config);
        assert!(sanitized.service.api_key_configured);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("secret-key"));
    }
}
