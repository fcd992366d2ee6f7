use reqwest::Url;

use crate::converter::ConverterKind;

use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Service URLs are absolute http(s) URLs
/// - Every effective rule set and retry policy is usable
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    check_http_url("service.base_url", &config.service.base_url)?;
    if let Some(url) = &config.service.download_base_url {
        check_http_url("service.download_base_url", url)?;
    }

    if config.service.request_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "service.request_timeout_secs cannot be 0".to_string(),
        ));
    }

    for kind in ConverterKind::ALL {
        let rules = config.converters.rules(kind);
        if rules.allowed_extensions.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "converters.{}.allowed_extensions cannot be empty",
                kind
            )));
        }
        if rules.max_size_bytes == 0 {
            return Err(ConfigError::ValidationError(format!(
                "converters.{}.max_size_bytes cannot be 0",
                kind
            )));
        }

        let policy = config.converters.policy(kind);
        let zero_field = if policy.max_attempts == 0 {
            Some("max_attempts")
        } else if policy.max_consecutive_transport_failures == 0 {
            Some("max_consecutive_transport_failures")
        } else if policy.poll_interval_ms == 0 {
            Some("poll_interval_ms")
        } else {
            None
        };
        if let Some(field) = zero_field {
            return Err(ConfigError::ValidationError(format!(
                "converters.{}.{} cannot be 0",
                kind, field
            )));
        }
    }

    if config.notifications.channel_capacity == 0 {
        return Err(ConfigError::ValidationError(
            "notifications.channel_capacity cannot be 0".to_string(),
        ));
    }

    Ok(())
}

fn check_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::ValidationError(format!("{} is not a valid URL: {}", field, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::ValidationError(format!(
            "{} must use http or https, got {}",
            field,
            url.scheme()
        )));
    }
    Ok(())
}
