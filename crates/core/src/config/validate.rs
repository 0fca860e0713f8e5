use std::collections::HashSet;

use super::{types::Config, AuthMethod, ConfigError};

/// Validate configuration
///
/// Checks the cross-field rules serde cannot express:
/// - server port is not 0
/// - api_key auth has at least one key
/// - admission routes reference defined zones, no duplicate zone names
/// - pricing watermarks and multiplier are sane
/// - a backend is configured when the orchestrator is enabled
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.auth.method == AuthMethod::ApiKey && config.auth.api_keys.is_empty() {
        return Err(ConfigError::ValidationError(
            "auth.api_keys must not be empty when auth.method is api_key".to_string(),
        ));
    }

    let mut zone_names = HashSet::new();
    for zone in &config.admission.zones {
        if zone.rate_per_minute <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "admission zone '{}': rate_per_minute must be positive",
                zone.name
            )));
        }
        if zone.burst == 0 {
            return Err(ConfigError::ValidationError(format!(
                "admission zone '{}': burst must be at least 1",
                zone.name
            )));
        }
        if !zone_names.insert(zone.name.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate admission zone name '{}'",
                zone.name
            )));
        }
    }

    for route in &config.admission.routes {
        if !route.path.starts_with('/') {
            return Err(ConfigError::ValidationError(format!(
                "admission route '{}' must start with '/'",
                route.path
            )));
        }
        if !zone_names.contains(route.zone.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "admission route '{}' references unknown zone '{}'",
                route.path, route.zone
            )));
        }
    }

    if config.pricing.surge_multiplier < 1.0 {
        return Err(ConfigError::ValidationError(
            "pricing.surge_multiplier must be >= 1.0".to_string(),
        ));
    }
    if config.pricing.activation_samples == 0 {
        return Err(ConfigError::ValidationError(
            "pricing.activation_samples must be at least 1".to_string(),
        ));
    }

    if config.orchestrator.enabled && config.backend.is_none() {
        return Err(ConfigError::ValidationError(
            "a [backend] section is required when the orchestrator is enabled".to_string(),
        ));
    }

    Ok(())
}
