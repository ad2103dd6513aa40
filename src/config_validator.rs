use crate::auth::AuthValidator;
use crate::config::Config;
use crate::error::ConfigError;

const USER_ROUTES_PREFIX: &str = "/api/user";

/// Validates configuration objects for consistency and correctness
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        Self::validate_api_keys(&config.api_keys)?;
        Self::validate_rate_limit(config.rate_limit_permits, config.rate_limit_window_secs)?;
        Self::validate_bypass_prefix(&config.bypass_prefix)?;

        if config.cleanup_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "Cleanup interval must be greater than 0".to_string(),
            ));
        }

        if config.max_body_bytes == 0 {
            return Err(ConfigError::Validation(
                "Maximum body size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// At least one non-blank key must remain after parsing.
    pub fn validate_api_keys(keys: &str) -> Result<(), ConfigError> {
        if AuthValidator::from_csv(keys).is_empty() {
            return Err(ConfigError::Validation(
                "API_KEYS must contain at least one non-empty key".to_string(),
            ));
        }

        Ok(())
    }

    /// Validates rate limit parameters
    pub fn validate_rate_limit(permits: u32, window_secs: u64) -> Result<(), ConfigError> {
        if permits == 0 {
            return Err(ConfigError::Validation(
                "Rate limit permits must be greater than 0".to_string(),
            ));
        }

        if window_secs == 0 {
            return Err(ConfigError::Validation(
                "Rate limit window must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn validate_bypass_prefix(prefix: &str) -> Result<(), ConfigError> {
        if !prefix.starts_with('/') || prefix.len() < 2 {
            return Err(ConfigError::Validation(format!(
                "Bypass prefix '{}' must start with '/' and name a path",
                prefix
            )));
        }

        // Served as a literal route, so no capture or wildcard syntax.
        if prefix.contains([':', '*', '{', '}']) {
            return Err(ConfigError::Validation(format!(
                "Bypass prefix '{}' must not contain ':', '*', '{{' or '}}'",
                prefix
            )));
        }

        let lowered = prefix.to_ascii_lowercase();
        if lowered.starts_with(USER_ROUTES_PREFIX) || USER_ROUTES_PREFIX.starts_with(&lowered) {
            return Err(ConfigError::Validation(format!(
                "Bypass prefix '{}' overlaps the protected {} routes",
                prefix, USER_ROUTES_PREFIX
            )));
        }

        Ok(())
    }
}
