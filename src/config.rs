use envconfig::Envconfig;
use std::net::SocketAddr;
use std::time::Duration;

use crate::config_validator::ConfigValidator;
use crate::error::ConfigError;

#[derive(Debug, Envconfig, Clone)]
pub struct Config {
    /// Server bind address
    #[envconfig(from = "BIND_ADDR", default = "127.0.0.1:3000")]
    pub bind_addr: SocketAddr,

    /// Comma separated list of accepted `X-Api-Key` values
    #[envconfig(from = "API_KEYS", default = "dev-api-key")]
    pub api_keys: String,

    /// Requests admitted per client in one window
    #[envconfig(from = "RATE_LIMIT_PERMITS", default = "100")]
    pub rate_limit_permits: u32,

    /// Rate limit window length in seconds
    #[envconfig(from = "RATE_LIMIT_WINDOW_SECS", default = "60")]
    pub rate_limit_window_secs: u64,

    /// Interval in seconds between sweeps of idle rate limit windows
    #[envconfig(from = "CLEANUP_INTERVAL", default = "300")]
    pub cleanup_interval_secs: u64,

    /// Path prefix served without authentication (documentation tooling)
    #[envconfig(from = "BYPASS_PREFIX", default = "/swagger")]
    pub bypass_prefix: String,

    /// Take the client address from X-Forwarded-For / X-Real-IP
    #[envconfig(from = "TRUST_PROXY_HEADERS", default = "false")]
    pub trust_proxy_headers: bool,

    /// Largest request body the logging stage will buffer
    #[envconfig(from = "MAX_BODY_BYTES", default = "1048576")]
    pub max_body_bytes: usize,

    #[envconfig(from = "LOG_LEVEL", default = "info")]
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables and validate it.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Config::init_from_env()?;
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            api_keys: "dev-api-key".to_string(),
            rate_limit_permits: 100,
            rate_limit_window_secs: 60,
            cleanup_interval_secs: 300,
            bypass_prefix: "/swagger".to_string(),
            trust_proxy_headers: false,
            max_body_bytes: 1024 * 1024,
            log_level: "info".to_string(),
        }
    }
}
