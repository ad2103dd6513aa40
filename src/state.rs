use std::sync::Arc;

use crate::auth::AuthValidator;
use crate::call_tracker::CallTracker;
use crate::config::Config;
use crate::rate_limiter::RateLimiter;
use crate::store::UserStore;

/// Shared application state
pub type SharedState = Arc<AppState>;

/// Process-wide state shared by every request. Nothing here survives a restart.
pub struct AppState {
    pub store: UserStore,
    pub tracker: CallTracker,
    pub auth: AuthValidator,
    pub rate_limiter: RateLimiter,
    pub settings: PipelineSettings,
}

/// Knobs read by the middleware stages.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub bypass_prefix: String,
    pub trust_proxy_headers: bool,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn from_config(config: &Config) -> Self {
        Self {
            store: UserStore::new(),
            tracker: CallTracker::new(),
            auth: AuthValidator::from_csv(&config.api_keys),
            rate_limiter: RateLimiter::new(config.rate_limit_permits, config.rate_limit_window()),
            settings: PipelineSettings {
                bypass_prefix: config.bypass_prefix.clone(),
                trust_proxy_headers: config.trust_proxy_headers,
                max_body_bytes: config.max_body_bytes,
            },
        }
    }

    pub fn shared(config: &Config) -> SharedState {
        Arc::new(Self::from_config(config))
    }
}
