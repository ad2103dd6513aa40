use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use crate::error::ApiError;
use crate::fixed_window::{Admission, FixedWindow};

/// Per-client fixed-window rate limiter.
///
/// Each client owns its own window behind a mutex, so the check-and-increment
/// for one client is serialized while different clients proceed in parallel.
/// Fixed windows allow a burst of up to twice the limit across a boundary.
#[derive(Clone)]
pub struct RateLimiter {
    permit_limit: u32,
    window: Duration,
    windows: Arc<RwLock<HashMap<String, Mutex<FixedWindow>>>>,
}

impl RateLimiter {
    pub fn new(permit_limit: u32, window: Duration) -> Self {
        RateLimiter {
            permit_limit,
            window,
            windows: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn permit_limit(&self) -> u32 {
        self.permit_limit
    }

    /// Decide whether `client_id` may make a request at `now`.
    pub fn try_admit(&self, client_id: &str, now: Instant) -> Result<Admission, ApiError> {
        {
            let windows = self.windows.read()
                .map_err(|_| ApiError::Internal("Failed to acquire read lock on windows".to_string()))?;
            if let Some(window) = windows.get(client_id) {
                let mut window = window.lock()
                    .map_err(|_| ApiError::Internal("Failed to lock client window".to_string()))?;
                return Ok(window.try_admit(now, self.permit_limit, self.window));
            }
        }

        let mut windows = self.windows.write()
            .map_err(|_| ApiError::Internal("Failed to acquire write lock on windows".to_string()))?;
        let window = windows
            .entry(client_id.to_string())
            .or_insert_with(|| Mutex::new(FixedWindow::new(now)))
            .get_mut()
            .map_err(|_| ApiError::Internal("Failed to lock client window".to_string()))?;

        Ok(window.try_admit(now, self.permit_limit, self.window))
    }

    /// Drop windows that closed before `now`; returns how many were removed.
    pub fn cleanup_expired(&self, now: Instant) -> Result<usize, ApiError> {
        let mut windows = self.windows.write()
            .map_err(|_| ApiError::Internal("Failed to acquire write lock on windows".to_string()))?;

        let initial_count = windows.len();
        windows.retain(|_, window| match window.get_mut() {
            Ok(window) => !window.is_expired(now, self.window),
            Err(_) => false,
        });

        Ok(initial_count - windows.len())
    }

    pub fn tracked_clients(&self) -> usize {
        self.windows.read().map(|windows| windows.len()).unwrap_or(0)
    }
}
