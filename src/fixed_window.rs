use std::time::{Duration, Instant};

/// Admission decision for a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted { remaining: u32 },
    Rejected { retry_after: Duration },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted { .. })
    }
}

/// Counter for one client over a fixed-length window.
///
/// A window that has been open for at least `window` is replaced by a new one
/// starting at the observed time; the boundary instant belongs to the new
/// window. Instants earlier than `window_start` are treated as `window_start`.
#[derive(Debug, Clone)]
pub struct FixedWindow {
    window_start: Instant,
    count: u32,
}

impl FixedWindow {
    pub fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            count: 0,
        }
    }

    pub fn try_admit(&mut self, now: Instant, permit_limit: u32, window: Duration) -> Admission {
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed >= window {
            self.window_start = now;
            self.count = 0;
        }

        if self.count < permit_limit {
            self.count += 1;
            Admission::Admitted {
                remaining: permit_limit - self.count,
            }
        } else {
            Admission::Rejected {
                retry_after: self.time_until_reset(now, window),
            }
        }
    }

    pub fn time_until_reset(&self, now: Instant, window: Duration) -> Duration {
        window.saturating_sub(now.saturating_duration_since(self.window_start))
    }

    /// True once the window has closed with nothing admitted since.
    pub fn is_expired(&self, now: Instant, window: Duration) -> bool {
        now.saturating_duration_since(self.window_start) >= window
    }
}
