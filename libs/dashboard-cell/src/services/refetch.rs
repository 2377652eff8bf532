use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

/// Default minimum spacing between re-fetches of one view.
pub const REFETCH_INTERVAL: Duration = Duration::from_secs(30);

/// Per-view re-fetch throttle: visibility/focus signals arrive for every
/// view at once, and each view refuses to hit the backend more than once
/// per interval.
pub struct RefetchGuard {
    min_interval: Duration,
    last_fetch: Mutex<Option<Instant>>,
}

impl RefetchGuard {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_fetch: Mutex::new(None),
        }
    }

    /// Claims a fetch slot. Returns false (and leaves the slot untouched)
    /// when the previous fetch was less than the interval ago.
    pub fn try_begin(&self) -> bool {
        let mut last_fetch = self.last_fetch.lock().unwrap();
        if let Some(last) = *last_fetch {
            if last.elapsed() < self.min_interval {
                return false;
            }
        }
        *last_fetch = Some(Instant::now());
        true
    }

    /// Lets the next `try_begin` pass regardless of timing (used by forced
    /// recovery re-fetches).
    pub fn reset(&self) {
        *self.last_fetch.lock().unwrap() = None;
    }
}

impl Default for RefetchGuard {
    fn default() -> Self {
        Self::new(REFETCH_INTERVAL)
    }
}
