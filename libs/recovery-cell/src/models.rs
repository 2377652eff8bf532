use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Host-shell signals the recovery machinery and the session coordinator
/// both subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VisibilityEvent {
    Visible,
    Hidden,
    FocusGained,
    FocusLost,
    Online,
    Offline,
}

/// Which recovery path fired, in order of increasing severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecoveryTier {
    ForceReset,
    PageReload,
    Manual,
}

#[derive(Debug, Clone)]
pub struct WatchdogConfig {
    /// How long loading indicators may stay active after the tab becomes
    /// visible before recovery kicks in.
    pub stuck_ceiling: Duration,
    /// Registry polling cadence while an episode is being monitored.
    pub poll_interval: Duration,
    /// Extra window after a force-reset before the reload tier fires.
    pub reload_grace: Duration,
    pub reload_as_last_resort: bool,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            stuck_ceiling: Duration::from_secs(10),
            poll_interval: Duration::from_secs(2),
            reload_grace: Duration::from_secs(5),
            reload_as_last_resort: true,
        }
    }
}

impl WatchdogConfig {
    /// Monitoring stops this long after the tab became visible.
    pub fn episode_window(&self) -> Duration {
        self.stuck_ceiling + self.reload_grace + Duration::from_secs(5)
    }
}
