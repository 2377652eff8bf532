use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::models::{RecoveryTier, VisibilityEvent, WatchdogConfig};
use crate::services::loading::LoadingRegistry;
use crate::services::visibility::VisibilityEvents;

/// Caller-supplied recovery actions. `force_reset` must flip all known
/// loading flags inactive and kick off a fresh data re-fetch; `reload` is
/// the last-resort full restart. `on_recovery` reports which tier fired.
pub struct RecoveryHooks {
    pub force_reset: Box<dyn Fn() + Send + Sync>,
    pub reload: Box<dyn Fn() + Send + Sync>,
    pub on_recovery: Option<Box<dyn Fn(RecoveryTier) + Send + Sync>>,
}

struct WatchdogShared {
    config: WatchdogConfig,
    registry: LoadingRegistry,
    hooks: RecoveryHooks,
    // At most one recovery per stuck episode; re-arms only once the
    // registry reports no active indicators.
    recovery_attempted: AtomicBool,
}

impl WatchdogShared {
    fn report(&self, tier: RecoveryTier) {
        if let Some(on_recovery) = &self.hooks.on_recovery {
            on_recovery(tier);
        }
    }
}

/// Safety net on top of the session store's own timeouts: watches for
/// loading indicators that never resolve after a hidden→visible transition
/// and forces recovery in order of increasing severity.
pub struct RecoveryWatchdog {
    shared: Arc<WatchdogShared>,
    handle: JoinHandle<()>,
}

impl RecoveryWatchdog {
    pub fn spawn(
        config: WatchdogConfig,
        registry: LoadingRegistry,
        events: &VisibilityEvents,
        hooks: RecoveryHooks,
    ) -> Self {
        let shared = Arc::new(WatchdogShared {
            config,
            registry,
            hooks,
            recovery_attempted: AtomicBool::new(false),
        });

        let rx = events.subscribe();
        let handle = tokio::spawn(run(shared.clone(), rx));

        Self { shared, handle }
    }

    /// Manual escape hatch. `force` fires even when this episode already
    /// attempted recovery, and escalates straight to reload when enabled.
    pub fn trigger_recovery(&self, force: bool) {
        if force || !self.shared.recovery_attempted.load(Ordering::SeqCst) {
            info!("Manual recovery triggered");
            self.shared.recovery_attempted.store(true, Ordering::SeqCst);
            self.shared.report(RecoveryTier::Manual);

            if force && self.shared.config.reload_as_last_resort {
                self.shared.report(RecoveryTier::PageReload);
                (self.shared.hooks.reload)();
            }
        }
    }
}

impl Drop for RecoveryWatchdog {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn run(shared: Arc<WatchdogShared>, mut rx: broadcast::Receiver<VisibilityEvent>) {
    let mut was_hidden = false;

    loop {
        match rx.recv().await {
            Ok(VisibilityEvent::Hidden) => {
                debug!("Tab hidden, arming stuck-state monitoring");
                was_hidden = true;
            }
            Ok(VisibilityEvent::Visible) | Ok(VisibilityEvent::FocusGained) if was_hidden => {
                was_hidden = false;
                shared.recovery_attempted.store(false, Ordering::SeqCst);
                monitor_episode(&shared).await;
            }
            Ok(_) => {}
            Err(RecvError::Lagged(missed)) => {
                warn!("Visibility events lagged, missed {}", missed);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Polls the registry for the duration of one episode window after the tab
/// became visible, escalating force-reset → reload when indicators stay
/// active past the configured ceilings.
async fn monitor_episode(shared: &WatchdogShared) {
    let config = &shared.config;
    let started = Instant::now();
    let mut force_reset_at: Option<Instant> = None;

    let mut ticker = tokio::time::interval(config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick resolves immediately.
    ticker.tick().await;

    debug!("Tab visible again, monitoring loading indicators");

    loop {
        ticker.tick().await;
        let elapsed = started.elapsed();

        if !shared.registry.any_active() {
            shared.recovery_attempted.store(false, Ordering::SeqCst);
            force_reset_at = None;
        } else if !shared.recovery_attempted.load(Ordering::SeqCst)
            && elapsed >= config.stuck_ceiling
        {
            let stuck = shared.registry.active_names();
            error!(
                "Stuck loading detected {}ms after tab became visible: {:?}",
                elapsed.as_millis(),
                stuck
            );
            shared.recovery_attempted.store(true, Ordering::SeqCst);
            force_reset_at = Some(Instant::now());
            shared.report(RecoveryTier::ForceReset);
            (shared.hooks.force_reset)();
        } else if let Some(reset_at) = force_reset_at {
            if config.reload_as_last_resort && reset_at.elapsed() >= config.reload_grace {
                error!("Loading still stuck after force-reset, falling back to full reload");
                shared.report(RecoveryTier::PageReload);
                (shared.hooks.reload)();
                return;
            }
        }

        if elapsed >= config.episode_window() {
            debug!("Stuck-state monitoring window elapsed");
            return;
        }
    }
}
