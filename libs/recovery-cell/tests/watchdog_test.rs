use std::sync::{Arc, Mutex};
use std::time::Duration;

use recovery_cell::{
    LoadingRegistry, RecoveryHooks, RecoveryTier, RecoveryWatchdog, VisibilityEvent,
    VisibilityEvents, WatchdogConfig,
};

fn test_config() -> WatchdogConfig {
    WatchdogConfig {
        stuck_ceiling: Duration::from_secs(10),
        poll_interval: Duration::from_secs(2),
        reload_grace: Duration::from_secs(5),
        reload_as_last_resort: true,
    }
}

struct Recorder {
    tiers: Arc<Mutex<Vec<RecoveryTier>>>,
}

impl Recorder {
    fn new() -> Self {
        Self {
            tiers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn hooks(&self, registry: &LoadingRegistry, reset_clears_flags: bool) -> RecoveryHooks {
        let tiers = self.tiers.clone();
        let reset_registry = registry.clone();
        RecoveryHooks {
            force_reset: Box::new(move || {
                if reset_clears_flags {
                    reset_registry.force_reset_all();
                }
            }),
            reload: Box::new(|| {}),
            on_recovery: Some(Box::new(move |tier| {
                tiers.lock().unwrap().push(tier);
            })),
        }
    }

    fn fired(&self) -> Vec<RecoveryTier> {
        self.tiers.lock().unwrap().clone()
    }
}

async fn settle() {
    // Lets the watchdog task observe events and tick under the paused clock.
    tokio::time::sleep(Duration::from_millis(10)).await;
}

#[tokio::test(start_paused = true)]
async fn stuck_loading_fires_force_reset() {
    let registry = LoadingRegistry::new();
    let events = VisibilityEvents::new();
    let recorder = Recorder::new();

    let flag = registry.register("calls");
    flag.set();

    let _watchdog = RecoveryWatchdog::spawn(
        test_config(),
        registry.clone(),
        &events,
        recorder.hooks(&registry, true),
    );
    settle().await;

    events.emit(VisibilityEvent::Hidden);
    settle().await;
    events.emit(VisibilityEvent::Visible);
    settle().await;

    tokio::time::sleep(Duration::from_secs(13)).await;

    assert_eq!(recorder.fired(), vec![RecoveryTier::ForceReset]);
    assert!(!registry.any_active());
}

#[tokio::test(start_paused = true)]
async fn persistent_stuck_state_escalates_to_reload() {
    let registry = LoadingRegistry::new();
    let events = VisibilityEvents::new();
    let recorder = Recorder::new();

    let flag = registry.register("session");
    flag.set();

    // Force-reset that does not manage to clear the indicators.
    let _watchdog = RecoveryWatchdog::spawn(
        test_config(),
        registry.clone(),
        &events,
        recorder.hooks(&registry, false),
    );
    settle().await;

    events.emit(VisibilityEvent::Hidden);
    settle().await;
    events.emit(VisibilityEvent::Visible);
    settle().await;

    tokio::time::sleep(Duration::from_secs(20)).await;

    assert_eq!(
        recorder.fired(),
        vec![RecoveryTier::ForceReset, RecoveryTier::PageReload]
    );
}

#[tokio::test(start_paused = true)]
async fn loading_that_resolves_in_time_needs_no_recovery() {
    let registry = LoadingRegistry::new();
    let events = VisibilityEvents::new();
    let recorder = Recorder::new();

    let flag = registry.register("patients");
    flag.set();

    let _watchdog = RecoveryWatchdog::spawn(
        test_config(),
        registry.clone(),
        &events,
        recorder.hooks(&registry, true),
    );
    settle().await;

    events.emit(VisibilityEvent::Hidden);
    settle().await;
    events.emit(VisibilityEvent::Visible);
    settle().await;

    // Fetch completes well inside the ceiling.
    tokio::time::sleep(Duration::from_secs(4)).await;
    flag.clear();

    tokio::time::sleep(Duration::from_secs(20)).await;

    assert!(recorder.fired().is_empty());
}

#[tokio::test(start_paused = true)]
async fn recovery_fires_at_most_once_per_episode() {
    let registry = LoadingRegistry::new();
    let events = VisibilityEvents::new();
    let recorder = Recorder::new();

    let flag = registry.register("alerts");
    flag.set();

    let config = WatchdogConfig {
        reload_as_last_resort: false,
        ..test_config()
    };

    // Reset hook leaves the flag active, simulating a re-fetch that sticks
    // again instantly.
    let _watchdog = RecoveryWatchdog::spawn(
        config,
        registry.clone(),
        &events,
        recorder.hooks(&registry, false),
    );
    settle().await;

    events.emit(VisibilityEvent::Hidden);
    settle().await;
    events.emit(VisibilityEvent::Visible);
    settle().await;

    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(recorder.fired(), vec![RecoveryTier::ForceReset]);
}

#[tokio::test(start_paused = true)]
async fn visible_without_prior_hidden_does_not_monitor() {
    let registry = LoadingRegistry::new();
    let events = VisibilityEvents::new();
    let recorder = Recorder::new();

    let flag = registry.register("calls");
    flag.set();

    let _watchdog = RecoveryWatchdog::spawn(
        test_config(),
        registry.clone(),
        &events,
        recorder.hooks(&registry, true),
    );
    settle().await;

    events.emit(VisibilityEvent::Visible);
    settle().await;

    tokio::time::sleep(Duration::from_secs(20)).await;

    assert!(recorder.fired().is_empty());
}

#[tokio::test(start_paused = true)]
async fn manual_force_trigger_escalates_to_reload() {
    let registry = LoadingRegistry::new();
    let events = VisibilityEvents::new();
    let recorder = Recorder::new();

    let watchdog = RecoveryWatchdog::spawn(
        test_config(),
        registry.clone(),
        &events,
        recorder.hooks(&registry, true),
    );
    settle().await;

    watchdog.trigger_recovery(true);

    assert_eq!(
        recorder.fired(),
        vec![RecoveryTier::Manual, RecoveryTier::PageReload]
    );
}
