use std::sync::Arc;
use std::time::Duration;

use recovery_cell::{LoadingRegistry, VisibilityEvent, VisibilityEvents};
use session_cell::{
    RoleResolver, SessionPhase, SessionStore, SessionStoreConfig, ValidationTrigger,
};
use shared_config::{AppConfig, DEFAULT_PROBE_URL};
use shared_models::auth::AuthChangeEvent;
use shared_utils::test_utils::{StubAuthBackend, TestConfig, TestUser};

// Connection-refused endpoint; forces the resolver down its fallback chain
// without waiting on timers.
const UNREACHABLE_ROLE_FUNCTION: &str = "http://127.0.0.1:1/fetch-role";

struct Harness {
    store: SessionStore,
    backend: Arc<StubAuthBackend>,
    registry: LoadingRegistry,
    events: VisibilityEvents,
}

fn build_store(backend: Arc<StubAuthBackend>, config: SessionStoreConfig) -> Harness {
    let app_config = TestConfig::default().to_app_config();
    let registry = LoadingRegistry::new();
    let events = VisibilityEvents::new();
    let resolver = Arc::new(RoleResolver::with_function_url(
        UNREACHABLE_ROLE_FUNCTION.to_string(),
        backend.clone(),
    ));
    let store = SessionStore::new(
        &app_config,
        config,
        backend.clone(),
        resolver,
        &registry,
        &events,
    );
    Harness {
        store,
        backend,
        registry,
        events,
    }
}

fn manual_config() -> SessionStoreConfig {
    SessionStoreConfig {
        validate_on_start: false,
        ..Default::default()
    }
}

async fn wait_for_authenticated(store: &SessionStore) {
    let mut rx = store.subscribe();
    while !rx.borrow().is_authenticated() {
        rx.changed().await.unwrap();
    }
}

async fn wait_for_phase(store: &SessionStore, phase: SessionPhase) {
    let mut rx = store.subscribe();
    while rx.borrow().phase != phase {
        rx.changed().await.unwrap();
    }
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

#[tokio::test(start_paused = true)]
async fn mount_validation_resolves_authenticated() {
    let user = TestUser::doctor("dr.smith@clinic.com");
    let backend = Arc::new(StubAuthBackend::with_session(user.to_session()));
    backend.set_current_user(Some(user.to_session_user()));

    let harness = build_store(backend, SessionStoreConfig::default());

    wait_for_authenticated(&harness.store).await;

    let identity = harness.store.current_identity().unwrap();
    assert_eq!(identity.email, "dr.smith@clinic.com");
    assert_eq!(identity.role, "doctor");
    assert!(!harness.store.is_loading());
    assert!(!harness.registry.any_active());
}

#[tokio::test(start_paused = true)]
async fn failed_session_fetch_resolves_unauthenticated_after_retry() {
    let backend = Arc::new(StubAuthBackend::new());
    backend.fail_session_fetches();

    let harness = build_store(backend, manual_config());

    let identity = harness.store.revalidate(ValidationTrigger::Manual).await;

    assert_eq!(identity, None);
    assert_eq!(harness.store.snapshot().phase, SessionPhase::Unauthenticated);
    assert!(!harness.store.is_loading());
    // One original attempt plus the single bounded retry.
    assert_eq!(harness.backend.session_fetches(), 2);
}

#[tokio::test(start_paused = true)]
async fn hung_session_fetch_times_out_without_panicking() {
    let backend = Arc::new(StubAuthBackend::new());
    backend.hang_session_fetches();

    let harness = build_store(backend, manual_config());

    let identity = harness.store.revalidate(ValidationTrigger::Manual).await;

    assert_eq!(identity, None);
    assert_eq!(harness.store.snapshot().phase, SessionPhase::Unauthenticated);
    assert!(!harness.store.is_loading());
    assert_eq!(harness.backend.session_fetches(), 2);
}

#[tokio::test(start_paused = true)]
async fn overlapping_triggers_share_one_validation_attempt() {
    let user = TestUser::staff("reception@clinic.com");
    let backend = Arc::new(StubAuthBackend::with_session(user.to_session()));
    backend.set_session_delay(Duration::from_secs(1));

    let harness = build_store(backend, manual_config());
    let store = Arc::new(harness.store);

    let first = tokio::spawn({
        let store = store.clone();
        async move { store.revalidate(ValidationTrigger::Manual).await }
    });
    let second = tokio::spawn({
        let store = store.clone();
        async move { store.revalidate(ValidationTrigger::Manual).await }
    });

    let first = first.await.unwrap();
    let second = second.await.unwrap();

    assert!(first.is_some());
    assert_eq!(first, second);
    assert_eq!(harness.backend.session_fetches(), 1);
}

#[tokio::test(start_paused = true)]
async fn completed_cycles_debounce_generic_triggers() {
    let user = TestUser::staff("reception@clinic.com");
    let backend = Arc::new(StubAuthBackend::with_session(user.to_session()));

    let harness = build_store(backend, manual_config());

    harness.store.revalidate(ValidationTrigger::Mount).await;
    assert_eq!(harness.backend.session_fetches(), 1);

    // Inside the generic cooldown: rejected outright.
    harness.store.revalidate(ValidationTrigger::Mount).await;
    assert_eq!(harness.backend.session_fetches(), 1);

    tokio::time::advance(Duration::from_secs(2)).await;
    harness.store.revalidate(ValidationTrigger::Mount).await;
    assert_eq!(harness.backend.session_fetches(), 2);
}

#[tokio::test(start_paused = true)]
async fn visibility_rechecks_use_the_long_cooldown() {
    let user = TestUser::staff("reception@clinic.com");
    let backend = Arc::new(StubAuthBackend::with_session(user.to_session()));

    let harness = build_store(backend, manual_config());

    harness.events.emit(VisibilityEvent::Hidden);
    harness.events.emit(VisibilityEvent::Visible);
    settle().await;
    assert_eq!(harness.backend.session_fetches(), 1);

    // Rapid tab switching inside the focus cooldown: no extra fetches.
    tokio::time::advance(Duration::from_secs(5)).await;
    harness.events.emit(VisibilityEvent::Visible);
    settle().await;
    assert_eq!(harness.backend.session_fetches(), 1);

    tokio::time::advance(Duration::from_secs(13)).await;
    harness.events.emit(VisibilityEvent::Visible);
    settle().await;
    assert_eq!(harness.backend.session_fetches(), 2);
}

#[tokio::test(start_paused = true)]
async fn sign_in_round_trip_applies_identity_from_push_event() {
    let backend = Arc::new(StubAuthBackend::new());
    let harness = build_store(backend, manual_config());

    harness
        .store
        .sign_in("nurse.kelly@clinic.com", "correct-horse")
        .await
        .unwrap();

    wait_for_authenticated(&harness.store).await;

    let identity = harness.store.current_identity().unwrap();
    assert_eq!(identity.email, "nurse.kelly@clinic.com");
    assert_eq!(identity.role, "staff");
    assert!(!harness.store.is_loading());
}

#[tokio::test(start_paused = true)]
async fn sign_in_failure_surfaces_to_the_caller() {
    let backend = Arc::new(StubAuthBackend::new());
    backend.set_sign_in_error("Invalid login credentials");

    let harness = build_store(backend, manual_config());

    let result = harness.store.sign_in("nurse.kelly@clinic.com", "wrong").await;

    let err = result.unwrap_err();
    assert!(err.to_string().contains("Invalid login credentials"));
    assert!(!harness.store.is_loading());
    assert_eq!(harness.store.current_identity(), None);
}

#[tokio::test(start_paused = true)]
async fn sign_out_clears_identity_immediately() {
    let user = TestUser::staff("reception@clinic.com");
    let backend = Arc::new(StubAuthBackend::with_session(user.to_session()));

    let harness = build_store(backend, manual_config());
    harness.store.revalidate(ValidationTrigger::Manual).await;
    assert!(harness.store.current_identity().is_some());

    harness.store.sign_out().await.unwrap();

    assert_eq!(harness.store.current_identity(), None);
    assert_eq!(harness.store.snapshot().phase, SessionPhase::Unauthenticated);
    assert!(!harness.store.is_loading());
}

#[tokio::test(start_paused = true)]
async fn signed_out_event_clears_identity() {
    let user = TestUser::staff("reception@clinic.com");
    let backend = Arc::new(StubAuthBackend::with_session(user.to_session()));

    let harness = build_store(backend.clone(), manual_config());
    harness.store.revalidate(ValidationTrigger::Manual).await;
    assert!(harness.store.current_identity().is_some());

    backend.emit(AuthChangeEvent::SignedOut);
    wait_for_phase(&harness.store, SessionPhase::Unauthenticated).await;

    assert_eq!(harness.store.current_identity(), None);
}

#[tokio::test(start_paused = true)]
async fn push_event_resolves_role_through_fallback() {
    let user = TestUser::doctor("dr.jones@clinic.com");
    let backend = Arc::new(StubAuthBackend::new());
    backend.set_current_user(Some(user.to_session_user()));

    let harness = build_store(backend.clone(), manual_config());

    backend.emit(AuthChangeEvent::SignedIn(user.to_session()));
    wait_for_authenticated(&harness.store).await;

    let identity = harness.store.current_identity().unwrap();
    assert_eq!(identity.role, "doctor");
}

#[tokio::test(start_paused = true)]
async fn loading_flag_mirrors_the_validation_cycle() {
    let backend = Arc::new(StubAuthBackend::new());
    backend.hang_session_fetches();

    let harness = build_store(backend, manual_config());
    let store = Arc::new(harness.store);

    let cycle = tokio::spawn({
        let store = store.clone();
        async move { store.revalidate(ValidationTrigger::Manual).await }
    });

    settle().await;
    assert!(store.is_loading());
    assert!(harness.registry.any_active());

    cycle.await.unwrap();
    assert!(!store.is_loading());
    assert!(!harness.registry.any_active());
}

#[tokio::test(start_paused = true)]
async fn missing_configuration_degrades_to_not_configured() {
    let app_config = AppConfig {
        supabase_url: String::new(),
        supabase_anon_key: String::new(),
        connectivity_probe_url: DEFAULT_PROBE_URL.to_string(),
    };
    let backend = Arc::new(StubAuthBackend::new());
    let registry = LoadingRegistry::new();
    let events = VisibilityEvents::new();
    let resolver = Arc::new(RoleResolver::with_function_url(
        UNREACHABLE_ROLE_FUNCTION.to_string(),
        backend.clone(),
    ));

    let store = SessionStore::new(
        &app_config,
        SessionStoreConfig::default(),
        backend.clone(),
        resolver,
        &registry,
        &events,
    );
    settle().await;

    assert_eq!(store.snapshot().phase, SessionPhase::NotConfigured);
    assert_eq!(store.revalidate(ValidationTrigger::Manual).await, None);
    assert_eq!(backend.session_fetches(), 0);
    assert!(store.sign_in("a@b.c", "pw").await.is_err());
}
