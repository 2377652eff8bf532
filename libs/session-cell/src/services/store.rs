use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use recovery_cell::{LoadingFlag, LoadingRegistry, VisibilityEvent, VisibilityEvents};
use shared_config::AppConfig;
use shared_database::AuthBackend;
use shared_models::auth::{AuthChangeEvent, AuthSession, Identity};
use shared_utils::retry::retry_operation;

use crate::models::{SessionPhase, SessionSnapshot, SessionStoreConfig, ValidationTrigger};
use crate::services::roles::RoleResolver;

/// Name of the coordinator's own flag in the loading registry.
pub const SESSION_LOADING_FLAG: &str = "session";

struct CoordinationGate {
    last_completed: Option<Instant>,
}

struct StoreInner {
    configured: bool,
    config: SessionStoreConfig,
    backend: Arc<dyn AuthBackend>,
    resolver: Arc<RoleResolver>,
    state: watch::Sender<SessionSnapshot>,
    // Serializes every identity writer: pull validation cycles, push auth
    // events, and sign-out all take this lock.
    gate: Mutex<CoordinationGate>,
    // Bumped whenever an attempt completes; lets a caller that waited on
    // the gate adopt the outcome that landed in the meantime.
    cycle_seq: AtomicU64,
    loading_flag: LoadingFlag,
}

impl StoreInner {
    fn set_loading(&self, loading: bool) {
        if loading {
            self.loading_flag.set();
        } else {
            self.loading_flag.clear();
        }
        self.state.send_modify(|snapshot| snapshot.is_loading = loading);
    }

    fn current_identity(&self) -> Option<Identity> {
        self.state.borrow().identity().cloned()
    }

    /// Replaces the identity wholesale and settles the cycle into a
    /// terminal phase.
    fn apply_identity(&self, identity: Option<Identity>) {
        let phase = match identity {
            Some(identity) => SessionPhase::Authenticated(identity),
            None => SessionPhase::Unauthenticated,
        };
        self.loading_flag.clear();
        self.state.send_modify(|snapshot| {
            snapshot.phase = phase;
            snapshot.is_loading = false;
        });
    }

    fn complete_cycle(&self, gate: &mut CoordinationGate) {
        gate.last_completed = Some(Instant::now());
        self.cycle_seq.fetch_add(1, Ordering::SeqCst);
    }

    async fn identity_from_session(&self, session: &AuthSession) -> Identity {
        let role = self.resolver.resolve_role(&session.user.id).await;
        Identity {
            id: session.user.id.clone(),
            email: session.user.email.clone().unwrap_or_default(),
            role,
        }
    }

    /// One validation cycle. Holds the coordination gate for its whole
    /// duration; concurrent triggers queue on the lock and adopt this
    /// attempt's outcome instead of fetching again.
    async fn validate(&self, trigger: ValidationTrigger) -> Option<Identity> {
        if !self.configured {
            debug!("Skipping validation, backend not configured");
            return None;
        }

        let seq_before = self.cycle_seq.load(Ordering::SeqCst);
        let mut gate = self.gate.lock().await;

        if self.cycle_seq.load(Ordering::SeqCst) != seq_before {
            debug!(
                "Validation ({:?}) attached to an attempt that completed while waiting",
                trigger
            );
            return self.current_identity();
        }

        if let Some(completed) = gate.last_completed {
            let cooldown = trigger.cooldown(&self.config);
            if completed.elapsed() < cooldown {
                debug!(
                    "Validation ({:?}) rejected, previous attempt finished {:?} ago",
                    trigger,
                    completed.elapsed()
                );
                return self.current_identity();
            }
        }

        debug!("Starting validation cycle ({:?})", trigger);
        self.set_loading(true);

        let session = retry_operation(
            "session fetch",
            self.config.max_retries,
            self.config.retry_base_delay,
            || {
                let backend = self.backend.clone();
                async move { backend.get_session().await }
            },
        )
        .await;

        let identity = match session {
            Ok(Some(session)) => Some(self.identity_from_session(&session).await),
            Ok(None) => {
                debug!("Backend reports no session");
                None
            }
            Err(err) => {
                // A failed validation is not an error state for callers; it
                // resolves to unauthenticated.
                warn!("Session validation failed: {}", err);
                None
            }
        };

        self.apply_identity(identity.clone());
        self.complete_cycle(&mut gate);
        identity
    }

    async fn handle_auth_event(&self, event: AuthChangeEvent) {
        match event {
            AuthChangeEvent::SignedIn(session) | AuthChangeEvent::TokenRefreshed(session) => {
                let mut gate = self.gate.lock().await;
                let identity = self.identity_from_session(&session).await;
                info!("Auth event applied identity for user {}", identity.id);
                self.apply_identity(Some(identity));
                self.complete_cycle(&mut gate);
            }
            AuthChangeEvent::SignedOut => {
                let mut gate = self.gate.lock().await;
                info!("Auth event cleared identity");
                self.resolver.clear_cache();
                self.apply_identity(None);
                self.complete_cycle(&mut gate);
            }
            AuthChangeEvent::PasswordRecovery => {}
        }
    }
}

/// The single authority for "who is signed in and with what role".
///
/// Pull-based validation cycles (mount, visibility, focus, network
/// recovery) and the backend's push notifications both funnel into the same
/// coordination gate, so identity updates never interleave. Dropping the
/// store tears the listener down.
pub struct SessionStore {
    inner: Arc<StoreInner>,
    listener: JoinHandle<()>,
}

impl SessionStore {
    pub fn new(
        app_config: &AppConfig,
        config: SessionStoreConfig,
        backend: Arc<dyn AuthBackend>,
        resolver: Arc<RoleResolver>,
        registry: &LoadingRegistry,
        events: &VisibilityEvents,
    ) -> Self {
        let configured = app_config.is_configured();

        let initial = SessionSnapshot {
            phase: if configured {
                SessionPhase::Validating
            } else {
                SessionPhase::NotConfigured
            },
            is_loading: false,
        };
        let (state, _) = watch::channel(initial);

        let validate_on_start = config.validate_on_start;
        let inner = Arc::new(StoreInner {
            configured,
            config,
            backend: backend.clone(),
            resolver,
            state,
            gate: Mutex::new(CoordinationGate {
                last_completed: None,
            }),
            cycle_seq: AtomicU64::new(0),
            loading_flag: registry.register(SESSION_LOADING_FLAG),
        });

        let listener = tokio::spawn(run_listener(
            inner.clone(),
            backend.subscribe(),
            events.subscribe(),
        ));

        if validate_on_start && configured {
            let store = inner.clone();
            tokio::spawn(async move {
                store.validate(ValidationTrigger::Mount).await;
            });
        }

        Self { inner, listener }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.state.borrow().clone()
    }

    pub fn current_identity(&self) -> Option<Identity> {
        self.inner.current_identity()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().is_loading
    }

    /// Watch the snapshot; consumers (data views) get change notifications
    /// without being able to write.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.state.subscribe()
    }

    /// Reconcile the local identity with the backend's actual session.
    /// Returns the identity the cycle settled on.
    pub async fn revalidate(&self, trigger: ValidationTrigger) -> Option<Identity> {
        self.inner.validate(trigger).await
    }

    /// Credential exchange. Failures surface to the caller for display;
    /// on success the identity lands through the `SignedIn` push event.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<()> {
        if !self.inner.configured {
            return Err(anyhow!("Auth backend is not configured"));
        }

        self.inner.set_loading(true);
        match self.inner.backend.sign_in_with_password(email, password).await {
            Ok(_) => Ok(()),
            Err(err) => {
                self.inner.set_loading(false);
                Err(err)
            }
        }
    }

    /// Invalidates the backend session and clears the local identity
    /// immediately. Does not flip `is_loading` back on.
    pub async fn sign_out(&self) -> Result<()> {
        {
            let mut gate = self.inner.gate.lock().await;
            self.inner.resolver.clear_cache();
            self.inner.apply_identity(None);
            self.inner.complete_cycle(&mut gate);
        }
        self.inner.backend.sign_out().await
    }

    pub async fn request_password_reset(&self, email: &str) -> Result<()> {
        self.inner.backend.request_password_reset(email).await
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

/// Push half of the coordinator: auth-change notifications update identity
/// through the same gate as validation; visibility/focus/network signals
/// are pure revalidation triggers.
async fn run_listener(
    inner: Arc<StoreInner>,
    mut auth_rx: broadcast::Receiver<AuthChangeEvent>,
    mut visibility_rx: broadcast::Receiver<VisibilityEvent>,
) {
    let mut auth_open = true;
    let mut visibility_open = true;

    while auth_open || visibility_open {
        tokio::select! {
            event = auth_rx.recv(), if auth_open => match event {
                Ok(event) => inner.handle_auth_event(event).await,
                Err(RecvError::Lagged(missed)) => {
                    warn!("Auth events lagged, missed {}; revalidating", missed);
                    inner.validate(ValidationTrigger::Manual).await;
                }
                Err(RecvError::Closed) => auth_open = false,
            },
            event = visibility_rx.recv(), if visibility_open => match event {
                Ok(VisibilityEvent::Visible) => {
                    inner.validate(ValidationTrigger::Visibility).await;
                }
                Ok(VisibilityEvent::FocusGained) => {
                    inner.validate(ValidationTrigger::Focus).await;
                }
                Ok(VisibilityEvent::Online) => {
                    inner.validate(ValidationTrigger::NetworkRestored).await;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => {
                    warn!("Visibility events lagged, missed {}", missed);
                }
                Err(RecvError::Closed) => visibility_open = false,
            },
        }
    }
}
