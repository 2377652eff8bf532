use std::time::Duration;

use tokio::time::Instant;

use shared_models::auth::Identity;

/// What caused a validation cycle to be requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationTrigger {
    /// App start / store construction.
    Mount,
    /// Tab became visible again.
    Visibility,
    /// Window regained focus.
    Focus,
    /// Network connectivity came back.
    NetworkRestored,
    /// Explicit request from calling code.
    Manual,
    /// A push notification from the auth backend.
    AuthEvent,
}

impl ValidationTrigger {
    /// Cooldown after a completed attempt during which this trigger is
    /// rejected outright. Focus/visibility rechecks get a long window so
    /// rapid tab switching cannot cause re-validation storms; push events
    /// and explicit requests are never debounced.
    pub fn cooldown(self, config: &SessionStoreConfig) -> Duration {
        match self {
            ValidationTrigger::Visibility | ValidationTrigger::Focus => config.focus_cooldown,
            ValidationTrigger::Mount | ValidationTrigger::NetworkRestored => {
                config.generic_cooldown
            }
            ValidationTrigger::Manual | ValidationTrigger::AuthEvent => Duration::ZERO,
        }
    }
}

/// Where the reconciliation machine currently stands. `Validating` only
/// means "no terminal state reached yet" (first cycle in progress); during
/// re-validation the previous terminal phase is kept so readers never see
/// the identity flicker away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    /// Required endpoint/credential configuration is missing; surfaced
    /// persistently instead of crashing or spinning.
    NotConfigured,
    Validating,
    Authenticated(Identity),
    Unauthenticated,
}

/// Read-only view handed to consumers; replaced wholesale on every change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub is_loading: bool,
}

impl SessionSnapshot {
    pub fn identity(&self) -> Option<&Identity> {
        match &self.phase {
            SessionPhase::Authenticated(identity) => Some(identity),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.phase, SessionPhase::Authenticated(_))
    }
}

#[derive(Debug, Clone)]
pub struct SessionStoreConfig {
    /// Retries after the first failed session fetch.
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    /// Debounce for mount/network triggers.
    pub generic_cooldown: Duration,
    /// Debounce for focus/visibility triggers.
    pub focus_cooldown: Duration,
    /// Kick off a Mount validation as soon as the store is constructed.
    pub validate_on_start: bool,
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            retry_base_delay: Duration::from_millis(500),
            generic_cooldown: Duration::from_millis(1500),
            focus_cooldown: Duration::from_secs(12),
            validate_on_start: true,
        }
    }
}

/// One resolved role, fresh for the cache TTL.
#[derive(Debug, Clone)]
pub struct RoleCacheEntry {
    pub role: String,
    pub resolved_at: Instant,
}
