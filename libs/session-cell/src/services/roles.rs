use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use anyhow::{anyhow, Result};
use reqwest::header::CACHE_CONTROL;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, warn};

use shared_config::AppConfig;
use shared_database::AuthBackend;
use shared_models::auth::{roles, RoleLookupResponse, SessionUser};

use crate::models::RoleCacheEntry;

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(8);

/// Resolved roles stay fresh for this long before a new remote lookup.
pub const ROLE_CACHE_TTL: Duration = Duration::from_secs(300);

/// Maps an opaque user id to a role string. Resolution is total: every
/// failure falls through the chain (remote function → own auth record
/// keyword sniff → hard-coded default) and errors are logged, never raised.
pub struct RoleResolver {
    http: Client,
    function_url: String,
    backend: Arc<dyn AuthBackend>,
    cache: RoleCache,
}

impl RoleResolver {
    pub fn new(config: &AppConfig, backend: Arc<dyn AuthBackend>) -> Self {
        Self::with_function_url(config.role_function_url(), backend)
    }

    pub fn with_function_url(function_url: String, backend: Arc<dyn AuthBackend>) -> Self {
        Self {
            http: Client::builder().timeout(LOOKUP_TIMEOUT).build().unwrap(),
            function_url,
            backend,
            cache: RoleCache::new(ROLE_CACHE_TTL),
        }
    }

    pub async fn resolve_role(&self, identity_id: &str) -> String {
        if let Some(role) = self.cache.get(identity_id) {
            debug!("Role for {} served from cache: {}", identity_id, role);
            return role;
        }

        match self.lookup_remote(identity_id).await {
            Ok(role) => {
                self.cache.insert(identity_id, &role);
                return role;
            }
            Err(err) => {
                warn!("Remote role lookup for {} failed: {}", identity_id, err);
            }
        }

        match self.lookup_from_own_record().await {
            Ok(Some(role)) => {
                self.cache.insert(identity_id, &role);
                return role;
            }
            Ok(None) => {
                debug!("No role keyword matched for {}", identity_id);
            }
            Err(err) => {
                warn!("Fallback role lookup for {} failed: {}", identity_id, err);
            }
        }

        roles::DEFAULT.to_string()
    }

    /// Drops all cached resolutions (used on sign-out).
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    async fn lookup_remote(&self, user_id: &str) -> Result<String> {
        let response = self
            .http
            .post(&self.function_url)
            .header(CACHE_CONTROL, "no-cache")
            .json(&json!({ "user_id": user_id }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Role function returned {}", status));
        }

        let body: RoleLookupResponse = response.json().await?;
        if body.role.is_empty() {
            return Err(anyhow!("Role function returned an empty role"));
        }
        Ok(body.role)
    }

    async fn lookup_from_own_record(&self) -> Result<Option<String>> {
        let Some(user) = self.backend.current_user().await? else {
            return Ok(None);
        };
        Ok(role_from_profile(&user))
    }
}

/// Best-effort guess from the user's own record: email and self-reported
/// metadata are scanned for role keywords, first match wins.
fn role_from_profile(user: &SessionUser) -> Option<String> {
    let mut haystacks = Vec::new();
    if let Some(email) = &user.email {
        haystacks.push(email.to_lowercase());
    }
    if let Some(metadata) = &user.user_metadata {
        haystacks.push(metadata.to_string().to_lowercase());
    }
    if let Some(metadata) = &user.app_metadata {
        haystacks.push(metadata.to_string().to_lowercase());
    }

    const ADMIN_KEYWORDS: &[&str] = &["admin", "administrator"];
    const DOCTOR_KEYWORDS: &[&str] = &["doctor", "physician", "dr."];

    for haystack in &haystacks {
        if ADMIN_KEYWORDS.iter().any(|kw| haystack.contains(kw)) {
            return Some(roles::ADMIN.to_string());
        }
        if DOCTOR_KEYWORDS.iter().any(|kw| haystack.contains(kw)) {
            return Some(roles::DOCTOR.to_string());
        }
    }

    None
}

/// Per-identity role cache. Entries past the TTL are ignored, not returned
/// stale.
struct RoleCache {
    entries: RwLock<HashMap<String, RoleCacheEntry>>,
    ttl: Duration,
}

impl RoleCache {
    fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    fn get(&self, identity_id: &str) -> Option<String> {
        let entries = self.entries.read().unwrap();
        let entry = entries.get(identity_id)?;
        if entry.resolved_at.elapsed() < self.ttl {
            Some(entry.role.clone())
        } else {
            None
        }
    }

    fn insert(&self, identity_id: &str, role: &str) {
        self.entries.write().unwrap().insert(
            identity_id.to_string(),
            RoleCacheEntry {
                role: role.to_string(),
                resolved_at: tokio::time::Instant::now(),
            },
        );
    }

    fn clear(&self) {
        self.entries.write().unwrap().clear();
    }
}
