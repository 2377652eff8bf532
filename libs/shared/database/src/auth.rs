use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client,
};
use serde_json::json;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, warn};

use shared_config::{AppConfig, CLIENT_INFO};
use shared_models::auth::{
    AuthChangeEvent, AuthSession, JwtClaims, SessionUser, TokenGrantResponse,
};

const AUTH_TIMEOUT: Duration = Duration::from_secs(15);

/// Tokens within this window of expiry are refreshed eagerly instead of
/// being sent to the backend and bounced.
const EXPIRY_SKEW_SECS: u64 = 30;

/// Operations the session coordinator needs from an auth backend. The live
/// implementation is [`SupabaseAuth`]; tests substitute a mock.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Current session, refreshed if the access token has expired.
    /// `Ok(None)` means "definitely signed out", errors mean "could not tell".
    async fn get_session(&self) -> Result<Option<AuthSession>>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthSession>;

    async fn sign_out(&self) -> Result<()>;

    async fn request_password_reset(&self, email: &str) -> Result<()>;

    /// The signed-in user's own record, as the auth service reports it.
    async fn current_user(&self) -> Result<Option<SessionUser>>;

    fn subscribe(&self) -> broadcast::Receiver<AuthChangeEvent>;
}

/// Client-side half of the vendor auth protocol: exchanges credentials,
/// holds the current session tokens, and broadcasts auth-state changes the
/// way the vendor SDK's `onAuthStateChange` does.
pub struct SupabaseAuth {
    client: Client,
    base_url: String,
    anon_key: String,
    session: RwLock<Option<AuthSession>>,
    events: broadcast::Sender<AuthChangeEvent>,
}

impl SupabaseAuth {
    pub fn new(config: &AppConfig) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            client: Client::builder().timeout(AUTH_TIMEOUT).build().unwrap(),
            base_url: config.supabase_url.clone(),
            anon_key: config.supabase_anon_key.clone(),
            session: RwLock::new(None),
            events,
        }
    }

    fn headers(&self, auth_token: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("apikey", HeaderValue::from_str(&self.anon_key).unwrap());
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("X-Client-Info", HeaderValue::from_static(CLIENT_INFO));
        if let Some(token) = auth_token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
            );
        }
        headers
    }

    fn emit(&self, event: AuthChangeEvent) {
        // A send error only means nobody is listening yet.
        let _ = self.events.send(event);
    }

    /// Restore a previously persisted session (the SDK's `setSession`).
    /// Emits `SignedIn` so subscribers pick up the identity.
    pub async fn restore_session(&self, session: AuthSession) {
        *self.session.write().await = Some(session.clone());
        self.emit(AuthChangeEvent::SignedIn(session));
    }

    async fn grant(&self, grant_type: &str, body: serde_json::Value) -> Result<AuthSession> {
        let url = format!("{}/auth/v1/token?grant_type={}", self.base_url, grant_type);

        let response = self
            .client
            .post(&url)
            .headers(self.headers(None))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&error_text)
                .ok()
                .and_then(|v| {
                    v.get("error_description")
                        .or_else(|| v.get("msg"))
                        .or_else(|| v.get("message"))
                        .and_then(|m| m.as_str())
                        .map(str::to_string)
                })
                .unwrap_or(error_text);
            return Err(anyhow!("Authentication failed ({}): {}", status, message));
        }

        let grant: TokenGrantResponse = response.json().await?;
        Ok(grant.into_session())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession> {
        debug!("Access token expired, refreshing session");
        let session = self
            .grant("refresh_token", json!({ "refresh_token": refresh_token }))
            .await?;
        *self.session.write().await = Some(session.clone());
        self.emit(AuthChangeEvent::TokenRefreshed(session.clone()));
        Ok(session)
    }
}

#[async_trait]
impl AuthBackend for SupabaseAuth {
    async fn get_session(&self) -> Result<Option<AuthSession>> {
        let current = self.session.read().await.clone();
        let Some(session) = current else {
            return Ok(None);
        };

        if !token_expired(&session.access_token) {
            return Ok(Some(session));
        }

        match self.refresh(&session.refresh_token).await {
            Ok(refreshed) => Ok(Some(refreshed)),
            Err(err) => {
                // A refresh that the backend rejects means the session is
                // gone; resolve to signed-out instead of erroring.
                warn!("Session refresh failed, treating as signed out: {}", err);
                *self.session.write().await = None;
                self.emit(AuthChangeEvent::SignedOut);
                Ok(None)
            }
        }
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthSession> {
        let session = self
            .grant("password", json!({ "email": email, "password": password }))
            .await?;

        *self.session.write().await = Some(session.clone());
        self.emit(AuthChangeEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<()> {
        let session = self.session.write().await.take();

        if let Some(session) = session {
            let url = format!("{}/auth/v1/logout", self.base_url);
            let result = self
                .client
                .post(&url)
                .headers(self.headers(Some(&session.access_token)))
                .send()
                .await;

            // The local session is cleared regardless; a failed revocation
            // only matters server-side.
            if let Err(err) = result {
                warn!("Backend sign-out failed: {}", err);
            }
        }

        self.emit(AuthChangeEvent::SignedOut);
        Ok(())
    }

    async fn request_password_reset(&self, email: &str) -> Result<()> {
        let url = format!("{}/auth/v1/recover", self.base_url);
        let response = self
            .client
            .post(&url)
            .headers(self.headers(None))
            .json(&json!({ "email": email }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Password reset request failed ({})",
                response.status()
            ));
        }
        Ok(())
    }

    async fn current_user(&self) -> Result<Option<SessionUser>> {
        let current = self.session.read().await.clone();
        let Some(session) = current else {
            return Ok(None);
        };

        let url = format!("{}/auth/v1/user", self.base_url);
        let response = self
            .client
            .get(&url)
            .headers(self.headers(Some(&session.access_token)))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("Failed to fetch user ({})", response.status()));
        }

        let user: SessionUser = response.json().await?;
        Ok(Some(user))
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthChangeEvent> {
        self.events.subscribe()
    }
}

/// Reads the `exp` claim out of an access token payload. No signature check:
/// the dashboard only inspects expiry locally, the backend remains the
/// authority on validity.
fn token_expiry(token: &str) -> Option<u64> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return None;
    }

    let payload = URL_SAFE_NO_PAD.decode(parts[1]).ok()?;
    let claims: JwtClaims = serde_json::from_slice(&payload).ok()?;
    claims.exp
}

fn token_expired(token: &str) -> bool {
    match token_expiry(token) {
        Some(exp) => {
            let now = chrono::Utc::now().timestamp() as u64;
            exp < now + EXPIRY_SKEW_SECS
        }
        // Unreadable claims are left for the backend to reject.
        None => false,
    }
}
