use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration as StdDuration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use base64::{engine::general_purpose, Engine as _};
use serde_json::json;
use tokio::sync::broadcast;
use uuid::Uuid;

use shared_config::{AppConfig, DEFAULT_PROBE_URL};
use shared_database::AuthBackend;
use shared_models::auth::{AuthChangeEvent, AuthSession, Identity, SessionUser};

pub struct TestConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
        }
    }
}

impl TestConfig {
    pub fn with_url(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            connectivity_probe_url: DEFAULT_PROBE_URL.to_string(),
        }
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@clinic.com".to_string(),
            role: "staff".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn staff(email: &str) -> Self {
        Self::new(email, "staff")
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "doctor")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn to_identity(&self) -> Identity {
        Identity {
            id: self.id.clone(),
            email: self.email.clone(),
            role: self.role.clone(),
        }
    }

    pub fn to_session_user(&self) -> SessionUser {
        SessionUser {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            user_metadata: None,
            app_metadata: None,
            created_at: Some(Utc::now()),
        }
    }

    pub fn to_session(&self) -> AuthSession {
        AuthSession {
            access_token: JwtTestUtils::create_access_token(self, "test-secret", Some(1)),
            refresh_token: Uuid::new_v4().to_string(),
            user: self.to_session_user(),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    /// Signed access token in the backend's shape. The dashboard never
    /// verifies the signature, but fixtures mimic the real thing.
    pub fn create_access_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_access_token(user, secret, Some(-1))
    }
}

/// Programmable in-process auth backend for coordinator tests: scripted
/// session fetches (value, transient failure, hang, artificial latency), a
/// real auth-event channel, and call counting.
pub struct StubAuthBackend {
    events: broadcast::Sender<AuthChangeEvent>,
    session: Mutex<Option<AuthSession>>,
    current_user: Mutex<Option<SessionUser>>,
    sign_in_error: Mutex<Option<String>>,
    session_delay: Mutex<StdDuration>,
    hang_session_fetches: AtomicBool,
    fail_session_fetches: AtomicBool,
    session_fetches: AtomicU32,
}

impl Default for StubAuthBackend {
    fn default() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            events,
            session: Mutex::new(None),
            current_user: Mutex::new(None),
            sign_in_error: Mutex::new(None),
            session_delay: Mutex::new(StdDuration::ZERO),
            hang_session_fetches: AtomicBool::new(false),
            fail_session_fetches: AtomicBool::new(false),
            session_fetches: AtomicU32::new(0),
        }
    }
}

impl StubAuthBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: AuthSession) -> Self {
        let stub = Self::new();
        stub.set_session(Some(session));
        stub
    }

    pub fn set_session(&self, session: Option<AuthSession>) {
        *self.session.lock().unwrap() = session;
    }

    pub fn set_current_user(&self, user: Option<SessionUser>) {
        *self.current_user.lock().unwrap() = user;
    }

    pub fn set_sign_in_error(&self, message: &str) {
        *self.sign_in_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn set_session_delay(&self, delay: StdDuration) {
        *self.session_delay.lock().unwrap() = delay;
    }

    /// Makes session fetches park forever, so only timeouts resolve them.
    pub fn hang_session_fetches(&self) {
        self.hang_session_fetches.store(true, Ordering::SeqCst);
    }

    /// Makes session fetches fail with a transient (retryable) error.
    pub fn fail_session_fetches(&self) {
        self.fail_session_fetches.store(true, Ordering::SeqCst);
    }

    pub fn session_fetches(&self) -> u32 {
        self.session_fetches.load(Ordering::SeqCst)
    }

    pub fn emit(&self, event: AuthChangeEvent) {
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl AuthBackend for StubAuthBackend {
    async fn get_session(&self) -> Result<Option<AuthSession>> {
        self.session_fetches.fetch_add(1, Ordering::SeqCst);

        if self.hang_session_fetches.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }

        let delay = *self.session_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.fail_session_fetches.load(Ordering::SeqCst) {
            return Err(anyhow!("connection reset by peer"));
        }

        Ok(self.session.lock().unwrap().clone())
    }

    async fn sign_in_with_password(&self, email: &str, _password: &str) -> Result<AuthSession> {
        if let Some(message) = self.sign_in_error.lock().unwrap().clone() {
            return Err(anyhow!("{}", message));
        }

        let user = TestUser::new(email, "staff");
        let session = user.to_session();
        *self.session.lock().unwrap() = Some(session.clone());
        self.emit(AuthChangeEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<()> {
        *self.session.lock().unwrap() = None;
        self.emit(AuthChangeEvent::SignedOut);
        Ok(())
    }

    async fn request_password_reset(&self, _email: &str) -> Result<()> {
        Ok(())
    }

    async fn current_user(&self) -> Result<Option<SessionUser>> {
        Ok(self.current_user.lock().unwrap().clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthChangeEvent> {
        self.events.subscribe()
    }
}

pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn token_grant_response(user: &TestUser) -> serde_json::Value {
        json!({
            "access_token": JwtTestUtils::create_access_token(user, "test-secret", Some(1)),
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": Uuid::new_v4().to_string(),
            "user": Self::auth_user_response(user)
        })
    }

    pub fn auth_user_response(user: &TestUser) -> serde_json::Value {
        json!({
            "id": user.id,
            "email": user.email,
            "user_metadata": {},
            "app_metadata": {},
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn role_row_response(role: &str) -> serde_json::Value {
        json!([{ "role": role }])
    }

    pub fn call_row(patient_name: &str) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "patient_id": Uuid::new_v4(),
            "call_time": "2026-08-01T10:15:00Z",
            "call_status": "completed",
            "transcript": "Patient reports feeling well.",
            "patients": { "full_name": patient_name }
        })
    }

    pub fn patient_row(full_name: &str) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "full_name": full_name,
            "phone_number": "+353851234567",
            "last_visit": "2026-07-20",
            "condition_type": "post-op",
            "doctor_id": Uuid::new_v4()
        })
    }

    pub fn symptom_report_row(risk_level: &str, escalate: bool) -> serde_json::Value {
        json!({
            "id": 101,
            "call_id": Uuid::new_v4(),
            "patient_id": Uuid::new_v4(),
            "risk_level": risk_level,
            "escalate": escalate,
            "notes": "Reported chest tightness",
            "symptoms": ["chest tightness", "fatigue"],
            "created_at": "2026-08-01T10:20:00Z",
            "calls": { "patients": { "full_name": "Mary Byrne" } }
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "error": {
                "message": message,
                "code": code
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::default();
        let app_config = config.to_app_config();

        assert_eq!(app_config.supabase_url, "http://localhost:54321");
        assert_eq!(app_config.supabase_anon_key, "test-anon-key");
        assert!(app_config.is_configured());
    }

    #[test]
    fn test_user_creation() {
        let user = TestUser::doctor("doc@clinic.com");
        assert_eq!(user.email, "doc@clinic.com");
        assert_eq!(user.role, "doctor");

        let identity = user.to_identity();
        assert_eq!(identity.email, user.email);
        assert_eq!(identity.role, user.role);
        assert_eq!(identity.id, user.id);
    }

    #[test]
    fn test_access_token_shape() {
        let user = TestUser::default();
        let token = JwtTestUtils::create_access_token(&user, "test-secret", Some(1));

        assert_eq!(token.split('.').count(), 3);
    }
}
