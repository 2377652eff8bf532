use std::sync::Arc;

use axum::extract::{Json, State};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error};

use shared_config::AppConfig;
use shared_models::auth::RoleLookupResponse;
use shared_models::error::AppError;

pub struct AppState {
    pub config: AppConfig,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FetchRoleRequest {
    pub user_id: Option<String>,
}

/// Role lookup consumed by the dashboard's role resolver: reads the user's
/// row from the staff table and answers `{ "role": ... }`, defaulting to
/// "staff" when no row or role exists.
pub async fn fetch_role(
    State(state): State<Arc<AppState>>,
    Json(request): Json<FetchRoleRequest>,
) -> Result<Json<RoleLookupResponse>, AppError> {
    let Some(user_id) = request.user_id.filter(|id| !id.is_empty()) else {
        return Err(AppError::BadRequest("user_id is required".to_string()));
    };

    if !state.config.is_configured() {
        error!("fetch-role invoked without backend configuration");
        return Err(AppError::Configuration("Configuration error".to_string()));
    }

    debug!("Looking up role for user {}", user_id);

    let url = format!(
        "{}/rest/v1/users?id=eq.{}&select=role",
        state.config.supabase_url, user_id
    );
    let response = state
        .http
        .get(&url)
        .header("apikey", &state.config.supabase_anon_key)
        .bearer_auth(&state.config.supabase_anon_key)
        .send()
        .await
        .map_err(|err| {
            error!("Role query failed to send: {}", err);
            AppError::Database("Database query failed".to_string())
        })?;

    if !response.status().is_success() {
        error!("Role query failed with status {}", response.status());
        return Err(AppError::Database("Database query failed".to_string()));
    }

    let rows: Vec<Value> = response.json().await.map_err(|err| {
        error!("Role query returned an unreadable body: {}", err);
        AppError::Database("Database query failed".to_string())
    })?;

    let role = rows
        .first()
        .and_then(|row| row.get("role"))
        .and_then(|role| role.as_str())
        .filter(|role| !role.is_empty())
        .unwrap_or("staff")
        .to_string();

    debug!("Resolved role for {}: {}", user_id, role);

    Ok(Json(RoleLookupResponse { role }))
}
