use std::time::Duration;

use anyhow::{anyhow, Result};
use reqwest::{Client, Method, StatusCode};
use tokio::time::{timeout, Instant};
use tracing::{debug, warn};

use shared_config::AppConfig;

use crate::models::{ConnectionTestResult, ConnectivityReport};

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);
const CORS_CHECK_TIMEOUT: Duration = Duration::from_secs(3);

/// Best-effort reachability checks against the network, the backend REST
/// root, the auth service, the database, and CORS preflight handling. Every
/// check is wrapped and caught individually; one failure never aborts the
/// rest, and `probe` itself never fails.
pub struct ConnectivityDiagnostics {
    client: Client,
    config: AppConfig,
}

impl ConnectivityDiagnostics {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            config: config.clone(),
        }
    }

    pub async fn probe(&self) -> ConnectivityReport {
        let mut report = ConnectivityReport::default();

        debug!("Starting connectivity diagnostics");

        if !self.config.is_configured() {
            report
                .details
                .push("Environment configuration is missing".to_string());
        }

        if let Err(err) = self.check_network().await {
            report.details.push(format!("Network check failed: {}", err));
        }

        match self.check_rest_root().await {
            Ok(()) => report.reachable = true,
            Err(err) => report
                .details
                .push(format!("Backend is not reachable: {}", err)),
        }

        match self.check_auth_service().await {
            Ok(()) => report.auth_ok = true,
            Err(err) => report
                .details
                .push(format!("Auth service check failed: {}", err)),
        }

        match self.check_database().await {
            Ok(()) => report.db_ok = true,
            Err(err) => report
                .details
                .push(format!("Database check failed: {}", err)),
        }

        match self.check_cors_preflight().await {
            Ok(()) => report.cors_ok = true,
            Err(err) => report
                .details
                .push(format!("CORS preflight failed: {}", err)),
        }

        if report.details.is_empty() {
            debug!("All connectivity checks passed");
        } else {
            warn!("Connectivity diagnostics found issues: {:?}", report.details);
        }

        report
    }

    /// Single round trip against the REST root with a hard deadline,
    /// reporting elapsed time either way.
    pub async fn quick_check(&self) -> ConnectionTestResult {
        let started = Instant::now();
        let result = self.check_rest_root().await;

        ConnectionTestResult {
            is_connected: result.is_ok(),
            response_time: started.elapsed(),
            error: result.err().map(|err| err.to_string()),
        }
    }

    /// External host probe: separates "the backend is down" from "there is
    /// no internet".
    async fn check_network(&self) -> Result<()> {
        let response = timeout(
            CHECK_TIMEOUT,
            self.client.get(&self.config.connectivity_probe_url).send(),
        )
        .await
        .map_err(|_| anyhow!("timed out"))??;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(anyhow!("probe host returned {}", response.status()))
        }
    }

    async fn check_rest_root(&self) -> Result<()> {
        let url = format!("{}/rest/v1/", self.config.supabase_url);
        let response = timeout(
            CHECK_TIMEOUT,
            self.client
                .get(&url)
                .header("apikey", &self.config.supabase_anon_key)
                .bearer_auth(&self.config.supabase_anon_key)
                .send(),
        )
        .await
        .map_err(|_| anyhow!("timed out"))??;

        let status = response.status();
        // 401 means the service answered; only transport failures count
        // against reachability.
        if status.is_success() || status == StatusCode::UNAUTHORIZED {
            Ok(())
        } else {
            Err(anyhow!("REST root returned {}", status))
        }
    }

    /// Session no-op: an unauthenticated `/auth/v1/user` call. A 401/403 is
    /// the expected answer and proves the auth service is working.
    async fn check_auth_service(&self) -> Result<()> {
        let url = format!("{}/auth/v1/user", self.config.supabase_url);
        let response = timeout(
            CHECK_TIMEOUT,
            self.client
                .get(&url)
                .header("apikey", &self.config.supabase_anon_key)
                .send(),
        )
        .await
        .map_err(|_| anyhow!("timed out"))??;

        let status = response.status();
        if status.is_success()
            || status == StatusCode::UNAUTHORIZED
            || status == StatusCode::FORBIDDEN
        {
            Ok(())
        } else {
            Err(anyhow!("auth service returned {}", status))
        }
    }

    /// Database no-op: a single-row query. A "relation does not exist"
    /// answer still proves the connection works.
    async fn check_database(&self) -> Result<()> {
        let url = format!(
            "{}/rest/v1/users?select=id&limit=1",
            self.config.supabase_url
        );
        let response = timeout(
            CHECK_TIMEOUT,
            self.client
                .get(&url)
                .header("apikey", &self.config.supabase_anon_key)
                .bearer_auth(&self.config.supabase_anon_key)
                .send(),
        )
        .await
        .map_err(|_| anyhow!("timed out"))??;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        if body.contains("does not exist") {
            return Ok(());
        }

        Err(anyhow!("database query returned {}: {}", status, body))
    }

    async fn check_cors_preflight(&self) -> Result<()> {
        let url = format!("{}/auth/v1/", self.config.supabase_url);
        let response = timeout(
            CORS_CHECK_TIMEOUT,
            self.client.request(Method::OPTIONS, &url).send(),
        )
        .await
        .map_err(|_| anyhow!("timed out"))??;

        let status = response.status();
        if status == StatusCode::OK || status == StatusCode::NO_CONTENT {
            Ok(())
        } else {
            Err(anyhow!("preflight returned {}", status))
        }
    }
}
