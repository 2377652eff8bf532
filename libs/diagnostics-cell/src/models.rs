use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Outcome of one full diagnostics pass. Purely informational: the session
/// coordinator proceeds (degraded) whatever this says.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectivityReport {
    /// Backend REST root answered (401 counts; it proves the service is up).
    pub reachable: bool,
    pub auth_ok: bool,
    pub db_ok: bool,
    pub cors_ok: bool,
    /// Human-readable descriptions of every failed check.
    pub details: Vec<String>,
}

/// Lightweight pre-flight result used by data views before heavier fetches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionTestResult {
    pub is_connected: bool,
    pub response_time: Duration,
    pub error: Option<String>,
}
