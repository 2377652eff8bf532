use std::env;

use regex::Regex;
use tracing::warn;

/// Default external host used by connectivity diagnostics to tell "the
/// backend is down" apart from "the network is down".
pub const DEFAULT_PROBE_URL: &str = "https://httpbin.org/get";

/// Client identification header sent with every backend request.
pub const CLIENT_INFO: &str = "carecall-dashboard";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub connectivity_probe_url: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            connectivity_probe_url: env::var("CONNECTIVITY_PROBE_URL")
                .unwrap_or_else(|_| DEFAULT_PROBE_URL.to_string()),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    /// The whole system degrades to a surfaced "not configured" state when
    /// either value is missing, rather than crashing.
    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_anon_key.is_empty()
    }

    /// URL of the fetch-role function.
    ///
    /// Hosted Supabase projects serve functions from a sibling domain
    /// (`https://<ref>.functions.supabase.co`); anything else (local stack,
    /// self-hosted) falls back to the `/functions/v1` path on the project URL.
    pub fn role_function_url(&self) -> String {
        let project_ref = Regex::new(r"^https://([^.]+)\.supabase\.co")
            .ok()
            .and_then(|re| re.captures(&self.supabase_url))
            .map(|caps| caps[1].to_string());

        match project_ref {
            Some(project_ref) => format!("https://{}.functions.supabase.co/fetch-role", project_ref),
            None => format!("{}/functions/v1/fetch-role", self.supabase_url.trim_end_matches('/')),
        }
    }
}
