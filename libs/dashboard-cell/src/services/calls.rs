use anyhow::Result;
use reqwest::Method;
use tracing::debug;

use recovery_cell::{LoadingFlag, LoadingRegistry};
use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::CallRecord;
use crate::services::refetch::RefetchGuard;

const RECENT_CALLS_LIMIT: u32 = 10;

/// Recent-call feed for the dashboard landing view.
pub struct CallFeedService {
    supabase: SupabaseClient,
    flag: LoadingFlag,
    guard: RefetchGuard,
}

impl CallFeedService {
    pub fn new(config: &AppConfig, registry: &LoadingRegistry) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            flag: registry.register("calls"),
            guard: RefetchGuard::default(),
        }
    }

    /// The most recent calls, newest first, with patient names joined in.
    pub async fn recent_calls(&self, auth_token: &str) -> Result<Vec<CallRecord>> {
        debug!("Fetching the {} most recent calls", RECENT_CALLS_LIMIT);
        self.flag.set();

        let path = format!(
            "/rest/v1/calls?select=id,patient_id,call_time,call_status,transcript,patients(full_name)&order=call_time.desc&limit={}",
            RECENT_CALLS_LIMIT
        );
        let result = self
            .supabase
            .request::<Vec<CallRecord>>(Method::GET, &path, Some(auth_token), None)
            .await;

        self.flag.clear();
        result
    }

    /// Visibility-triggered variant; `None` when the re-fetch guard is
    /// still closed.
    pub async fn recent_calls_if_due(&self, auth_token: &str) -> Result<Option<Vec<CallRecord>>> {
        if !self.guard.try_begin() {
            debug!("Recent-calls re-fetch skipped by guard");
            return Ok(None);
        }
        self.recent_calls(auth_token).await.map(Some)
    }

    /// Full call history for one patient, newest first.
    pub async fn calls_for_patient(
        &self,
        patient_id: &str,
        auth_token: &str,
    ) -> Result<Vec<CallRecord>> {
        debug!("Fetching call history for patient {}", patient_id);
        self.flag.set();

        let path = format!(
            "/rest/v1/calls?select=id,patient_id,call_time,call_status,transcript&patient_id=eq.{}&order=call_time.desc",
            patient_id
        );
        let result = self
            .supabase
            .request::<Vec<CallRecord>>(Method::GET, &path, Some(auth_token), None)
            .await;

        self.flag.clear();
        result
    }

    pub fn guard(&self) -> &RefetchGuard {
        &self.guard
    }
}
