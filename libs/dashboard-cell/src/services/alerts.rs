use anyhow::Result;
use reqwest::Method;
use tracing::debug;

use recovery_cell::{LoadingFlag, LoadingRegistry};
use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::SymptomReport;
use crate::services::refetch::RefetchGuard;

/// Escalated symptom alerts view.
pub struct EscalatedAlertsService {
    supabase: SupabaseClient,
    flag: LoadingFlag,
    guard: RefetchGuard,
}

impl EscalatedAlertsService {
    pub fn new(config: &AppConfig, registry: &LoadingRegistry) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            flag: registry.register("alerts"),
            guard: RefetchGuard::default(),
        }
    }

    /// Every report flagged for escalation, newest first, with the patient
    /// name joined through the originating call.
    pub async fn escalated_reports(&self, auth_token: &str) -> Result<Vec<SymptomReport>> {
        debug!("Fetching escalated symptom reports");
        self.flag.set();

        let path = "/rest/v1/symptom_reports?select=id,call_id,risk_level,escalate,notes,calls(patients(full_name))&escalate=eq.true&order=id.desc";
        let result = self
            .supabase
            .request::<Vec<SymptomReport>>(Method::GET, path, Some(auth_token), None)
            .await;

        self.flag.clear();
        result
    }

    pub async fn escalated_reports_if_due(
        &self,
        auth_token: &str,
    ) -> Result<Option<Vec<SymptomReport>>> {
        if !self.guard.try_begin() {
            debug!("Escalated-alerts re-fetch skipped by guard");
            return Ok(None);
        }
        self.escalated_reports(auth_token).await.map(Some)
    }

    /// Symptom history for one patient's profile page.
    pub async fn reports_for_patient(
        &self,
        patient_id: &str,
        auth_token: &str,
    ) -> Result<Vec<SymptomReport>> {
        debug!("Fetching symptom reports for patient {}", patient_id);

        let path = format!(
            "/rest/v1/symptom_reports?select=id,call_id,risk_level,escalate,notes,symptoms,created_at&patient_id=eq.{}&order=created_at.desc",
            patient_id
        );
        self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
    }

    pub fn guard(&self) -> &RefetchGuard {
        &self.guard
    }
}
