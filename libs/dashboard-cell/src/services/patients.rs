use std::collections::HashSet;

use anyhow::{anyhow, Result};
use chrono::{Duration, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use tracing::debug;
use uuid::Uuid;

use recovery_cell::{LoadingFlag, LoadingRegistry};
use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::{CallSummary, NewPatient, PatientRecord, PatientUpdate, StaffUser};
use crate::services::refetch::RefetchGuard;

const PATIENT_COLUMNS: &str = "id,full_name,phone_number,last_visit,condition_type,doctor_id";

/// How far back a call still counts as "recent" for follow-up scheduling.
const FOLLOW_UP_WINDOW_DAYS: i64 = 7;

/// Patient directory: listing, record management, and the follow-up-due
/// roster.
pub struct PatientDirectoryService {
    supabase: SupabaseClient,
    flag: LoadingFlag,
    guard: RefetchGuard,
}

impl PatientDirectoryService {
    pub fn new(config: &AppConfig, registry: &LoadingRegistry) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            flag: registry.register("patients"),
            guard: RefetchGuard::default(),
        }
    }

    pub async fn list_patients(&self, auth_token: &str) -> Result<Vec<PatientRecord>> {
        debug!("Fetching patient directory");
        self.flag.set();

        let path = format!("/rest/v1/patients?select={}", PATIENT_COLUMNS);
        let result = self
            .supabase
            .request::<Vec<PatientRecord>>(Method::GET, &path, Some(auth_token), None)
            .await;

        self.flag.clear();
        result
    }

    pub async fn list_patients_if_due(&self, auth_token: &str) -> Result<Option<Vec<PatientRecord>>> {
        if !self.guard.try_begin() {
            debug!("Patient list re-fetch skipped by guard");
            return Ok(None);
        }
        self.list_patients(auth_token).await.map(Some)
    }

    pub async fn get_patient(&self, patient_id: &str, auth_token: &str) -> Result<PatientRecord> {
        debug!("Fetching patient profile: {}", patient_id);

        let path = format!(
            "/rest/v1/patients?select={}&id=eq.{}",
            PATIENT_COLUMNS, patient_id
        );
        let result: Vec<PatientRecord> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        result
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Patient not found"))
    }

    /// Doctors from the staff table, for the assignment dropdown.
    pub async fn list_doctors(&self, auth_token: &str) -> Result<Vec<StaffUser>> {
        let path = "/rest/v1/users?select=id,name,email,role&role=eq.doctor";
        self.supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await
    }

    pub async fn create_patient(
        &self,
        patient: &NewPatient,
        auth_token: &str,
    ) -> Result<PatientRecord> {
        debug!("Creating patient record for {}", patient.full_name);

        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        let result: Vec<PatientRecord> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/patients",
                Some(auth_token),
                Some(serde_json::to_value(patient)?),
                Some(headers),
            )
            .await?;

        result
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Failed to create patient record"))
    }

    pub async fn update_patient(
        &self,
        patient_id: &str,
        update: &PatientUpdate,
        auth_token: &str,
    ) -> Result<PatientRecord> {
        debug!("Updating patient record: {}", patient_id);

        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        let result: Vec<PatientRecord> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(serde_json::to_value(update)?),
                Some(headers),
            )
            .await?;

        result
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Patient not found"))
    }

    pub async fn delete_patient(&self, patient_id: &str, auth_token: &str) -> Result<()> {
        debug!("Deleting patient record: {}", patient_id);

        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        self.supabase
            .execute(Method::DELETE, &path, Some(auth_token), None)
            .await
    }

    /// Patients with no call inside the follow-up window, computed from the
    /// full roster minus recently-called patient ids.
    pub async fn follow_up_due(&self, auth_token: &str) -> Result<Vec<PatientRecord>> {
        self.flag.set();
        let result = self.follow_up_due_inner(auth_token).await;
        self.flag.clear();
        result
    }

    async fn follow_up_due_inner(&self, auth_token: &str) -> Result<Vec<PatientRecord>> {
        let since = (Utc::now() - Duration::days(FOLLOW_UP_WINDOW_DAYS)).to_rfc3339();

        let patients: Vec<PatientRecord> = self
            .supabase
            .request(
                Method::GET,
                &format!("/rest/v1/patients?select={}", PATIENT_COLUMNS),
                Some(auth_token),
                None,
            )
            .await?;

        let recent_calls: Vec<CallSummary> = self
            .supabase
            .request(
                Method::GET,
                &format!(
                    "/rest/v1/calls?select=patient_id,call_time&call_time=gte.{}",
                    since
                ),
                Some(auth_token),
                None,
            )
            .await?;

        let recently_called: HashSet<Uuid> = recent_calls
            .into_iter()
            .map(|call| call.patient_id)
            .collect();

        Ok(patients
            .into_iter()
            .filter(|patient| !recently_called.contains(&patient.id))
            .collect())
    }

    pub fn guard(&self) -> &RefetchGuard {
        &self.guard
    }
}
