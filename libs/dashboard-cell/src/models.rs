use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Embedded patient name produced by the `patients(full_name)` join.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientName {
    pub full_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub call_time: DateTime<Utc>,
    pub call_status: String,
    pub transcript: Option<String>,
    #[serde(default)]
    pub patients: Option<PatientName>,
}

/// Narrow projection used when only recency matters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallSummary {
    pub patient_id: Uuid,
    pub call_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientRecord {
    pub id: Uuid,
    pub full_name: String,
    pub phone_number: Option<String>,
    pub last_visit: Option<NaiveDate>,
    pub condition_type: Option<String>,
    pub doctor_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPatient {
    pub full_name: String,
    pub phone_number: Option<String>,
    pub last_visit: Option<NaiveDate>,
    pub condition_type: Option<String>,
    pub doctor_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_visit: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doctor_id: Option<Uuid>,
}

/// Row in the staff `users` table (distinct from the auth service's user).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffUser {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
}

/// Nested `calls(patients(full_name))` join on symptom reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallPatientJoin {
    pub patients: Option<PatientName>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymptomReport {
    pub id: i64,
    pub call_id: Option<Uuid>,
    pub risk_level: Option<String>,
    pub escalate: bool,
    pub notes: Option<String>,
    #[serde(default)]
    pub symptoms: Option<serde_json::Value>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub calls: Option<CallPatientJoin>,
}

/// Projection for the weekly risk summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskSummaryRow {
    pub risk_level: Option<String>,
    pub escalate: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardStats {
    pub calls_last_7_days: u64,
    pub escalated_last_7_days: u64,
    /// Mean of the mapped risk levels (low=1, medium=2, high=3) over the
    /// week, when any report carried a known level.
    pub average_risk: Option<f64>,
}

pub fn risk_weight(risk_level: &str) -> u32 {
    match risk_level {
        "low" => 1,
        "medium" => 2,
        "high" => 3,
        _ => 0,
    }
}
