use chrono::NaiveDate;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dashboard_cell::{
    CallFeedService, DashboardStatsService, EscalatedAlertsService, NewPatient,
    PatientDirectoryService, PatientUpdate,
};
use recovery_cell::LoadingRegistry;
use shared_config::AppConfig;
use shared_utils::test_utils::MockSupabaseResponses;

const TOKEN: &str = "test-access-token";

fn config_for(server: &MockServer) -> AppConfig {
    AppConfig {
        supabase_url: server.uri(),
        supabase_anon_key: "test-anon-key".to_string(),
        connectivity_probe_url: format!("{}/probe", server.uri()),
    }
}

#[tokio::test]
async fn recent_calls_are_fetched_newest_first_with_names() {
    let server = MockServer::start().await;
    let registry = LoadingRegistry::new();

    Mock::given(method("GET"))
        .and(path("/rest/v1/calls"))
        .and(query_param("order", "call_time.desc"))
        .and(query_param("limit", "10"))
        .and(header("Authorization", format!("Bearer {}", TOKEN)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::call_row("Mary Byrne"),
            MockSupabaseResponses::call_row("Sean Murphy"),
        ])))
        .mount(&server)
        .await;

    let service = CallFeedService::new(&config_for(&server), &registry);
    let calls = service.recent_calls(TOKEN).await.unwrap();

    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].patients.as_ref().unwrap().full_name, "Mary Byrne");
    assert_eq!(calls[0].call_status, "completed");
    assert!(!registry.any_active());
}

#[tokio::test]
async fn refetch_guard_limits_repeat_fetches() {
    let server = MockServer::start().await;
    let registry = LoadingRegistry::new();

    Mock::given(method("GET"))
        .and(path("/rest/v1/calls"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let service = CallFeedService::new(&config_for(&server), &registry);

    let first = service.recent_calls_if_due(TOKEN).await.unwrap();
    assert!(first.is_some());

    let second = service.recent_calls_if_due(TOKEN).await.unwrap();
    assert!(second.is_none());
}

#[tokio::test]
async fn fetch_failure_clears_the_loading_flag() {
    let server = MockServer::start().await;
    let registry = LoadingRegistry::new();

    Mock::given(method("GET"))
        .and(path("/rest/v1/calls"))
        .respond_with(ResponseTemplate::new(500).set_body_json(
            MockSupabaseResponses::error_response("Internal server error", "INTERNAL_ERROR"),
        ))
        .mount(&server)
        .await;

    let service = CallFeedService::new(&config_for(&server), &registry);
    let result = service.recent_calls(TOKEN).await;

    assert!(result.is_err());
    assert!(!registry.any_active());
}

#[tokio::test]
async fn escalated_reports_parse_the_nested_patient_join() {
    let server = MockServer::start().await;
    let registry = LoadingRegistry::new();

    Mock::given(method("GET"))
        .and(path("/rest/v1/symptom_reports"))
        .and(query_param("escalate", "eq.true"))
        .and(query_param("order", "id.desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::symptom_report_row("high", true),
        ])))
        .mount(&server)
        .await;

    let service = EscalatedAlertsService::new(&config_for(&server), &registry);
    let reports = service.escalated_reports(TOKEN).await.unwrap();

    assert_eq!(reports.len(), 1);
    assert!(reports[0].escalate);
    assert_eq!(reports[0].risk_level.as_deref(), Some("high"));
    let name = reports[0]
        .calls
        .as_ref()
        .and_then(|call| call.patients.as_ref())
        .map(|patient| patient.full_name.as_str());
    assert_eq!(name, Some("Mary Byrne"));
}

#[tokio::test]
async fn create_patient_returns_the_created_representation() {
    let server = MockServer::start().await;
    let registry = LoadingRegistry::new();

    let created = MockSupabaseResponses::patient_row("Aoife Walsh");

    Mock::given(method("POST"))
        .and(path("/rest/v1/patients"))
        .and(header("Prefer", "return=representation"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([created])))
        .mount(&server)
        .await;

    let service = PatientDirectoryService::new(&config_for(&server), &registry);
    let patient = service
        .create_patient(
            &NewPatient {
                full_name: "Aoife Walsh".to_string(),
                phone_number: Some("+353851234567".to_string()),
                last_visit: NaiveDate::from_ymd_opt(2026, 7, 20),
                condition_type: Some("post-op".to_string()),
                doctor_id: None,
            },
            TOKEN,
        )
        .await
        .unwrap();

    assert_eq!(patient.full_name, "Aoife Walsh");
}

#[tokio::test]
async fn update_patient_patches_only_provided_fields() {
    let server = MockServer::start().await;
    let registry = LoadingRegistry::new();

    let patient_id = Uuid::new_v4();

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/patients"))
        .and(query_param("id", format!("eq.{}", patient_id)))
        .and(wiremock::matchers::body_json(
            json!({ "condition_type": "cardiac" }),
        ))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([MockSupabaseResponses::patient_row("Mary Byrne")])),
        )
        .mount(&server)
        .await;

    let service = PatientDirectoryService::new(&config_for(&server), &registry);
    let update = PatientUpdate {
        condition_type: Some("cardiac".to_string()),
        ..Default::default()
    };

    let patient = service
        .update_patient(&patient_id.to_string(), &update, TOKEN)
        .await
        .unwrap();

    assert_eq!(patient.full_name, "Mary Byrne");
}

#[tokio::test]
async fn delete_patient_tolerates_an_empty_response_body() {
    let server = MockServer::start().await;
    let registry = LoadingRegistry::new();

    let patient_id = Uuid::new_v4();

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/patients"))
        .and(query_param("id", format!("eq.{}", patient_id)))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let service = PatientDirectoryService::new(&config_for(&server), &registry);
    service
        .delete_patient(&patient_id.to_string(), TOKEN)
        .await
        .unwrap();
}

#[tokio::test]
async fn follow_up_due_excludes_recently_called_patients() {
    let server = MockServer::start().await;
    let registry = LoadingRegistry::new();

    let called = MockSupabaseResponses::patient_row("Mary Byrne");
    let uncalled = MockSupabaseResponses::patient_row("Sean Murphy");
    let called_id = called["id"].clone();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([called, uncalled])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/calls"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "patient_id": called_id, "call_time": "2026-08-05T09:00:00Z" }
        ])))
        .mount(&server)
        .await;

    let service = PatientDirectoryService::new(&config_for(&server), &registry);
    let due = service.follow_up_due(TOKEN).await.unwrap();

    assert_eq!(due.len(), 1);
    assert_eq!(due[0].full_name, "Sean Murphy");
}

#[tokio::test]
async fn weekly_stats_aggregate_counts_and_risk() {
    let server = MockServer::start().await;
    let registry = LoadingRegistry::new();

    Mock::given(method("GET"))
        .and(path("/rest/v1/calls"))
        .and(header("Prefer", "count=exact"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("Content-Range", "0-0/42")
                .set_body_json(json!([])),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/symptom_reports"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "risk_level": "high", "escalate": true },
            { "risk_level": "low", "escalate": false },
            { "risk_level": "unknown", "escalate": false },
        ])))
        .mount(&server)
        .await;

    let service = DashboardStatsService::new(&config_for(&server), &registry);
    let stats = service.weekly_stats(TOKEN).await.unwrap();

    assert_eq!(stats.calls_last_7_days, 42);
    assert_eq!(stats.escalated_last_7_days, 1);
    // high=3, low=1; "unknown" is ignored.
    assert_eq!(stats.average_risk, Some(2.0));
}
