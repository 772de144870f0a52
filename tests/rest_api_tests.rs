//! REST-backed store and registry against wiremock servers: deterministic
//! HTTP mocking for the screening backend, covering the retry and
//! authentication paths without touching a network.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use screenflow::{
    ApiClient, ApiError, PatientsHandler, RegistrationGate, RestPatientRegistry, RestSessionStore,
    RetryConfig, ScreeningStep, SessionStatus, SessionStore, SessionsHandler, StaticCredentials,
    StoreError, Student, WorkflowSession, FALLBACK_EMAIL, FALLBACK_PHONE,
};

fn client(server: &MockServer) -> ApiClient {
    ApiClient::new(
        server.uri(),
        Arc::new(StaticCredentials::new("mock-token")),
    )
    .unwrap()
}

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        jitter: false,
    }
}

fn store(server: &MockServer) -> RestSessionStore {
    RestSessionStore::new(SessionsHandler::new(client(server))).with_retry(fast_retry())
}

fn student(id: &str) -> Student {
    Student {
        id: id.to_string(),
        name: "Test Student".to_string(),
        date_of_birth: NaiveDate::from_ymd_opt(2014, 6, 1),
        school: Some("Ban Nong Bua School".to_string()),
        grade: Some("P4".to_string()),
        citizen_id: Some("110170020000".to_string()),
        consent: true,
        screening_status: None,
    }
}

/// Session JSON exactly as the store would return it: the submitted
/// document plus an assigned id.
fn stored_session_json(session: &WorkflowSession, session_id: &str) -> serde_json::Value {
    let mut value = serde_json::to_value(session).unwrap();
    value["session_id"] = json!(session_id);
    value
}

#[tokio::test]
async fn first_save_creates_and_adopts_the_assigned_id() {
    let server = MockServer::start().await;
    let session = WorkflowSession::new();

    Mock::given(method("POST"))
        .and(path("/screening-sessions"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(stored_session_json(&session, "SESS-9")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let stored = store(&server).save_progress(&session).await.unwrap();
    assert_eq!(stored.session_id.as_deref(), Some("SESS-9"));
}

#[tokio::test]
async fn later_saves_update_the_existing_document() {
    let server = MockServer::start().await;
    let mut session = WorkflowSession::new();
    session.session_id = Some("SESS-9".to_string());

    Mock::given(method("PUT"))
        .and(path("/screening-sessions/SESS-9"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(stored_session_json(&session, "SESS-9")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let stored = store(&server).save_progress(&session).await.unwrap();
    assert_eq!(stored.session_id.as_deref(), Some("SESS-9"));
}

#[tokio::test]
async fn transient_server_errors_are_retried_until_success() {
    let server = MockServer::start().await;
    let session = WorkflowSession::new();

    // Two failures, then the store recovers.
    Mock::given(method("POST"))
        .and(path("/screening-sessions"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/screening-sessions"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(stored_session_json(&session, "SESS-1")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let stored = store(&server).save_progress(&session).await.unwrap();
    assert_eq!(stored.session_id.as_deref(), Some("SESS-1"));
}

#[tokio::test]
async fn exhausted_retries_surface_the_server_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/screening-sessions"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let err = store(&server)
        .save_progress(&WorkflowSession::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Api(ApiError::Server { status: 500, .. })
    ));
}

#[tokio::test]
async fn unauthorized_fails_fast_without_retry() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/screening-sessions"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let err = store(&server)
        .save_progress(&WorkflowSession::new())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Api(ApiError::Unauthorized)));
}

#[tokio::test]
async fn load_reattaches_at_the_persisted_step() {
    let server = MockServer::start().await;
    let mut session = WorkflowSession::new();
    session.session_id = Some("SESS-9".to_string());
    session.current_step = ScreeningStep::DoctorDiagnosis;

    Mock::given(method("GET"))
        .and(path("/screening-sessions/SESS-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::to_value(&session).unwrap()))
        .mount(&server)
        .await;

    let loaded = store(&server).load_session("SESS-9").await.unwrap();
    assert_eq!(loaded.current_step, ScreeningStep::DoctorDiagnosis);
    assert_eq!(loaded.current_step.index(), 4);
    assert_eq!(loaded.status, SessionStatus::InProgress);
}

#[tokio::test]
async fn out_of_range_step_index_is_reported_as_corruption() {
    let server = MockServer::start().await;
    let mut value = serde_json::to_value(WorkflowSession::new()).unwrap();
    value["session_id"] = json!("SESS-9");
    value["current_step"] = json!(99);

    Mock::given(method("GET"))
        .and(path("/screening-sessions/SESS-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(value))
        .mount(&server)
        .await;

    let err = store(&server).load_session("SESS-9").await.unwrap_err();
    assert!(matches!(err, StoreError::Corrupt { .. }));
}

#[tokio::test]
async fn completing_marks_the_stored_document_completed() {
    let server = MockServer::start().await;
    let mut session = WorkflowSession::new();
    session.session_id = Some("SESS-9".to_string());
    session.current_step = ScreeningStep::SchoolDelivery;

    let mut terminal = session.clone();
    terminal.status = SessionStatus::Completed;
    Mock::given(method("PUT"))
        .and(path("/screening-sessions/SESS-9"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::to_value(&terminal).unwrap()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let stored = store(&server).complete_session(&session).await.unwrap();
    assert_eq!(stored.status, SessionStatus::Completed);
}

#[tokio::test]
async fn gate_over_rest_creates_once_and_then_reuses() {
    let server = MockServer::start().await;
    let patient = json!({
        "id": "P1",
        "student_id": "S1",
        "name": "Test Student",
        "date_of_birth": "2014-06-01",
        "phone": FALLBACK_PHONE,
        "email": FALLBACK_EMAIL,
    });

    // First lookup finds nothing, so the gate creates.
    Mock::given(method("GET"))
        .and(path("/patients"))
        .and(query_param("student_id", "S1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/patients/from-student/S1"))
        .respond_with(ResponseTemplate::new(201).set_body_json(patient.clone()))
        .expect(1)
        .mount(&server)
        .await;
    // Second lookup returns the existing patient; no second creation.
    Mock::given(method("GET"))
        .and(path("/patients"))
        .and(query_param("student_id", "S1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([patient])))
        .mount(&server)
        .await;

    let gate = RegistrationGate::new(Box::new(RestPatientRegistry::new(PatientsHandler::new(
        client(&server),
    ))));

    let first = gate.ensure_patient(&student("S1")).await.unwrap();
    let second = gate.ensure_patient(&student("S1")).await.unwrap();

    assert_eq!(first.id, "P1");
    assert_eq!(second.id, "P1");
    assert_eq!(first.phone.as_deref(), Some(FALLBACK_PHONE));
    assert_eq!(first.email.as_deref(), Some(FALLBACK_EMAIL));
}
