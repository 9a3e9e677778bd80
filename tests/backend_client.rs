use axum::extract::{ Path, Query, State };
use axum::http::{ HeaderMap, StatusCode };
use axum::routing::{ get, patch, post };
use axum::{ Json, Router };
use ecovoice::backend::admin::load_dashboard;
use ecovoice::backend::{ BackendConfig, BackendError, HttpBackend, ReportingBackend };
use ecovoice::models::backend::{
    ContactSubmission,
    IncidentType,
    Language,
    ReportStatus,
    ReportSubmission,
};
use serde_json::{ json, Value };
use std::collections::HashMap;
use std::sync::{ Arc, Mutex };
use std::time::Duration;

#[derive(Default)]
struct Recorded {
    bodies: Vec<(String, Value)>,
    auth: Vec<Option<String>>,
    status_updates: Vec<(String, String)>,
    demo_calls: usize,
}

type Shared = Arc<Mutex<Recorded>>;

fn remember_auth(state: &Shared, headers: &HeaderMap) {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    state.lock().unwrap().auth.push(auth);
}

fn report_json(id: &str, status: &str) -> Value {
    json!({
        "id": id,
        "reporter_name": "Lito",
        "description": "Plastic waste on the shore",
        "location": "Iloilo",
        "latitude": 10.7,
        "longitude": 122.5,
        "incident_type": "Coastal Damage",
        "language": "fil",
        "trust_score": 81,
        "status": status,
        "ai_classification": null,
        "photo_urls": [],
        "created_at": "2025-12-22T08:00:00",
        "updated_at": "2025-12-22T08:00:00"
    })
}

async fn spawn_backend() -> (String, Shared) {
    let state: Shared = Arc::default();

    let app = Router::new()
        .route(
            "/api/reports",
            post(|State(s): State<Shared>, headers: HeaderMap, Json(body): Json<Value>| async move {
                remember_auth(&s, &headers);
                s.lock().unwrap().bodies.push(("report".into(), body));
                Json(json!({ "id": "9d2f61aa-0c3e-4f7e-9a51", "trust_score": 72.5, "status": "pending_verification" }))
            }).get(|State(s): State<Shared>, headers: HeaderMap| async move {
                remember_auth(&s, &headers);
                Json(json!((1..=7).map(|i| report_json(&format!("r{}", i), "verified")).collect::<Vec<_>>()))
            })
        )
        .route(
            "/api/contact",
            post(|State(s): State<Shared>, Json(body): Json<Value>| async move {
                s.lock().unwrap().bodies.push(("contact".into(), body));
                Json(json!({ "ok": true }))
            })
        )
        .route(
            "/api/contacts",
            get(|| async {
                Json(json!((1..=4).map(|i| json!({
                    "id": format!("c{}", i),
                    "name": "Maria",
                    "email": "maria@example.org",
                    "organization": null,
                    "message": "Can we partner?",
                    "created_at": "2025-12-22T09:00:00",
                    "status": "unread"
                })).collect::<Vec<_>>()))
            })
        )
        .route(
            "/api/stats",
            get(|| async {
                Json(json!({
                    "total_reports": 7,
                    "verified_reports": 7,
                    "pending_reports": 0,
                    "resolved_reports": 0,
                    "total_contacts": 4,
                    "incident_types": { "Coastal Damage": 7 }
                }))
            })
        )
        .route(
            "/api/reports/{id}/status",
            patch(|State(s): State<Shared>, Path(id): Path<String>, Query(q): Query<HashMap<String, String>>| async move {
                let status = q.get("status").cloned().unwrap_or_default();
                s.lock().unwrap().status_updates.push((id, status));
                Json(json!({ "ok": true }))
            })
        )
        .route(
            "/api/demo/populate",
            post(|State(s): State<Shared>| async move {
                s.lock().unwrap().demo_calls += 1;
                StatusCode::NO_CONTENT
            })
        )
        .with_state(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), state)
}

fn client(base_url: &str, token: Option<&str>) -> HttpBackend {
    HttpBackend::new(BackendConfig {
        base_url: base_url.to_string(),
        token: token.map(String::from),
        timeout: Duration::from_secs(5),
    }).unwrap()
}

#[tokio::test]
async fn submits_report_with_form_body() {
    let (url, state) = spawn_backend().await;
    let backend = client(&url, None);

    let receipt = backend
        .submit_report(
            &(ReportSubmission {
                reporter_name: "Ana".into(),
                reporter_phone: "+63 900 000 0000".into(),
                description: "Logs being hauled at night".into(),
                location: "Sierra Madre".into(),
                incident_type: IncidentType::IllegalLogging,
                language: Language::Fil,
            })
        ).await
        .unwrap();

    assert_eq!(receipt.short_id(), "9d2f61aa");
    assert_eq!(receipt.trust_score, 72.5);

    let recorded = state.lock().unwrap();
    let (kind, body) = &recorded.bodies[0];
    assert_eq!(kind, "report");
    assert_eq!(
        body,
        &json!({
            "reporter_name": "Ana",
            "reporter_phone": "+63 900 000 0000",
            "description": "Logs being hauled at night",
            "location": "Sierra Madre",
            "incident_type": "Illegal Logging",
            "language": "fil"
        })
    );
    assert_eq!(recorded.auth, vec![None]);
}

#[tokio::test]
async fn submits_contact_message() {
    let (url, state) = spawn_backend().await;
    let backend = client(&url, None);

    backend
        .submit_contact(
            &(ContactSubmission {
                name: "Jun".into(),
                email: "jun@example.org".into(),
                organization: "Save the Reefs".into(),
                message: "We'd like a demo".into(),
            })
        ).await
        .unwrap();

    let recorded = state.lock().unwrap();
    assert_eq!(recorded.bodies[0].0, "contact");
    assert_eq!(recorded.bodies[0].1["organization"], "Save the Reefs");
}

#[tokio::test]
async fn admin_calls_carry_bearer_token() {
    let (url, state) = spawn_backend().await;
    let backend = client(&url, Some("tok-123"));

    let reports = backend.list_reports().await.unwrap();
    assert_eq!(reports.len(), 7);
    assert_eq!(reports[0].status(), Some(ReportStatus::Verified));
    assert_eq!(reports[0].latitude, Some(10.7));

    assert_eq!(state.lock().unwrap().auth, vec![Some("Bearer tok-123".to_string())]);
}

#[tokio::test]
async fn status_update_uses_query_parameter() {
    let (url, state) = spawn_backend().await;
    let backend = client(&url, None);

    backend.update_report_status("r3", ReportStatus::InProgress).await.unwrap();
    backend.update_report_status("r/4?x", ReportStatus::Rejected).await.unwrap();
    backend.populate_demo().await.unwrap();

    let recorded = state.lock().unwrap();
    assert_eq!(
        recorded.status_updates,
        vec![
            ("r3".to_string(), "in_progress".to_string()),
            ("r/4?x".to_string(), "rejected".to_string())
        ]
    );
    assert_eq!(recorded.demo_calls, 1);
}

#[tokio::test]
async fn dashboard_keeps_recent_items_only() {
    let (url, _state) = spawn_backend().await;
    let backend = client(&url, None);

    let dashboard = load_dashboard(&backend).await.unwrap();
    assert_eq!(dashboard.stats.total_reports, 7);
    assert_eq!(dashboard.stats.incident_types.get("Coastal Damage"), Some(&7));
    assert_eq!(dashboard.recent_reports.len(), 5);
    assert_eq!(dashboard.recent_contacts.len(), 3);
    assert_eq!(dashboard.recent_contacts[0].organization, None);
}

#[tokio::test]
async fn non_success_status_is_a_failure() {
    let app = Router::new().route(
        "/api/contact",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "database down") })
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let backend = client(&format!("http://{}", addr), None);
    let err = backend
        .submit_contact(
            &(ContactSubmission {
                name: "Jun".into(),
                email: "jun@example.org".into(),
                organization: String::new(),
                message: "Hello".into(),
            })
        ).await
        .unwrap_err();

    match err {
        BackendError::Status { status, body, .. } => {
            assert_eq!(status.as_u16(), 500);
            assert_eq!(body, "database down");
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn unreachable_backend_is_reported() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let backend = client(&format!("http://{}", addr), None);
    let err = backend.stats().await.unwrap_err();
    assert!(matches!(err, BackendError::Unreachable { .. }));
    assert!(err.to_string().contains("Make sure the backend is running"));
}
