//! HTTP-level tests for `HttpLessonApi` against a local axum stand-in for the
//! lesson service.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use lesson_pipeline_core::domain::{
    LessonRequest, SessionId, SlideEdit, UdlPrinciple, UploadFile,
};
use lesson_pipeline_core::ports::{LessonApi, PortError};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use studio_lib::adapters::HttpLessonApi;

// ── Stand-in service ───────────────────────────────────────────

#[derive(Clone, Default)]
struct Received {
    form_fields: Arc<Mutex<BTreeMap<String, String>>>,
    json_bodies: Arc<Mutex<Vec<Value>>>,
}

fn lesson_json(title: &str) -> Value {
    json!({
        "title": title,
        "overview": null,
        "learning_objectives": ["Explain eruptions"],
        "slides": [
            { "title": "Opening", "content": "Hook", "notes": null },
            { "title": "Types", "content": "Shield, cinder, composite" }
        ],
        "udl_applied_principles": ["engagement"]
    })
}

async fn generate_baseline(State(received): State<Received>, mut multipart: Multipart) -> Json<Value> {
    let mut fields = BTreeMap::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        let value = match field.file_name() {
            Some(file_name) => {
                let content_type = field.content_type().unwrap_or_default().to_string();
                let file_name = file_name.to_string();
                let data = field.bytes().await.unwrap();
                format!("{file_name}|{content_type}|{}", data.len())
            }
            None => field.text().await.unwrap(),
        };
        fields.insert(name, value);
    }
    let title = fields.get("lesson_title").cloned().unwrap_or_default();
    *received.form_fields.lock().unwrap() = fields;
    Json(json!({ "session_id": "abc 123", "lesson_content": lesson_json(&title) }))
}

async fn get_session(Path(id): Path<String>) -> Response {
    match id.as_str() {
        "missing" => (
            StatusCode::NOT_FOUND,
            Json(json!({ "detail": "Lesson session not found" })),
        )
            .into_response(),
        "garbled" => (StatusCode::OK, "<html>not json</html>").into_response(),
        _ => Json(json!({
            "session_id": id,
            "stage": "engagement",
            "lesson_content": lesson_json("Volcanoes"),
            "available_next_stages": ["representation"]
        }))
        .into_response(),
    }
}

async fn edit_slide(State(received): State<Received>, Json(body): Json<Value>) -> Response {
    received.json_bodies.lock().unwrap().push(body.clone());
    if body["slide_index"].as_u64() >= Some(2) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "Invalid slide index" })),
        )
            .into_response();
    }
    Json(json!({ "success": true, "slide": { "title": body["title"], "content": body["content"] } }))
        .into_response()
}

async fn enhance_slide() -> Response {
    (StatusCode::BAD_GATEWAY, "<html>Bad Gateway</html>").into_response()
}

async fn apply_principle(State(received): State<Received>, Json(body): Json<Value>) -> Json<Value> {
    received.json_bodies.lock().unwrap().push(body);
    Json(json!({ "success": false, "message": "Principle already applied" }))
}

async fn export_lesson() -> Json<Value> {
    Json(json!({
        "success": true,
        "download_url": "/static/downloads/abc/lesson.pptx",
        "lesson_details": { "title": "Volcanoes", "stage": "action_expression", "slide_count": 2, "edits_made": 1 }
    }))
}

async fn delete_session() -> Json<Value> {
    Json(json!({ "success": true, "message": "Session deleted" }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "version": "1.0.0", "active_sessions": 3 }))
}

async fn spawn_service() -> (HttpLessonApi, Received) {
    let received = Received::default();
    let app = Router::new()
        .route("/api/generate-baseline", post(generate_baseline))
        .route(
            "/api/lesson-session/{id}",
            get(get_session).delete(delete_session),
        )
        .route("/api/edit-slide/{id}", post(edit_slide))
        .route("/api/ai-enhance-slide/{id}", post(enhance_slide))
        .route("/api/apply-udl-principle/{id}", post(apply_principle))
        .route("/api/export-lesson/{id}", post(export_lesson))
        .route("/api/health", get(health))
        .with_state(received.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let api = HttpLessonApi::new(format!("http://{addr}/api/"), Duration::from_secs(5)).unwrap();
    (api, received)
}

fn session(id: &str) -> SessionId {
    SessionId::new(id).unwrap()
}

fn request() -> LessonRequest {
    serde_json::from_value(json!({
        "topic": "Earth Science",
        "chapter": "Unit 3",
        "lesson_title": "Volcanoes",
        "course_level": "College Freshman",
        "learning_objectives": "Explain eruptions",
        "duration": "50 minutes",
        "complexity_level": 7
    }))
    .unwrap()
}

// ── Tests ───────────────────────────────────────────────────────

#[tokio::test]
async fn baseline_is_posted_as_multipart() {
    let (api, received) = spawn_service().await;
    assert!(api.base_url().ends_with("/api"));

    let upload = UploadFile::new("notes.pdf", "application/pdf", Bytes::from_static(b"%PDF-1.7"));
    let generated = api
        .generate_baseline(&request().with_file(upload))
        .await
        .unwrap();

    assert_eq!(generated.session_id.as_str(), "abc 123");
    assert_eq!(generated.lesson_content.title, "Volcanoes");
    assert_eq!(generated.lesson_content.slide_count(), 2);
    assert_eq!(generated.lesson_content.overview, "");
    assert_eq!(generated.lesson_content.slides[0].notes, "");

    let fields = received.form_fields.lock().unwrap().clone();
    assert_eq!(fields["grade_level"], "College Freshman");
    assert_eq!(fields["complexity_level"], "7");
    assert_eq!(fields["duration"], "50 minutes");
    assert_eq!(fields["file"], "notes.pdf|application/pdf|8");
}

#[tokio::test]
async fn invalid_baseline_request_is_not_sent() {
    let (api, received) = spawn_service().await;
    let mut request = request();
    request.chapter.clear();

    let err = api.generate_baseline(&request).await.unwrap_err();
    assert_eq!(
        err,
        PortError::Validation(vec!["Chapter/Unit is required".to_string()])
    );
    assert!(received.form_fields.lock().unwrap().is_empty());
}

#[tokio::test]
async fn session_ids_are_sent_as_one_path_segment() {
    let (api, _) = spawn_service().await;
    let snapshot = api.get_session(&session("abc 123")).await.unwrap();

    assert_eq!(snapshot.session_id.as_str(), "abc 123");
    assert_eq!(snapshot.stage, "engagement");
    assert_eq!(snapshot.available_next_stages, vec!["representation"]);
    assert!(snapshot.lesson_content.has_applied(UdlPrinciple::Engagement));
}

#[tokio::test]
async fn detail_message_becomes_the_error() {
    let (api, _) = spawn_service().await;
    let err = api.get_session(&session("missing")).await.unwrap_err();

    assert_eq!(
        err,
        PortError::Server {
            status: Some(404),
            message: "Lesson session not found".to_string(),
        }
    );
    assert!(err.is_client_error());
}

#[tokio::test]
async fn message_field_is_used_without_detail() {
    let (api, received) = spawn_service().await;
    let edit = SlideEdit {
        title: "Lava".to_string(),
        ..Default::default()
    };
    let err = api.edit_slide(&session("abc"), 4, &edit).await.unwrap_err();
    assert_eq!(err.to_string(), "Invalid slide index");
    assert!(err.is_client_error());

    let slide = api.edit_slide(&session("abc"), 1, &edit).await.unwrap();
    assert_eq!(slide.title, "Lava");

    let bodies = received.json_bodies.lock().unwrap().clone();
    assert_eq!(bodies[1]["slide_index"], 1);
    assert_eq!(bodies[1]["title"], "Lava");
    assert_eq!(bodies[1]["image_prompt"], "");
}

#[tokio::test]
async fn unreadable_error_body_falls_back_to_status() {
    let (api, _) = spawn_service().await;
    let err = api
        .ai_enhance_slide(&session("abc"), 0, "simplify")
        .await
        .unwrap_err();

    assert_eq!(
        err,
        PortError::Server {
            status: Some(502),
            message: "Server error: 502".to_string(),
        }
    );
    assert!(err.is_server_error());
}

#[tokio::test]
async fn unsuccessful_ok_body_is_a_server_error() {
    let (api, received) = spawn_service().await;
    let err = api
        .apply_udl_principle(&session("abc"), UdlPrinciple::ActionExpression, Some("Use labs"))
        .await
        .unwrap_err();

    assert!(matches!(
        &err,
        PortError::Server { status: Some(200), message } if message == "Principle already applied"
    ));
    let bodies = received.json_bodies.lock().unwrap().clone();
    assert_eq!(bodies[0]["principle"], "action_expression");
    assert_eq!(bodies[0]["custom_requirements"], "Use labs");
}

#[tokio::test]
async fn malformed_success_body_is_a_server_error() {
    let (api, _) = spawn_service().await;
    let err = api.get_session(&session("garbled")).await.unwrap_err();
    assert!(err.to_string().starts_with("Malformed response from server"));
    assert!(!err.is_network_error());
}

#[tokio::test]
async fn export_delete_and_health() {
    let (api, _) = spawn_service().await;
    let id = session("abc");

    let export = api.export_lesson(&id).await.unwrap();
    assert_eq!(export.download_url, "/static/downloads/abc/lesson.pptx");
    assert_eq!(export.lesson_details.map(|d| d.edits_made), Some(1));

    api.delete_session(&id).await.unwrap();

    let health = api.health_check().await.unwrap();
    assert!(health.is_healthy());
    assert_eq!(health.active_sessions, Some(3));
}

#[tokio::test]
async fn unreachable_service_is_a_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let api = HttpLessonApi::new(format!("http://{addr}/api"), Duration::from_secs(2)).unwrap();
    let err = api.health_check().await.unwrap_err();
    assert_eq!(
        err,
        PortError::Transport(
            "No response from server. Please check your connection and try again.".to_string()
        )
    );
    assert!(err.is_network_error());
}
