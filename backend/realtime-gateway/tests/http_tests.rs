use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use base64::{engine::general_purpose, Engine as _};
use quiz_realtime_gateway::create_router;
use quiz_realtime_gateway::models::{ServerEvent, UserRole};
use serde_json::{json, Value};
use tower::ServiceExt;

mod common;

use common::Harness;

fn app(harness: &Harness) -> Router {
    create_router(harness.state.clone())
}

async fn get(app: &Router, uri: &str, token: Option<&str>) -> Response {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    app.clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn post_json(app: &Router, uri: &str, token: &str, body: Value) -> Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("authorization", format!("Bearer {}", token))
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn body_json(response: Response) -> Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn ws_handshake_without_token_is_unauthorized() {
    let harness = Harness::new();
    let response = get(&app(&harness), "/ws", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(harness.state.presence.count(), 0);
}

#[tokio::test]
async fn ws_handshake_with_bad_token_is_unauthorized() {
    let harness = Harness::new();
    let app = app(&harness);

    let response = get(&app, "/ws", Some("garbage")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = get(&app, "/ws?token=garbage", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn ws_handshake_for_unknown_user_is_unauthorized() {
    let harness = Harness::new();
    let token = harness.token_for("ghost", "student");
    let response = get(&app(&harness), &format!("/ws?token={}", token), None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn ws_handshake_with_valid_query_token_passes_auth() {
    let harness = Harness::new();
    harness.add_user("s1", UserRole::Student);
    let token = harness.token_for("s1", "student");

    // No upgrade headers here, so the request fails after authentication
    let response = get(&app(&harness), &format!("/ws?token={}", token), None).await;
    assert_ne!(response.status(), StatusCode::UNAUTHORIZED);
    assert_ne!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn presence_list_requires_supervisor() {
    let harness = Harness::new();
    let student = harness.add_user("s1", UserRole::Student);
    let _client = harness.connect(&student);
    let app = app(&harness);

    let response = get(&app, "/api/v1/presence", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let student_token = harness.token_for("s1", "student");
    let response = get(&app, "/api/v1/presence", Some(&student_token)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let teacher_token = harness.token_for("t1", "teacher");
    let response = get(&app, "/api/v1/presence", Some(&teacher_token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["users"][0]["id"], "s1");
    assert_eq!(body["users"][0]["role"], "student");
}

#[tokio::test]
async fn single_user_presence_lookup() {
    let harness = Harness::new();
    let student = harness.add_user("s1", UserRole::Student);
    let _client = harness.connect(&student);
    let token = harness.token_for("s2", "student");
    let app = app(&harness);

    let body = body_json(get(&app, "/api/v1/presence/s1", Some(&token)).await).await;
    assert_eq!(body, json!({ "userId": "s1", "online": true }));

    let body = body_json(get(&app, "/api/v1/presence/nobody", Some(&token)).await).await;
    assert_eq!(body["online"], false);
}

#[tokio::test]
async fn notification_is_pushed_to_every_device_of_recipient() {
    let harness = Harness::new();
    let student = harness.add_user("s1", UserRole::Student);
    let mut phone = harness.connect(&student);
    let mut laptop = harness.connect(&student);
    phone.drain();
    laptop.drain();
    let token = harness.token_for("t1", "teacher");

    let response = post_json(
        &app(&harness),
        "/api/v1/broadcasts/notification",
        &token,
        json!({
            "id": "n-1",
            "recipientId": "s1",
            "title": "Graded",
            "message": "Your quiz was graded",
            "createdAt": "2026-01-10T10:00:00Z"
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = body_json(response).await;
    assert_eq!(body["event"], "new_notification");
    assert_eq!(body["delivered"], 2);
    assert_eq!(phone.drain_named("new_notification").len(), 1);
    assert_eq!(laptop.drain_named("new_notification").len(), 1);
}

#[tokio::test]
async fn invalid_notification_is_rejected() {
    let harness = Harness::new();
    let token = harness.token_for("t1", "teacher");

    let response = post_json(
        &app(&harness),
        "/api/v1/broadcasts/notification",
        &token,
        json!({
            "id": "n-1",
            "recipientId": "s1",
            "title": "",
            "message": "empty title",
            "createdAt": "2026-01-10T10:00:00Z"
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = post_json(
        &app(&harness),
        "/api/v1/broadcasts/notification",
        &token,
        json!({ "unexpected": true }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn announcement_is_admin_only_and_reaches_everyone() {
    let harness = Harness::new();
    let student = harness.add_user("s1", UserRole::Student);
    let teacher = harness.add_user("t1", UserRole::Teacher);
    let mut student_client = harness.connect(&student);
    let mut teacher_client = harness.connect(&teacher);
    student_client.drain();
    teacher_client.drain();
    let app = app(&harness);
    let announcement = json!({ "title": "Maintenance", "message": "Back at 10:00", "priority": "high" });

    let response = post_json(
        &app,
        "/api/v1/broadcasts/announcement",
        &harness.token_for("t1", "teacher"),
        announcement.clone(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = post_json(
        &app,
        "/api/v1/broadcasts/announcement",
        &harness.token_for("a1", "admin"),
        announcement,
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(student_client.drain_named("system_announcement").len(), 1);
    assert_eq!(teacher_client.drain_named("system_announcement").len(), 1);
}

#[tokio::test]
async fn dashboard_update_reaches_admins_only() {
    let harness = Harness::new();
    let admin = harness.add_user("a1", UserRole::Admin);
    let teacher = harness.add_user("t1", UserRole::Teacher);
    let mut admin_client = harness.connect(&admin);
    let mut teacher_client = harness.connect(&teacher);
    admin_client.drain();
    teacher_client.drain();

    let response = post_json(
        &app(&harness),
        "/api/v1/broadcasts/dashboard",
        &harness.token_for("a1", "admin"),
        json!({ "activeAttempts": 12 }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let updates = admin_client.drain_named("dashboard_update");
    assert!(matches!(&updates[..], [ServerEvent::DashboardUpdate(v)] if v["activeAttempts"] == 12));
    assert!(teacher_client.drain().is_empty());
}

#[tokio::test]
async fn quiz_started_reaches_students_and_quiz_watchers() {
    let harness = Harness::new();
    let student = harness.add_user("s1", UserRole::Student);
    let teacher = harness.add_user("t1", UserRole::Teacher);
    let other_teacher = harness.add_user("t2", UserRole::Teacher);
    let mut student_client = harness.connect(&student);
    let mut watcher = harness.connect(&teacher);
    let mut bystander = harness.connect(&other_teacher);
    harness
        .state
        .gateway
        .handle_text(&watcher.session, r#"{"event":"join_quiz","data":"quiz-7"}"#)
        .await;
    student_client.drain();
    watcher.drain();
    bystander.drain();

    let response = post_json(
        &app(&harness),
        "/api/v1/broadcasts/quiz",
        &harness.token_for("t1", "teacher"),
        json!({ "kind": "started", "quizId": "quiz-7", "title": "Capitals" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let started = student_client.drain_named("quiz_started");
    assert!(matches!(&started[..], [ServerEvent::QuizStarted(q)] if q.quiz_id == "quiz-7"));
    assert_eq!(watcher.drain_named("quiz_started").len(), 1);
    assert!(bystander.drain().is_empty());
}

#[tokio::test]
async fn health_reports_online_users() {
    let harness = Harness::new();
    let student = harness.add_user("s1", UserRole::Student);
    let _client = harness.connect(&student);

    let response = get(&app(&harness), "/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["usersOnline"], 1);
    assert_eq!(body["dependencies"]["mongodb"]["status"], "not_configured");
}

#[tokio::test]
#[serial_test::serial]
async fn metrics_require_basic_auth() {
    std::env::set_var("METRICS_AUTH", "ops:secret");
    let harness = Harness::new();
    let app = app(&harness);

    let response = get(&app, "/metrics", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let credentials = general_purpose::STANDARD.encode("ops:secret");
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .header("authorization", format!("Basic {}", credentials))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    std::env::remove_var("METRICS_AUTH");
}
