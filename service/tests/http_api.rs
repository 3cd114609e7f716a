use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use inkwell_service::domain::publication::{PublicationOptions, PublicationService};
use inkwell_service::infrastructure::AppStateImpl;
use inkwell_service::infrastructure::delivery::LoggingDeliveryNotifier;
use inkwell_service::infrastructure::http::router;
use inkwell_service::infrastructure::persistence::MemoryContentRepository;
use serde_json::{Value, json};
use tower::ServiceExt;

fn app() -> Router {
    let publication = PublicationService::new(
        MemoryContentRepository::new(),
        LoggingDeliveryNotifier,
        PublicationOptions::default(),
    );
    router(AppStateImpl::new(Arc::new(publication)))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if body_bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap()
    };
    (status, body)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method(method)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str, tier: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(tier) = tier {
        builder = builder.header("x-membership-tier", tier);
    }
    builder.body(Body::empty()).unwrap()
}

async fn create(app: &Router, body: Value) -> String {
    let (status, created) = send(app, json_request("POST", "/api/content", body)).await;
    assert_eq!(status, StatusCode::CREATED);
    created["id"].as_str().unwrap().to_string()
}

async fn transition(app: &Router, id: &str, body: Value) -> (StatusCode, Value) {
    send(
        app,
        json_request("POST", &format!("/api/content/{id}/transitions"), body),
    )
    .await
}

#[tokio::test]
async fn test_health_check() {
    let (status, _) = send(&app(), get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_create_returns_draft() {
    let app = app();
    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/content",
            json!({ "title": "  Hello  ", "body": "<p>hi</p>", "visibility": "members_only" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["title"], "Hello");
    assert_eq!(body["kind"], "post");
    assert_eq!(body["status"], "draft");
    assert_eq!(body["visibility"], "members_only");
    assert_eq!(body["deliveryIntent"], "publish_only");
    assert_eq!(body["scheduledAt"], Value::Null);
}

#[tokio::test]
async fn test_create_rejects_invalid_input() {
    let app = app();

    let (status, _) = send(
        &app,
        json_request("POST", "/api/content", json!({ "title": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/content",
            json!({ "kind": "page", "title": "About", "deliveryIntent": "email_only" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["status_code"], 422);
}

#[tokio::test]
async fn test_schedule_is_clamped_and_revert_clears_it() {
    let app = app();
    let id = create(&app, json!({ "title": "Soon" })).await;

    let (status, body) = transition(
        &app,
        &id,
        json!({ "action": "schedule", "at": "2001-01-01T00:00:00Z" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "scheduled");
    let scheduled_at: chrono::DateTime<chrono::Utc> =
        serde_json::from_value(body["scheduledAt"].clone()).unwrap();
    assert!(scheduled_at > chrono::Utc::now());

    let (status, body) = transition(&app, &id, json!({ "action": "revert_to_draft" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "draft");
    assert_eq!(body["scheduledAt"], Value::Null);
}

#[tokio::test]
async fn test_transition_errors() {
    let app = app();
    let id = create(&app, json!({ "title": "Errors" })).await;

    let (status, _) = transition(&app, &id, json!({ "action": "revert_to_draft" })).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = transition(&app, &id, json!({ "action": "schedule", "at": "soon" })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let missing = uuid_like();
    let (status, _) = transition(&app, &missing, json!({ "action": "publish" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = transition(&app, "not-an-id", json!({ "action": "publish" })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_reader_sees_only_published_content() {
    let app = app();
    let id = create(&app, json!({ "title": "Draft only", "body": "secret" })).await;

    let (status, _) = send(&app, get(&format!("/content/{id}"), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, get(&format!("/content/{}", uuid_like()), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, get("/content/whatever", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = transition(&app, &id, json!({ "action": "publish" })).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, get(&format!("/content/{id}"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["access"], "allowed");
    assert_eq!(body["body"], "secret");
}

#[tokio::test]
async fn test_paid_content_is_a_teaser_for_lower_tiers() {
    let app = app();
    let id = create(
        &app,
        json!({
            "title": "Premium",
            "body": "the good stuff",
            "excerpt": "a taste",
            "visibility": "paid_members_only"
        }),
    )
    .await;
    transition(&app, &id, json!({ "action": "publish" })).await;

    let (status, teaser) = send(&app, get(&format!("/content/{id}"), Some("free"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(teaser["access"], "upgrade_required");
    assert_eq!(teaser["excerpt"], "a taste");
    assert!(teaser.get("body").is_none());

    let (_, full) = send(&app, get(&format!("/content/{id}"), Some("paid"))).await;
    assert_eq!(full["access"], "allowed");
    assert_eq!(full["body"], "the good stuff");
}

#[tokio::test]
async fn test_patch_edits_and_clears_excerpt() {
    let app = app();
    let id = create(&app, json!({ "title": "Patchable", "excerpt": "old" })).await;
    let uri = format!("/api/content/{id}");

    let (status, body) = send(
        &app,
        json_request("PATCH", &uri, json!({ "title": "Patched", "excerpt": null })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Patched");
    assert_eq!(body["excerpt"], Value::Null);
    assert_eq!(body["version"], 2);

    let (status, _) = send(&app, json_request("PATCH", &uri, json!({}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_delete_then_get_is_not_found() {
    let app = app();
    let id = create(&app, json!({ "title": "Short lived" })).await;
    let uri = format!("/api/content/{id}");

    let request = Request::builder()
        .uri(&uri)
        .method("DELETE")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, get(&uri, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_feed_omits_drafts_and_withheld_bodies() {
    let app = app();
    let public = create(&app, json!({ "title": "Open", "body": "for all" })).await;
    let members = create(
        &app,
        json!({ "title": "Members", "body": "for members", "visibility": "members_only" }),
    )
    .await;
    create(&app, json!({ "title": "Unreleased" })).await;
    transition(&app, &public, json!({ "action": "publish" })).await;
    transition(&app, &members, json!({ "action": "publish" })).await;

    let (status, feed) = send(&app, get("/content", None)).await;
    assert_eq!(status, StatusCode::OK);
    let feed = feed.as_array().unwrap();
    assert_eq!(feed.len(), 2);

    let members_entry = feed.iter().find(|e| e["id"] == members.as_str()).unwrap();
    assert_eq!(members_entry["access"], "upgrade_required");
    assert!(members_entry.get("body").is_none());

    let public_entry = feed.iter().find(|e| e["id"] == public.as_str()).unwrap();
    assert_eq!(public_entry["body"], "for all");
}

fn uuid_like() -> String {
    "6f1c1d2e-3b4a-4c5d-8e9f-0a1b2c3d4e5f".to_string()
}
