use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use critiq::config::Config;
use critiq::db::BOOTSTRAP_ADMIN_TOKEN;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use tower::ServiceExt;

async fn spawn_app() -> (Router, PathBuf) {
    let outbox = std::env::temp_dir().join(format!("critiq-test-{}", uuid::Uuid::new_v4()));

    let mut config = Config::default();
    config.database.url = "sqlite::memory:".to_string();
    config.mail.outbox_path = outbox.to_string_lossy().to_string();
    config.observability.metrics_enabled = false;

    let state = critiq::api::create_app_state_from_config(config, None)
        .await
        .expect("Failed to create app state");
    (critiq::api::router(state), outbox)
}

fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    match body {
        Some(v) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn read_confirmation_code(outbox: &Path, email: &str) -> String {
    let mut newest: Option<(std::time::SystemTime, String)> = None;
    for entry in std::fs::read_dir(outbox).expect("outbox directory should exist") {
        let entry = entry.unwrap();
        let content = std::fs::read_to_string(entry.path()).unwrap();
        if !content.contains(&format!("To: {email}")) {
            continue;
        }
        let modified = entry.metadata().unwrap().modified().unwrap();
        if newest.as_ref().is_none_or(|(t, _)| modified >= *t) {
            newest = Some((modified, content));
        }
    }

    let (_, content) = newest.expect("no outbox message for recipient");
    content
        .split_whitespace()
        .next_back()
        .expect("empty outbox message")
        .to_string()
}

async fn signup_and_token(app: &Router, outbox: &Path, username: &str, email: &str) -> String {
    let (status, _) = send(
        app,
        request(
            "POST",
            "/v1/auth/signup/",
            None,
            Some(json!({"username": username, "email": email})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let code = read_confirmation_code(outbox, email);
    let (status, body) = send(
        app,
        request(
            "POST",
            "/v1/auth/token/",
            None,
            Some(json!({"username": username, "confirmation_code": code})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["token"].as_str().unwrap().to_string()
}

async fn create_title(app: &Router, name: &str) -> i64 {
    let (status, body) = send(
        app,
        request(
            "POST",
            "/v1/titles/",
            Some(BOOTSTRAP_ADMIN_TOKEN),
            Some(json!({"name": name, "year": 2020})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_review_lifecycle_and_rating() {
    let (app, outbox) = spawn_app().await;

    let title_id = create_title(&app, "Dune").await;
    let alice = signup_and_token(&app, &outbox, "alice", "alice@example.com").await;
    let bob = signup_and_token(&app, &outbox, "bob", "bob@example.com").await;

    // Anonymous callers can read but not write.
    let (status, body) = send(
        &app,
        request("GET", &format!("/v1/titles/{title_id}/reviews/"), None, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);

    let (status, _) = send(
        &app,
        request(
            "POST",
            &format!("/v1/titles/{title_id}/reviews/"),
            None,
            Some(json!({"text": "great", "score": 8})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Scores live on a 1 to 10 scale.
    for score in [0, 11] {
        let (status, _) = send(
            &app,
            request(
                "POST",
                &format!("/v1/titles/{title_id}/reviews/"),
                Some(&alice),
                Some(json!({"text": "out of range", "score": score})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    let (status, body) = send(
        &app,
        request(
            "POST",
            &format!("/v1/titles/{title_id}/reviews/"),
            Some(&alice),
            Some(json!({"text": "A spice odyssey", "score": 5})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["author"], "alice");
    let review_id = body["id"].as_i64().unwrap();

    // One review per title per author.
    let (status, body) = send(
        &app,
        request(
            "POST",
            &format!("/v1/titles/{title_id}/reviews/"),
            Some(&alice),
            Some(json!({"text": "second thoughts", "score": 9})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "conflict");

    let (status, _) = send(
        &app,
        request(
            "POST",
            &format!("/v1/titles/{title_id}/reviews/"),
            Some(&bob),
            Some(json!({"text": "masterpiece", "score": 10})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // Rating is the mean of current scores.
    let (status, body) = send(
        &app,
        request("GET", &format!("/v1/titles/{title_id}/"), None, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rating"], 7.5);

    // Editing is allowed and re-reads reflect it; no duplicate check on update.
    let (status, body) = send(
        &app,
        request(
            "PATCH",
            &format!("/v1/titles/{title_id}/reviews/{review_id}/"),
            Some(&alice),
            Some(json!({"score": 6})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["score"], 6);

    let (status, body) = send(
        &app,
        request("GET", &format!("/v1/titles/{title_id}/"), None, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rating"], 8.0);

    let _ = std::fs::remove_dir_all(&outbox);
}

#[tokio::test]
async fn test_review_permissions() {
    let (app, outbox) = spawn_app().await;

    let title_id = create_title(&app, "Solaris").await;
    let alice = signup_and_token(&app, &outbox, "alice", "alice@example.com").await;
    let bob = signup_and_token(&app, &outbox, "bob", "bob@example.com").await;
    let mod_token = signup_and_token(&app, &outbox, "mia", "mia@example.com").await;
    let (status, _) = send(
        &app,
        request(
            "PATCH",
            "/v1/users/mia/",
            Some(BOOTSTRAP_ADMIN_TOKEN),
            Some(json!({"role": "moderator"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        request(
            "POST",
            &format!("/v1/titles/{title_id}/reviews/"),
            Some(&alice),
            Some(json!({"text": "haunting", "score": 9})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let review_id = body["id"].as_i64().unwrap();

    // Another plain user cannot touch it.
    let (status, body) = send(
        &app,
        request(
            "PATCH",
            &format!("/v1/titles/{title_id}/reviews/{review_id}/"),
            Some(&bob),
            Some(json!({"score": 1})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["kind"], "permission_denied");

    let (status, _) = send(
        &app,
        request(
            "DELETE",
            &format!("/v1/titles/{title_id}/reviews/{review_id}/"),
            Some(&bob),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Moderators may edit and delete any review.
    let (status, _) = send(
        &app,
        request(
            "PATCH",
            &format!("/v1/titles/{title_id}/reviews/{review_id}/"),
            Some(&mod_token),
            Some(json!({"text": "moderated"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        request(
            "DELETE",
            &format!("/v1/titles/{title_id}/reviews/{review_id}/"),
            Some(&mod_token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(
        &app,
        request("GET", &format!("/v1/titles/{title_id}/"), None, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["rating"].is_null());

    let _ = std::fs::remove_dir_all(&outbox);
}

#[tokio::test]
async fn test_reviews_scoped_to_existing_title() {
    let (app, outbox) = spawn_app().await;

    let alice = signup_and_token(&app, &outbox, "alice", "alice@example.com").await;

    let (status, body) = send(
        &app,
        request("GET", "/v1/titles/999/reviews/", None, None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");

    let (status, _) = send(
        &app,
        request(
            "POST",
            "/v1/titles/999/reviews/",
            Some(&alice),
            Some(json!({"text": "into the void", "score": 5})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // A review id under the wrong title does not resolve.
    let title_a = create_title(&app, "Title A").await;
    let title_b = create_title(&app, "Title B").await;
    let (status, body) = send(
        &app,
        request(
            "POST",
            &format!("/v1/titles/{title_a}/reviews/"),
            Some(&alice),
            Some(json!({"text": "belongs to A", "score": 7})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let review_id = body["id"].as_i64().unwrap();

    let (status, _) = send(
        &app,
        request(
            "GET",
            &format!("/v1/titles/{title_b}/reviews/{review_id}/"),
            None,
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let _ = std::fs::remove_dir_all(&outbox);
}

#[tokio::test]
async fn test_comment_lifecycle() {
    let (app, outbox) = spawn_app().await;

    let title_id = create_title(&app, "Annihilation").await;
    let alice = signup_and_token(&app, &outbox, "alice", "alice@example.com").await;
    let bob = signup_and_token(&app, &outbox, "bob", "bob@example.com").await;

    let (status, body) = send(
        &app,
        request(
            "POST",
            &format!("/v1/titles/{title_id}/reviews/"),
            Some(&alice),
            Some(json!({"text": "unsettling", "score": 8})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let review_id = body["id"].as_i64().unwrap();
    let base = format!("/v1/titles/{title_id}/reviews/{review_id}/comments/");

    let (status, _) = send(
        &app,
        request("POST", &base, None, Some(json!({"text": "agreed"}))),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &app,
        request("POST", &base, Some(&bob), Some(json!({"text": "agreed"}))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["author"], "bob");
    let comment_id = body["id"].as_i64().unwrap();

    let (status, body) = send(&app, request("GET", &base, None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);

    // Only the author (or staff) edits a comment.
    let (status, _) = send(
        &app,
        request(
            "PATCH",
            &format!("{base}{comment_id}/"),
            Some(&alice),
            Some(json!({"text": "hijacked"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        request(
            "PATCH",
            &format!("{base}{comment_id}/"),
            Some(&bob),
            Some(json!({"text": "agreed, mostly"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["text"], "agreed, mostly");

    let (status, _) = send(
        &app,
        request(
            "DELETE",
            &format!("{base}{comment_id}/"),
            Some(BOOTSTRAP_ADMIN_TOKEN),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        &app,
        request("GET", &format!("{base}{comment_id}/"), None, None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Comments under a review that does not exist are a 404, writes included.
    let (status, _) = send(
        &app,
        request(
            "POST",
            &format!("/v1/titles/{title_id}/reviews/999/comments/"),
            Some(&bob),
            Some(json!({"text": "lost"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let _ = std::fs::remove_dir_all(&outbox);
}
