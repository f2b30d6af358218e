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

async fn create_category(app: &Router, name: &str, slug: &str) {
    let (status, _) = send(
        app,
        request(
            "POST",
            "/v1/categories/",
            Some(BOOTSTRAP_ADMIN_TOKEN),
            Some(json!({"name": name, "slug": slug})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

async fn create_genre(app: &Router, name: &str, slug: &str) {
    let (status, _) = send(
        app,
        request(
            "POST",
            "/v1/genres/",
            Some(BOOTSTRAP_ADMIN_TOKEN),
            Some(json!({"name": name, "slug": slug})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_category_crud() {
    let (app, outbox) = spawn_app().await;

    let (status, body) = send(&app, request("GET", "/v1/categories/", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);
    assert_eq!(body["results"].as_array().unwrap().len(), 0);

    create_category(&app, "Books", "books").await;

    // Slugs are unique.
    let (status, body) = send(
        &app,
        request(
            "POST",
            "/v1/categories/",
            Some(BOOTSTRAP_ADMIN_TOKEN),
            Some(json!({"name": "More books", "slug": "books"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "conflict");

    let (status, _) = send(
        &app,
        request(
            "POST",
            "/v1/categories/",
            Some(BOOTSTRAP_ADMIN_TOKEN),
            Some(json!({"name": "Bad Slug", "slug": "Not A Slug"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, request("GET", "/v1/categories/books/", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Books");

    let (status, body) = send(
        &app,
        request(
            "PATCH",
            "/v1/categories/books/",
            Some(BOOTSTRAP_ADMIN_TOKEN),
            Some(json!({"name": "Printed books"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Printed books");

    let (status, _) = send(
        &app,
        request(
            "DELETE",
            "/v1/categories/books/",
            Some(BOOTSTRAP_ADMIN_TOKEN),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, request("GET", "/v1/categories/books/", None, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let _ = std::fs::remove_dir_all(&outbox);
}

#[tokio::test]
async fn test_catalog_writes_require_admin() {
    let (app, outbox) = spawn_app().await;

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/v1/categories/",
            None,
            Some(json!({"name": "Films", "slug": "films"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "authentication_required");

    let token = signup_and_token(&app, &outbox, "gina", "gina@example.com").await;
    let (status, body) = send(
        &app,
        request(
            "POST",
            "/v1/genres/",
            Some(&token),
            Some(json!({"name": "Jazz", "slug": "jazz"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["kind"], "permission_denied");

    // Moderators curate reviews, not the catalog.
    let (status, _) = send(
        &app,
        request(
            "PATCH",
            "/v1/users/gina/",
            Some(BOOTSTRAP_ADMIN_TOKEN),
            Some(json!({"role": "moderator"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        request(
            "POST",
            "/v1/genres/",
            Some(&token),
            Some(json!({"name": "Jazz", "slug": "jazz"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let _ = std::fs::remove_dir_all(&outbox);
}

#[tokio::test]
async fn test_title_crud_with_relations() {
    let (app, outbox) = spawn_app().await;

    create_category(&app, "Books", "books").await;
    create_genre(&app, "Fantasy", "fantasy").await;
    create_genre(&app, "Adventure", "adventure").await;

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/v1/titles/",
            Some(BOOTSTRAP_ADMIN_TOKEN),
            Some(json!({
                "name": "The Hobbit",
                "year": 1937,
                "description": "There and back again",
                "category": "books",
                "genre": ["fantasy", "adventure"]
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let title_id = body["id"].as_i64().unwrap();
    assert_eq!(body["category"]["slug"], "books");
    assert_eq!(body["genre"].as_array().unwrap().len(), 2);
    assert!(body["rating"].is_null());

    // Unknown relation slugs are rejected before anything is written.
    let (status, _) = send(
        &app,
        request(
            "POST",
            "/v1/titles/",
            Some(BOOTSTRAP_ADMIN_TOKEN),
            Some(json!({"name": "Orphan", "year": 2000, "category": "nope"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        request(
            "POST",
            "/v1/titles/",
            Some(BOOTSTRAP_ADMIN_TOKEN),
            Some(json!({"name": "Orphan", "year": 2000, "genre": ["nope"]})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Future years are invalid.
    let (status, _) = send(
        &app,
        request(
            "POST",
            "/v1/titles/",
            Some(BOOTSTRAP_ADMIN_TOKEN),
            Some(json!({"name": "From the future", "year": 3000})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        request(
            "PATCH",
            &format!("/v1/titles/{title_id}/"),
            Some(BOOTSTRAP_ADMIN_TOKEN),
            Some(json!({"name": "The Hobbit, revised", "genre": ["fantasy"]})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "The Hobbit, revised");
    assert_eq!(body["genre"].as_array().unwrap().len(), 1);

    // Deleting the category leaves the title in place, uncategorized.
    let (status, _) = send(
        &app,
        request(
            "DELETE",
            "/v1/categories/books/",
            Some(BOOTSTRAP_ADMIN_TOKEN),
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
    assert!(body["category"].is_null());

    let (status, _) = send(
        &app,
        request(
            "DELETE",
            &format!("/v1/titles/{title_id}/"),
            Some(BOOTSTRAP_ADMIN_TOKEN),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        &app,
        request("GET", &format!("/v1/titles/{title_id}/"), None, None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let _ = std::fs::remove_dir_all(&outbox);
}

#[tokio::test]
async fn test_title_filters() {
    let (app, outbox) = spawn_app().await;

    create_category(&app, "Books", "books").await;
    create_category(&app, "Films", "films").await;
    create_genre(&app, "Fantasy", "fantasy").await;
    create_genre(&app, "Drama", "drama").await;

    for (name, year, category, genres) in [
        ("The Hobbit", 1937, "books", vec!["fantasy"]),
        ("Casablanca", 1942, "films", vec!["drama"]),
        ("The Silmarillion", 1977, "books", vec!["fantasy"]),
    ] {
        let (status, _) = send(
            &app,
            request(
                "POST",
                "/v1/titles/",
                Some(BOOTSTRAP_ADMIN_TOKEN),
                Some(json!({
                    "name": name,
                    "year": year,
                    "category": category,
                    "genre": genres
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = send(&app, request("GET", "/v1/titles/", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);
    // Newest first.
    assert_eq!(body["results"][0]["name"], "The Silmarillion");

    let (status, body) = send(
        &app,
        request("GET", "/v1/titles/?category=books", None, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);

    let (status, body) = send(&app, request("GET", "/v1/titles/?genre=drama", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["results"][0]["name"], "Casablanca");

    let (status, body) = send(&app, request("GET", "/v1/titles/?year=1937", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);

    let (status, body) = send(
        &app,
        request("GET", "/v1/titles/?name=sil&category=books", None, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["results"][0]["name"], "The Silmarillion");

    let (status, body) = send(
        &app,
        request("GET", "/v1/titles/?genre=fantasy&year=1942", None, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);

    let _ = std::fs::remove_dir_all(&outbox);
}

#[tokio::test]
async fn test_pagination_and_search() {
    let (app, outbox) = spawn_app().await;

    for i in 1..=5 {
        create_genre(&app, &format!("Genre {i}"), &format!("genre-{i}")).await;
    }
    create_genre(&app, "Oddball", "oddball").await;

    let (status, body) = send(
        &app,
        request("GET", "/v1/genres/?page=1&page_size=4", None, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 6);
    assert_eq!(body["total_pages"], 2);
    assert_eq!(body["results"].as_array().unwrap().len(), 4);

    let (status, body) = send(
        &app,
        request("GET", "/v1/genres/?page=2&page_size=4", None, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"].as_array().unwrap().len(), 2);

    let (status, body) = send(
        &app,
        request("GET", "/v1/genres/?search=odd", None, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["results"][0]["slug"], "oddball");

    let _ = std::fs::remove_dir_all(&outbox);
}
