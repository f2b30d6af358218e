use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::get,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::db::Store;
use crate::mail::{Mailer, OutboxMailer};

pub mod auth;
mod categories;
mod comments;
mod error;
mod genres;
mod observability;
pub mod policy;
mod reviews;
mod titles;
mod types;
mod users;
pub mod validation;

pub use error::ApiError;
pub use types::*;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,

    pub store: Store,

    pub mailer: Arc<dyn Mailer>,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }
}

pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let store = Store::with_pool_options(
        &config.database.url,
        config.database.max_connections,
        config.database.min_connections,
    )
    .await?;

    let mailer: Arc<dyn Mailer> = Arc::new(OutboxMailer::new(
        config.mail.from_address.clone(),
        config.mail.outbox_path.clone(),
    ));

    Ok(Arc::new(AppState {
        config: Arc::new(config),
        store,
        mailer,
        prometheus_handle,
    }))
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors_origins = state.config.server.cors_allowed_origins.clone();

    let v1 = Router::new()
        .route("/auth/signup/", axum::routing::post(auth::signup))
        .route("/auth/token/", axum::routing::post(auth::obtain_token))
        .route(
            "/users/",
            get(users::list_users).post(users::create_user),
        )
        .route("/users/me/", get(users::me).patch(users::update_me))
        .route(
            "/users/{username}/",
            get(users::get_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
        .route(
            "/categories/",
            get(categories::list_categories).post(categories::create_category),
        )
        .route(
            "/categories/{slug}/",
            get(categories::get_category)
                .patch(categories::update_category)
                .delete(categories::delete_category),
        )
        .route(
            "/genres/",
            get(genres::list_genres).post(genres::create_genre),
        )
        .route(
            "/genres/{slug}/",
            get(genres::get_genre)
                .patch(genres::update_genre)
                .delete(genres::delete_genre),
        )
        .route(
            "/titles/",
            get(titles::list_titles).post(titles::create_title),
        )
        .route(
            "/titles/{title_id}/",
            get(titles::get_title)
                .patch(titles::update_title)
                .delete(titles::delete_title),
        )
        .route(
            "/titles/{title_id}/reviews/",
            get(reviews::list_reviews).post(reviews::create_review),
        )
        .route(
            "/titles/{title_id}/reviews/{review_id}/",
            get(reviews::get_review)
                .patch(reviews::update_review)
                .delete(reviews::delete_review),
        )
        .route(
            "/titles/{title_id}/reviews/{review_id}/comments/",
            get(comments::list_comments).post(comments::create_comment),
        )
        .route(
            "/titles/{title_id}/reviews/{review_id}/comments/{id}/",
            get(comments::get_comment)
                .patch(comments::update_comment)
                .delete(comments::delete_comment),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_context,
        ));

    let cors_layer = if cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/v1", v1)
        .route("/metrics", get(observability::get_metrics))
        .route("/health/live", get(observability::health_live))
        .route("/health/ready", get(observability::health_ready))
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::track_requests))
        .with_state(state)
}
