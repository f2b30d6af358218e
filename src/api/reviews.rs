use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
};
use std::sync::Arc;

use super::auth::AuthContext;
use super::validation::{validate_score, validate_text};
use super::{ApiError, AppState, Page, PageQuery, ReviewDto, ReviewPatch, ReviewPayload, policy};
use crate::entities::{reviews, users};

/// The parent title must exist before anything else happens.
async fn require_title(state: &AppState, title_id: i32) -> Result<(), ApiError> {
    if state.store().title_exists(title_id).await? {
        Ok(())
    } else {
        Err(ApiError::title_not_found(title_id))
    }
}

async fn require_review(
    state: &AppState,
    title_id: i32,
    id: i32,
) -> Result<(reviews::Model, Option<users::Model>), ApiError> {
    require_title(state, title_id).await?;

    state
        .store()
        .get_review(title_id, id)
        .await?
        .ok_or_else(|| ApiError::review_not_found(id))
}

/// GET /v1/titles/{title_id}/reviews/ — public.
pub async fn list_reviews(
    State(state): State<Arc<AppState>>,
    Path(title_id): Path<i32>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<ReviewDto>>, ApiError> {
    require_title(&state, title_id).await?;

    let page_size = query.size(&state.config.api);
    let paged = state.store().list_reviews(title_id, query.page, page_size).await?;

    Ok(Json(Page {
        count: paged.count,
        total_pages: paged.total_pages,
        results: paged.items.into_iter().map(ReviewDto::from_row).collect(),
    }))
}

/// POST /v1/titles/{title_id}/reviews/ — any authenticated user, at most one
/// review per title per author.
pub async fn create_review(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(title_id): Path<i32>,
    Json(payload): Json<ReviewPayload>,
) -> Result<(StatusCode, Json<ReviewDto>), ApiError> {
    require_title(&state, title_id).await?;
    let author = policy::authenticated(auth.user.as_ref())?.clone();

    validate_text(&payload.text)?;
    validate_score(payload.score)?;

    if state.store().has_review_by(title_id, author.id).await? {
        return Err(ApiError::Conflict(
            "you have already reviewed this title".to_string(),
        ));
    }

    let review = state
        .store()
        .create_review(title_id, author.id, &payload.text, payload.score)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ReviewDto::from_row((review, Some(author)))),
    ))
}

/// GET /v1/titles/{title_id}/reviews/{id}/ — public.
pub async fn get_review(
    State(state): State<Arc<AppState>>,
    Path((title_id, id)): Path<(i32, i32)>,
) -> Result<Json<ReviewDto>, ApiError> {
    let row = require_review(&state, title_id, id).await?;
    Ok(Json(ReviewDto::from_row(row)))
}

/// PATCH /v1/titles/{title_id}/reviews/{id}/ — author, moderator or admin.
/// Unlike create, updating never trips the one-review-per-title check.
pub async fn update_review(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path((title_id, id)): Path<(i32, i32)>,
    Json(payload): Json<ReviewPatch>,
) -> Result<Json<ReviewDto>, ApiError> {
    let (review, author) = require_review(&state, title_id, id).await?;

    let actor = policy::authenticated(auth.user.as_ref())?;
    policy::author_moderator_or_admin(actor, review.author_id)?;

    if let Some(ref text) = payload.text {
        validate_text(text)?;
    }
    if let Some(score) = payload.score {
        validate_score(score)?;
    }

    let review = state
        .store()
        .update_review(review, payload.text, payload.score)
        .await?;

    Ok(Json(ReviewDto::from_row((review, author))))
}

/// DELETE /v1/titles/{title_id}/reviews/{id}/ — author, moderator or admin;
/// comments cascade.
pub async fn delete_review(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path((title_id, id)): Path<(i32, i32)>,
) -> Result<StatusCode, ApiError> {
    let (review, _) = require_review(&state, title_id, id).await?;

    let actor = policy::authenticated(auth.user.as_ref())?;
    policy::author_moderator_or_admin(actor, review.author_id)?;

    state.store().delete_review(review.id).await?;

    Ok(StatusCode::NO_CONTENT)
}
