use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
};
use std::sync::Arc;

use super::auth::AuthContext;
use super::validation::validate_text;
use super::{
    ApiError, AppState, CommentDto, CommentPatch, CommentPayload, Page, PageQuery, policy,
};
use crate::entities::{comments, users};

/// Both parents must resolve, and the review must belong to the title in the
/// path, before any validation runs.
async fn require_parent_review(
    state: &AppState,
    title_id: i32,
    review_id: i32,
) -> Result<(), ApiError> {
    if !state.store().title_exists(title_id).await? {
        return Err(ApiError::title_not_found(title_id));
    }

    state
        .store()
        .get_review(title_id, review_id)
        .await?
        .ok_or_else(|| ApiError::review_not_found(review_id))?;

    Ok(())
}

async fn require_comment(
    state: &AppState,
    title_id: i32,
    review_id: i32,
    id: i32,
) -> Result<(comments::Model, Option<users::Model>), ApiError> {
    require_parent_review(state, title_id, review_id).await?;

    state
        .store()
        .get_comment(review_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("comment", id))
}

/// GET /v1/titles/{title_id}/reviews/{review_id}/comments/ — public.
pub async fn list_comments(
    State(state): State<Arc<AppState>>,
    Path((title_id, review_id)): Path<(i32, i32)>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<CommentDto>>, ApiError> {
    require_parent_review(&state, title_id, review_id).await?;

    let page_size = query.size(&state.config.api);
    let paged = state
        .store()
        .list_comments(review_id, query.page, page_size)
        .await?;

    Ok(Json(Page {
        count: paged.count,
        total_pages: paged.total_pages,
        results: paged.items.into_iter().map(CommentDto::from_row).collect(),
    }))
}

/// POST /v1/titles/{title_id}/reviews/{review_id}/comments/ — any
/// authenticated user.
pub async fn create_comment(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path((title_id, review_id)): Path<(i32, i32)>,
    Json(payload): Json<CommentPayload>,
) -> Result<(StatusCode, Json<CommentDto>), ApiError> {
    require_parent_review(&state, title_id, review_id).await?;
    let author = policy::authenticated(auth.user.as_ref())?.clone();

    validate_text(&payload.text)?;

    let comment = state
        .store()
        .create_comment(review_id, author.id, &payload.text)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CommentDto::from_row((comment, Some(author)))),
    ))
}

/// GET /v1/titles/{title_id}/reviews/{review_id}/comments/{id}/ — public.
pub async fn get_comment(
    State(state): State<Arc<AppState>>,
    Path((title_id, review_id, id)): Path<(i32, i32, i32)>,
) -> Result<Json<CommentDto>, ApiError> {
    let row = require_comment(&state, title_id, review_id, id).await?;
    Ok(Json(CommentDto::from_row(row)))
}

/// PATCH — author, moderator or admin.
pub async fn update_comment(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path((title_id, review_id, id)): Path<(i32, i32, i32)>,
    Json(payload): Json<CommentPatch>,
) -> Result<Json<CommentDto>, ApiError> {
    let (comment, author) = require_comment(&state, title_id, review_id, id).await?;

    let actor = policy::authenticated(auth.user.as_ref())?;
    policy::author_moderator_or_admin(actor, comment.author_id)?;

    if let Some(ref text) = payload.text {
        validate_text(text)?;
    }

    let comment = state.store().update_comment(comment, payload.text).await?;

    Ok(Json(CommentDto::from_row((comment, author))))
}

/// DELETE — author, moderator or admin.
pub async fn delete_comment(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path((title_id, review_id, id)): Path<(i32, i32, i32)>,
) -> Result<StatusCode, ApiError> {
    let (comment, _) = require_comment(&state, title_id, review_id, id).await?;

    let actor = policy::authenticated(auth.user.as_ref())?;
    policy::author_moderator_or_admin(actor, comment.author_id)?;

    state.store().delete_comment(comment.id).await?;

    Ok(StatusCode::NO_CONTENT)
}
