use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
};
use std::sync::Arc;

use super::auth::AuthContext;
use super::validation::{validate_name, validate_slug};
use super::{ApiError, AppState, GenreDto, Page, PageQuery, SlugItemPatch, SlugItemPayload, policy};

/// GET /v1/genres/ — public, searchable by name.
pub async fn list_genres(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<GenreDto>>, ApiError> {
    let page_size = query.size(&state.config.api);
    let paged = state
        .store()
        .list_genres(query.page, page_size, query.search)
        .await?;

    Ok(Json(Page {
        count: paged.count,
        total_pages: paged.total_pages,
        results: paged.items.into_iter().map(GenreDto::from).collect(),
    }))
}

/// POST /v1/genres/ (admin)
pub async fn create_genre(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<SlugItemPayload>,
) -> Result<(StatusCode, Json<GenreDto>), ApiError> {
    policy::admin_for_write(auth.user.as_ref())?;

    validate_name(&payload.name)?;
    validate_slug(&payload.slug)?;

    let genre = state.store().create_genre(&payload.name, &payload.slug).await?;

    Ok((StatusCode::CREATED, Json(GenreDto::from(genre))))
}

/// GET /v1/genres/{slug}/ — public.
pub async fn get_genre(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<GenreDto>, ApiError> {
    let genre = state
        .store()
        .get_genre_by_slug(&slug)
        .await?
        .ok_or_else(|| ApiError::not_found("genre", &slug))?;

    Ok(Json(GenreDto::from(genre)))
}

/// PATCH /v1/genres/{slug}/ (admin)
pub async fn update_genre(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(slug): Path<String>,
    Json(payload): Json<SlugItemPatch>,
) -> Result<Json<GenreDto>, ApiError> {
    policy::admin_for_write(auth.user.as_ref())?;

    if let Some(ref name) = payload.name {
        validate_name(name)?;
    }
    if let Some(ref new_slug) = payload.slug {
        validate_slug(new_slug)?;
    }

    let genre = state
        .store()
        .get_genre_by_slug(&slug)
        .await?
        .ok_or_else(|| ApiError::not_found("genre", &slug))?;

    let genre = state
        .store()
        .update_genre(genre, payload.name, payload.slug)
        .await?;

    Ok(Json(GenreDto::from(genre)))
}

/// DELETE /v1/genres/{slug}/ (admin) — the join rows cascade away.
pub async fn delete_genre(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(slug): Path<String>,
) -> Result<StatusCode, ApiError> {
    policy::admin_for_write(auth.user.as_ref())?;

    if !state.store().delete_genre(&slug).await? {
        return Err(ApiError::not_found("genre", &slug));
    }

    Ok(StatusCode::NO_CONTENT)
}
