use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
};
use std::sync::Arc;

use super::auth::AuthContext;
use super::validation::{validate_name, validate_slug};
use super::{
    ApiError, AppState, CategoryDto, Page, PageQuery, SlugItemPatch, SlugItemPayload, policy,
};

/// GET /v1/categories/ — public, searchable by name.
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<CategoryDto>>, ApiError> {
    let page_size = query.size(&state.config.api);
    let paged = state
        .store()
        .list_categories(query.page, page_size, query.search)
        .await?;

    Ok(Json(Page {
        count: paged.count,
        total_pages: paged.total_pages,
        results: paged.items.into_iter().map(CategoryDto::from).collect(),
    }))
}

/// POST /v1/categories/ (admin)
pub async fn create_category(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<SlugItemPayload>,
) -> Result<(StatusCode, Json<CategoryDto>), ApiError> {
    policy::admin_for_write(auth.user.as_ref())?;

    validate_name(&payload.name)?;
    validate_slug(&payload.slug)?;

    let category = state
        .store()
        .create_category(&payload.name, &payload.slug)
        .await?;

    Ok((StatusCode::CREATED, Json(CategoryDto::from(category))))
}

/// GET /v1/categories/{slug}/ — public.
pub async fn get_category(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<CategoryDto>, ApiError> {
    let category = state
        .store()
        .get_category_by_slug(&slug)
        .await?
        .ok_or_else(|| ApiError::not_found("category", &slug))?;

    Ok(Json(CategoryDto::from(category)))
}

/// PATCH /v1/categories/{slug}/ (admin)
pub async fn update_category(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(slug): Path<String>,
    Json(payload): Json<SlugItemPatch>,
) -> Result<Json<CategoryDto>, ApiError> {
    policy::admin_for_write(auth.user.as_ref())?;

    if let Some(ref name) = payload.name {
        validate_name(name)?;
    }
    if let Some(ref new_slug) = payload.slug {
        validate_slug(new_slug)?;
    }

    let category = state
        .store()
        .get_category_by_slug(&slug)
        .await?
        .ok_or_else(|| ApiError::not_found("category", &slug))?;

    let category = state
        .store()
        .update_category(category, payload.name, payload.slug)
        .await?;

    Ok(Json(CategoryDto::from(category)))
}

/// DELETE /v1/categories/{slug}/ (admin) — titles keep existing with a null
/// category.
pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(slug): Path<String>,
) -> Result<StatusCode, ApiError> {
    policy::admin_for_write(auth.user.as_ref())?;

    if !state.store().delete_category(&slug).await? {
        return Err(ApiError::not_found("category", &slug));
    }

    Ok(StatusCode::NO_CONTENT)
}
