use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::AuthContext;
use super::validation::{validate_name, validate_year};
use super::{ApiError, AppState, Page, TitleDto, TitlePatch, TitlePayload, policy, types};
use crate::db::TitleFilter;
use crate::db::repositories::title::TitleChanges;

/// Title list filters; every present filter narrows the result (AND).
#[derive(Debug, Deserialize)]
pub struct TitleQuery {
    #[serde(default = "types::default_page")]
    pub page: u64,
    pub page_size: Option<u64>,
    /// Substring match on the title name.
    pub name: Option<String>,
    /// Category slug (exact).
    pub category: Option<String>,
    /// Genre slug (exact).
    pub genre: Option<String>,
    /// Exact year.
    pub year: Option<i32>,
}

/// GET /v1/titles/ — public.
pub async fn list_titles(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TitleQuery>,
) -> Result<Json<Page<TitleDto>>, ApiError> {
    let page_size = query
        .page_size
        .unwrap_or(state.config.api.default_page_size)
        .clamp(1, state.config.api.max_page_size);

    let filter = TitleFilter {
        name: query.name,
        category_slug: query.category,
        genre_slug: query.genre,
        year: query.year,
    };

    let paged = state.store().list_titles(query.page, page_size, filter).await?;

    Ok(Json(Page {
        count: paged.count,
        total_pages: paged.total_pages,
        results: paged.items.into_iter().map(TitleDto::from).collect(),
    }))
}

/// POST /v1/titles/ (admin)
pub async fn create_title(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<TitlePayload>,
) -> Result<(StatusCode, Json<TitleDto>), ApiError> {
    policy::admin_for_write(auth.user.as_ref())?;

    validate_name(&payload.name)?;
    validate_year(payload.year)?;

    let category_id = resolve_category(&state, payload.category.as_deref()).await?;
    let genre_ids = resolve_genres(&state, &payload.genre).await?;

    let record = state
        .store()
        .create_title(
            &payload.name,
            payload.description,
            payload.year,
            category_id,
            genre_ids,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(TitleDto::from(record))))
}

/// GET /v1/titles/{id}/ — public; rating is computed here, never stored.
pub async fn get_title(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<TitleDto>, ApiError> {
    let record = state
        .store()
        .get_title(id)
        .await?
        .ok_or_else(|| ApiError::title_not_found(id))?;

    Ok(Json(TitleDto::from(record)))
}

/// PATCH /v1/titles/{id}/ (admin)
pub async fn update_title(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i32>,
    Json(payload): Json<TitlePatch>,
) -> Result<Json<TitleDto>, ApiError> {
    policy::admin_for_write(auth.user.as_ref())?;

    if let Some(ref name) = payload.name {
        validate_name(name)?;
    }
    if let Some(year) = payload.year {
        validate_year(year)?;
    }

    let category_id = match payload.category.as_deref() {
        Some(slug) => resolve_category(&state, Some(slug)).await?,
        None => None,
    };

    let genre_ids = match payload.genre {
        Some(ref slugs) => Some(resolve_genres(&state, slugs).await?),
        None => None,
    };

    let record = state
        .store()
        .update_title(
            id,
            TitleChanges {
                name: payload.name,
                description: payload.description,
                year: payload.year,
                category_id,
                genre_ids,
            },
        )
        .await?
        .ok_or_else(|| ApiError::title_not_found(id))?;

    Ok(Json(TitleDto::from(record)))
}

/// DELETE /v1/titles/{id}/ (admin) — reviews and their comments cascade.
pub async fn delete_title(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    policy::admin_for_write(auth.user.as_ref())?;

    if !state.store().delete_title(id).await? {
        return Err(ApiError::title_not_found(id));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// An unresolvable category slug is a not-found rejection, before any write.
async fn resolve_category(
    state: &AppState,
    slug: Option<&str>,
) -> Result<Option<i32>, ApiError> {
    let Some(slug) = slug else {
        return Ok(None);
    };

    let category = state
        .store()
        .get_category_by_slug(slug)
        .await?
        .ok_or_else(|| ApiError::not_found("category", slug))?;

    Ok(Some(category.id))
}

/// Every genre slug must resolve; the first miss aborts the request.
async fn resolve_genres(state: &AppState, slugs: &[String]) -> Result<Vec<i32>, ApiError> {
    let found = state.store().get_genres_by_slugs(slugs).await?;

    for slug in slugs {
        if !found.iter().any(|g| &g.slug == slug) {
            return Err(ApiError::not_found("genre", slug));
        }
    }

    Ok(found.into_iter().map(|g| g.id).collect())
}
