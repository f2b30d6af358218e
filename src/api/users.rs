use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
};
use std::sync::Arc;

use super::auth::AuthContext;
use super::validation::{validate_email, validate_username};
use super::{
    ApiError, AppState, CreateUserRequest, Page, PageQuery, UpdateUserRequest, UserDto, policy,
};
use crate::db::repositories::user::{NewUser, UserChanges};
use crate::entities::users::Role;

/// GET /v1/users/ (admin)
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<UserDto>>, ApiError> {
    policy::admin_only(auth.user.as_ref())?;

    let page_size = query.size(&state.config.api);
    let paged = state
        .store()
        .list_users(query.page, page_size, query.search)
        .await?;

    Ok(Json(Page {
        count: paged.count,
        total_pages: paged.total_pages,
        results: paged.items.into_iter().map(UserDto::from).collect(),
    }))
}

/// POST /v1/users/ (admin)
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserDto>), ApiError> {
    policy::admin_only(auth.user.as_ref())?;

    validate_username(&payload.username)?;
    let email = validate_email(&payload.email)?;

    let user = state
        .store()
        .create_user(NewUser {
            username: payload.username,
            email,
            first_name: payload.first_name,
            last_name: payload.last_name,
            bio: payload.bio,
            role: payload.role.unwrap_or(Role::User),
        })
        .await
        .map_err(conflict_as_validation)?;

    Ok((StatusCode::CREATED, Json(UserDto::from(user))))
}

/// GET /v1/users/{username}/ (admin)
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(username): Path<String>,
) -> Result<Json<UserDto>, ApiError> {
    policy::admin_only(auth.user.as_ref())?;

    let user = state
        .store()
        .get_user_by_username(&username)
        .await?
        .ok_or_else(|| ApiError::not_found("user", &username))?;

    Ok(Json(UserDto::from(user)))
}

/// PATCH /v1/users/{username}/ (admin; may change role)
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(username): Path<String>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<UserDto>, ApiError> {
    policy::admin_only(auth.user.as_ref())?;

    let user = state
        .store()
        .get_user_by_username(&username)
        .await?
        .ok_or_else(|| ApiError::not_found("user", &username))?;

    let changes = validate_changes(payload, None)?;
    let user = state
        .store()
        .update_user(user, changes)
        .await
        .map_err(conflict_as_validation)?;

    Ok(Json(UserDto::from(user)))
}

/// DELETE /v1/users/{username}/ (admin)
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(username): Path<String>,
) -> Result<StatusCode, ApiError> {
    policy::admin_only(auth.user.as_ref())?;

    if !state.store().delete_user(&username).await? {
        return Err(ApiError::not_found("user", &username));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// GET /v1/users/me/
pub async fn me(Extension(auth): Extension<AuthContext>) -> Result<Json<UserDto>, ApiError> {
    let user = policy::authenticated(auth.user.as_ref())?;
    Ok(Json(UserDto::from(user.clone())))
}

/// PATCH /v1/users/me/
/// Role is re-pinned to its pre-update value; callers cannot self-promote.
pub async fn update_me(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<UserDto>, ApiError> {
    let user = policy::authenticated(auth.user.as_ref())?.clone();

    let pinned_role = user.role;
    let changes = validate_changes(payload, Some(pinned_role))?;

    let user = state
        .store()
        .update_user(user, changes)
        .await
        .map_err(conflict_as_validation)?;

    Ok(Json(UserDto::from(user)))
}

/// Validate the mutable fields; `pin_role` overrides whatever role the
/// payload carried.
fn validate_changes(
    payload: UpdateUserRequest,
    pin_role: Option<Role>,
) -> Result<UserChanges, ApiError> {
    if let Some(ref username) = payload.username {
        validate_username(username)?;
    }

    let email = match payload.email {
        Some(ref email) => Some(validate_email(email)?),
        None => None,
    };

    Ok(UserChanges {
        username: payload.username,
        email,
        first_name: payload.first_name,
        last_name: payload.last_name,
        bio: payload.bio,
        role: pin_role.or(payload.role),
    })
}

/// User uniqueness failures surface as 400 on the public interface.
fn conflict_as_validation(err: crate::db::InsertError) -> ApiError {
    match err {
        crate::db::InsertError::Conflict(msg) => ApiError::validation(msg),
        crate::db::InsertError::Other(e) => ApiError::DatabaseError(e.to_string()),
    }
}
