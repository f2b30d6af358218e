use axum::{
    Json,
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use super::validation::{validate_email, validate_username};
use super::{ApiError, AppState, SignupRequest, SignupResponse, TokenRequest, TokenResponse};
use crate::entities::users;

/// Resolved caller, attached to every request by [`auth_context`].
/// `None` means anonymous; read endpoints accept that.
#[derive(Clone)]
pub struct AuthContext {
    pub user: Option<users::Model>,
}

/// Middleware resolving `Authorization: Bearer <token>` into an
/// [`AuthContext`] extension. An unknown or absent token is not an error
/// here; the policy layer decides what anonymous callers may do.
pub async fn auth_context(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let mut user = None;

    if let Some(token) = extract_bearer_token(&headers) {
        user = state
            .store()
            .get_user_by_token(&token)
            .await
            .map_err(|e| ApiError::internal(format!("Token lookup failed: {e}")))?;

        if let Some(ref u) = user {
            tracing::Span::current().record("user_id", u.username.as_str());
        }
    }

    request.extensions_mut().insert(AuthContext { user });
    Ok(next.run(request).await)
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let auth_header = headers.get("Authorization")?;
    let auth_str = auth_header.to_str().ok()?;
    let token = auth_str.strip_prefix("Bearer ")?;
    Some(token.trim().to_string())
}

/// POST /v1/auth/signup/
/// Get-or-create the user and mail them a single-use confirmation code.
/// The code never appears in the response.
pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SignupRequest>,
) -> Result<Json<SignupResponse>, ApiError> {
    validate_username(&payload.username)?;
    let email = validate_email(&payload.email)?;

    let user = state
        .store()
        .get_or_create_user(&payload.username, &email)
        .await
        .map_err(|e| match e {
            // The public interface reports signup uniqueness failures as 400.
            crate::db::InsertError::Conflict(msg) => ApiError::validation(msg),
            crate::db::InsertError::Other(e) => ApiError::DatabaseError(e.to_string()),
        })?;

    let code = generate_confirmation_code();
    state.store().set_confirmation_code(user, &code).await?;

    // Delivery failure fails the signup; the caller must be able to retry.
    state
        .mailer
        .send(
            &email,
            "Confirmation code",
            &format!("Your confirmation code is {code}"),
        )
        .await
        .map_err(|e| ApiError::internal(format!("Failed to deliver confirmation code: {e}")))?;

    tracing::info!("Signup for {} accepted, confirmation code queued", payload.username);

    Ok(Json(SignupResponse {
        username: payload.username,
        email,
    }))
}

/// POST /v1/auth/token/
/// Exchange a confirmation code for a bearer token. The stored code is
/// cleared on success, so each code works exactly once.
pub async fn obtain_token(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let user = state
        .store()
        .get_user_by_username(&payload.username)
        .await?
        .ok_or_else(|| ApiError::not_found("user", &payload.username))?;

    let matches = user
        .confirmation_code
        .as_deref()
        .is_some_and(|code| code == payload.confirmation_code);

    if !matches {
        return Err(ApiError::validation("wrong confirmation code"));
    }

    let token = generate_token();
    state.store().issue_token(user, &token).await?;

    tracing::info!("Issued token for {}", payload.username);

    Ok(Json(TokenResponse { token }))
}

fn random_hex(bytes: usize) -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    (0..bytes).fold(String::with_capacity(bytes * 2), |mut acc, _| {
        use std::fmt::Write;
        let b: u8 = rng.random();
        let _ = write!(acc, "{b:02x}");
        acc
    })
}

/// 32-char hex confirmation code.
#[must_use]
pub fn generate_confirmation_code() -> String {
    random_hex(16)
}

/// 64-char hex bearer token.
#[must_use]
pub fn generate_token() -> String {
    random_hex(32)
}
