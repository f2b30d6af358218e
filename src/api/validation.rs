use chrono::Datelike;
use regex::Regex;
use std::sync::LazyLock;

use super::ApiError;

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.@+-]+$").expect("username regex"));

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex"));

static SLUG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z0-9_-]+$").expect("slug regex"));

pub const MAX_USERNAME_LEN: usize = 150;
pub const MAX_EMAIL_LEN: usize = 254;
pub const MAX_NAME_LEN: usize = 256;
pub const MAX_SLUG_LEN: usize = 50;

/// "me" is reserved for the current-user endpoint.
pub fn validate_username(username: &str) -> Result<(), ApiError> {
    if username.is_empty() || username.len() > MAX_USERNAME_LEN {
        return Err(ApiError::validation(format!(
            "username must be 1 to {} characters",
            MAX_USERNAME_LEN
        )));
    }
    if !USERNAME_RE.is_match(username) {
        return Err(ApiError::validation(
            "username may only contain letters, digits and .@+- characters",
        ));
    }
    if username == "me" {
        return Err(ApiError::validation("username \"me\" is reserved"));
    }
    Ok(())
}

/// Returns the lowercased address; uniqueness is checked on that form.
pub fn validate_email(email: &str) -> Result<String, ApiError> {
    if email.is_empty() || email.len() > MAX_EMAIL_LEN {
        return Err(ApiError::validation(format!(
            "email must be 1 to {} characters",
            MAX_EMAIL_LEN
        )));
    }
    if !EMAIL_RE.is_match(email) {
        return Err(ApiError::validation("email address is not well-formed"));
    }
    Ok(email.to_lowercase())
}

pub fn validate_slug(slug: &str) -> Result<(), ApiError> {
    if slug.is_empty() || slug.len() > MAX_SLUG_LEN {
        return Err(ApiError::validation(format!(
            "slug must be 1 to {} characters",
            MAX_SLUG_LEN
        )));
    }
    if !SLUG_RE.is_match(slug) {
        return Err(ApiError::validation(
            "slug may only contain lowercase letters, digits, hyphens and underscores",
        ));
    }
    Ok(())
}

pub fn validate_name(name: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::validation("name must not be empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(ApiError::validation(format!(
            "name must be at most {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(())
}

/// Year is bounded above by the current calendar year at validation time.
pub fn validate_year(year: i32) -> Result<(), ApiError> {
    let current = chrono::Utc::now().year();
    if year < 0 {
        return Err(ApiError::validation("year must not be negative"));
    }
    if year > current {
        return Err(ApiError::validation(format!(
            "year must not be later than {}",
            current
        )));
    }
    Ok(())
}

pub fn validate_score(score: i32) -> Result<(), ApiError> {
    if !(1..=10).contains(&score) {
        return Err(ApiError::validation("score must be between 1 and 10"));
    }
    Ok(())
}

pub fn validate_text(text: &str) -> Result<(), ApiError> {
    if text.trim().is_empty() {
        return Err(ApiError::validation("text must not be empty"));
    }
    Ok(())
}
