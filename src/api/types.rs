use serde::{Deserialize, Serialize};

use crate::db::TitleRecord;
use crate::entities::users::{self, Role};
use crate::entities::{categories, comments, genres, reviews};

/// Paginated list envelope shared by every list endpoint.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: u64,
    pub total_pages: u64,
    pub results: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    pub page_size: Option<u64>,
    pub search: Option<String>,
}

pub const fn default_page() -> u64 {
    1
}

impl PageQuery {
    /// Effective page size: the configured default, clamped to the cap.
    #[must_use]
    pub fn size(&self, api: &crate::config::ApiConfig) -> u64 {
        self.page_size
            .unwrap_or(api.default_page_size)
            .clamp(1, api.max_page_size)
    }
}

#[derive(Debug, Serialize)]
pub struct UserDto {
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub role: Role,
}

impl From<users::Model> for UserDto {
    fn from(model: users::Model) -> Self {
        Self {
            username: model.username,
            email: model.email,
            first_name: model.first_name,
            last_name: model.last_name,
            bio: model.bio,
            role: model.role,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CategoryDto {
    pub name: String,
    pub slug: String,
}

impl From<categories::Model> for CategoryDto {
    fn from(model: categories::Model) -> Self {
        Self {
            name: model.name,
            slug: model.slug,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GenreDto {
    pub name: String,
    pub slug: String,
}

impl From<genres::Model> for GenreDto {
    fn from(model: genres::Model) -> Self {
        Self {
            name: model.name,
            slug: model.slug,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TitleDto {
    pub id: i32,
    pub name: String,
    pub year: i32,
    /// Mean of review scores; null while the title has no reviews.
    pub rating: Option<f64>,
    pub description: Option<String>,
    pub genre: Vec<GenreDto>,
    pub category: Option<CategoryDto>,
}

impl From<TitleRecord> for TitleDto {
    fn from(record: TitleRecord) -> Self {
        Self {
            id: record.title.id,
            name: record.title.name,
            year: record.title.year,
            rating: record.rating,
            description: record.title.description,
            genre: record.genres.into_iter().map(GenreDto::from).collect(),
            category: record.category.map(CategoryDto::from),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReviewDto {
    pub id: i32,
    pub text: String,
    /// Author's username.
    pub author: String,
    pub score: i32,
    pub pub_date: String,
}

impl ReviewDto {
    #[must_use]
    pub fn from_row((review, author): (reviews::Model, Option<users::Model>)) -> Self {
        Self {
            id: review.id,
            text: review.text,
            author: author.map(|u| u.username).unwrap_or_default(),
            score: review.score,
            pub_date: review.pub_date,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CommentDto {
    pub id: i32,
    pub text: String,
    pub author: String,
    pub pub_date: String,
}

impl CommentDto {
    #[must_use]
    pub fn from_row((comment, author): (comments::Model, Option<users::Model>)) -> Self {
        Self {
            id: comment.id,
            text: comment.text,
            author: author.map(|u| u.username).unwrap_or_default(),
            pub_date: comment.pub_date,
        }
    }
}

// ============================================================================
// Request payloads
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub username: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub username: String,
    pub confirmation_code: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    /// Honored only on the admin endpoint; `/users/me/` re-pins the caller's
    /// existing role.
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
pub struct SlugItemPayload {
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Deserialize)]
pub struct SlugItemPatch {
    pub name: Option<String>,
    pub slug: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TitlePayload {
    pub name: String,
    pub description: Option<String>,
    pub year: i32,
    /// Category slug.
    pub category: Option<String>,
    /// Genre slugs.
    #[serde(default)]
    pub genre: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct TitlePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub year: Option<i32>,
    pub category: Option<String>,
    pub genre: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewPayload {
    pub text: String,
    pub score: i32,
}

#[derive(Debug, Deserialize)]
pub struct ReviewPatch {
    pub text: Option<String>,
    pub score: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct CommentPayload {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct CommentPatch {
    pub text: Option<String>,
}
