use anyhow::Result;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr, SqlErr};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::entities::{categories, comments, genres, reviews, users};

pub mod migrator;
pub mod repositories;

pub use migrator::BOOTSTRAP_ADMIN_TOKEN;
pub use repositories::title::{TitleFilter, TitleRecord};

/// Error type for inserts/updates that may trip a unique constraint. The
/// constraint is the arbiter for concurrent writers racing on the same key,
/// so it has to be distinguishable from other database failures.
#[derive(Debug, thiserror::Error)]
pub enum InsertError {
    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Other(#[from] DbErr),
}

impl InsertError {
    /// Wrap a `DbErr`, turning unique-constraint violations into `Conflict`
    /// with the given message.
    pub fn from_db(err: DbErr, conflict_message: &str) -> Self {
        if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
            Self::Conflict(conflict_message.to_string())
        } else {
            Self::Other(err)
        }
    }
}

/// A page of rows plus the paginator totals.
pub struct Paged<T> {
    pub items: Vec<T>,
    pub count: u64,
    pub total_pages: u64,
}

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    /// Connectivity check for the readiness probe.
    pub async fn ping(&self) -> Result<()> {
        self.conn.ping().await?;
        Ok(())
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn category_repo(&self) -> repositories::category::CategoryRepository {
        repositories::category::CategoryRepository::new(self.conn.clone())
    }

    fn genre_repo(&self) -> repositories::genre::GenreRepository {
        repositories::genre::GenreRepository::new(self.conn.clone())
    }

    fn title_repo(&self) -> repositories::title::TitleRepository {
        repositories::title::TitleRepository::new(self.conn.clone())
    }

    fn review_repo(&self) -> repositories::review::ReviewRepository {
        repositories::review::ReviewRepository::new(self.conn.clone())
    }

    fn comment_repo(&self) -> repositories::comment::CommentRepository {
        repositories::comment::CommentRepository::new(self.conn.clone())
    }

    // ========================================================================
    // Users
    // ========================================================================

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<users::Model>> {
        self.user_repo().get_by_username(username).await
    }

    pub async fn get_user_by_token(&self, token: &str) -> Result<Option<users::Model>> {
        self.user_repo().get_by_token(token).await
    }

    pub async fn get_or_create_user(
        &self,
        username: &str,
        email: &str,
    ) -> Result<users::Model, InsertError> {
        self.user_repo().get_or_create(username, email).await
    }

    pub async fn create_user(
        &self,
        input: repositories::user::NewUser,
    ) -> Result<users::Model, InsertError> {
        self.user_repo().create(input).await
    }

    pub async fn update_user(
        &self,
        user: users::Model,
        changes: repositories::user::UserChanges,
    ) -> Result<users::Model, InsertError> {
        self.user_repo().update(user, changes).await
    }

    pub async fn delete_user(&self, username: &str) -> Result<bool> {
        self.user_repo().delete_by_username(username).await
    }

    pub async fn list_users(
        &self,
        page: u64,
        page_size: u64,
        search: Option<String>,
    ) -> Result<Paged<users::Model>> {
        self.user_repo().list(page, page_size, search).await
    }

    pub async fn set_confirmation_code(&self, user: users::Model, code: &str) -> Result<()> {
        self.user_repo().set_confirmation_code(user, code).await
    }

    /// Persist a freshly issued token and clear the confirmation code, making
    /// the code single-use.
    pub async fn issue_token(&self, user: users::Model, token: &str) -> Result<()> {
        self.user_repo().issue_token(user, token).await
    }

    // ========================================================================
    // Categories & Genres
    // ========================================================================

    pub async fn list_categories(
        &self,
        page: u64,
        page_size: u64,
        search: Option<String>,
    ) -> Result<Paged<categories::Model>> {
        self.category_repo().list(page, page_size, search).await
    }

    pub async fn get_category_by_slug(&self, slug: &str) -> Result<Option<categories::Model>> {
        self.category_repo().get_by_slug(slug).await
    }

    pub async fn create_category(
        &self,
        name: &str,
        slug: &str,
    ) -> Result<categories::Model, InsertError> {
        self.category_repo().create(name, slug).await
    }

    pub async fn update_category(
        &self,
        category: categories::Model,
        name: Option<String>,
        slug: Option<String>,
    ) -> Result<categories::Model, InsertError> {
        self.category_repo().update(category, name, slug).await
    }

    pub async fn delete_category(&self, slug: &str) -> Result<bool> {
        self.category_repo().delete_by_slug(slug).await
    }

    pub async fn list_genres(
        &self,
        page: u64,
        page_size: u64,
        search: Option<String>,
    ) -> Result<Paged<genres::Model>> {
        self.genre_repo().list(page, page_size, search).await
    }

    pub async fn get_genre_by_slug(&self, slug: &str) -> Result<Option<genres::Model>> {
        self.genre_repo().get_by_slug(slug).await
    }

    pub async fn get_genres_by_slugs(&self, slugs: &[String]) -> Result<Vec<genres::Model>> {
        self.genre_repo().get_by_slugs(slugs).await
    }

    pub async fn create_genre(&self, name: &str, slug: &str) -> Result<genres::Model, InsertError> {
        self.genre_repo().create(name, slug).await
    }

    pub async fn update_genre(
        &self,
        genre: genres::Model,
        name: Option<String>,
        slug: Option<String>,
    ) -> Result<genres::Model, InsertError> {
        self.genre_repo().update(genre, name, slug).await
    }

    pub async fn delete_genre(&self, slug: &str) -> Result<bool> {
        self.genre_repo().delete_by_slug(slug).await
    }

    // ========================================================================
    // Titles
    // ========================================================================

    pub async fn list_titles(
        &self,
        page: u64,
        page_size: u64,
        filter: TitleFilter,
    ) -> Result<Paged<TitleRecord>> {
        self.title_repo().list(page, page_size, filter).await
    }

    pub async fn get_title(&self, id: i32) -> Result<Option<TitleRecord>> {
        self.title_repo().get(id).await
    }

    pub async fn title_exists(&self, id: i32) -> Result<bool> {
        self.title_repo().exists(id).await
    }

    pub async fn create_title(
        &self,
        name: &str,
        description: Option<String>,
        year: i32,
        category_id: Option<i32>,
        genre_ids: Vec<i32>,
    ) -> Result<TitleRecord> {
        self.title_repo()
            .create(name, description, year, category_id, genre_ids)
            .await
    }

    pub async fn update_title(
        &self,
        id: i32,
        changes: repositories::title::TitleChanges,
    ) -> Result<Option<TitleRecord>> {
        self.title_repo().update(id, changes).await
    }

    pub async fn delete_title(&self, id: i32) -> Result<bool> {
        self.title_repo().delete(id).await
    }

    // ========================================================================
    // Reviews & Comments
    // ========================================================================

    pub async fn list_reviews(
        &self,
        title_id: i32,
        page: u64,
        page_size: u64,
    ) -> Result<Paged<(reviews::Model, Option<users::Model>)>> {
        self.review_repo().list_for_title(title_id, page, page_size).await
    }

    pub async fn get_review(
        &self,
        title_id: i32,
        id: i32,
    ) -> Result<Option<(reviews::Model, Option<users::Model>)>> {
        self.review_repo().get(title_id, id).await
    }

    pub async fn has_review_by(&self, title_id: i32, author_id: i32) -> Result<bool> {
        self.review_repo().exists_for(title_id, author_id).await
    }

    pub async fn create_review(
        &self,
        title_id: i32,
        author_id: i32,
        text: &str,
        score: i32,
    ) -> Result<reviews::Model, InsertError> {
        self.review_repo()
            .create(title_id, author_id, text, score)
            .await
    }

    pub async fn update_review(
        &self,
        review: reviews::Model,
        text: Option<String>,
        score: Option<i32>,
    ) -> Result<reviews::Model> {
        self.review_repo().update(review, text, score).await
    }

    pub async fn delete_review(&self, id: i32) -> Result<bool> {
        self.review_repo().delete(id).await
    }

    pub async fn list_comments(
        &self,
        review_id: i32,
        page: u64,
        page_size: u64,
    ) -> Result<Paged<(comments::Model, Option<users::Model>)>> {
        self.comment_repo()
            .list_for_review(review_id, page, page_size)
            .await
    }

    pub async fn get_comment(
        &self,
        review_id: i32,
        id: i32,
    ) -> Result<Option<(comments::Model, Option<users::Model>)>> {
        self.comment_repo().get(review_id, id).await
    }

    pub async fn create_comment(
        &self,
        review_id: i32,
        author_id: i32,
        text: &str,
    ) -> Result<comments::Model> {
        self.comment_repo().create(review_id, author_id, text).await
    }

    pub async fn update_comment(
        &self,
        comment: comments::Model,
        text: Option<String>,
    ) -> Result<comments::Model> {
        self.comment_repo().update(comment, text).await
    }

    pub async fn delete_comment(&self, id: i32) -> Result<bool> {
        self.comment_repo().delete(id).await
    }
}
