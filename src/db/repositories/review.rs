use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::db::{InsertError, Paged};
use crate::entities::{reviews, users};

pub struct ReviewRepository {
    conn: DatabaseConnection,
}

impl ReviewRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn list_for_title(
        &self,
        title_id: i32,
        page: u64,
        page_size: u64,
    ) -> Result<Paged<(reviews::Model, Option<users::Model>)>> {
        let paginator = reviews::Entity::find()
            .filter(reviews::Column::TitleId.eq(title_id))
            .order_by_desc(reviews::Column::PubDate)
            .find_also_related(users::Entity)
            .paginate(&self.conn, page_size);

        let totals = paginator.num_items_and_pages().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok(Paged {
            items,
            count: totals.number_of_items,
            total_pages: totals.number_of_pages,
        })
    }

    /// Fetch a review scoped to its parent title; a review id under the
    /// wrong title is treated as absent.
    pub async fn get(
        &self,
        title_id: i32,
        id: i32,
    ) -> Result<Option<(reviews::Model, Option<users::Model>)>> {
        reviews::Entity::find_by_id(id)
            .filter(reviews::Column::TitleId.eq(title_id))
            .find_also_related(users::Entity)
            .one(&self.conn)
            .await
            .context("Failed to query review")
    }

    pub async fn exists_for(&self, title_id: i32, author_id: i32) -> Result<bool> {
        let count = reviews::Entity::find()
            .filter(reviews::Column::TitleId.eq(title_id))
            .filter(reviews::Column::AuthorId.eq(author_id))
            .count(&self.conn)
            .await
            .context("Failed to check review existence")?;

        Ok(count > 0)
    }

    pub async fn create(
        &self,
        title_id: i32,
        author_id: i32,
        text: &str,
        score: i32,
    ) -> Result<reviews::Model, InsertError> {
        let active = reviews::ActiveModel {
            title_id: Set(title_id),
            author_id: Set(author_id),
            text: Set(text.to_string()),
            score: Set(score),
            pub_date: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };

        active
            .insert(&self.conn)
            .await
            .map_err(|e| InsertError::from_db(e, "you have already reviewed this title"))
    }

    /// Author and pub_date are immutable; only text and score move.
    pub async fn update(
        &self,
        review: reviews::Model,
        text: Option<String>,
        score: Option<i32>,
    ) -> Result<reviews::Model> {
        let mut active: reviews::ActiveModel = review.into();

        if let Some(text) = text {
            active.text = Set(text);
        }
        if let Some(score) = score {
            active.score = Set(score);
        }

        active
            .update(&self.conn)
            .await
            .context("Failed to update review")
    }

    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = reviews::Entity::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete review")?;

        Ok(result.rows_affected > 0)
    }
}
