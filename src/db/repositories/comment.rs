use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::db::Paged;
use crate::entities::{comments, users};

pub struct CommentRepository {
    conn: DatabaseConnection,
}

impl CommentRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn list_for_review(
        &self,
        review_id: i32,
        page: u64,
        page_size: u64,
    ) -> Result<Paged<(comments::Model, Option<users::Model>)>> {
        let paginator = comments::Entity::find()
            .filter(comments::Column::ReviewId.eq(review_id))
            .order_by_desc(comments::Column::PubDate)
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

    pub async fn get(
        &self,
        review_id: i32,
        id: i32,
    ) -> Result<Option<(comments::Model, Option<users::Model>)>> {
        comments::Entity::find_by_id(id)
            .filter(comments::Column::ReviewId.eq(review_id))
            .find_also_related(users::Entity)
            .one(&self.conn)
            .await
            .context("Failed to query comment")
    }

    pub async fn create(
        &self,
        review_id: i32,
        author_id: i32,
        text: &str,
    ) -> Result<comments::Model> {
        let active = comments::ActiveModel {
            review_id: Set(review_id),
            author_id: Set(author_id),
            text: Set(text.to_string()),
            pub_date: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };

        active
            .insert(&self.conn)
            .await
            .context("Failed to insert comment")
    }

    pub async fn update(
        &self,
        comment: comments::Model,
        text: Option<String>,
    ) -> Result<comments::Model> {
        let mut active: comments::ActiveModel = comment.into();

        if let Some(text) = text {
            active.text = Set(text);
        }

        active
            .update(&self.conn)
            .await
            .context("Failed to update comment")
    }

    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = comments::Entity::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete comment")?;

        Ok(result.rows_affected > 0)
    }
}
