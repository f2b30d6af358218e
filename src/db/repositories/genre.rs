use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::db::{InsertError, Paged};
use crate::entities::genres;

pub struct GenreRepository {
    conn: DatabaseConnection,
}

impl GenreRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn list(
        &self,
        page: u64,
        page_size: u64,
        search: Option<String>,
    ) -> Result<Paged<genres::Model>> {
        let mut query = genres::Entity::find().order_by_asc(genres::Column::Name);

        if let Some(term) = search {
            query = query.filter(genres::Column::Name.contains(term));
        }

        let paginator = query.paginate(&self.conn, page_size);
        let totals = paginator.num_items_and_pages().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok(Paged {
            items,
            count: totals.number_of_items,
            total_pages: totals.number_of_pages,
        })
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<genres::Model>> {
        genres::Entity::find()
            .filter(genres::Column::Slug.eq(slug))
            .one(&self.conn)
            .await
            .context("Failed to query genre by slug")
    }

    /// Resolve a batch of slugs; the caller decides what a missing slug means.
    pub async fn get_by_slugs(&self, slugs: &[String]) -> Result<Vec<genres::Model>> {
        if slugs.is_empty() {
            return Ok(Vec::new());
        }

        genres::Entity::find()
            .filter(genres::Column::Slug.is_in(slugs.iter().cloned()))
            .all(&self.conn)
            .await
            .context("Failed to query genres by slugs")
    }

    pub async fn create(&self, name: &str, slug: &str) -> Result<genres::Model, InsertError> {
        let active = genres::ActiveModel {
            name: Set(name.to_string()),
            slug: Set(slug.to_string()),
            ..Default::default()
        };

        active
            .insert(&self.conn)
            .await
            .map_err(|e| InsertError::from_db(e, "genre slug already in use"))
    }

    pub async fn update(
        &self,
        genre: genres::Model,
        name: Option<String>,
        slug: Option<String>,
    ) -> Result<genres::Model, InsertError> {
        let mut active: genres::ActiveModel = genre.into();

        if let Some(name) = name {
            active.name = Set(name);
        }
        if let Some(slug) = slug {
            active.slug = Set(slug);
        }

        active
            .update(&self.conn)
            .await
            .map_err(|e| InsertError::from_db(e, "genre slug already in use"))
    }

    pub async fn delete_by_slug(&self, slug: &str) -> Result<bool> {
        let result = genres::Entity::delete_many()
            .filter(genres::Column::Slug.eq(slug))
            .exec(&self.conn)
            .await
            .context("Failed to delete genre")?;

        Ok(result.rows_affected > 0)
    }
}
