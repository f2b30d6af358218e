use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::db::{InsertError, Paged};
use crate::entities::categories;

pub struct CategoryRepository {
    conn: DatabaseConnection,
}

impl CategoryRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn list(
        &self,
        page: u64,
        page_size: u64,
        search: Option<String>,
    ) -> Result<Paged<categories::Model>> {
        let mut query = categories::Entity::find().order_by_asc(categories::Column::Name);

        if let Some(term) = search {
            query = query.filter(categories::Column::Name.contains(term));
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

    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<categories::Model>> {
        categories::Entity::find()
            .filter(categories::Column::Slug.eq(slug))
            .one(&self.conn)
            .await
            .context("Failed to query category by slug")
    }

    pub async fn create(&self, name: &str, slug: &str) -> Result<categories::Model, InsertError> {
        let active = categories::ActiveModel {
            name: Set(name.to_string()),
            slug: Set(slug.to_string()),
            ..Default::default()
        };

        active
            .insert(&self.conn)
            .await
            .map_err(|e| InsertError::from_db(e, "category slug already in use"))
    }

    pub async fn update(
        &self,
        category: categories::Model,
        name: Option<String>,
        slug: Option<String>,
    ) -> Result<categories::Model, InsertError> {
        let mut active: categories::ActiveModel = category.into();

        if let Some(name) = name {
            active.name = Set(name);
        }
        if let Some(slug) = slug {
            active.slug = Set(slug);
        }

        active
            .update(&self.conn)
            .await
            .map_err(|e| InsertError::from_db(e, "category slug already in use"))
    }

    pub async fn delete_by_slug(&self, slug: &str) -> Result<bool> {
        let result = categories::Entity::delete_many()
            .filter(categories::Column::Slug.eq(slug))
            .exec(&self.conn)
            .await
            .context("Failed to delete category")?;

        Ok(result.rows_affected > 0)
    }
}
