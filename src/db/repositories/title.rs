use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::collections::HashMap;

use crate::db::Paged;
use crate::entities::{categories, genres, reviews, title_genres, titles};

/// A title plus everything its representation needs: the resolved category,
/// the attached genres, and the on-read mean of review scores.
pub struct TitleRecord {
    pub title: titles::Model,
    pub category: Option<categories::Model>,
    pub genres: Vec<genres::Model>,
    pub rating: Option<f64>,
}

/// Title list filters; all present filters are ANDed together.
#[derive(Default)]
pub struct TitleFilter {
    pub name: Option<String>,
    pub category_slug: Option<String>,
    pub genre_slug: Option<String>,
    pub year: Option<i32>,
}

/// Partial update for a title; `None` leaves the field alone.
#[derive(Default)]
pub struct TitleChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub year: Option<i32>,
    pub category_id: Option<i32>,
    pub genre_ids: Option<Vec<i32>>,
}

pub struct TitleRepository {
    conn: DatabaseConnection,
}

impl TitleRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn list(
        &self,
        page: u64,
        page_size: u64,
        filter: TitleFilter,
    ) -> Result<Paged<TitleRecord>> {
        let mut query = titles::Entity::find()
            .order_by_desc(titles::Column::Year)
            .order_by_asc(titles::Column::Name);

        if let Some(name) = filter.name {
            query = query.filter(titles::Column::Name.contains(name));
        }

        if let Some(year) = filter.year {
            query = query.filter(titles::Column::Year.eq(year));
        }

        if let Some(slug) = filter.category_slug {
            let category = categories::Entity::find()
                .filter(categories::Column::Slug.eq(slug))
                .one(&self.conn)
                .await
                .context("Failed to resolve category filter")?;

            match category {
                Some(category) => {
                    query = query.filter(titles::Column::CategoryId.eq(category.id));
                }
                // Unknown slug matches nothing rather than erroring.
                None => return Ok(empty_page()),
            }
        }

        if let Some(slug) = filter.genre_slug {
            let genre = genres::Entity::find()
                .filter(genres::Column::Slug.eq(slug))
                .one(&self.conn)
                .await
                .context("Failed to resolve genre filter")?;

            let Some(genre) = genre else {
                return Ok(empty_page());
            };

            let title_ids: Vec<i32> = title_genres::Entity::find()
                .filter(title_genres::Column::GenreId.eq(genre.id))
                .all(&self.conn)
                .await
                .context("Failed to resolve genre filter links")?
                .into_iter()
                .map(|link| link.title_id)
                .collect();

            if title_ids.is_empty() {
                return Ok(empty_page());
            }

            query = query.filter(titles::Column::Id.is_in(title_ids));
        }

        let paginator = query
            .find_also_related(categories::Entity)
            .paginate(&self.conn, page_size);
        let totals = paginator.num_items_and_pages().await?;
        let rows = paginator.fetch_page(page.saturating_sub(1)).await?;

        let ids: Vec<i32> = rows.iter().map(|(title, _)| title.id).collect();
        let mut genre_map = self.genres_for(&ids).await?;
        let rating_map = self.ratings_for(&ids).await?;

        let items = rows
            .into_iter()
            .map(|(title, category)| {
                let rating = rating_map.get(&title.id).copied();
                let genres = genre_map.remove(&title.id).unwrap_or_default();
                TitleRecord {
                    title,
                    category,
                    genres,
                    rating,
                }
            })
            .collect();

        Ok(Paged {
            items,
            count: totals.number_of_items,
            total_pages: totals.number_of_pages,
        })
    }

    pub async fn get(&self, id: i32) -> Result<Option<TitleRecord>> {
        let row = titles::Entity::find_by_id(id)
            .find_also_related(categories::Entity)
            .one(&self.conn)
            .await
            .context("Failed to query title")?;

        let Some((title, category)) = row else {
            return Ok(None);
        };

        let mut genre_map = self.genres_for(&[title.id]).await?;
        let rating_map = self.ratings_for(&[title.id]).await?;
        let rating = rating_map.get(&title.id).copied();
        let genres = genre_map.remove(&title.id).unwrap_or_default();

        Ok(Some(TitleRecord {
            title,
            category,
            genres,
            rating,
        }))
    }

    pub async fn exists(&self, id: i32) -> Result<bool> {
        let count = titles::Entity::find_by_id(id)
            .count(&self.conn)
            .await
            .context("Failed to check title existence")?;

        Ok(count > 0)
    }

    pub async fn create(
        &self,
        name: &str,
        description: Option<String>,
        year: i32,
        category_id: Option<i32>,
        genre_ids: Vec<i32>,
    ) -> Result<TitleRecord> {
        let txn = self.conn.begin().await?;

        let active = titles::ActiveModel {
            name: Set(name.to_string()),
            description: Set(description),
            year: Set(year),
            category_id: Set(category_id),
            ..Default::default()
        };

        let title = active.insert(&txn).await.context("Failed to insert title")?;

        if !genre_ids.is_empty() {
            let links = genre_ids.iter().map(|&genre_id| title_genres::ActiveModel {
                title_id: Set(title.id),
                genre_id: Set(genre_id),
            });
            title_genres::Entity::insert_many(links)
                .exec(&txn)
                .await
                .context("Failed to link title genres")?;
        }

        txn.commit().await?;

        self.get(title.id)
            .await?
            .context("Title disappeared right after insert")
    }

    pub async fn update(&self, id: i32, changes: TitleChanges) -> Result<Option<TitleRecord>> {
        let Some(title) = titles::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query title for update")?
        else {
            return Ok(None);
        };

        let txn = self.conn.begin().await?;

        let mut active: titles::ActiveModel = title.into();
        if let Some(name) = changes.name {
            active.name = Set(name);
        }
        if let Some(description) = changes.description {
            active.description = Set(Some(description));
        }
        if let Some(year) = changes.year {
            active.year = Set(year);
        }
        if let Some(category_id) = changes.category_id {
            active.category_id = Set(Some(category_id));
        }
        let title = active
            .update(&txn)
            .await
            .context("Failed to update title")?;

        if let Some(genre_ids) = changes.genre_ids {
            title_genres::Entity::delete_many()
                .filter(title_genres::Column::TitleId.eq(title.id))
                .exec(&txn)
                .await
                .context("Failed to clear title genres")?;

            if !genre_ids.is_empty() {
                let links = genre_ids.iter().map(|&genre_id| title_genres::ActiveModel {
                    title_id: Set(title.id),
                    genre_id: Set(genre_id),
                });
                title_genres::Entity::insert_many(links)
                    .exec(&txn)
                    .await
                    .context("Failed to link title genres")?;
            }
        }

        txn.commit().await?;

        self.get(title.id).await
    }

    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = titles::Entity::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete title")?;

        Ok(result.rows_affected > 0)
    }

    /// Genres for a batch of titles, one query, grouped by title id.
    async fn genres_for(&self, title_ids: &[i32]) -> Result<HashMap<i32, Vec<genres::Model>>> {
        if title_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = title_genres::Entity::find()
            .filter(title_genres::Column::TitleId.is_in(title_ids.to_vec()))
            .find_also_related(genres::Entity)
            .all(&self.conn)
            .await
            .context("Failed to query title genres")?;

        let mut map: HashMap<i32, Vec<genres::Model>> = HashMap::new();
        for (link, genre) in rows {
            if let Some(genre) = genre {
                map.entry(link.title_id).or_default().push(genre);
            }
        }
        for genre_list in map.values_mut() {
            genre_list.sort_by(|a, b| a.name.cmp(&b.name));
        }

        Ok(map)
    }

    /// Mean review score per title. Scores are small integers so summing in
    /// Rust over the batch is simpler than pushing AVG into SQL.
    async fn ratings_for(&self, title_ids: &[i32]) -> Result<HashMap<i32, f64>> {
        if title_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<(i32, i32)> = reviews::Entity::find()
            .select_only()
            .column(reviews::Column::TitleId)
            .column(reviews::Column::Score)
            .filter(reviews::Column::TitleId.is_in(title_ids.to_vec()))
            .into_tuple()
            .all(&self.conn)
            .await
            .context("Failed to query review scores")?;

        let mut sums: HashMap<i32, (i64, i64)> = HashMap::new();
        for (title_id, score) in rows {
            let entry = sums.entry(title_id).or_default();
            entry.0 += i64::from(score);
            entry.1 += 1;
        }

        Ok(sums
            .into_iter()
            .map(|(title_id, (sum, n))| (title_id, sum as f64 / n as f64))
            .collect())
    }
}

fn empty_page() -> Paged<TitleRecord> {
    Paged {
        items: Vec::new(),
        count: 0,
        total_pages: 0,
    }
}
