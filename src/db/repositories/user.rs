use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::db::{InsertError, Paged};
use crate::entities::users::{self, Role};

/// Fields for an admin-created user.
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub role: Role,
}

/// Partial update; `None` means leave the field alone.
#[derive(Default)]
pub struct UserChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub role: Option<Role>,
}

const UNIQUENESS_MESSAGE: &str = "username or email already in use";

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<users::Model>> {
        users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user by username")
    }

    pub async fn get_by_token(&self, token: &str) -> Result<Option<users::Model>> {
        users::Entity::find()
            .filter(users::Column::Token.eq(token))
            .one(&self.conn)
            .await
            .context("Failed to query user by token")
    }

    /// Signup semantics: an exact (username, email) match returns the
    /// existing record; otherwise insert. A partial match on only one of the
    /// two unique fields surfaces as a conflict from the unique index.
    pub async fn get_or_create(
        &self,
        username: &str,
        email: &str,
    ) -> Result<users::Model, InsertError> {
        let existing = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .filter(users::Column::Email.eq(email))
            .one(&self.conn)
            .await?;

        if let Some(user) = existing {
            return Ok(user);
        }

        let now = chrono::Utc::now().to_rfc3339();
        let active = users::ActiveModel {
            username: Set(username.to_string()),
            email: Set(email.to_string()),
            role: Set(Role::User),
            is_staff: Set(false),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        active
            .insert(&self.conn)
            .await
            .map_err(|e| InsertError::from_db(e, UNIQUENESS_MESSAGE))
    }

    pub async fn create(&self, input: NewUser) -> Result<users::Model, InsertError> {
        let now = chrono::Utc::now().to_rfc3339();
        let active = users::ActiveModel {
            username: Set(input.username),
            email: Set(input.email),
            first_name: Set(input.first_name),
            last_name: Set(input.last_name),
            bio: Set(input.bio),
            role: Set(input.role),
            is_staff: Set(false),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        active
            .insert(&self.conn)
            .await
            .map_err(|e| InsertError::from_db(e, UNIQUENESS_MESSAGE))
    }

    pub async fn update(
        &self,
        user: users::Model,
        changes: UserChanges,
    ) -> Result<users::Model, InsertError> {
        let mut active: users::ActiveModel = user.into();

        if let Some(username) = changes.username {
            active.username = Set(username);
        }
        if let Some(email) = changes.email {
            active.email = Set(email);
        }
        if let Some(first_name) = changes.first_name {
            active.first_name = Set(Some(first_name));
        }
        if let Some(last_name) = changes.last_name {
            active.last_name = Set(Some(last_name));
        }
        if let Some(bio) = changes.bio {
            active.bio = Set(Some(bio));
        }
        if let Some(role) = changes.role {
            active.role = Set(role);
        }
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        active
            .update(&self.conn)
            .await
            .map_err(|e| InsertError::from_db(e, UNIQUENESS_MESSAGE))
    }

    pub async fn delete_by_username(&self, username: &str) -> Result<bool> {
        let result = users::Entity::delete_many()
            .filter(users::Column::Username.eq(username))
            .exec(&self.conn)
            .await
            .context("Failed to delete user")?;

        Ok(result.rows_affected > 0)
    }

    pub async fn list(
        &self,
        page: u64,
        page_size: u64,
        search: Option<String>,
    ) -> Result<Paged<users::Model>> {
        let mut query = users::Entity::find().order_by_asc(users::Column::Username);

        if let Some(term) = search {
            query = query.filter(users::Column::Username.contains(term));
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

    pub async fn set_confirmation_code(&self, user: users::Model, code: &str) -> Result<()> {
        let mut active: users::ActiveModel = user.into();
        active.confirmation_code = Set(Some(code.to_string()));
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());
        active
            .update(&self.conn)
            .await
            .context("Failed to store confirmation code")?;

        Ok(())
    }

    pub async fn issue_token(&self, user: users::Model, token: &str) -> Result<()> {
        let mut active: users::ActiveModel = user.into();
        active.token = Set(Some(token.to_string()));
        active.confirmation_code = Set(None);
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());
        active
            .update(&self.conn)
            .await
            .context("Failed to store access token")?;

        Ok(())
    }
}
