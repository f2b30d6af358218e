use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub username: String,

    /// Stored lowercased; uniqueness is checked against the lowercased form.
    #[sea_orm(unique)]
    pub email: String,

    pub first_name: Option<String>,

    pub last_name: Option<String>,

    pub bio: Option<String>,

    pub role: Role,

    pub is_staff: bool,

    /// Single-use signup code. Regenerated on every signup, cleared once a
    /// token is issued.
    pub confirmation_code: Option<String>,

    /// Opaque bearer token (64-char hex string). Rotated on each
    /// confirmation-code exchange.
    pub token: Option<String>,

    pub created_at: String,

    pub updated_at: String,
}

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    #[sea_orm(string_value = "user")]
    User,

    #[sea_orm(string_value = "moderator")]
    Moderator,

    #[sea_orm(string_value = "admin")]
    Admin,
}

impl Model {
    /// Unified admin check: the `admin` role or the staff flag.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin || self.is_staff
    }

    #[must_use]
    pub fn is_moderator(&self) -> bool {
        self.role == Role::Moderator
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::reviews::Entity")]
    Reviews,
    #[sea_orm(has_many = "super::comments::Entity")]
    Comments,
}

impl Related<super::reviews::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reviews.def()
    }
}

impl Related<super::comments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
