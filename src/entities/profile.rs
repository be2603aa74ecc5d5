//! Profile entity - A portal user (student, staff or administrator).
//!
//! Profiles mirror the identity rows created at sign-up. The id is the auth
//! provider's user id, so it is a string rather than an autoincrement key.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Profile database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "profiles")]
pub struct Model {
    /// Auth provider user id
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Login e-mail, unique across the portal
    #[sea_orm(unique)]
    pub email: String,
    /// Display name
    pub full_name: String,
    /// Department the user belongs to, if any
    pub department: Option<String>,
    /// Deactivated users keep their history but cannot act
    pub is_active: bool,
    /// When the profile was created
    pub created_at: DateTimeUtc,
    /// When the profile was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Profile and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One profile holds many role assignments
    #[sea_orm(has_many = "super::user_role::Entity")]
    UserRoles,
}

impl Related<super::user_role::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserRoles.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
