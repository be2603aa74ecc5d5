//! User role entity - Join table between profiles and roles.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// User role assignment database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_roles")]
pub struct Model {
    /// Unique identifier for the assignment
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Profile holding the role
    pub user_id: String,
    /// Role being held
    pub role_id: i64,
    /// When the role was granted
    pub assigned_at: DateTimeUtc,
}

/// Defines relationships between `UserRole` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each assignment belongs to one profile
    #[sea_orm(
        belongs_to = "super::profile::Entity",
        from = "Column::UserId",
        to = "super::profile::Column::Id"
    )]
    Profile,
    /// Each assignment refers to one role
    #[sea_orm(
        belongs_to = "super::role::Entity",
        from = "Column::RoleId",
        to = "super::role::Column::Id"
    )]
    Role,
}

impl Related<super::profile::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Profile.def()
    }
}

impl Related<super::role::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Role.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
