//! Service category entity - Groups services in the catalog (e.g. "Certificates").

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Service category database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "service_categories")]
pub struct Model {
    /// Unique identifier for the category
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Category name
    #[sea_orm(unique)]
    pub name: String,
    /// Optional description
    pub description: Option<String>,
    /// Hidden categories are kept for history
    pub is_active: bool,
}

/// Defines relationships between `ServiceCategory` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One category has many services
    #[sea_orm(has_many = "super::service::Entity")]
    Services,
}

impl Related<super::service::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Services.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
