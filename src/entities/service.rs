//! Service entity - A requestable administrative service.
//!
//! `max_approval_level` is the length of the approval chain and is kept in sync
//! with the service's rows in `service_approval_levels`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Service database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "services")]
pub struct Model {
    /// Unique identifier for the service
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Category the service is listed under
    pub category_id: i64,
    /// Service name (e.g. "Bonafide certificate")
    pub name: String,
    /// Optional description shown to requesters
    pub description: Option<String>,
    /// Inactive services cannot receive new requests
    pub is_active: bool,
    /// Number of approval steps a request must pass
    pub max_approval_level: i32,
    /// When the service was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Service and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each service belongs to one category
    #[sea_orm(
        belongs_to = "super::service_category::Entity",
        from = "Column::CategoryId",
        to = "super::service_category::Column::Id"
    )]
    Category,
    /// One service has many approval levels
    #[sea_orm(has_many = "super::service_approval_level::Entity")]
    ApprovalLevels,
    /// One service has many requests
    #[sea_orm(has_many = "super::service_request::Entity")]
    Requests,
}

impl Related<super::service_category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::service_approval_level::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ApprovalLevels.def()
    }
}

impl Related<super::service_request::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Requests.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
