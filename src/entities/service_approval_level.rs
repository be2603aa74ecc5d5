//! Service approval level entity - Which role signs off at each step of a service's chain.
//!
//! Levels are 1-based. A request at `level = n` is waiting for the role configured
//! at level `n + 1`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Approval level database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "service_approval_levels")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Service this step belongs to
    pub service_id: i64,
    /// 1-based step number
    pub level: i32,
    /// Role name allowed to approve at this step
    pub approver_role: String,
}

/// Defines relationships between `ServiceApprovalLevel` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each level belongs to one service
    #[sea_orm(
        belongs_to = "super::service::Entity",
        from = "Column::ServiceId",
        to = "super::service::Column::Id"
    )]
    Service,
}

impl Related<super::service::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Service.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
