//! Service request entity - One user's request for a service and its approval progress.
//!
//! `status` and `level` are advanced only through `core::workflow`. `version` is bumped
//! on every workflow write and is compared on update so that two approvers acting on
//! the same request cannot both succeed.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a service request.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    /// Waiting for the next approval level
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Every level has approved
    #[sea_orm(string_value = "approved")]
    Approved,
    /// An approver turned the request down
    #[sea_orm(string_value = "rejected")]
    Rejected,
    /// Withdrawn by the requester or an administrator
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    /// The service has been delivered
    #[sea_orm(string_value = "completed")]
    Completed,
}

impl RequestStatus {
    /// Lowercase name as stored in the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }

    /// Rejected, cancelled and completed requests never change again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Cancelled | Self::Completed)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Service request database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "service_requests")]
pub struct Model {
    /// Unique identifier for the request
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Requested service
    pub service_id: i64,
    /// Profile id of the requester
    pub requester_id: String,
    /// Current lifecycle status
    pub status: RequestStatus,
    /// Number of approval levels already passed
    pub level: i32,
    /// Length of the approval chain, copied from the service at creation
    pub max_approval_level: i32,
    /// Approver role for each level as a JSON array, copied from the service at creation
    #[sea_orm(column_type = "Text")]
    pub approver_roles: String,
    /// Form data submitted with the request, as JSON text
    #[sea_orm(column_type = "Text")]
    pub request_data: String,
    /// Latest approver or requester comment
    pub comments: Option<String>,
    /// Profile id of whoever last changed the status or level
    pub last_actor_id: Option<String>,
    /// Optimistic concurrency counter
    pub version: i32,
    /// When the request was submitted
    pub created_at: DateTimeUtc,
    /// When the request last changed
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between `ServiceRequest` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each request targets one service
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

impl Model {
    /// Approver role names of this request's chain, first level first.
    pub fn approval_chain(&self) -> serde_json::Result<Vec<String>> {
        serde_json::from_str(&self.approver_roles)
    }
}

impl ActiveModelBehavior for ActiveModel {}
