//! Payment status history entity - Append-only log of session status changes.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Payment status history database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payment_status_history")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Order whose status changed
    pub order_id: String,
    /// Previous status, `None` for the first entry
    pub from_status: Option<String>,
    /// New status
    pub to_status: String,
    /// Why the status changed
    pub reason: Option<String>,
    /// When the change was recorded
    pub created_at: DateTimeUtc,
}

/// History rows have no foreign keys
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
