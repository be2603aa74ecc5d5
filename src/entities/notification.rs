//! Notification entity - In-portal messages shown in the header bell.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Notification database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notifications")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Recipient profile id
    pub user_id: String,
    /// Short headline
    pub title: String,
    /// Body text
    #[sea_orm(column_type = "Text")]
    pub message: String,
    /// Whether the recipient has opened it
    pub is_read: bool,
    /// When the notification was created
    pub created_at: DateTimeUtc,
}

/// Notifications have no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
