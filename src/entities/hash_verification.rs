//! Hash verification entity - Result of comparing the bank's checksum with ours.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Hash verification database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "hash_verification")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Order the checksum belongs to
    pub order_id: String,
    /// Checksum computed on our side
    pub expected_hash: String,
    /// Checksum sent by the bank
    pub received_hash: String,
    /// Whether the two matched
    pub is_valid: bool,
    /// When the comparison ran
    pub created_at: DateTimeUtc,
}

/// Verification rows have no foreign keys
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
