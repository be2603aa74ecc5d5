//! Transaction detail entity - Raw bank response recorded for an order.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Transaction detail database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transaction_details")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Order the response belongs to
    pub order_id: String,
    /// Bank transaction id
    pub transaction_id: Option<String>,
    /// Bank reference number
    pub bank_reference: Option<String>,
    /// Gateway response code
    pub response_code: Option<String>,
    /// Gateway response message
    pub response_message: Option<String>,
    /// Full response payload as received
    #[sea_orm(column_type = "Text")]
    pub raw_response: String,
    /// Outcome of the checksum comparison, if one was supplied
    pub hash_verified: Option<bool>,
    /// When the response was recorded
    pub created_at: DateTimeUtc,
}

/// Transaction details have no foreign keys
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
