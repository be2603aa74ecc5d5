//! Payment session entity - One bank checkout attempt, keyed by `order_id`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Gateway-reported state of a payment session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Session created, user not yet redirected back
    #[sea_orm(string_value = "initiated")]
    Initiated,
    /// Bank acknowledged but has not settled
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Payment captured
    #[sea_orm(string_value = "success")]
    Success,
    /// Payment declined or errored
    #[sea_orm(string_value = "failure")]
    Failure,
    /// User abandoned the checkout
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl PaymentStatus {
    /// Lowercase name as stored in the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initiated => "initiated",
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment session database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payment_sessions")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Merchant order id sent to the bank
    #[sea_orm(unique)]
    pub order_id: String,
    /// Paying profile id
    pub user_id: String,
    /// Service request the payment is for, if any
    pub service_request_id: Option<i64>,
    /// Amount in the currency's major unit
    pub amount: f64,
    /// ISO currency code
    pub currency: String,
    /// Current gateway status
    pub status: PaymentStatus,
    /// Gateway identifier (bank name or test harness)
    pub gateway: String,
    /// When the session was created
    pub created_at: DateTimeUtc,
    /// When the status last changed
    pub updated_at: DateTimeUtc,
}

/// Audit rows reference sessions by `order_id`, not by foreign key
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
