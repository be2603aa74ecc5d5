//! Bank test case entity - Scripted scenarios run against the bank's UAT environment.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Bank test case database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bank_test_cases")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Case code from the bank's test sheet (e.g. `TC-07`)
    #[sea_orm(unique)]
    pub case_code: String,
    /// What the case exercises
    pub description: String,
    /// Payment status the case should end in
    pub expected_status: String,
    /// Status observed on the last run
    pub actual_status: Option<String>,
    /// Whether the last run matched the expectation
    pub passed: Option<bool>,
    /// Order used for the last run
    pub order_id: Option<String>,
    /// When the case was last run
    pub executed_at: Option<DateTimeUtc>,
    /// When the case was defined
    pub created_at: DateTimeUtc,
}

/// Test cases have no foreign keys
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
