//! Security audit log entity - Suspicious or noteworthy payment events.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Severity of a security event.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational
    #[sea_orm(string_value = "low")]
    Low,
    /// Worth a look
    #[sea_orm(string_value = "medium")]
    Medium,
    /// Probable tampering or misconfiguration
    #[sea_orm(string_value = "high")]
    High,
    /// Needs immediate attention
    #[sea_orm(string_value = "critical")]
    Critical,
}

/// Security audit log database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "security_audit_log")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Related order, if the event concerns one
    pub order_id: Option<String>,
    /// Machine-readable event name (e.g. `hash_mismatch`)
    pub event_type: String,
    /// Event severity
    pub severity: Severity,
    /// Human-readable details
    #[sea_orm(column_type = "Text")]
    pub details: String,
    /// Client address, when known
    pub ip_address: Option<String>,
    /// When the event was logged
    pub created_at: DateTimeUtc,
}

/// Audit log rows have no foreign keys
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
