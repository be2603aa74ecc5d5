//! Database configuration module for the portal.
//!
//! This module handles the database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust structs.
//! Production runs against Postgres; tests use in-memory `SQLite`.

use crate::entities::{
    BankTestCase, HashVerification, Notification, PaymentSession, PaymentStatusHistory, Profile,
    Role, SecurityAuditLog, Service, ServiceApprovalLevel, ServiceCategory, ServiceRequest,
    TransactionDetail, UserRole,
};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};
use std::path::Path;
use tracing::{debug, info, instrument};

/// Establishes a connection to the database at `database_url`.
#[instrument(skip(database_url))]
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    ensure_sqlite_dir(database_url)?;
    debug!("Connecting to database");
    Database::connect(database_url).await.map_err(Into::into)
}

/// Creates the parent directory of a file-backed `SQLite` URL so `mode=rwc` can create the file.
fn ensure_sqlite_dir(database_url: &str) -> Result<()> {
    let Some(rest) = database_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let file = rest.split('?').next().unwrap_or_default();
    if let Some(parent) = Path::new(file).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

async fn create_table_for<E>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<()>
where
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    Ok(())
}

/// Creates all necessary database tables using `SeaORM`'s schema generation from entity definitions.
///
/// Tables are created parents-first so that foreign keys resolve on Postgres.
/// Existing tables are left untouched.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let schema = Schema::new(db.get_database_backend());

    // Users and roles
    create_table_for(db, &schema, Profile).await?;
    create_table_for(db, &schema, Role).await?;
    create_table_for(db, &schema, UserRole).await?;

    // Service catalog and workflow
    create_table_for(db, &schema, ServiceCategory).await?;
    create_table_for(db, &schema, Service).await?;
    create_table_for(db, &schema, ServiceApprovalLevel).await?;
    create_table_for(db, &schema, ServiceRequest).await?;
    create_table_for(db, &schema, Notification).await?;

    // Payment audit trail
    create_table_for(db, &schema, PaymentSession).await?;
    create_table_for(db, &schema, TransactionDetail).await?;
    create_table_for(db, &schema, PaymentStatusHistory).await?;
    create_table_for(db, &schema, SecurityAuditLog).await?;
    create_table_for(db, &schema, BankTestCase).await?;
    create_table_for(db, &schema, HashVerification).await?;

    info!("Database tables ensured");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{PaymentSessionModel, ProfileModel, ServiceRequestModel};
    use sea_orm::QuerySelect;

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = create_connection("sqlite::memory:").await?;
        create_tables(&db).await?;

        // Test that tables exist by querying them
        let _: Vec<ProfileModel> = Profile::find().limit(1).all(&db).await?;
        let _: Vec<ServiceRequestModel> = ServiceRequest::find().limit(1).all(&db).await?;
        let _: Vec<PaymentSessionModel> = PaymentSession::find().limit(1).all(&db).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_is_idempotent() -> Result<()> {
        let db = create_connection("sqlite::memory:").await?;
        create_tables(&db).await?;
        create_tables(&db).await?;
        Ok(())
    }
}
