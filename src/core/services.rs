//! Service catalog and service requests.
//!
//! Services are grouped into categories and each carries an ordered approval chain
//! (`service_approval_levels`). A request copies the chain (its approver roles and
//! their count) when it is created, so later edits to the chain do not move requests
//! that are already in flight.

use super::workflow::{Actor, RequestAction, allowed_actions};
use crate::{
    entities::{
        RequestStatus, Service, ServiceApprovalLevel, ServiceCategory, ServiceRequest,
        ServiceApprovalLevelModel, ServiceRequestModel, service, service_approval_level,
        service_category, service_request,
    },
    errors::{Error, Result},
};
use sea_orm::{ConnectionTrait, QueryFilter, QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{debug, info, instrument};

/// Creates an active category.
pub async fn create_category(
    db: &DatabaseConnection,
    name: &str,
    description: Option<String>,
) -> Result<service_category::Model> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation("Category name cannot be empty"));
    }
    let model = service_category::ActiveModel {
        name: Set(name.to_string()),
        description: Set(description),
        is_active: Set(true),
        ..Default::default()
    };
    Ok(model.insert(db).await?)
}

/// Categories ordered by name, optionally only the active ones.
pub async fn list_categories(
    db: &DatabaseConnection,
    active_only: bool,
) -> Result<Vec<service_category::Model>> {
    let mut query = ServiceCategory::find();
    if active_only {
        query = query.filter(service_category::Column::IsActive.eq(true));
    }
    query
        .order_by_asc(service_category::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Input for [`create_service`].
#[derive(Debug, Clone, Default)]
pub struct NewService {
    /// Owning category
    pub category_id: i64,
    /// Display name
    pub name: String,
    /// Optional long description
    pub description: Option<String>,
    /// Approver role for each level, first level first
    pub approver_roles: Vec<String>,
}

fn validate_roles(roles: &[String]) -> Result<()> {
    if roles.iter().any(|r| r.trim().is_empty()) {
        return Err(Error::validation("Approver role names cannot be empty"));
    }
    Ok(())
}

fn chain_length(roles: &[String]) -> Result<i32> {
    i32::try_from(roles.len())
        .map_err(|_| Error::validation("Approval chain is too long"))
}

async fn insert_levels<C: ConnectionTrait>(
    db: &C,
    service_id: i64,
    roles: &[String],
) -> Result<Vec<ServiceApprovalLevelModel>> {
    let mut levels = Vec::with_capacity(roles.len());
    for (level, role) in (1..).zip(roles) {
        let model = service_approval_level::ActiveModel {
            service_id: Set(service_id),
            level: Set(level),
            approver_role: Set(role.trim().to_string()),
            ..Default::default()
        };
        levels.push(model.insert(db).await?);
    }
    Ok(levels)
}

/// Creates a service together with its approval chain.
#[instrument(skip(db, new), fields(name = %new.name))]
pub async fn create_service(db: &DatabaseConnection, new: NewService) -> Result<service::Model> {
    if new.name.trim().is_empty() {
        return Err(Error::validation("Service name cannot be empty"));
    }
    validate_roles(&new.approver_roles)?;
    let max_level = chain_length(&new.approver_roles)?;

    let txn = db.begin().await?;
    ServiceCategory::find_by_id(new.category_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("service category", new.category_id))?;

    let model = service::ActiveModel {
        category_id: Set(new.category_id),
        name: Set(new.name.trim().to_string()),
        description: Set(new.description),
        is_active: Set(true),
        max_approval_level: Set(max_level),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };
    let service = model.insert(&txn).await?;
    insert_levels(&txn, service.id, &new.approver_roles).await?;
    txn.commit().await?;

    info!(
        "Created service {} with {} approval level(s)",
        service.id, max_level
    );
    Ok(service)
}

/// Looks up a service by id.
pub async fn get_service<C: ConnectionTrait>(db: &C, id: i64) -> Result<service::Model> {
    Service::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("service", id))
}

/// Services ordered by name, optionally restricted to one category or to active ones.
pub async fn list_services(
    db: &DatabaseConnection,
    category_id: Option<i64>,
    active_only: bool,
) -> Result<Vec<service::Model>> {
    let mut query = Service::find();
    if let Some(category_id) = category_id {
        query = query.filter(service::Column::CategoryId.eq(category_id));
    }
    if active_only {
        query = query.filter(service::Column::IsActive.eq(true));
    }
    query
        .order_by_asc(service::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Opens or closes a service for new requests.
pub async fn set_service_active(
    db: &DatabaseConnection,
    id: i64,
    is_active: bool,
) -> Result<service::Model> {
    let existing = get_service(db, id).await?;
    let mut model: service::ActiveModel = existing.into();
    model.is_active = Set(is_active);
    Ok(model.update(db).await?)
}

/// Replaces the approval chain of a service and updates its `max_approval_level`.
///
/// Requests created earlier keep the approvers they were created with.
#[instrument(skip(db))]
pub async fn set_approval_levels(
    db: &DatabaseConnection,
    service_id: i64,
    roles: &[String],
) -> Result<Vec<ServiceApprovalLevelModel>> {
    validate_roles(roles)?;
    let max_level = chain_length(roles)?;

    let txn = db.begin().await?;
    let existing = get_service(&txn, service_id).await?;

    ServiceApprovalLevel::delete_many()
        .filter(service_approval_level::Column::ServiceId.eq(service_id))
        .exec(&txn)
        .await?;
    let levels = insert_levels(&txn, service_id, roles).await?;

    let mut model: service::ActiveModel = existing.into();
    model.max_approval_level = Set(max_level);
    model.update(&txn).await?;
    txn.commit().await?;

    info!("Service {} now has {} approval level(s)", service_id, max_level);
    Ok(levels)
}

/// Approval chain of a service, ordered by level.
pub async fn approval_levels<C: ConnectionTrait>(
    db: &C,
    service_id: i64,
) -> Result<Vec<ServiceApprovalLevelModel>> {
    ServiceApprovalLevel::find()
        .filter(service_approval_level::Column::ServiceId.eq(service_id))
        .order_by_asc(service_approval_level::Column::Level)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Submits a new request for an active service.
#[instrument(skip(db, request_data))]
pub async fn create_service_request(
    db: &DatabaseConnection,
    service_id: i64,
    requester_id: &str,
    request_data: &serde_json::Value,
) -> Result<service_request::Model> {
    let service = get_service(db, service_id).await?;
    if !service.is_active {
        return Err(Error::validation(format!(
            "Service '{}' is not accepting requests",
            service.name
        )));
    }
    let requester = super::users::get_profile(db, requester_id).await?;
    if !requester.is_active {
        return Err(Error::validation(format!(
            "Profile {requester_id} is deactivated"
        )));
    }
    let chain: Vec<String> = approval_levels(db, service_id)
        .await?
        .into_iter()
        .map(|l| l.approver_role)
        .collect();

    let now = chrono::Utc::now();
    let model = service_request::ActiveModel {
        service_id: Set(service_id),
        requester_id: Set(requester_id.to_string()),
        status: Set(RequestStatus::Pending),
        level: Set(0),
        max_approval_level: Set(chain_length(&chain)?),
        approver_roles: Set(serde_json::to_string(&chain)?),
        request_data: Set(serde_json::to_string(request_data)?),
        comments: Set(None),
        last_actor_id: Set(None),
        version: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let request = model.insert(db).await?;
    info!(
        "Request {} submitted for service {} by {}",
        request.id, service_id, requester_id
    );
    Ok(request)
}

/// Looks up a request by id.
pub async fn get_service_request(
    db: &DatabaseConnection,
    id: i64,
) -> Result<service_request::Model> {
    ServiceRequest::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("service request", id))
}

/// A requester's own requests, newest first.
pub async fn list_requests_for_requester(
    db: &DatabaseConnection,
    requester_id: &str,
    status: Option<RequestStatus>,
) -> Result<Vec<service_request::Model>> {
    let mut query =
        ServiceRequest::find().filter(service_request::Column::RequesterId.eq(requester_id));
    if let Some(status) = status {
        query = query.filter(service_request::Column::Status.eq(status));
    }
    query
        .order_by_desc(service_request::Column::CreatedAt)
        .order_by_desc(service_request::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Pending requests that `actor` may approve right now, oldest first.
pub async fn list_pending_for_actor(
    db: &DatabaseConnection,
    actor: &Actor,
) -> Result<Vec<service_request::Model>> {
    let pending = ServiceRequest::find()
        .filter(service_request::Column::Status.eq(RequestStatus::Pending))
        .order_by_asc(service_request::Column::CreatedAt)
        .order_by_asc(service_request::Column::Id)
        .all(db)
        .await?;

    let mut actionable: Vec<ServiceRequestModel> = Vec::new();
    for request in pending {
        let chain = request.approval_chain()?;
        if allowed_actions(&request, actor, &chain).contains(&RequestAction::Approve) {
            actionable.push(request);
        }
    }
    debug!(
        "{} pending request(s) actionable by {}",
        actionable.len(),
        actor.user_id
    );
    Ok(actionable)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::workflow::{apply_action, available_actions};
    use crate::test_utils::{
        create_test_profile, create_test_request, create_test_service, setup_test_db,
    };
    use serde_json::json;

    #[tokio::test]
    async fn test_create_service_builds_chain() -> Result<()> {
        let db = setup_test_db().await?;
        let service = create_test_service(&db, "Bonafide", &["hod", "principal"]).await?;

        assert_eq!(service.max_approval_level, 2);
        let levels = approval_levels(&db, service.id).await?;
        let roles: Vec<_> = levels.iter().map(|l| (l.level, l.approver_role.as_str())).collect();
        assert_eq!(roles, vec![(1, "hod"), (2, "principal")]);
        Ok(())
    }

    #[tokio::test]
    async fn test_create_service_validation() -> Result<()> {
        let db = setup_test_db().await?;
        let missing_category = create_service(
            &db,
            NewService {
                category_id: 42,
                name: "Orphan".to_string(),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(missing_category, Err(Error::NotFound { .. })));

        let category = create_category(&db, "Academic", None).await?;
        let blank_role = create_service(
            &db,
            NewService {
                category_id: category.id,
                name: "Bad".to_string(),
                approver_roles: vec![" ".to_string()],
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(blank_role, Err(Error::Validation { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_set_approval_levels_keeps_existing_requests() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_profile(&db, "s1", "Student").await?;
        let service = create_test_service(&db, "Leave", &["hod"]).await?;
        let before = create_test_request(&db, service.id, "s1").await?;

        let roles = vec!["tutor".to_string(), "hod".to_string(), "principal".to_string()];
        let levels = set_approval_levels(&db, service.id, &roles).await?;
        assert_eq!(levels.len(), 3);
        assert_eq!(get_service(&db, service.id).await?.max_approval_level, 3);

        let after = create_test_request(&db, service.id, "s1").await?;
        let before = get_service_request(&db, before.id).await?;
        assert_eq!(before.max_approval_level, 1);
        assert_eq!(before.approval_chain()?, vec!["hod"]);
        assert_eq!(after.max_approval_level, 3);
        assert_eq!(after.approval_chain()?, roles);
        Ok(())
    }

    #[tokio::test]
    async fn test_in_flight_request_stays_approvable_after_chain_shrinks() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_profile(&db, "s1", "Student").await?;
        let service = create_test_service(&db, "Bonafide", &["hod", "principal"]).await?;
        let request = create_test_request(&db, service.id, "s1").await?;
        let hod = Actor::new("hod1", ["hod"]);
        let principal = Actor::new("pr1", ["principal"]);

        apply_action(&db, request.id, 0, RequestAction::Approve, &hod, None).await?;
        set_approval_levels(&db, service.id, &["hod".to_string()]).await?;

        let view = available_actions(&db, request.id, &principal).await?;
        assert_eq!(view.actions, vec![RequestAction::Approve, RequestAction::Reject]);
        assert!(available_actions(&db, request.id, &hod).await?.actions.is_empty());

        let approved =
            apply_action(&db, request.id, 1, RequestAction::Approve, &principal, None).await?;
        assert_eq!(approved.status, RequestStatus::Approved);
        assert_eq!(approved.level, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_reordered_chain_does_not_change_in_flight_approver() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_profile(&db, "s1", "Student").await?;
        let service = create_test_service(&db, "Leave", &["tutor", "hod"]).await?;
        let request = create_test_request(&db, service.id, "s1").await?;

        set_approval_levels(&db, service.id, &["hod".to_string(), "tutor".to_string()]).await?;

        let tutor = Actor::new("t1", ["tutor"]);
        let hod = Actor::new("hod1", ["hod"]);
        assert_eq!(list_pending_for_actor(&db, &tutor).await?.len(), 1);
        assert!(list_pending_for_actor(&db, &hod).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_inactive_service_rejects_requests() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_profile(&db, "s1", "Student").await?;
        let service = create_test_service(&db, "Closed", &["hod"]).await?;
        set_service_active(&db, service.id, false).await?;

        let result = create_service_request(&db, service.id, "s1", &json!({})).await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        assert!(list_services(&db, None, true).await?.is_empty());
        assert_eq!(list_services(&db, Some(service.category_id), false).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_request_data_is_stored_as_json() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_profile(&db, "s1", "Student").await?;
        let service = create_test_service(&db, "Certificate", &["hod"]).await?;

        let request =
            create_service_request(&db, service.id, "s1", &json!({"purpose": "passport"})).await?;
        let data: serde_json::Value = serde_json::from_str(&request.request_data)?;
        assert_eq!(data["purpose"], "passport");
        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(request.level, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_pending_lists_follow_roles_and_status() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_profile(&db, "s1", "Student").await?;
        let chain = create_test_service(&db, "Bonafide", &["hod", "principal"]).await?;
        let single = create_test_service(&db, "Library", &["librarian"]).await?;
        let first = create_test_request(&db, chain.id, "s1").await?;
        create_test_request(&db, single.id, "s1").await?;

        let hod = Actor::new("hod1", ["hod"]);
        let principal = Actor::new("pr1", ["principal"]);
        let admin = Actor::new("root", ["super_admin"]);

        assert_eq!(list_pending_for_actor(&db, &hod).await?.len(), 1);
        assert!(list_pending_for_actor(&db, &principal).await?.is_empty());
        assert_eq!(list_pending_for_actor(&db, &admin).await?.len(), 2);

        apply_action(&db, first.id, 0, RequestAction::Approve, &hod, None).await?;
        assert!(list_pending_for_actor(&db, &hod).await?.is_empty());
        assert_eq!(list_pending_for_actor(&db, &principal).await?[0].id, first.id);

        let all = list_requests_for_requester(&db, "s1", None).await?;
        assert_eq!(all.len(), 2);
        let pending = list_requests_for_requester(&db, "s1", Some(RequestStatus::Pending)).await?;
        assert_eq!(pending.len(), 2);
        Ok(())
    }
}
