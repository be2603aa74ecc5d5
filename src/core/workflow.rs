//! Service-request approval workflow.
//!
//! A request starts `pending` at `level = 0`. Each approval raises `level` by one;
//! when it reaches the request's `max_approval_level` the request becomes
//! `approved`. Rejection and cancellation end the chain early, and an approved
//! request is finally marked `completed` once the service has been delivered.
//!
//! Who may approve is decided by the approval chain copied onto the request when it
//! was submitted: the actor must hold the role configured for `level + 1`.
//! Administrators may act at any level. Requesters cannot approve or complete their
//! own requests, even when they are administrators.
//!
//! Writes use an optimistic check on the `version` column so that two approvers
//! acting on the same snapshot cannot both succeed; the loser gets
//! [`Error::Conflict`].

use super::notifications::create_notification;
use super::users::ADMIN_ROLES;
use crate::{
    entities::{RequestStatus, ServiceRequest, ServiceRequestModel, service_request},
    errors::{Error, Result},
};
use sea_orm::{QueryFilter, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::{info, instrument, warn};

/// Something an actor can do to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestAction {
    /// Pass the current approval level
    Approve,
    /// Turn the request down
    Reject,
    /// Withdraw the request
    Cancel,
    /// Mark an approved request as delivered
    Complete,
}

impl RequestAction {
    /// Lowercase name used on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Cancel => "cancel",
            Self::Complete => "complete",
        }
    }
}

impl fmt::Display for RequestAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "approve" => Ok(Self::Approve),
            "reject" => Ok(Self::Reject),
            "cancel" => Ok(Self::Cancel),
            "complete" => Ok(Self::Complete),
            other => Err(Error::validation(format!("Unknown action '{other}'"))),
        }
    }
}

/// The user performing an action, with the role names they hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    /// Profile id
    pub user_id: String,
    /// Role names
    pub roles: BTreeSet<String>,
}

impl Actor {
    /// Actor with the given profile id and role names.
    pub fn new<I, S>(user_id: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            user_id: user_id.into(),
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether the actor holds `role`.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Whether the actor holds one of [`ADMIN_ROLES`].
    #[must_use]
    pub fn is_admin(&self) -> bool {
        ADMIN_ROLES.iter().any(|role| self.has_role(role))
    }
}

/// Status and level a request moves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// New status
    pub status: RequestStatus,
    /// New level
    pub level: i32,
}

/// Role of 1-based `level` in `chain`.
fn role_at(chain: &[String], level: i32) -> Option<&str> {
    let index = usize::try_from(level.checked_sub(1)?).ok()?;
    chain.get(index).map(String::as_str)
}

fn can_approve_next(request: &ServiceRequestModel, actor: &Actor, chain: &[String]) -> bool {
    if actor.user_id == request.requester_id {
        return false;
    }
    actor.is_admin() || role_at(chain, request.level + 1).is_some_and(|role| actor.has_role(role))
}

fn can_complete(request: &ServiceRequestModel, actor: &Actor, chain: &[String]) -> bool {
    if actor.user_id == request.requester_id {
        return false;
    }
    actor.is_admin()
        || role_at(chain, request.max_approval_level).is_some_and(|role| actor.has_role(role))
}

/// Actions `actor` may take on `request`, given the request's approval chain
/// (approver role per level, first level first).
#[must_use]
pub fn allowed_actions(
    request: &ServiceRequestModel,
    actor: &Actor,
    chain: &[String],
) -> BTreeSet<RequestAction> {
    let mut actions = BTreeSet::new();
    let is_owner_or_admin = actor.user_id == request.requester_id || actor.is_admin();

    match request.status {
        RequestStatus::Pending => {
            if can_approve_next(request, actor, chain) {
                actions.insert(RequestAction::Approve);
                actions.insert(RequestAction::Reject);
            }
            if is_owner_or_admin {
                actions.insert(RequestAction::Cancel);
            }
        }
        RequestStatus::Approved => {
            if is_owner_or_admin {
                actions.insert(RequestAction::Cancel);
            }
            if can_complete(request, actor, chain) {
                actions.insert(RequestAction::Complete);
            }
        }
        RequestStatus::Rejected | RequestStatus::Cancelled | RequestStatus::Completed => {}
    }
    actions
}

/// Where `action` takes `request`. Does not check permissions.
#[must_use]
pub fn transition(request: &ServiceRequestModel, action: RequestAction) -> Transition {
    match action {
        RequestAction::Approve => {
            let level = (request.level + 1).min(request.max_approval_level);
            let status = if level >= request.max_approval_level {
                RequestStatus::Approved
            } else {
                RequestStatus::Pending
            };
            Transition { status, level }
        }
        RequestAction::Reject => Transition {
            status: RequestStatus::Rejected,
            level: request.level,
        },
        RequestAction::Cancel => Transition {
            status: RequestStatus::Cancelled,
            level: request.level,
        },
        RequestAction::Complete => Transition {
            status: RequestStatus::Completed,
            level: request.level,
        },
    }
}

fn notification_text(request: &ServiceRequestModel, next: Transition) -> (String, String) {
    let title = format!("Service request #{} {}", request.id, next.status);
    let message = if next.status == RequestStatus::Pending {
        format!(
            "Your request passed approval level {} of {}.",
            next.level, request.max_approval_level
        )
    } else {
        format!("Your request is now {}.", next.status)
    };
    (title, message)
}

/// Applies `action` to a request, provided nobody changed it since `expected_version`.
///
/// On success the request's `version` is incremented and the requester receives a
/// notification (unless they performed the action themselves).
#[instrument(skip(db, actor, comment), fields(actor = %actor.user_id))]
pub async fn apply_action(
    db: &DatabaseConnection,
    request_id: i64,
    expected_version: i32,
    action: RequestAction,
    actor: &Actor,
    comment: Option<String>,
) -> Result<ServiceRequestModel> {
    let txn = db.begin().await?;

    let request = ServiceRequest::find_by_id(request_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("service request", request_id))?;

    if request.version != expected_version {
        warn!(
            "Stale version for request {}: expected {}, found {}",
            request_id, expected_version, request.version
        );
        return Err(Error::Conflict {
            request_id,
            expected_version,
        });
    }

    let chain = request.approval_chain()?;
    if !allowed_actions(&request, actor, &chain).contains(&action) {
        return Err(Error::ActionNotAllowed {
            action: action.to_string(),
            status: request.status.to_string(),
        });
    }

    let next = transition(&request, action);
    if !(0..=request.max_approval_level).contains(&next.level) {
        return Err(Error::validation(format!(
            "Level {} is outside 0..={}",
            next.level, request.max_approval_level
        )));
    }

    let now = chrono::Utc::now();
    let comments = comment.or_else(|| request.comments.clone());
    let update = service_request::ActiveModel {
        status: Set(next.status),
        level: Set(next.level),
        comments: Set(comments.clone()),
        last_actor_id: Set(Some(actor.user_id.clone())),
        version: Set(request.version + 1),
        updated_at: Set(now),
        ..Default::default()
    };
    let result = ServiceRequest::update_many()
        .set(update)
        .filter(service_request::Column::Id.eq(request_id))
        .filter(service_request::Column::Version.eq(expected_version))
        .exec(&txn)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::Conflict {
            request_id,
            expected_version,
        });
    }

    if actor.user_id != request.requester_id {
        let (title, message) = notification_text(&request, next);
        create_notification(&txn, &request.requester_id, &title, &message).await?;
    }

    txn.commit().await?;
    info!(
        "Request {} {} -> {} (level {}/{})",
        request_id, request.status, next.status, next.level, request.max_approval_level
    );

    Ok(ServiceRequestModel {
        status: next.status,
        level: next.level,
        comments,
        last_actor_id: Some(actor.user_id.clone()),
        version: request.version + 1,
        updated_at: now,
        ..request
    })
}

/// What the HTTP layer shows next to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailableActions {
    /// Request id
    pub request_id: i64,
    /// Current status
    pub status: RequestStatus,
    /// Approval levels passed
    pub level: i32,
    /// Length of the chain
    pub max_approval_level: i32,
    /// Version to send back with the chosen action
    pub version: i32,
    /// Permitted actions, in a stable order
    pub actions: Vec<RequestAction>,
}

/// Loads a request and lists what `actor` may do with it.
pub async fn available_actions(
    db: &DatabaseConnection,
    request_id: i64,
    actor: &Actor,
) -> Result<AvailableActions> {
    let request = ServiceRequest::find_by_id(request_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("service request", request_id))?;
    let chain = request.approval_chain()?;
    let actions = allowed_actions(&request, actor, &chain)
        .into_iter()
        .collect();
    Ok(AvailableActions {
        request_id,
        status: request.status,
        level: request.level,
        max_approval_level: request.max_approval_level,
        version: request.version,
        actions,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::notifications::unread_count;
    use crate::core::services::get_service_request;
    use crate::test_utils::{
        create_test_profile, create_test_request, create_test_service, setup_test_db,
    };

    fn chain(roles: &[&str]) -> Vec<String> {
        roles.iter().map(ToString::to_string).collect()
    }

    fn request(status: RequestStatus, level: i32, max: i32) -> ServiceRequestModel {
        let now = chrono::Utc::now();
        ServiceRequestModel {
            id: 1,
            service_id: 1,
            requester_id: "student1".to_string(),
            status,
            level,
            max_approval_level: max,
            approver_roles: "[]".to_string(),
            request_data: "{}".to_string(),
            comments: None,
            last_actor_id: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_action_parsing() {
        assert_eq!("Approve".parse::<RequestAction>().unwrap(), RequestAction::Approve);
        assert_eq!(" cancel ".parse::<RequestAction>().unwrap(), RequestAction::Cancel);
        assert!("escalate".parse::<RequestAction>().is_err());
        assert_eq!(
            serde_json::to_string(&RequestAction::Complete).unwrap(),
            "\"complete\""
        );
    }

    #[test]
    fn test_approver_needs_role_for_next_level() {
        let levels = chain(&["hod", "principal"]);
        let hod = Actor::new("hod1", ["hod"]);
        let principal = Actor::new("pr1", ["principal"]);
        let pending = request(RequestStatus::Pending, 0, 2);

        let actions = allowed_actions(&pending, &hod, &levels);
        assert!(actions.contains(&RequestAction::Approve));
        assert!(actions.contains(&RequestAction::Reject));
        assert!(!actions.contains(&RequestAction::Cancel));

        assert!(allowed_actions(&pending, &principal, &levels).is_empty());

        let at_level_one = request(RequestStatus::Pending, 1, 2);
        assert!(allowed_actions(&at_level_one, &hod, &levels).is_empty());
        assert!(allowed_actions(&at_level_one, &principal, &levels).contains(&RequestAction::Approve));
    }

    #[test]
    fn test_requester_can_cancel_but_not_approve() {
        let levels = chain(&["hod"]);
        let requester = Actor::new("student1", ["hod"]);
        let pending = request(RequestStatus::Pending, 0, 1);

        let actions = allowed_actions(&pending, &requester, &levels);
        assert_eq!(actions, BTreeSet::from([RequestAction::Cancel]));

        let approved = request(RequestStatus::Approved, 1, 1);
        assert_eq!(
            allowed_actions(&approved, &requester, &levels),
            BTreeSet::from([RequestAction::Cancel])
        );
    }

    #[test]
    fn test_admin_requester_cannot_approve_or_complete_own_request() {
        let levels = chain(&["hod"]);
        let admin_requester = Actor::new("student1", ["admin"]);

        let pending = request(RequestStatus::Pending, 0, 1);
        assert_eq!(
            allowed_actions(&pending, &admin_requester, &levels),
            BTreeSet::from([RequestAction::Cancel])
        );

        let approved = request(RequestStatus::Approved, 1, 1);
        assert_eq!(
            allowed_actions(&approved, &admin_requester, &levels),
            BTreeSet::from([RequestAction::Cancel])
        );
    }

    #[test]
    fn test_role_lookup_outside_chain_is_none() {
        let levels = chain(&["hod", "principal"]);
        assert_eq!(role_at(&levels, 1), Some("hod"));
        assert_eq!(role_at(&levels, 2), Some("principal"));
        assert_eq!(role_at(&levels, 0), None);
        assert_eq!(role_at(&levels, 3), None);
        assert_eq!(role_at(&levels, i32::MIN), None);
    }

    #[test]
    fn test_terminal_states_allow_nothing() {
        let admin = Actor::new("admin1", ["super_admin"]);
        for status in [
            RequestStatus::Rejected,
            RequestStatus::Cancelled,
            RequestStatus::Completed,
        ] {
            assert!(allowed_actions(&request(status, 1, 1), &admin, &[]).is_empty());
        }
    }

    #[test]
    fn test_admin_can_act_on_chain_without_levels() {
        let admin = Actor::new("admin1", ["admin"]);
        let pending = request(RequestStatus::Pending, 0, 0);
        assert_eq!(
            allowed_actions(&pending, &admin, &[]),
            BTreeSet::from([
                RequestAction::Approve,
                RequestAction::Reject,
                RequestAction::Cancel
            ])
        );
        let next = transition(&pending, RequestAction::Approve);
        assert_eq!(next.status, RequestStatus::Approved);
        assert_eq!(next.level, 0);
    }

    #[test]
    fn test_transition_levels_stay_in_bounds() {
        let first = transition(&request(RequestStatus::Pending, 0, 3), RequestAction::Approve);
        assert_eq!(first, Transition { status: RequestStatus::Pending, level: 1 });

        let last = transition(&request(RequestStatus::Pending, 2, 3), RequestAction::Approve);
        assert_eq!(last, Transition { status: RequestStatus::Approved, level: 3 });

        let rejected = transition(&request(RequestStatus::Pending, 1, 3), RequestAction::Reject);
        assert_eq!(rejected, Transition { status: RequestStatus::Rejected, level: 1 });
    }

    #[tokio::test]
    async fn test_two_level_chain_end_to_end() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_profile(&db, "student1", "Student One").await?;
        let service = create_test_service(&db, "Bonafide Certificate", &["hod", "principal"]).await?;
        let req = create_test_request(&db, service.id, "student1").await?;
        let hod = Actor::new("hod1", ["hod"]);
        let principal = Actor::new("pr1", ["principal"]);
        let admin = Actor::new("admin1", ["admin"]);

        let after_hod = apply_action(&db, req.id, 0, RequestAction::Approve, &hod, None).await?;
        assert_eq!(after_hod.status, RequestStatus::Pending);
        assert_eq!(after_hod.level, 1);
        assert_eq!(after_hod.version, 1);

        let approved = apply_action(
            &db,
            req.id,
            1,
            RequestAction::Approve,
            &principal,
            Some("Signed".to_string()),
        )
        .await?;
        assert_eq!(approved.status, RequestStatus::Approved);
        assert_eq!(approved.level, 2);

        let completed = apply_action(&db, req.id, 2, RequestAction::Complete, &admin, None).await?;
        assert_eq!(completed.status, RequestStatus::Completed);
        assert_eq!(completed.comments.as_deref(), Some("Signed"));

        let stored = get_service_request(&db, req.id).await?;
        assert_eq!(stored.status, RequestStatus::Completed);
        assert_eq!(stored.version, 3);
        assert_eq!(stored.last_actor_id.as_deref(), Some("admin1"));
        assert_eq!(unread_count(&db, "student1").await?, 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_stale_version_is_conflict() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_profile(&db, "student1", "Student One").await?;
        let service = create_test_service(&db, "Hostel Leave", &["warden"]).await?;
        let req = create_test_request(&db, service.id, "student1").await?;
        let warden_a = Actor::new("w1", ["warden"]);
        let warden_b = Actor::new("w2", ["warden"]);

        apply_action(&db, req.id, 0, RequestAction::Approve, &warden_a, None).await?;
        let second = apply_action(&db, req.id, 0, RequestAction::Reject, &warden_b, None).await;

        assert!(matches!(
            second,
            Err(Error::Conflict { request_id, expected_version: 0 }) if request_id == req.id
        ));
        let stored = get_service_request(&db, req.id).await?;
        assert_eq!(stored.status, RequestStatus::Approved);
        Ok(())
    }

    #[tokio::test]
    async fn test_disallowed_action_leaves_request_untouched() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_profile(&db, "student1", "Student One").await?;
        let service = create_test_service(&db, "Transfer Certificate", &["principal"]).await?;
        let req = create_test_request(&db, service.id, "student1").await?;
        let requester = Actor::new("student1", Vec::<String>::new());

        let result = apply_action(&db, req.id, 0, RequestAction::Approve, &requester, None).await;
        assert!(matches!(result, Err(Error::ActionNotAllowed { .. })));

        let cancelled = apply_action(&db, req.id, 0, RequestAction::Cancel, &requester, None).await?;
        assert_eq!(cancelled.status, RequestStatus::Cancelled);
        assert_eq!(unread_count(&db, "student1").await?, 0);

        let missing = apply_action(&db, 9999, 0, RequestAction::Cancel, &requester, None).await;
        assert!(matches!(missing, Err(Error::NotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_admin_cannot_approve_own_request() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_profile(&db, "adm", "Administrator").await?;
        let service = create_test_service(&db, "Parking Pass", &["security"]).await?;
        let req = create_test_request(&db, service.id, "adm").await?;
        let admin = Actor::new("adm", ["admin"]);

        let result = apply_action(&db, req.id, 0, RequestAction::Approve, &admin, None).await;
        assert!(matches!(result, Err(Error::ActionNotAllowed { .. })));
        let stored = get_service_request(&db, req.id).await?;
        assert_eq!(stored.status, RequestStatus::Pending);

        let other_admin = Actor::new("root", ["super_admin"]);
        let approved =
            apply_action(&db, req.id, 0, RequestAction::Approve, &other_admin, None).await?;
        assert_eq!(approved.status, RequestStatus::Approved);
        Ok(())
    }

    #[tokio::test]
    async fn test_available_actions_reports_version() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_profile(&db, "student1", "Student One").await?;
        let service = create_test_service(&db, "ID Card", &["hod"]).await?;
        let req = create_test_request(&db, service.id, "student1").await?;

        let view = available_actions(&db, req.id, &Actor::new("hod1", ["hod"])).await?;
        assert_eq!(view.version, 0);
        assert_eq!(view.max_approval_level, 1);
        assert_eq!(view.actions, vec![RequestAction::Approve, RequestAction::Reject]);
        Ok(())
    }
}
