//! Profile and role management.
//!
//! Profiles are created by the sign-up flow and carry the auth provider's user id.
//! Roles are plain names; what a role may do is decided by the approval chains in
//! [`super::services`] and by [`ADMIN_ROLES`].

use super::workflow::Actor;
use super::{Paged, collect_page, page_size};
use crate::{
    entities::{Profile, Role, UserRole, profile, role, user_role},
    errors::{Error, Result},
};
use sea_orm::{
    Condition, ConnectionTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, prelude::*,
};
use tracing::{info, instrument};

/// Roles that may act on any request regardless of approval chains.
pub const ADMIN_ROLES: &[&str] = &["super_admin", "admin"];

/// Creates a profile with the given auth id.
#[instrument(skip(db))]
pub async fn create_profile(
    db: &DatabaseConnection,
    id: &str,
    email: &str,
    full_name: &str,
    department: Option<String>,
) -> Result<profile::Model> {
    if id.trim().is_empty() {
        return Err(Error::validation("Profile id cannot be empty"));
    }
    if !email.contains('@') {
        return Err(Error::validation(format!("Invalid e-mail address: {email}")));
    }
    if full_name.trim().is_empty() {
        return Err(Error::validation("Full name cannot be empty"));
    }

    let email = email.trim().to_lowercase();
    let existing = Profile::find()
        .filter(profile::Column::Email.eq(email.as_str()))
        .one(db)
        .await?;
    if existing.is_some() {
        return Err(Error::validation(format!(
            "A profile with e-mail {email} already exists"
        )));
    }

    let now = chrono::Utc::now();
    let model = profile::ActiveModel {
        id: Set(id.trim().to_string()),
        email: Set(email),
        full_name: Set(full_name.trim().to_string()),
        department: Set(department),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    };
    let profile = model.insert(db).await?;
    info!("Created profile {}", profile.id);
    Ok(profile)
}

/// Looks up a profile by auth id.
pub async fn get_profile<C: ConnectionTrait>(db: &C, id: &str) -> Result<profile::Model> {
    Profile::find_by_id(id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("profile", id))
}

/// Lists profiles alphabetically, optionally matching `search` against name or e-mail.
pub async fn list_profiles(
    db: &DatabaseConnection,
    search: Option<&str>,
    page: u64,
    limit: u64,
) -> Result<Paged<profile::Model>> {
    let limit = page_size(limit);
    let mut query = Profile::find();
    if let Some(term) = search.map(str::trim).filter(|t| !t.is_empty()) {
        query = query.filter(
            Condition::any()
                .add(profile::Column::FullName.contains(term))
                .add(profile::Column::Email.contains(term)),
        );
    }
    let paginator = query
        .order_by_asc(profile::Column::FullName)
        .paginate(db, limit);
    collect_page(paginator, page, limit).await
}

/// Activates or deactivates a profile. Deactivated users cannot act on requests.
pub async fn set_profile_active(
    db: &DatabaseConnection,
    id: &str,
    is_active: bool,
) -> Result<profile::Model> {
    let existing = get_profile(db, id).await?;
    let mut model: profile::ActiveModel = existing.into();
    model.is_active = Set(is_active);
    model.updated_at = Set(chrono::Utc::now());
    let updated = model.update(db).await?;
    info!("Profile {} is_active={}", id, is_active);
    Ok(updated)
}

/// Creates a role. Names are unique.
pub async fn create_role(
    db: &DatabaseConnection,
    name: &str,
    description: Option<String>,
) -> Result<role::Model> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation("Role name cannot be empty"));
    }
    if find_role(db, name).await?.is_some() {
        return Err(Error::validation(format!("Role '{name}' already exists")));
    }
    let model = role::ActiveModel {
        name: Set(name.to_string()),
        description: Set(description),
        ..Default::default()
    };
    Ok(model.insert(db).await?)
}

/// All roles ordered by name.
pub async fn list_roles(db: &DatabaseConnection) -> Result<Vec<role::Model>> {
    Role::find()
        .order_by_asc(role::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

async fn find_role<C: ConnectionTrait>(db: &C, name: &str) -> Result<Option<role::Model>> {
    Role::find()
        .filter(role::Column::Name.eq(name))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Grants `role_name` to the user. Granting a role twice returns the existing row.
#[instrument(skip(db))]
pub async fn assign_role(
    db: &DatabaseConnection,
    user_id: &str,
    role_name: &str,
) -> Result<user_role::Model> {
    get_profile(db, user_id).await?;
    let role = find_role(db, role_name)
        .await?
        .ok_or_else(|| Error::not_found("role", role_name))?;

    let existing = UserRole::find()
        .filter(user_role::Column::UserId.eq(user_id))
        .filter(user_role::Column::RoleId.eq(role.id))
        .one(db)
        .await?;
    if let Some(assignment) = existing {
        return Ok(assignment);
    }

    let model = user_role::ActiveModel {
        user_id: Set(user_id.to_string()),
        role_id: Set(role.id),
        assigned_at: Set(chrono::Utc::now()),
        ..Default::default()
    };
    let assignment = model.insert(db).await?;
    info!("Assigned role {} to {}", role_name, user_id);
    Ok(assignment)
}

/// Removes `role_name` from the user. Returns false if they did not hold it.
pub async fn revoke_role(db: &DatabaseConnection, user_id: &str, role_name: &str) -> Result<bool> {
    let Some(role) = find_role(db, role_name).await? else {
        return Ok(false);
    };
    let result = UserRole::delete_many()
        .filter(user_role::Column::UserId.eq(user_id))
        .filter(user_role::Column::RoleId.eq(role.id))
        .exec(db)
        .await?;
    Ok(result.rows_affected > 0)
}

/// Names of every role the user holds, sorted.
pub async fn role_names_for_user<C: ConnectionTrait>(db: &C, user_id: &str) -> Result<Vec<String>> {
    let rows = UserRole::find()
        .filter(user_role::Column::UserId.eq(user_id))
        .find_also_related(Role)
        .all(db)
        .await?;
    let mut names: Vec<String> = rows
        .into_iter()
        .filter_map(|(_, role)| role.map(|r| r.name))
        .collect();
    names.sort();
    names.dedup();
    Ok(names)
}

/// Loads the profile and roles of `user_id` as a workflow [`Actor`].
pub async fn load_actor<C: ConnectionTrait>(db: &C, user_id: &str) -> Result<Actor> {
    let profile = get_profile(db, user_id).await?;
    if !profile.is_active {
        return Err(Error::validation(format!(
            "Profile {user_id} is deactivated"
        )));
    }
    let roles = role_names_for_user(db, user_id).await?;
    Ok(Actor::new(profile.id, roles))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::{create_test_profile, setup_test_db};

    #[tokio::test]
    async fn test_create_profile_validation() -> Result<()> {
        let db = setup_test_db().await?;

        let result = create_profile(&db, "", "a@jkkn.ac.in", "A", None).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let result = create_profile(&db, "u1", "not-an-email", "A", None).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let result = create_profile(&db, "u1", "a@jkkn.ac.in", "  ", None).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() -> Result<()> {
        let db = setup_test_db().await?;
        create_profile(&db, "u1", "Staff@jkkn.ac.in", "First", None).await?;

        let result = create_profile(&db, "u2", "staff@jkkn.ac.in", "Second", None).await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_list_profiles_search_and_paginate() -> Result<()> {
        let db = setup_test_db().await?;
        for i in 0..12 {
            create_test_profile(&db, &format!("u{i:02}"), &format!("Faculty {i:02}")).await?;
        }
        create_profile(&db, "p1", "principal@jkkn.ac.in", "Principal", None).await?;

        let page = list_profiles(&db, None, 2, 5).await?;
        assert_eq!(page.total, 13);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.items.len(), 5);

        let found = list_profiles(&db, Some("princ"), 1, 10).await?;
        assert_eq!(found.total, 1);
        assert_eq!(found.items[0].id, "p1");
        Ok(())
    }

    #[tokio::test]
    async fn test_assign_role_is_idempotent_and_revocable() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_profile(&db, "hod1", "Head of CSE").await?;
        create_role(&db, "hod", None).await?;
        create_role(&db, "principal", None).await?;

        let first = assign_role(&db, "hod1", "hod").await?;
        let second = assign_role(&db, "hod1", "hod").await?;
        assert_eq!(first.id, second.id);
        assign_role(&db, "hod1", "principal").await?;

        assert_eq!(
            role_names_for_user(&db, "hod1").await?,
            vec!["hod".to_string(), "principal".to_string()]
        );

        assert!(revoke_role(&db, "hod1", "hod").await?);
        assert!(!revoke_role(&db, "hod1", "hod").await?);
        assert!(!revoke_role(&db, "hod1", "missing").await?);
        assert_eq!(role_names_for_user(&db, "hod1").await?, vec!["principal"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_assign_unknown_role_or_user() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_profile(&db, "u1", "User").await?;

        let result = assign_role(&db, "u1", "dean").await;
        assert!(matches!(result, Err(Error::NotFound { entity: "role", .. })));

        create_role(&db, "dean", None).await?;
        let result = assign_role(&db, "ghost", "dean").await;
        assert!(matches!(result, Err(Error::NotFound { entity: "profile", .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_load_actor_requires_active_profile() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_profile(&db, "admin1", "Admin").await?;
        create_role(&db, "admin", None).await?;
        assign_role(&db, "admin1", "admin").await?;

        let actor = load_actor(&db, "admin1").await?;
        assert!(actor.is_admin());

        set_profile_active(&db, "admin1", false).await?;
        let result = load_actor(&db, "admin1").await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        Ok(())
    }
}
