//! Permission registry and read-only authorization checks.
//!
//! The checks collapse every absence condition — unknown user,
//! organization, role, or permission — into `false` on purpose: callers
//! cannot distinguish "does not have permission" from "does not exist",
//! and are not meant to. Malformed permission strings are the
//! exception; they fail with a validation error before any query runs.

use validator::Validate;

use crate::error::{validation_failed, EntityKind, TenancyError, TenancyResult};
use crate::permission::PermissionQuery;
use crate::store::{with_transaction, TenancyStore};
use crate::types::{NewPermission, Permission, RolePermission};

/// Create a permission. The description defaults to
/// `"{action} {access} {entity}"`. Fails with
/// [`TenancyError::DuplicateKey`] when the triple already exists.
pub async fn create_permission<S: TenancyStore>(
    store: &S,
    permission: NewPermission,
) -> TenancyResult<Permission> {
    permission.validate().map_err(|e| validation_failed(&e))?;

    with_transaction(store, move |store, tx| {
        Box::pin(async move {
            let description = format!(
                "{} {} {}",
                permission.action, permission.access, permission.entity
            );
            store.insert_permission(tx, &permission, &description).await
        })
    })
    .await
}

/// Delete a permission by id. Fails with [`TenancyError::NotFound`]
/// when it does not exist.
pub async fn delete_permission<S: TenancyStore>(store: &S, permission_id: i64) -> TenancyResult<()> {
    with_transaction(store, move |store, tx| {
        Box::pin(async move {
            store
                .find_permission(tx, permission_id)
                .await?
                .ok_or_else(|| TenancyError::not_found(EntityKind::Permission, permission_id))?;

            store.delete_permission(tx, permission_id).await?;
            Ok(())
        })
    })
    .await
}

/// Associate a permission with a role, both resolved up front. Fails
/// with [`TenancyError::DuplicateKey`] when the association already
/// exists.
pub async fn add_permission_to_role<S: TenancyStore>(
    store: &S,
    role_name: &str,
    permission_id: i64,
) -> TenancyResult<()> {
    let role_name = role_name.to_string();
    with_transaction(store, move |store, tx| {
        Box::pin(async move {
            let role = store
                .find_role_by_name(tx, &role_name)
                .await?
                .ok_or_else(|| TenancyError::not_found(EntityKind::Role, &role_name))?;
            store
                .find_permission(tx, permission_id)
                .await?
                .ok_or_else(|| TenancyError::not_found(EntityKind::Permission, permission_id))?;

            store.insert_role_permission(tx, role.id, permission_id).await
        })
    })
    .await
}

/// Dissociate a permission from a role. Fails with
/// [`TenancyError::NotFound`] only when the role name is unknown;
/// removing an association that does not exist is a no-op.
pub async fn remove_permission_from_role<S: TenancyStore>(
    store: &S,
    role_name: &str,
    permission_id: i64,
) -> TenancyResult<()> {
    let role_name = role_name.to_string();
    with_transaction(store, move |store, tx| {
        Box::pin(async move {
            let role = store
                .find_role_by_name(tx, &role_name)
                .await?
                .ok_or_else(|| TenancyError::not_found(EntityKind::Role, &role_name))?;

            store.delete_role_permission(tx, role.id, permission_id).await?;
            Ok(())
        })
    })
    .await
}

/// All permissions held by the named role, each tagged with the role
/// name. An unknown role yields an empty list, not an error.
pub async fn get_permissions_by_role_name<S: TenancyStore>(
    store: &S,
    role_name: &str,
) -> TenancyResult<Vec<RolePermission>> {
    let role_name = role_name.to_string();
    with_transaction(store, move |store, tx| {
        Box::pin(async move {
            let role = match store.find_role_by_name(tx, &role_name).await? {
                Some(role) => role,
                None => return Ok(Vec::new()),
            };

            let permissions = store.permissions_for_role(tx, role.id).await?;
            Ok(permissions
                .into_iter()
                .map(|p| RolePermission {
                    role_name: role.name.clone(),
                    permission_id: p.id,
                    action: p.action,
                    entity: p.entity,
                    access: p.access,
                    description: p.description,
                })
                .collect())
        })
    })
    .await
}

/// Whether the user holds a permission matching `permission` (in
/// `"action:entity[:access[,access]]"` form) within the organization.
///
/// The same permission may be granted through several roles; one
/// matching grant suffices. When the string names several access
/// levels, any one of them matching suffices; with none, grants at
/// every access level match.
pub async fn user_has_permission<S: TenancyStore>(
    store: &S,
    user_id: i64,
    organization_id: i64,
    permission: &str,
) -> TenancyResult<bool> {
    let query = PermissionQuery::parse(permission)?;

    with_transaction(store, move |store, tx| {
        Box::pin(async move {
            store
                .permission_grant_exists(tx, user_id, organization_id, &query)
                .await
        })
    })
    .await
}

/// Whether the user holds the named role within the organization.
pub async fn user_has_role<S: TenancyStore>(
    store: &S,
    user_id: i64,
    organization_id: i64,
    role_name: &str,
) -> TenancyResult<bool> {
    let role_name = role_name.to_string();
    with_transaction(store, move |store, tx| {
        Box::pin(async move {
            store
                .role_grant_exists(tx, user_id, organization_id, &role_name)
                .await
        })
    })
    .await
}

/// [`user_has_permission`] scoped to the user's active organization.
///
/// Fails with [`TenancyError::NoActiveOrganization`] when the user's
/// active organization cannot be resolved.
pub async fn user_has_permission_in_active_org<S: TenancyStore>(
    store: &S,
    user_id: i64,
    permission: &str,
) -> TenancyResult<bool> {
    let query = PermissionQuery::parse(permission)?;

    with_transaction(store, move |store, tx| {
        Box::pin(async move {
            let user = store
                .find_user(tx, user_id)
                .await?
                .ok_or(TenancyError::NoActiveOrganization { user_id })?;

            store
                .permission_grant_exists(tx, user_id, user.active_organization_id, &query)
                .await
        })
    })
    .await
}

/// [`user_has_role`] scoped to the user's active organization.
pub async fn user_has_role_in_active_org<S: TenancyStore>(
    store: &S,
    user_id: i64,
    role_name: &str,
) -> TenancyResult<bool> {
    let role_name = role_name.to_string();
    with_transaction(store, move |store, tx| {
        Box::pin(async move {
            let user = store
                .find_user(tx, user_id)
                .await?
                .ok_or(TenancyError::NoActiveOrganization { user_id })?;

            store
                .role_grant_exists(tx, user_id, user.active_organization_id, &role_name)
                .await
        })
    })
    .await
}
