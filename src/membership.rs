//! Membership engine: the rows linking users (or invitees) to
//! organizations, and the role grants attached to them.
//!
//! Every operation has two forms: the plain form opens its own
//! transaction, the `*_in_tx` form participates in a caller-owned one.

use crate::error::{EntityKind, TenancyError, TenancyResult};
use crate::store::{with_transaction, TenancyStore};
use crate::types::Membership;

/// Create an active membership for `(user_id, organization_id)`.
///
/// Fails with [`TenancyError::DuplicateKey`] when the user already has
/// a membership in this organization.
pub async fn create_membership<S: TenancyStore>(
    store: &S,
    user_id: i64,
    organization_id: i64,
) -> TenancyResult<Membership> {
    with_transaction(store, move |store, tx| {
        Box::pin(async move { create_membership_in_tx(store, tx, user_id, organization_id).await })
    })
    .await
}

pub async fn create_membership_in_tx<S: TenancyStore>(
    store: &S,
    tx: &mut S::Tx,
    user_id: i64,
    organization_id: i64,
) -> TenancyResult<Membership> {
    store.insert_membership(tx, organization_id, user_id).await
}

/// Create a pending invitation row for an email address.
///
/// Not intended to be called directly; [`crate::invite`] wraps it with
/// the organization checks and role attachment of the invitation flow.
pub async fn create_pending_membership_in_tx<S: TenancyStore>(
    store: &S,
    tx: &mut S::Tx,
    organization_id: i64,
    invited_email: &str,
    invited_name: Option<&str>,
) -> TenancyResult<Membership> {
    let existing = store
        .find_pending_membership_by_email(tx, organization_id, invited_email)
        .await?;
    if existing.is_some() {
        return Err(TenancyError::duplicate_key(
            "A membership already exists for this email in this organization",
        ));
    }

    store
        .insert_pending_membership(tx, organization_id, invited_email, invited_name)
        .await
}

/// Attach a role, resolved by name, to a membership.
///
/// A membership may hold many distinct roles; granting one it already
/// holds fails with [`TenancyError::DuplicateKey`].
pub async fn add_role_to_membership<S: TenancyStore>(
    store: &S,
    membership_id: i64,
    role_name: &str,
) -> TenancyResult<()> {
    let role_name = role_name.to_string();
    with_transaction(store, move |store, tx| {
        Box::pin(
            async move { add_role_to_membership_in_tx(store, tx, membership_id, &role_name).await },
        )
    })
    .await
}

pub async fn add_role_to_membership_in_tx<S: TenancyStore>(
    store: &S,
    tx: &mut S::Tx,
    membership_id: i64,
    role_name: &str,
) -> TenancyResult<()> {
    let role = store
        .find_role_by_name(tx, role_name)
        .await?
        .ok_or_else(|| TenancyError::not_found(EntityKind::Role, role_name))?;

    store.insert_membership_role(tx, membership_id, role.id).await
}

/// Detach a role, resolved by name, from a membership.
///
/// Fails only when the role name is unknown; detaching a role the
/// membership does not hold is a no-op.
pub async fn remove_role_from_membership<S: TenancyStore>(
    store: &S,
    membership_id: i64,
    role_name: &str,
) -> TenancyResult<()> {
    let role_name = role_name.to_string();
    with_transaction(store, move |store, tx| {
        Box::pin(async move {
            remove_role_from_membership_in_tx(store, tx, membership_id, &role_name).await
        })
    })
    .await
}

pub async fn remove_role_from_membership_in_tx<S: TenancyStore>(
    store: &S,
    tx: &mut S::Tx,
    membership_id: i64,
    role_name: &str,
) -> TenancyResult<()> {
    let role = store
        .find_role_by_name(tx, role_name)
        .await?
        .ok_or_else(|| TenancyError::not_found(EntityKind::Role, role_name))?;

    store
        .delete_membership_role(tx, membership_id, role.id)
        .await?;
    Ok(())
}

/// Remove a membership and all of its role grants.
///
/// Fails with [`TenancyError::NotFound`] when the id does not exist;
/// rows belonging to other memberships are never touched.
pub async fn remove_membership<S: TenancyStore>(
    store: &S,
    membership_id: i64,
) -> TenancyResult<()> {
    with_transaction(store, move |store, tx| {
        Box::pin(async move { remove_membership_in_tx(store, tx, membership_id).await })
    })
    .await
}

pub async fn remove_membership_in_tx<S: TenancyStore>(
    store: &S,
    tx: &mut S::Tx,
    membership_id: i64,
) -> TenancyResult<()> {
    store
        .find_membership(tx, membership_id)
        .await?
        .ok_or_else(|| TenancyError::not_found(EntityKind::Membership, membership_id))?;

    store.delete_membership_roles(tx, membership_id).await?;
    store.delete_membership(tx, membership_id).await?;
    Ok(())
}
