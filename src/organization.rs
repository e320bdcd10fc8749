//! Organization operations: creation and active-organization switching.

use crate::error::{EntityKind, TenancyError, TenancyResult};
use crate::store::{with_transaction, TenancyStore};
use crate::types::{Organization, User};

/// Create an organization. Duplicate names are allowed by design.
pub async fn create_organization<S: TenancyStore>(
    store: &S,
    name: &str,
) -> TenancyResult<Organization> {
    let name = name.to_string();
    with_transaction(store, move |store, tx| {
        Box::pin(async move { create_organization_in_tx(store, tx, &name).await })
    })
    .await
}

pub async fn create_organization_in_tx<S: TenancyStore>(
    store: &S,
    tx: &mut S::Tx,
    name: &str,
) -> TenancyResult<Organization> {
    store.insert_organization(tx, name).await
}

/// Switch the user's active organization, verifying membership first.
///
/// The membership check and the user update run in one transaction so
/// the switch cannot land on an organization the user was concurrently
/// removed from. Fails with [`TenancyError::NotAMember`] when no
/// membership exists.
pub async fn change_active_organization<S: TenancyStore>(
    store: &S,
    user_id: i64,
    organization_id: i64,
) -> TenancyResult<User> {
    with_transaction(store, move |store, tx| {
        Box::pin(async move {
            change_active_organization_in_tx(store, tx, user_id, organization_id).await
        })
    })
    .await
}

pub async fn change_active_organization_in_tx<S: TenancyStore>(
    store: &S,
    tx: &mut S::Tx,
    user_id: i64,
    organization_id: i64,
) -> TenancyResult<User> {
    store
        .find_membership_by_user(tx, user_id, organization_id)
        .await?
        .ok_or(TenancyError::NotAMember)?;

    let user = store
        .set_active_organization(tx, user_id, organization_id)
        .await?
        .ok_or_else(|| TenancyError::not_found(EntityKind::User, user_id))?;

    tracing::debug!(user_id, organization_id, "changed active organization");
    Ok(user)
}
