//! Role registry: global role definitions, granted per-membership.

use validator::Validate;

use crate::error::{validation_failed, EntityKind, TenancyError, TenancyResult};
use crate::store::{with_transaction, TenancyStore};
use crate::types::{NewRole, Role};

/// Create a role. Fails with [`TenancyError::DuplicateKey`] when the
/// name is taken.
pub async fn create_role<S: TenancyStore>(store: &S, role: NewRole) -> TenancyResult<Role> {
    role.validate().map_err(|e| validation_failed(&e))?;

    with_transaction(store, move |store, tx| {
        Box::pin(async move { create_role_in_tx(store, tx, &role).await })
    })
    .await
}

pub async fn create_role_in_tx<S: TenancyStore>(
    store: &S,
    tx: &mut S::Tx,
    role: &NewRole,
) -> TenancyResult<Role> {
    let description = role
        .description
        .clone()
        .unwrap_or_else(|| format!("Role for {}", role.name));

    store.insert_role(tx, &role.name, &description).await
}

/// Delete a role by name. Fails with [`TenancyError::NotFound`] when no
/// such role exists.
pub async fn delete_role<S: TenancyStore>(store: &S, name: &str) -> TenancyResult<()> {
    let name = name.to_string();
    with_transaction(store, move |store, tx| {
        Box::pin(async move {
            let role = store
                .find_role_by_name(tx, &name)
                .await?
                .ok_or_else(|| TenancyError::not_found(EntityKind::Role, &name))?;

            store.delete_role(tx, role.id).await?;
            Ok(())
        })
    })
    .await
}
