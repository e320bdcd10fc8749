//! Idempotent seeding of the well-known roles.

use crate::config::TenancyConfig;
use crate::error::TenancyResult;
use crate::store::{with_transaction, TenancyStore};
use crate::types::Role;

/// Ensure the configured owner, admin, and member roles exist, creating
/// any that are missing. Safe to run repeatedly; returns the three
/// roles in that order.
pub async fn seed_default_roles<S: TenancyStore>(
    store: &S,
    config: &TenancyConfig,
) -> TenancyResult<Vec<Role>> {
    let names = vec![
        config.owner_role.clone(),
        config.admin_role.clone(),
        config.default_invited_role.clone(),
    ];

    with_transaction(store, move |store, tx| {
        Box::pin(async move {
            let mut roles = Vec::with_capacity(names.len());
            for name in &names {
                let role = match store.find_role_by_name(tx, name).await? {
                    Some(role) => role,
                    None => {
                        store
                            .insert_role(tx, name, &format!("Role for {name}"))
                            .await?
                    }
                };
                roles.push(role);
            }
            Ok(roles)
        })
    })
    .await
}
