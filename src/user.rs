//! User provisioning.
//!
//! The canonical account-creation entry point: a new user is always
//! created together with its first organization, a membership linking
//! the two, and the owner role grant — all in one transaction.

use validator::Validate;

use crate::config::TenancyConfig;
use crate::error::{validation_failed, TenancyError, TenancyResult};
use crate::store::{with_transaction, TenancyStore};
use crate::types::{CreateUser, CreateUserWithOrganization, GlobalRole, ProvisionedAccount};

/// Create a user, an organization, a membership, and the owner role
/// grant, atomically.
///
/// Input is validated before any datastore write. A failure at any step
/// — duplicate email, missing seeded owner role — rolls back every
/// prior insert; partial accounts are never observable. Returns the
/// created user, organization, and membership.
pub async fn create_user_with_organization<S: TenancyStore>(
    store: &S,
    config: &TenancyConfig,
    params: CreateUserWithOrganization,
) -> TenancyResult<ProvisionedAccount> {
    params.validate().map_err(|e| validation_failed(&e))?;
    params.user.validate().map_err(|e| validation_failed(&e))?;

    let owner_role = config.owner_role.clone();
    let result = with_transaction(store, move |store, tx| {
        Box::pin(async move {
            let organization = store
                .insert_organization(tx, &params.organization_name)
                .await?;

            // This path never mints a privileged global role, whatever
            // the caller supplied.
            let user = store
                .insert_user(
                    tx,
                    &CreateUser {
                        name: params.user.name.clone(),
                        email: params.user.email.clone(),
                        active_organization_id: organization.id,
                        global_role: GlobalRole::Customer,
                    },
                )
                .await?;

            let membership = store
                .insert_membership(tx, organization.id, user.id)
                .await?;

            let role = store
                .find_role_by_name(tx, &owner_role)
                .await?
                .ok_or_else(|| TenancyError::RoleNotSeeded(owner_role.clone()))?;
            store.insert_membership_role(tx, membership.id, role.id).await?;

            Ok(ProvisionedAccount {
                user,
                organization,
                membership,
            })
        })
    })
    .await;

    match &result {
        Ok(account) => tracing::info!(
            user_id = account.user.id,
            organization_id = account.organization.id,
            "provisioned user with organization"
        ),
        Err(err) => tracing::error!(error = %err, "failed to provision user with organization"),
    }

    result
}
