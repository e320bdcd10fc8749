//! Invitation workflow.
//!
//! A pending invitation is a membership row with no user: addressed by
//! email, holding its role grants, awaiting acceptance or decline.
//! Acceptance activates the row exactly once; decline removes it.

use validator::Validate;

use crate::config::TenancyConfig;
use crate::error::{validation_failed, EntityKind, TenancyError, TenancyResult};
use crate::membership::{add_role_to_membership_in_tx, create_pending_membership_in_tx};
use crate::store::{with_transaction, TenancyStore};
use crate::types::{InviteUser, Membership, OrganizationRef, PendingInvitation, RoleRef};

/// Invite an email address — possibly not yet registered — to an
/// organization, attaching the named role (or the configured default).
///
/// Fails with [`TenancyError::NotFound`] when the organization does not
/// exist and [`TenancyError::DuplicateKey`] when an invitation for this
/// email already exists there. Everything runs in one transaction.
pub async fn invite_user_to_organization<S: TenancyStore>(
    store: &S,
    config: &TenancyConfig,
    params: InviteUser,
) -> TenancyResult<Membership> {
    params.validate().map_err(|e| validation_failed(&e))?;

    let role_name = params
        .role_name
        .clone()
        .unwrap_or_else(|| config.default_invited_role.clone());

    with_transaction(store, move |store, tx| {
        Box::pin(async move {
            store
                .find_organization(tx, params.organization_id)
                .await?
                .ok_or_else(|| {
                    TenancyError::not_found(EntityKind::Organization, params.organization_id)
                })?;

            let membership = create_pending_membership_in_tx(
                store,
                tx,
                params.organization_id,
                &params.email,
                params.invited_name.as_deref(),
            )
            .await?;

            add_role_to_membership_in_tx(store, tx, membership.id, &role_name).await?;

            tracing::info!(
                membership_id = membership.id,
                organization_id = membership.organization_id,
                role = %role_name,
                "user invited to organization"
            );
            Ok(membership)
        })
    })
    .await
}

/// Accept a pending invitation on behalf of an existing user.
///
/// The membership gains the user and sheds its invite fields, and the
/// user's active organization switches to the newly joined one, so they
/// land there immediately. A second acceptance — or an unknown id —
/// fails with [`TenancyError::NotFound`], since the first acceptance
/// clears the pending marker.
pub async fn accept_invitation<S: TenancyStore>(
    store: &S,
    membership_id: i64,
    user_id: i64,
) -> TenancyResult<Membership> {
    with_transaction(store, move |store, tx| {
        Box::pin(async move {
            let invitation = store
                .find_pending_membership(tx, membership_id)
                .await?
                .ok_or_else(|| TenancyError::not_found(EntityKind::Invitation, membership_id))?;

            store
                .find_user(tx, user_id)
                .await?
                .ok_or_else(|| TenancyError::not_found(EntityKind::User, user_id))?;

            let membership = store
                .activate_membership(tx, membership_id, user_id)
                .await?
                .ok_or_else(|| TenancyError::not_found(EntityKind::Invitation, membership_id))?;

            store
                .set_active_organization(tx, user_id, invitation.organization_id)
                .await?
                .ok_or_else(|| TenancyError::not_found(EntityKind::User, user_id))?;

            tracing::info!(
                membership_id,
                user_id,
                organization_id = membership.organization_id,
                "invitation accepted"
            );
            Ok(membership)
        })
    })
    .await
}

/// Decline a pending invitation, removing the membership row and its
/// role grants. Fails with [`TenancyError::NotFound`] under the same
/// conditions as [`accept_invitation`].
pub async fn decline_invitation<S: TenancyStore>(
    store: &S,
    membership_id: i64,
) -> TenancyResult<()> {
    with_transaction(store, move |store, tx| {
        Box::pin(async move {
            store
                .find_pending_membership(tx, membership_id)
                .await?
                .ok_or_else(|| TenancyError::not_found(EntityKind::Invitation, membership_id))?;

            store.delete_membership_roles(tx, membership_id).await?;
            store.delete_membership(tx, membership_id).await?;

            tracing::info!(membership_id, "invitation declined");
            Ok(())
        })
    })
    .await
}

/// All pending invitations addressed to an email, each enriched with
/// its organization and the attached role names. An empty list is a
/// valid result.
pub async fn list_invitations<S: TenancyStore>(
    store: &S,
    email: &str,
) -> TenancyResult<Vec<PendingInvitation>> {
    let email = email.to_string();
    with_transaction(store, move |store, tx| {
        Box::pin(async move {
            let memberships = store.list_pending_memberships_by_email(tx, &email).await?;

            let mut invitations = Vec::with_capacity(memberships.len());
            for membership in memberships {
                let organization = store
                    .find_organization(tx, membership.organization_id)
                    .await?
                    .ok_or_else(|| {
                        TenancyError::not_found(
                            EntityKind::Organization,
                            membership.organization_id,
                        )
                    })?;

                let roles = store
                    .roles_for_membership(tx, membership.id)
                    .await?
                    .into_iter()
                    .map(|role| RoleRef {
                        id: role.id,
                        name: role.name,
                    })
                    .collect();

                invitations.push(PendingInvitation {
                    id: membership.id,
                    organization: OrganizationRef {
                        id: organization.id,
                        name: organization.name,
                    },
                    roles,
                    invited_at: membership.created_at,
                });
            }

            Ok(invitations)
        })
    })
    .await
}
