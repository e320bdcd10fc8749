mod common;

use common::{provision, seeded_store};
use tenancy_core::{invite, InviteUser, TenancyError, TenancyStore};

fn invite_params(email: &str, organization_id: i64) -> InviteUser {
    InviteUser {
        email: email.to_string(),
        organization_id,
        role_name: None,
        invited_name: None,
    }
}

#[tokio::test]
async fn invite_creates_a_pending_membership_with_the_default_role() {
    let (store, config) = seeded_store().await;
    let alice = provision(&store, &config, "alice@example.com", "Acme").await;

    let membership = invite::invite_user_to_organization(
        &store,
        &config,
        invite_params("bob@example.com", alice.organization.id),
    )
    .await
    .unwrap();

    assert!(membership.is_pending());
    assert_eq!(membership.invited_email.as_deref(), Some("bob@example.com"));

    let invitations = invite::list_invitations(&store, "bob@example.com")
        .await
        .unwrap();
    assert_eq!(invitations.len(), 1);
    assert_eq!(invitations[0].organization.name, "Acme");
    let role_names: Vec<&str> = invitations[0].roles.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(role_names, vec!["MEMBER"]);
}

#[tokio::test]
async fn invite_fails_for_unknown_organization() {
    let (store, config) = seeded_store().await;

    let err = invite::invite_user_to_organization(
        &store,
        &config,
        invite_params("bob@example.com", 999999),
    )
    .await
    .unwrap_err();
    assert_eq!(err.to_string(), "Organization not found");
}

#[tokio::test]
async fn invite_rejects_a_second_invitation_for_the_same_email() {
    let (store, config) = seeded_store().await;
    let alice = provision(&store, &config, "alice@example.com", "Acme").await;

    invite::invite_user_to_organization(
        &store,
        &config,
        invite_params("bob@example.com", alice.organization.id),
    )
    .await
    .unwrap();

    let err = invite::invite_user_to_organization(
        &store,
        &config,
        invite_params("bob@example.com", alice.organization.id),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, TenancyError::DuplicateKey(_)));

    // The failed call must not leave a second pending row behind.
    let invitations = invite::list_invitations(&store, "bob@example.com")
        .await
        .unwrap();
    assert_eq!(invitations.len(), 1);
}

#[tokio::test]
async fn accepting_activates_the_membership_and_switches_active_org() {
    let (store, config) = seeded_store().await;
    let alice = provision(&store, &config, "alice@example.com", "Acme").await;
    let bob = provision(&store, &config, "bob@example.com", "Bob's Org").await;

    let invitation = invite::invite_user_to_organization(
        &store,
        &config,
        invite_params("bob@example.com", alice.organization.id),
    )
    .await
    .unwrap();

    let membership = invite::accept_invitation(&store, invitation.id, bob.user.id)
        .await
        .unwrap();

    assert_eq!(membership.user_id, Some(bob.user.id));
    assert!(membership.invited_email.is_none());
    assert!(membership.invited_name.is_none());

    let mut tx = store.begin().await.unwrap();
    let bob_row = store.find_user(&mut tx, bob.user.id).await.unwrap().unwrap();
    assert_eq!(bob_row.active_organization_id, alice.organization.id);

    // No longer listed as pending.
    drop(tx);
    let invitations = invite::list_invitations(&store, "bob@example.com")
        .await
        .unwrap();
    assert!(invitations.is_empty());
}

#[tokio::test]
async fn accepting_twice_fails_with_not_found() {
    let (store, config) = seeded_store().await;
    let alice = provision(&store, &config, "alice@example.com", "Acme").await;
    let bob = provision(&store, &config, "bob@example.com", "Bob's Org").await;

    let invitation = invite::invite_user_to_organization(
        &store,
        &config,
        invite_params("bob@example.com", alice.organization.id),
    )
    .await
    .unwrap();

    invite::accept_invitation(&store, invitation.id, bob.user.id)
        .await
        .unwrap();

    let err = invite::accept_invitation(&store, invitation.id, bob.user.id)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Invitation not found or already accepted");
}

#[tokio::test]
async fn accepting_for_an_unknown_user_fails() {
    let (store, config) = seeded_store().await;
    let alice = provision(&store, &config, "alice@example.com", "Acme").await;

    let invitation = invite::invite_user_to_organization(
        &store,
        &config,
        invite_params("bob@example.com", alice.organization.id),
    )
    .await
    .unwrap();

    let err = invite::accept_invitation(&store, invitation.id, 999999)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "User not found");

    // The invitation stays pending for a later, valid acceptance.
    let invitations = invite::list_invitations(&store, "bob@example.com")
        .await
        .unwrap();
    assert_eq!(invitations.len(), 1);
}

#[tokio::test]
async fn declining_removes_the_invitation_outright() {
    let (store, config) = seeded_store().await;
    let alice = provision(&store, &config, "alice@example.com", "Acme").await;

    let invitation = invite::invite_user_to_organization(
        &store,
        &config,
        invite_params("bob@example.com", alice.organization.id),
    )
    .await
    .unwrap();

    invite::decline_invitation(&store, invitation.id).await.unwrap();

    let mut tx = store.begin().await.unwrap();
    assert!(store
        .find_membership(&mut tx, invitation.id)
        .await
        .unwrap()
        .is_none());
    assert!(store
        .roles_for_membership(&mut tx, invitation.id)
        .await
        .unwrap()
        .is_empty());
    drop(tx);

    let err = invite::decline_invitation(&store, invitation.id).await.unwrap_err();
    assert_eq!(err.to_string(), "Invitation not found or already accepted");
}

#[tokio::test]
async fn listing_invitations_for_an_unknown_email_is_empty() {
    let (store, _config) = seeded_store().await;

    let invitations = invite::list_invitations(&store, "nobody@example.com")
        .await
        .unwrap();
    assert!(invitations.is_empty());
}

#[tokio::test]
async fn invite_attaches_the_requested_role() {
    let (store, config) = seeded_store().await;
    let alice = provision(&store, &config, "alice@example.com", "Acme").await;

    invite::invite_user_to_organization(
        &store,
        &config,
        InviteUser {
            email: "carol@example.com".to_string(),
            organization_id: alice.organization.id,
            role_name: Some("ADMIN".to_string()),
            invited_name: Some("Carol".to_string()),
        },
    )
    .await
    .unwrap();

    let invitations = invite::list_invitations(&store, "carol@example.com")
        .await
        .unwrap();
    let role_names: Vec<&str> = invitations[0].roles.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(role_names, vec!["ADMIN"]);
}

#[tokio::test]
async fn invite_with_unknown_role_rolls_back_the_pending_membership() {
    let (store, config) = seeded_store().await;
    let alice = provision(&store, &config, "alice@example.com", "Acme").await;

    let err = invite::invite_user_to_organization(
        &store,
        &config,
        InviteUser {
            email: "dave@example.com".to_string(),
            organization_id: alice.organization.id,
            role_name: Some("NONEXISTENT".to_string()),
            invited_name: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, TenancyError::NotFound { .. }));

    let invitations = invite::list_invitations(&store, "dave@example.com")
        .await
        .unwrap();
    assert!(invitations.is_empty());
}
