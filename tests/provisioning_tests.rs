mod common;

use common::{provision, seeded_store};
use tenancy_core::{
    permissions, user, CreateUserWithOrganization, GlobalRole, MemoryStore, NewUser,
    TenancyConfig, TenancyError, TenancyStore,
};

fn params(email: &str, organization_name: &str) -> CreateUserWithOrganization {
    CreateUserWithOrganization {
        user: NewUser {
            email: email.to_string(),
            name: Some("Alice".to_string()),
        },
        organization_name: organization_name.to_string(),
    }
}

#[tokio::test]
async fn provisions_user_organization_membership_and_owner_role() {
    let (store, config) = seeded_store().await;

    let account = user::create_user_with_organization(
        &store,
        &config,
        params("alice@example.com", "Acme"),
    )
    .await
    .unwrap();

    assert_eq!(account.user.email, "alice@example.com");
    assert_eq!(account.organization.name, "Acme");
    assert_eq!(account.membership.user_id, Some(account.user.id));
    assert_eq!(account.membership.organization_id, account.organization.id);
    assert_eq!(account.user.active_organization_id, account.organization.id);

    let is_owner = permissions::user_has_role(
        &store,
        account.user.id,
        account.organization.id,
        "OWNER",
    )
    .await
    .unwrap();
    assert!(is_owner);
}

#[tokio::test]
async fn never_mints_a_privileged_global_role() {
    let (store, config) = seeded_store().await;

    let account = provision(&store, &config, "alice@example.com", "Acme").await;
    assert_eq!(account.user.global_role, GlobalRole::Customer);
}

#[tokio::test]
async fn duplicate_email_fails_and_leaves_first_account_intact() {
    let (store, config) = seeded_store().await;

    let first = provision(&store, &config, "alice@example.com", "Acme").await;

    let err = user::create_user_with_organization(
        &store,
        &config,
        params("alice@example.com", "Globex"),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, TenancyError::DuplicateKey(_)));

    // Exactly the first call's rows remain.
    let mut tx = store.begin().await.unwrap();
    let found = store
        .find_user_by_email(&mut tx, "alice@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, first.user.id);
    assert_eq!(found.active_organization_id, first.organization.id);

    let second_org = store
        .find_organization(&mut tx, first.organization.id + 1)
        .await
        .unwrap();
    assert!(second_org.is_none());
}

#[tokio::test]
async fn missing_owner_role_rolls_back_every_insert() {
    // No seeding: the OWNER role is absent.
    let store = MemoryStore::new();
    let config = TenancyConfig::default();

    let err = user::create_user_with_organization(
        &store,
        &config,
        params("alice@example.com", "Acme"),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, TenancyError::RoleNotSeeded(_)));

    let mut tx = store.begin().await.unwrap();
    let user_row = store
        .find_user_by_email(&mut tx, "alice@example.com")
        .await
        .unwrap();
    assert!(user_row.is_none());
    // The organization was inserted first inside the transaction; the
    // rollback removed it too.
    let organization = store.find_organization(&mut tx, 1).await.unwrap();
    assert!(organization.is_none());
}

#[tokio::test]
async fn rejects_malformed_email_before_any_write() {
    let (store, config) = seeded_store().await;

    let err =
        user::create_user_with_organization(&store, &config, params("not-an-email", "Acme"))
            .await
            .unwrap_err();
    assert!(matches!(err, TenancyError::Validation(_)));

    let mut tx = store.begin().await.unwrap();
    assert!(store.find_organization(&mut tx, 1).await.unwrap().is_none());
}

#[tokio::test]
async fn rejects_empty_organization_name() {
    let (store, config) = seeded_store().await;

    let err = user::create_user_with_organization(&store, &config, params("alice@example.com", ""))
        .await
        .unwrap_err();
    match err {
        TenancyError::Validation(message) => {
            assert!(message.contains("organization_name"), "got: {message}")
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn duplicate_organization_names_are_allowed() {
    let (store, config) = seeded_store().await;

    let first = provision(&store, &config, "alice@example.com", "Acme").await;
    let second = provision(&store, &config, "bob@example.com", "Acme").await;

    assert_eq!(first.organization.name, second.organization.name);
    assert_ne!(first.organization.id, second.organization.id);
}
