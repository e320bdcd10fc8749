mod common;

use common::{provision, seeded_store};
use proptest::prelude::*;
use tenancy_core::{
    membership, permissions, roles, MemoryStore, NewPermission, NewRole, PermissionAccess,
    PermissionAction, PermissionQuery, TenancyError,
};

async fn grant_role_with_permission(
    store: &MemoryStore,
    membership_id: i64,
    role_name: &str,
    entity: &str,
    action: PermissionAction,
    access: PermissionAccess,
) {
    roles::create_role(
        store,
        NewRole {
            name: role_name.to_string(),
            description: None,
        },
    )
    .await
    .unwrap();

    let permission = permissions::create_permission(
        store,
        NewPermission {
            entity: entity.to_string(),
            action,
            access,
        },
    )
    .await
    .unwrap();

    permissions::add_permission_to_role(store, role_name, permission.id)
        .await
        .unwrap();
    membership::add_role_to_membership(store, membership_id, role_name)
        .await
        .unwrap();
}

#[tokio::test]
async fn grants_through_multiple_roles_are_or_combined() {
    let (store, config) = seeded_store().await;
    let alice = provision(&store, &config, "alice@example.com", "Acme").await;

    grant_role_with_permission(
        &store,
        alice.membership.id,
        "WIDGET_READER_OWN",
        "widget",
        PermissionAction::Read,
        PermissionAccess::Own,
    )
    .await;
    grant_role_with_permission(
        &store,
        alice.membership.id,
        "WIDGET_READER_ANY",
        "widget",
        PermissionAction::Read,
        PermissionAccess::Any,
    )
    .await;

    for permission in ["read:widget", "read:widget:own", "read:widget:any"] {
        let granted = permissions::user_has_permission(
            &store,
            alice.user.id,
            alice.organization.id,
            permission,
        )
        .await
        .unwrap();
        assert!(granted, "expected {permission} to be granted");
    }
}

#[tokio::test]
async fn access_list_matches_any_listed_level() {
    let (store, config) = seeded_store().await;
    let alice = provision(&store, &config, "alice@example.com", "Acme").await;

    grant_role_with_permission(
        &store,
        alice.membership.id,
        "INVOICE_EDITOR",
        "invoice",
        PermissionAction::Update,
        PermissionAccess::Own,
    )
    .await;

    let granted = permissions::user_has_permission(
        &store,
        alice.user.id,
        alice.organization.id,
        "update:invoice:own,any",
    )
    .await
    .unwrap();
    assert!(granted);

    let denied = permissions::user_has_permission(
        &store,
        alice.user.id,
        alice.organization.id,
        "update:invoice:any",
    )
    .await
    .unwrap();
    assert!(!denied);
}

#[tokio::test]
async fn absence_of_anything_yields_false_not_an_error() {
    let (store, config) = seeded_store().await;
    let alice = provision(&store, &config, "alice@example.com", "Acme").await;

    // Permission that was never created.
    assert!(!permissions::user_has_permission(
        &store,
        alice.user.id,
        alice.organization.id,
        "delete:nonexistententity"
    )
    .await
    .unwrap());

    // Unknown user and unknown organization.
    assert!(
        !permissions::user_has_permission(&store, 999999, alice.organization.id, "read:widget")
            .await
            .unwrap()
    );
    assert!(
        !permissions::user_has_permission(&store, alice.user.id, 999999, "read:widget")
            .await
            .unwrap()
    );

    // Unknown role name.
    assert!(
        !permissions::user_has_role(&store, alice.user.id, alice.organization.id, "NONEXISTENT")
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn malformed_permission_strings_are_a_validation_error() {
    let (store, config) = seeded_store().await;
    let alice = provision(&store, &config, "alice@example.com", "Acme").await;

    let err = permissions::user_has_permission(
        &store,
        alice.user.id,
        alice.organization.id,
        "annihilate:widget",
    )
    .await
    .unwrap_err();
    assert!(matches!(err, TenancyError::Validation(_)));
}

#[tokio::test]
async fn active_org_checks_resolve_through_the_user_row() {
    let (store, config) = seeded_store().await;
    let alice = provision(&store, &config, "alice@example.com", "Acme").await;

    let is_owner = permissions::user_has_role_in_active_org(&store, alice.user.id, "OWNER")
        .await
        .unwrap();
    assert!(is_owner);

    grant_role_with_permission(
        &store,
        alice.membership.id,
        "WIDGET_READER",
        "widget",
        PermissionAction::Read,
        PermissionAccess::Any,
    )
    .await;
    let granted =
        permissions::user_has_permission_in_active_org(&store, alice.user.id, "read:widget")
            .await
            .unwrap();
    assert!(granted);

    let err = permissions::user_has_role_in_active_org(&store, 999999, "OWNER")
        .await
        .unwrap_err();
    assert!(matches!(err, TenancyError::NoActiveOrganization { .. }));
}

#[tokio::test]
async fn create_permission_synthesizes_the_description() {
    let (store, _config) = seeded_store().await;

    let permission = permissions::create_permission(
        &store,
        NewPermission {
            entity: "widget".to_string(),
            action: PermissionAction::Read,
            access: PermissionAccess::Own,
        },
    )
    .await
    .unwrap();
    assert_eq!(permission.description, "read own widget");

    let err = permissions::create_permission(
        &store,
        NewPermission {
            entity: "widget".to_string(),
            action: PermissionAction::Read,
            access: PermissionAccess::Own,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, TenancyError::DuplicateKey(_)));
}

#[tokio::test]
async fn role_permission_associations_are_unique_and_role_checked() {
    let (store, _config) = seeded_store().await;

    let permission = permissions::create_permission(
        &store,
        NewPermission {
            entity: "widget".to_string(),
            action: PermissionAction::Create,
            access: PermissionAccess::Any,
        },
    )
    .await
    .unwrap();

    let err = permissions::add_permission_to_role(&store, "NONEXISTENT", permission.id)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Role \"NONEXISTENT\" not found");

    permissions::add_permission_to_role(&store, "ADMIN", permission.id)
        .await
        .unwrap();
    let err = permissions::add_permission_to_role(&store, "ADMIN", permission.id)
        .await
        .unwrap_err();
    assert!(matches!(err, TenancyError::DuplicateKey(_)));

    // Removing an association that is not there is a no-op.
    permissions::remove_permission_from_role(&store, "MEMBER", permission.id)
        .await
        .unwrap();
    permissions::remove_permission_from_role(&store, "ADMIN", permission.id)
        .await
        .unwrap();

    let rows = permissions::get_permissions_by_role_name(&store, "ADMIN")
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn permissions_by_role_name_are_tagged_with_the_role() {
    let (store, _config) = seeded_store().await;

    let permission = permissions::create_permission(
        &store,
        NewPermission {
            entity: "report".to_string(),
            action: PermissionAction::Read,
            access: PermissionAccess::Any,
        },
    )
    .await
    .unwrap();
    permissions::add_permission_to_role(&store, "ADMIN", permission.id)
        .await
        .unwrap();

    let rows = permissions::get_permissions_by_role_name(&store, "ADMIN")
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].role_name, "ADMIN");
    assert_eq!(rows[0].entity, "report");

    // Unknown role: empty, not an error.
    let rows = permissions::get_permissions_by_role_name(&store, "NONEXISTENT")
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn deleting_missing_registry_entries_is_not_found() {
    let (store, _config) = seeded_store().await;

    let err = permissions::delete_permission(&store, 999999).await.unwrap_err();
    assert!(matches!(err, TenancyError::NotFound { .. }));

    let err = roles::delete_role(&store, "NONEXISTENT").await.unwrap_err();
    assert!(matches!(err, TenancyError::NotFound { .. }));
}

// ---------------------------------------------------------------------------
// Permission string grammar properties
// ---------------------------------------------------------------------------

proptest! {
    /// Every well-formed action:entity[:access] string parses, and the
    /// parse preserves its parts.
    #[test]
    fn well_formed_permission_strings_parse(
        action in prop::sample::select(vec!["create", "read", "update", "delete"]),
        entity in "[a-z][a-z0-9_]{0,20}",
        access in prop::option::of(prop::sample::select(vec!["own", "any", "own,any"])),
    ) {
        let input = match &access {
            Some(access) => format!("{action}:{entity}:{access}"),
            None => format!("{action}:{entity}"),
        };
        let query = PermissionQuery::parse(&input).unwrap();
        prop_assert_eq!(query.action.as_str(), action);
        prop_assert_eq!(query.entity.as_str(), entity.as_str());
        prop_assert_eq!(query.access.is_some(), access.is_some());
    }

    /// Strings without a recognizable action never parse.
    #[test]
    fn unknown_actions_are_rejected(
        action in "[a-z]{1,10}",
        entity in "[a-z]{1,10}",
    ) {
        prop_assume!(PermissionAction::parse(&action).is_none());
        let err = PermissionQuery::parse(&format!("{action}:{entity}")).unwrap_err();
        prop_assert!(matches!(err, TenancyError::Validation(_)));
    }
}
