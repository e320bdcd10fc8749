#![allow(dead_code)]

use tenancy_core::{
    seed, user, CreateUserWithOrganization, MemoryStore, NewUser, ProvisionedAccount,
    TenancyConfig,
};

/// Fresh in-memory store with the default roles seeded.
pub async fn seeded_store() -> (MemoryStore, TenancyConfig) {
    let store = MemoryStore::new();
    let config = TenancyConfig::default();
    seed::seed_default_roles(&store, &config)
        .await
        .expect("seeding default roles");
    (store, config)
}

/// Provision an account: user + organization + membership + owner role.
pub async fn provision(
    store: &MemoryStore,
    config: &TenancyConfig,
    email: &str,
    organization_name: &str,
) -> ProvisionedAccount {
    user::create_user_with_organization(
        store,
        config,
        CreateUserWithOrganization {
            user: NewUser {
                email: email.to_string(),
                name: Some("Test User".to_string()),
            },
            organization_name: organization_name.to_string(),
        },
    )
    .await
    .expect("provisioning account")
}
