//! # Tenancy Core
//!
//! Multitenancy authorization core: organizations, users, memberships,
//! roles, and permissions, with the transactional operations that
//! create and mutate them and the read-only queries that answer "does
//! user U have permission or role R in organization O?".
//!
//! The crate is a library, not a service. Callers supply an
//! authenticated user id and an organization id; persistence goes
//! through the [`TenancyStore`] trait, with a PostgreSQL backend
//! ([`SqlxStore`], feature `sqlx-postgres`) and an in-memory backend
//! ([`MemoryStore`]) for tests and development.
//!
//! ```rust,no_run
//! use tenancy_core::{
//!     invite, permissions, seed, user, CreateUserWithOrganization, InviteUser, MemoryStore,
//!     NewUser, TenancyConfig,
//! };
//!
//! # async fn demo() -> tenancy_core::TenancyResult<()> {
//! let store = MemoryStore::new();
//! let config = TenancyConfig::default();
//! seed::seed_default_roles(&store, &config).await?;
//!
//! let account = user::create_user_with_organization(
//!     &store,
//!     &config,
//!     CreateUserWithOrganization {
//!         user: NewUser {
//!             email: "alice@example.com".to_string(),
//!             name: Some("Alice".to_string()),
//!         },
//!         organization_name: "Acme".to_string(),
//!     },
//! )
//! .await?;
//!
//! invite::invite_user_to_organization(
//!     &store,
//!     &config,
//!     InviteUser {
//!         email: "bob@example.com".to_string(),
//!         organization_id: account.organization.id,
//!         role_name: None,
//!         invited_name: None,
//!     },
//! )
//! .await?;
//!
//! let allowed = permissions::user_has_role(
//!     &store,
//!     account.user.id,
//!     account.organization.id,
//!     "OWNER",
//! )
//! .await?;
//! assert!(allowed);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod invite;
pub mod membership;
pub mod organization;
pub mod permission;
pub mod permissions;
pub mod roles;
pub mod seed;
pub mod store;
pub mod types;
pub mod user;

// Re-export commonly used items
pub use config::TenancyConfig;
pub use error::{validation_failed, DatabaseError, EntityKind, TenancyError, TenancyResult};
pub use permission::PermissionQuery;
#[cfg(feature = "sqlx-postgres")]
pub use store::SqlxStore;
pub use store::{with_transaction, MemoryStore, TenancyStore};
pub use types::{
    CreateUser, CreateUserWithOrganization, GlobalRole, InviteUser, Membership, NewPermission,
    NewRole, NewUser, Organization, OrganizationRef, PendingInvitation, Permission,
    PermissionAccess, PermissionAction, ProvisionedAccount, Role, RolePermission, RoleRef, User,
};
