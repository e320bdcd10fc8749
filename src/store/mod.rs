//! Datastore abstraction.
//!
//! [`TenancyStore`] is the persistence seam: one method per row
//! operation, every method taking an explicit transaction handle so
//! operations compose inside a caller-opened transaction. Composite
//! operations go through [`with_transaction`], which owns the
//! begin/commit/rollback lifecycle.

use async_trait::async_trait;

use crate::error::TenancyResult;
use crate::permission::PermissionQuery;
use crate::types::{CreateUser, Membership, NewPermission, Organization, Permission, Role, User};

mod memory;
#[cfg(feature = "sqlx-postgres")]
mod postgres;

pub use memory::{MemoryStore, MemoryTransaction};
#[cfg(feature = "sqlx-postgres")]
pub use postgres::SqlxStore;

/// Boxed future tied to the borrow of a transaction handle.
pub type BoxFuture<'a, T> = std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Row-level persistence operations over the tenancy tables.
///
/// Every operation runs against an explicit transaction handle
/// (`&mut Self::Tx`); nothing commits until [`TenancyStore::commit`].
/// Uniqueness violations surface as
/// [`TenancyError::DuplicateKey`](crate::TenancyError::DuplicateKey)
/// from whichever backend detects them.
#[async_trait]
pub trait TenancyStore: Send + Sync {
    type Tx: Send;

    async fn begin(&self) -> TenancyResult<Self::Tx>;
    async fn commit(&self, tx: Self::Tx) -> TenancyResult<()>;
    async fn rollback(&self, tx: Self::Tx) -> TenancyResult<()>;

    // ── Organizations ──

    async fn insert_organization(
        &self,
        tx: &mut Self::Tx,
        name: &str,
    ) -> TenancyResult<Organization>;
    async fn find_organization(
        &self,
        tx: &mut Self::Tx,
        id: i64,
    ) -> TenancyResult<Option<Organization>>;

    // ── Users ──

    async fn insert_user(&self, tx: &mut Self::Tx, user: &CreateUser) -> TenancyResult<User>;
    async fn find_user(&self, tx: &mut Self::Tx, id: i64) -> TenancyResult<Option<User>>;
    async fn find_user_by_email(
        &self,
        tx: &mut Self::Tx,
        email: &str,
    ) -> TenancyResult<Option<User>>;
    /// Point the user at a new active organization. Returns the updated
    /// row, or `None` when the user does not exist.
    async fn set_active_organization(
        &self,
        tx: &mut Self::Tx,
        user_id: i64,
        organization_id: i64,
    ) -> TenancyResult<Option<User>>;

    // ── Memberships ──

    async fn insert_membership(
        &self,
        tx: &mut Self::Tx,
        organization_id: i64,
        user_id: i64,
    ) -> TenancyResult<Membership>;
    async fn insert_pending_membership(
        &self,
        tx: &mut Self::Tx,
        organization_id: i64,
        invited_email: &str,
        invited_name: Option<&str>,
    ) -> TenancyResult<Membership>;
    async fn find_membership(
        &self,
        tx: &mut Self::Tx,
        id: i64,
    ) -> TenancyResult<Option<Membership>>;
    async fn find_membership_by_user(
        &self,
        tx: &mut Self::Tx,
        user_id: i64,
        organization_id: i64,
    ) -> TenancyResult<Option<Membership>>;
    /// Find a membership that is still a pending invitation.
    async fn find_pending_membership(
        &self,
        tx: &mut Self::Tx,
        id: i64,
    ) -> TenancyResult<Option<Membership>>;
    async fn find_pending_membership_by_email(
        &self,
        tx: &mut Self::Tx,
        organization_id: i64,
        invited_email: &str,
    ) -> TenancyResult<Option<Membership>>;
    async fn list_pending_memberships_by_email(
        &self,
        tx: &mut Self::Tx,
        invited_email: &str,
    ) -> TenancyResult<Vec<Membership>>;
    /// Transition a pending invitation to an active membership: set
    /// `user_id`, clear the invite fields. Returns `None` when no
    /// pending row with this id exists.
    async fn activate_membership(
        &self,
        tx: &mut Self::Tx,
        id: i64,
        user_id: i64,
    ) -> TenancyResult<Option<Membership>>;
    /// Delete a membership row. Returns the number of rows removed.
    async fn delete_membership(&self, tx: &mut Self::Tx, id: i64) -> TenancyResult<u64>;

    // ── Roles ──

    async fn insert_role(
        &self,
        tx: &mut Self::Tx,
        name: &str,
        description: &str,
    ) -> TenancyResult<Role>;
    async fn find_role_by_name(
        &self,
        tx: &mut Self::Tx,
        name: &str,
    ) -> TenancyResult<Option<Role>>;
    async fn delete_role(&self, tx: &mut Self::Tx, id: i64) -> TenancyResult<u64>;

    // ── Permissions ──

    async fn insert_permission(
        &self,
        tx: &mut Self::Tx,
        permission: &NewPermission,
        description: &str,
    ) -> TenancyResult<Permission>;
    async fn find_permission(
        &self,
        tx: &mut Self::Tx,
        id: i64,
    ) -> TenancyResult<Option<Permission>>;
    async fn delete_permission(&self, tx: &mut Self::Tx, id: i64) -> TenancyResult<u64>;
    async fn permissions_for_role(
        &self,
        tx: &mut Self::Tx,
        role_id: i64,
    ) -> TenancyResult<Vec<Permission>>;

    // ── Role ↔ permission join ──

    async fn insert_role_permission(
        &self,
        tx: &mut Self::Tx,
        role_id: i64,
        permission_id: i64,
    ) -> TenancyResult<()>;
    async fn delete_role_permission(
        &self,
        tx: &mut Self::Tx,
        role_id: i64,
        permission_id: i64,
    ) -> TenancyResult<u64>;

    // ── Membership ↔ role join ──

    async fn insert_membership_role(
        &self,
        tx: &mut Self::Tx,
        membership_id: i64,
        role_id: i64,
    ) -> TenancyResult<()>;
    async fn delete_membership_role(
        &self,
        tx: &mut Self::Tx,
        membership_id: i64,
        role_id: i64,
    ) -> TenancyResult<u64>;
    async fn delete_membership_roles(
        &self,
        tx: &mut Self::Tx,
        membership_id: i64,
    ) -> TenancyResult<u64>;
    async fn roles_for_membership(
        &self,
        tx: &mut Self::Tx,
        membership_id: i64,
    ) -> TenancyResult<Vec<Role>>;

    // ── Authorization queries ──

    /// Whether any grant chain membership → role → permission matches
    /// the query for this user in this organization.
    async fn permission_grant_exists(
        &self,
        tx: &mut Self::Tx,
        user_id: i64,
        organization_id: i64,
        query: &PermissionQuery,
    ) -> TenancyResult<bool>;
    async fn role_grant_exists(
        &self,
        tx: &mut Self::Tx,
        user_id: i64,
        organization_id: i64,
        role_name: &str,
    ) -> TenancyResult<bool>;
}

/// Run `f` inside a fresh transaction: commit on `Ok`, roll back on
/// `Err`. The closure receives the store and the open handle, so the
/// same operation bodies compose under a caller-owned transaction via
/// their `*_in_tx` forms.
pub async fn with_transaction<S, T, F>(store: &S, f: F) -> TenancyResult<T>
where
    S: TenancyStore + ?Sized,
    F: for<'t> FnOnce(&'t S, &'t mut S::Tx) -> BoxFuture<'t, TenancyResult<T>>,
{
    let mut tx = store.begin().await?;
    let result = f(store, &mut tx).await;
    match result {
        Ok(value) => {
            store.commit(tx).await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = store.rollback(tx).await {
                tracing::warn!("transaction rollback failed: {rollback_err}");
            }
            Err(err)
        }
    }
}
