//! In-memory datastore for tests and development.
//!
//! Tables live in a mutex-guarded struct. A transaction is a full
//! snapshot of the tables: operations mutate the snapshot, commit swaps
//! it in, rollback drops it. This gives the same all-or-nothing
//! semantics as the SQL backend. Concurrent transactions are not
//! isolated from each other; the last commit wins.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use crate::error::TenancyResult;
use crate::permission::PermissionQuery;
use crate::types::{CreateUser, Membership, NewPermission, Organization, Permission, Role, User};
use crate::TenancyError;

use super::TenancyStore;

#[derive(Debug, Clone, Default)]
struct Tables {
    organizations: BTreeMap<i64, Organization>,
    users: BTreeMap<i64, User>,
    memberships: BTreeMap<i64, Membership>,
    roles: BTreeMap<i64, Role>,
    permissions: BTreeMap<i64, Permission>,
    role_permissions: BTreeSet<(i64, i64)>,
    membership_roles: BTreeSet<(i64, i64)>,
    next_organization_id: i64,
    next_user_id: i64,
    next_membership_id: i64,
    next_role_id: i64,
    next_permission_id: i64,
}

impl Tables {
    fn next_id(counter: &mut i64) -> i64 {
        *counter += 1;
        *counter
    }
}

/// Snapshot transaction over [`MemoryStore`].
pub struct MemoryTransaction {
    tables: Tables,
}

/// In-memory [`TenancyStore`] backend.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TenancyStore for MemoryStore {
    type Tx = MemoryTransaction;

    async fn begin(&self) -> TenancyResult<Self::Tx> {
        let tables = self.inner.lock().unwrap().clone();
        Ok(MemoryTransaction { tables })
    }

    async fn commit(&self, tx: Self::Tx) -> TenancyResult<()> {
        *self.inner.lock().unwrap() = tx.tables;
        Ok(())
    }

    async fn rollback(&self, tx: Self::Tx) -> TenancyResult<()> {
        drop(tx);
        Ok(())
    }

    // ── Organizations ──

    async fn insert_organization(
        &self,
        tx: &mut Self::Tx,
        name: &str,
    ) -> TenancyResult<Organization> {
        let tables = &mut tx.tables;
        let id = Tables::next_id(&mut tables.next_organization_id);
        let now = Utc::now();
        let organization = Organization {
            id,
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        };
        tables.organizations.insert(id, organization.clone());
        Ok(organization)
    }

    async fn find_organization(
        &self,
        tx: &mut Self::Tx,
        id: i64,
    ) -> TenancyResult<Option<Organization>> {
        Ok(tx.tables.organizations.get(&id).cloned())
    }

    // ── Users ──

    async fn insert_user(&self, tx: &mut Self::Tx, user: &CreateUser) -> TenancyResult<User> {
        let tables = &mut tx.tables;
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(TenancyError::duplicate_key(format!(
                "a user with email \"{}\" already exists",
                user.email
            )));
        }
        let id = Tables::next_id(&mut tables.next_user_id);
        let now = Utc::now();
        let user = User {
            id,
            name: user.name.clone(),
            email: user.email.clone(),
            active_organization_id: user.active_organization_id,
            global_role: user.global_role,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, tx: &mut Self::Tx, id: i64) -> TenancyResult<Option<User>> {
        Ok(tx.tables.users.get(&id).cloned())
    }

    async fn find_user_by_email(
        &self,
        tx: &mut Self::Tx,
        email: &str,
    ) -> TenancyResult<Option<User>> {
        Ok(tx.tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn set_active_organization(
        &self,
        tx: &mut Self::Tx,
        user_id: i64,
        organization_id: i64,
    ) -> TenancyResult<Option<User>> {
        match tx.tables.users.get_mut(&user_id) {
            Some(user) => {
                user.active_organization_id = organization_id;
                user.updated_at = Utc::now();
                Ok(Some(user.clone()))
            }
            None => Ok(None),
        }
    }

    // ── Memberships ──

    async fn insert_membership(
        &self,
        tx: &mut Self::Tx,
        organization_id: i64,
        user_id: i64,
    ) -> TenancyResult<Membership> {
        let tables = &mut tx.tables;
        let taken = tables
            .memberships
            .values()
            .any(|m| m.user_id == Some(user_id) && m.organization_id == organization_id);
        if taken {
            return Err(TenancyError::duplicate_key(format!(
                "user {user_id} already has a membership in organization {organization_id}"
            )));
        }
        let id = Tables::next_id(&mut tables.next_membership_id);
        let now = Utc::now();
        let membership = Membership {
            id,
            organization_id,
            user_id: Some(user_id),
            invited_name: None,
            invited_email: None,
            created_at: now,
            updated_at: now,
        };
        tables.memberships.insert(id, membership.clone());
        Ok(membership)
    }

    async fn insert_pending_membership(
        &self,
        tx: &mut Self::Tx,
        organization_id: i64,
        invited_email: &str,
        invited_name: Option<&str>,
    ) -> TenancyResult<Membership> {
        let tables = &mut tx.tables;
        let taken = tables.memberships.values().any(|m| {
            m.organization_id == organization_id && m.invited_email.as_deref() == Some(invited_email)
        });
        if taken {
            return Err(TenancyError::duplicate_key(format!(
                "an invitation for \"{invited_email}\" already exists in organization {organization_id}"
            )));
        }
        let id = Tables::next_id(&mut tables.next_membership_id);
        let now = Utc::now();
        let membership = Membership {
            id,
            organization_id,
            user_id: None,
            invited_name: invited_name.map(|s| s.to_string()),
            invited_email: Some(invited_email.to_string()),
            created_at: now,
            updated_at: now,
        };
        tables.memberships.insert(id, membership.clone());
        Ok(membership)
    }

    async fn find_membership(
        &self,
        tx: &mut Self::Tx,
        id: i64,
    ) -> TenancyResult<Option<Membership>> {
        Ok(tx.tables.memberships.get(&id).cloned())
    }

    async fn find_membership_by_user(
        &self,
        tx: &mut Self::Tx,
        user_id: i64,
        organization_id: i64,
    ) -> TenancyResult<Option<Membership>> {
        Ok(tx
            .tables
            .memberships
            .values()
            .find(|m| m.user_id == Some(user_id) && m.organization_id == organization_id)
            .cloned())
    }

    async fn find_pending_membership(
        &self,
        tx: &mut Self::Tx,
        id: i64,
    ) -> TenancyResult<Option<Membership>> {
        Ok(tx
            .tables
            .memberships
            .get(&id)
            .filter(|m| m.user_id.is_none())
            .cloned())
    }

    async fn find_pending_membership_by_email(
        &self,
        tx: &mut Self::Tx,
        organization_id: i64,
        invited_email: &str,
    ) -> TenancyResult<Option<Membership>> {
        Ok(tx
            .tables
            .memberships
            .values()
            .find(|m| {
                m.organization_id == organization_id
                    && m.invited_email.as_deref() == Some(invited_email)
            })
            .cloned())
    }

    async fn list_pending_memberships_by_email(
        &self,
        tx: &mut Self::Tx,
        invited_email: &str,
    ) -> TenancyResult<Vec<Membership>> {
        Ok(tx
            .tables
            .memberships
            .values()
            .filter(|m| m.user_id.is_none() && m.invited_email.as_deref() == Some(invited_email))
            .cloned()
            .collect())
    }

    async fn activate_membership(
        &self,
        tx: &mut Self::Tx,
        id: i64,
        user_id: i64,
    ) -> TenancyResult<Option<Membership>> {
        let tables = &mut tx.tables;
        let organization_id = match tables.memberships.get(&id) {
            Some(m) if m.user_id.is_none() => m.organization_id,
            _ => return Ok(None),
        };
        let taken = tables
            .memberships
            .values()
            .any(|m| m.user_id == Some(user_id) && m.organization_id == organization_id);
        if taken {
            return Err(TenancyError::duplicate_key(format!(
                "user {user_id} already has a membership in organization {organization_id}"
            )));
        }
        match tables.memberships.get_mut(&id) {
            Some(membership) => {
                membership.user_id = Some(user_id);
                membership.invited_name = None;
                membership.invited_email = None;
                membership.updated_at = Utc::now();
                Ok(Some(membership.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete_membership(&self, tx: &mut Self::Tx, id: i64) -> TenancyResult<u64> {
        Ok(tx.tables.memberships.remove(&id).map(|_| 1).unwrap_or(0))
    }

    // ── Roles ──

    async fn insert_role(
        &self,
        tx: &mut Self::Tx,
        name: &str,
        description: &str,
    ) -> TenancyResult<Role> {
        let tables = &mut tx.tables;
        if tables.roles.values().any(|r| r.name == name) {
            return Err(TenancyError::duplicate_key(format!(
                "a role named \"{name}\" already exists"
            )));
        }
        let id = Tables::next_id(&mut tables.next_role_id);
        let role = Role {
            id,
            name: name.to_string(),
            description: description.to_string(),
        };
        tables.roles.insert(id, role.clone());
        Ok(role)
    }

    async fn find_role_by_name(
        &self,
        tx: &mut Self::Tx,
        name: &str,
    ) -> TenancyResult<Option<Role>> {
        Ok(tx.tables.roles.values().find(|r| r.name == name).cloned())
    }

    async fn delete_role(&self, tx: &mut Self::Tx, id: i64) -> TenancyResult<u64> {
        Ok(tx.tables.roles.remove(&id).map(|_| 1).unwrap_or(0))
    }

    // ── Permissions ──

    async fn insert_permission(
        &self,
        tx: &mut Self::Tx,
        permission: &NewPermission,
        description: &str,
    ) -> TenancyResult<Permission> {
        let tables = &mut tx.tables;
        let taken = tables.permissions.values().any(|p| {
            p.action == permission.action
                && p.entity == permission.entity
                && p.access == permission.access
        });
        if taken {
            return Err(TenancyError::duplicate_key(format!(
                "permission ({}, {}, {}) already exists",
                permission.action, permission.entity, permission.access
            )));
        }
        let id = Tables::next_id(&mut tables.next_permission_id);
        let permission = Permission {
            id,
            action: permission.action,
            entity: permission.entity.clone(),
            access: permission.access,
            description: description.to_string(),
        };
        tables.permissions.insert(id, permission.clone());
        Ok(permission)
    }

    async fn find_permission(
        &self,
        tx: &mut Self::Tx,
        id: i64,
    ) -> TenancyResult<Option<Permission>> {
        Ok(tx.tables.permissions.get(&id).cloned())
    }

    async fn delete_permission(&self, tx: &mut Self::Tx, id: i64) -> TenancyResult<u64> {
        Ok(tx.tables.permissions.remove(&id).map(|_| 1).unwrap_or(0))
    }

    async fn permissions_for_role(
        &self,
        tx: &mut Self::Tx,
        role_id: i64,
    ) -> TenancyResult<Vec<Permission>> {
        let tables = &tx.tables;
        Ok(tables
            .role_permissions
            .iter()
            .filter(|(rid, _)| *rid == role_id)
            .filter_map(|(_, pid)| tables.permissions.get(pid))
            .cloned()
            .collect())
    }

    // ── Role ↔ permission join ──

    async fn insert_role_permission(
        &self,
        tx: &mut Self::Tx,
        role_id: i64,
        permission_id: i64,
    ) -> TenancyResult<()> {
        if !tx.tables.role_permissions.insert((role_id, permission_id)) {
            return Err(TenancyError::duplicate_key(format!(
                "role {role_id} already holds permission {permission_id}"
            )));
        }
        Ok(())
    }

    async fn delete_role_permission(
        &self,
        tx: &mut Self::Tx,
        role_id: i64,
        permission_id: i64,
    ) -> TenancyResult<u64> {
        Ok(tx.tables.role_permissions.remove(&(role_id, permission_id)) as u64)
    }

    // ── Membership ↔ role join ──

    async fn insert_membership_role(
        &self,
        tx: &mut Self::Tx,
        membership_id: i64,
        role_id: i64,
    ) -> TenancyResult<()> {
        if !tx.tables.membership_roles.insert((membership_id, role_id)) {
            return Err(TenancyError::duplicate_key(format!(
                "membership {membership_id} already holds role {role_id}"
            )));
        }
        Ok(())
    }

    async fn delete_membership_role(
        &self,
        tx: &mut Self::Tx,
        membership_id: i64,
        role_id: i64,
    ) -> TenancyResult<u64> {
        Ok(tx.tables.membership_roles.remove(&(membership_id, role_id)) as u64)
    }

    async fn delete_membership_roles(
        &self,
        tx: &mut Self::Tx,
        membership_id: i64,
    ) -> TenancyResult<u64> {
        let tables = &mut tx.tables;
        let before = tables.membership_roles.len();
        tables.membership_roles.retain(|(mid, _)| *mid != membership_id);
        Ok((before - tables.membership_roles.len()) as u64)
    }

    async fn roles_for_membership(
        &self,
        tx: &mut Self::Tx,
        membership_id: i64,
    ) -> TenancyResult<Vec<Role>> {
        let tables = &tx.tables;
        Ok(tables
            .membership_roles
            .iter()
            .filter(|(mid, _)| *mid == membership_id)
            .filter_map(|(_, rid)| tables.roles.get(rid))
            .cloned()
            .collect())
    }

    // ── Authorization queries ──

    async fn permission_grant_exists(
        &self,
        tx: &mut Self::Tx,
        user_id: i64,
        organization_id: i64,
        query: &PermissionQuery,
    ) -> TenancyResult<bool> {
        let tables = &tx.tables;
        let granted = tables
            .memberships
            .values()
            .filter(|m| m.user_id == Some(user_id) && m.organization_id == organization_id)
            .flat_map(|m| {
                tables
                    .membership_roles
                    .iter()
                    .filter(move |(mid, _)| *mid == m.id)
            })
            .flat_map(|(_, role_id)| {
                tables
                    .role_permissions
                    .iter()
                    .filter(move |(rid, _)| rid == role_id)
            })
            .filter_map(|(_, pid)| tables.permissions.get(pid))
            .any(|p| {
                p.action == query.action
                    && p.entity == query.entity
                    && query
                        .access
                        .as_ref()
                        .map(|levels| levels.contains(&p.access))
                        .unwrap_or(true)
            });
        Ok(granted)
    }

    async fn role_grant_exists(
        &self,
        tx: &mut Self::Tx,
        user_id: i64,
        organization_id: i64,
        role_name: &str,
    ) -> TenancyResult<bool> {
        let tables = &tx.tables;
        let granted = tables
            .memberships
            .values()
            .filter(|m| m.user_id == Some(user_id) && m.organization_id == organization_id)
            .flat_map(|m| {
                tables
                    .membership_roles
                    .iter()
                    .filter(move |(mid, _)| *mid == m.id)
            })
            .filter_map(|(_, rid)| tables.roles.get(rid))
            .any(|r| r.name == role_name);
        Ok(granted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GlobalRole;

    #[tokio::test]
    async fn rollback_discards_writes() {
        let store = MemoryStore::new();

        let mut tx = store.begin().await.unwrap();
        store.insert_organization(&mut tx, "Acme").await.unwrap();
        store.rollback(tx).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert_eq!(store.find_organization(&mut tx, 1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn commit_makes_writes_visible() {
        let store = MemoryStore::new();

        let mut tx = store.begin().await.unwrap();
        let org = store.insert_organization(&mut tx, "Acme").await.unwrap();
        store.commit(tx).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let found = store.find_organization(&mut tx, org.id).await.unwrap();
        assert_eq!(found.map(|o| o.name), Some("Acme".to_string()));
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let org = store.insert_organization(&mut tx, "Acme").await.unwrap();

        let create = CreateUser {
            name: None,
            email: "dup@example.com".to_string(),
            active_organization_id: org.id,
            global_role: GlobalRole::Customer,
        };
        store.insert_user(&mut tx, &create).await.unwrap();
        let err = store.insert_user(&mut tx, &create).await.unwrap_err();
        assert!(matches!(err, TenancyError::DuplicateKey(_)));
    }

    #[tokio::test]
    async fn activation_enforces_one_membership_per_user_per_org() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let org = store.insert_organization(&mut tx, "Acme").await.unwrap();
        let user = store
            .insert_user(
                &mut tx,
                &CreateUser {
                    name: None,
                    email: "member@example.com".to_string(),
                    active_organization_id: org.id,
                    global_role: GlobalRole::Customer,
                },
            )
            .await
            .unwrap();
        store
            .insert_membership(&mut tx, org.id, user.id)
            .await
            .unwrap();
        let pending = store
            .insert_pending_membership(&mut tx, org.id, "member@example.com", None)
            .await
            .unwrap();

        let err = store
            .activate_membership(&mut tx, pending.id, user.id)
            .await
            .unwrap_err();
        assert!(matches!(err, TenancyError::DuplicateKey(_)));
    }
}
