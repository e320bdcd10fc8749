//! PostgreSQL datastore via SQLx.

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::{Postgres, Transaction};

use crate::error::{DatabaseError, TenancyResult};
use crate::permission::PermissionQuery;
use crate::types::{CreateUser, Membership, NewPermission, Organization, Permission, Role, User};

use super::TenancyStore;

const SCHEMA: &str = include_str!("../../migrations/0001_create_tenancy_tables.sql");

/// PostgreSQL [`TenancyStore`] backend.
///
/// Transactions map directly onto database transactions; the uniqueness
/// constraints of the schema back the same duplicate-key errors the
/// in-memory backend raises by explicit probe.
#[derive(Clone)]
pub struct SqlxStore {
    pool: PgPool,
}

impl SqlxStore {
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the bundled schema. Every statement is idempotent, so this
    /// is safe to run on every startup.
    pub async fn migrate(&self) -> TenancyResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))?;
        Ok(())
    }

    /// Test database connectivity.
    pub async fn test_connection(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Close the connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl TenancyStore for SqlxStore {
    type Tx = Transaction<'static, Postgres>;

    async fn begin(&self) -> TenancyResult<Self::Tx> {
        Ok(self.pool.begin().await?)
    }

    async fn commit(&self, tx: Self::Tx) -> TenancyResult<()> {
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(&self, tx: Self::Tx) -> TenancyResult<()> {
        tx.rollback().await?;
        Ok(())
    }

    // ── Organizations ──

    async fn insert_organization(
        &self,
        tx: &mut Self::Tx,
        name: &str,
    ) -> TenancyResult<Organization> {
        let organization = sqlx::query_as::<_, Organization>(
            "INSERT INTO organizations (name) VALUES ($1) RETURNING *",
        )
        .bind(name)
        .fetch_one(&mut **tx)
        .await?;

        Ok(organization)
    }

    async fn find_organization(
        &self,
        tx: &mut Self::Tx,
        id: i64,
    ) -> TenancyResult<Option<Organization>> {
        let organization =
            sqlx::query_as::<_, Organization>("SELECT * FROM organizations WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut **tx)
                .await?;

        Ok(organization)
    }

    // ── Users ──

    async fn insert_user(&self, tx: &mut Self::Tx, user: &CreateUser) -> TenancyResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, active_organization_id, global_role)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.active_organization_id)
        .bind(user.global_role.as_str())
        .fetch_one(&mut **tx)
        .await?;

        Ok(user)
    }

    async fn find_user(&self, tx: &mut Self::Tx, id: i64) -> TenancyResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;

        Ok(user)
    }

    async fn find_user_by_email(
        &self,
        tx: &mut Self::Tx,
        email: &str,
    ) -> TenancyResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&mut **tx)
            .await?;

        Ok(user)
    }

    async fn set_active_organization(
        &self,
        tx: &mut Self::Tx,
        user_id: i64,
        organization_id: i64,
    ) -> TenancyResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET active_organization_id = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(organization_id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(user)
    }

    // ── Memberships ──

    async fn insert_membership(
        &self,
        tx: &mut Self::Tx,
        organization_id: i64,
        user_id: i64,
    ) -> TenancyResult<Membership> {
        let membership = sqlx::query_as::<_, Membership>(
            r#"
            INSERT INTO memberships (organization_id, user_id)
            VALUES ($1, $2)
            RETURNING *
            "#,
        )
        .bind(organization_id)
        .bind(user_id)
        .fetch_one(&mut **tx)
        .await?;

        Ok(membership)
    }

    async fn insert_pending_membership(
        &self,
        tx: &mut Self::Tx,
        organization_id: i64,
        invited_email: &str,
        invited_name: Option<&str>,
    ) -> TenancyResult<Membership> {
        let membership = sqlx::query_as::<_, Membership>(
            r#"
            INSERT INTO memberships (organization_id, invited_email, invited_name)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(organization_id)
        .bind(invited_email)
        .bind(invited_name)
        .fetch_one(&mut **tx)
        .await?;

        Ok(membership)
    }

    async fn find_membership(
        &self,
        tx: &mut Self::Tx,
        id: i64,
    ) -> TenancyResult<Option<Membership>> {
        let membership = sqlx::query_as::<_, Membership>("SELECT * FROM memberships WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;

        Ok(membership)
    }

    async fn find_membership_by_user(
        &self,
        tx: &mut Self::Tx,
        user_id: i64,
        organization_id: i64,
    ) -> TenancyResult<Option<Membership>> {
        let membership = sqlx::query_as::<_, Membership>(
            "SELECT * FROM memberships WHERE user_id = $1 AND organization_id = $2",
        )
        .bind(user_id)
        .bind(organization_id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(membership)
    }

    async fn find_pending_membership(
        &self,
        tx: &mut Self::Tx,
        id: i64,
    ) -> TenancyResult<Option<Membership>> {
        let membership = sqlx::query_as::<_, Membership>(
            "SELECT * FROM memberships WHERE id = $1 AND user_id IS NULL",
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(membership)
    }

    async fn find_pending_membership_by_email(
        &self,
        tx: &mut Self::Tx,
        organization_id: i64,
        invited_email: &str,
    ) -> TenancyResult<Option<Membership>> {
        let membership = sqlx::query_as::<_, Membership>(
            "SELECT * FROM memberships WHERE organization_id = $1 AND invited_email = $2",
        )
        .bind(organization_id)
        .bind(invited_email)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(membership)
    }

    async fn list_pending_memberships_by_email(
        &self,
        tx: &mut Self::Tx,
        invited_email: &str,
    ) -> TenancyResult<Vec<Membership>> {
        let memberships = sqlx::query_as::<_, Membership>(
            r#"
            SELECT * FROM memberships
            WHERE invited_email = $1 AND user_id IS NULL
            ORDER BY id
            "#,
        )
        .bind(invited_email)
        .fetch_all(&mut **tx)
        .await?;

        Ok(memberships)
    }

    async fn activate_membership(
        &self,
        tx: &mut Self::Tx,
        id: i64,
        user_id: i64,
    ) -> TenancyResult<Option<Membership>> {
        let membership = sqlx::query_as::<_, Membership>(
            r#"
            UPDATE memberships
            SET user_id = $2, invited_name = NULL, invited_email = NULL, updated_at = NOW()
            WHERE id = $1 AND user_id IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(membership)
    }

    async fn delete_membership(&self, tx: &mut Self::Tx, id: i64) -> TenancyResult<u64> {
        let result = sqlx::query("DELETE FROM memberships WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?;

        Ok(result.rows_affected())
    }

    // ── Roles ──

    async fn insert_role(
        &self,
        tx: &mut Self::Tx,
        name: &str,
        description: &str,
    ) -> TenancyResult<Role> {
        let role = sqlx::query_as::<_, Role>(
            "INSERT INTO roles (name, description) VALUES ($1, $2) RETURNING *",
        )
        .bind(name)
        .bind(description)
        .fetch_one(&mut **tx)
        .await?;

        Ok(role)
    }

    async fn find_role_by_name(
        &self,
        tx: &mut Self::Tx,
        name: &str,
    ) -> TenancyResult<Option<Role>> {
        let role = sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE name = $1")
            .bind(name)
            .fetch_optional(&mut **tx)
            .await?;

        Ok(role)
    }

    async fn delete_role(&self, tx: &mut Self::Tx, id: i64) -> TenancyResult<u64> {
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?;

        Ok(result.rows_affected())
    }

    // ── Permissions ──

    async fn insert_permission(
        &self,
        tx: &mut Self::Tx,
        permission: &NewPermission,
        description: &str,
    ) -> TenancyResult<Permission> {
        let permission = sqlx::query_as::<_, Permission>(
            r#"
            INSERT INTO permissions (action, entity, access, description)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(permission.action.as_str())
        .bind(&permission.entity)
        .bind(permission.access.as_str())
        .bind(description)
        .fetch_one(&mut **tx)
        .await?;

        Ok(permission)
    }

    async fn find_permission(
        &self,
        tx: &mut Self::Tx,
        id: i64,
    ) -> TenancyResult<Option<Permission>> {
        let permission = sqlx::query_as::<_, Permission>("SELECT * FROM permissions WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;

        Ok(permission)
    }

    async fn delete_permission(&self, tx: &mut Self::Tx, id: i64) -> TenancyResult<u64> {
        let result = sqlx::query("DELETE FROM permissions WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?;

        Ok(result.rows_affected())
    }

    async fn permissions_for_role(
        &self,
        tx: &mut Self::Tx,
        role_id: i64,
    ) -> TenancyResult<Vec<Permission>> {
        let permissions = sqlx::query_as::<_, Permission>(
            r#"
            SELECT p.*
            FROM permissions p
            INNER JOIN role_permissions rp ON rp.permission_id = p.id
            WHERE rp.role_id = $1
            ORDER BY p.id
            "#,
        )
        .bind(role_id)
        .fetch_all(&mut **tx)
        .await?;

        Ok(permissions)
    }

    // ── Role ↔ permission join ──

    async fn insert_role_permission(
        &self,
        tx: &mut Self::Tx,
        role_id: i64,
        permission_id: i64,
    ) -> TenancyResult<()> {
        sqlx::query("INSERT INTO role_permissions (role_id, permission_id) VALUES ($1, $2)")
            .bind(role_id)
            .bind(permission_id)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    async fn delete_role_permission(
        &self,
        tx: &mut Self::Tx,
        role_id: i64,
        permission_id: i64,
    ) -> TenancyResult<u64> {
        let result =
            sqlx::query("DELETE FROM role_permissions WHERE role_id = $1 AND permission_id = $2")
                .bind(role_id)
                .bind(permission_id)
                .execute(&mut **tx)
                .await?;

        Ok(result.rows_affected())
    }

    // ── Membership ↔ role join ──

    async fn insert_membership_role(
        &self,
        tx: &mut Self::Tx,
        membership_id: i64,
        role_id: i64,
    ) -> TenancyResult<()> {
        sqlx::query("INSERT INTO membership_roles (membership_id, role_id) VALUES ($1, $2)")
            .bind(membership_id)
            .bind(role_id)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    async fn delete_membership_role(
        &self,
        tx: &mut Self::Tx,
        membership_id: i64,
        role_id: i64,
    ) -> TenancyResult<u64> {
        let result =
            sqlx::query("DELETE FROM membership_roles WHERE membership_id = $1 AND role_id = $2")
                .bind(membership_id)
                .bind(role_id)
                .execute(&mut **tx)
                .await?;

        Ok(result.rows_affected())
    }

    async fn delete_membership_roles(
        &self,
        tx: &mut Self::Tx,
        membership_id: i64,
    ) -> TenancyResult<u64> {
        let result = sqlx::query("DELETE FROM membership_roles WHERE membership_id = $1")
            .bind(membership_id)
            .execute(&mut **tx)
            .await?;

        Ok(result.rows_affected())
    }

    async fn roles_for_membership(
        &self,
        tx: &mut Self::Tx,
        membership_id: i64,
    ) -> TenancyResult<Vec<Role>> {
        let roles = sqlx::query_as::<_, Role>(
            r#"
            SELECT r.*
            FROM roles r
            INNER JOIN membership_roles mr ON mr.role_id = r.id
            WHERE mr.membership_id = $1
            ORDER BY r.id
            "#,
        )
        .bind(membership_id)
        .fetch_all(&mut **tx)
        .await?;

        Ok(roles)
    }

    // ── Authorization queries ──

    async fn permission_grant_exists(
        &self,
        tx: &mut Self::Tx,
        user_id: i64,
        organization_id: i64,
        query: &PermissionQuery,
    ) -> TenancyResult<bool> {
        let access: Option<Vec<String>> = query
            .access
            .as_ref()
            .map(|levels| levels.iter().map(|a| a.as_str().to_string()).collect());

        let granted = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM memberships m
                INNER JOIN membership_roles mr ON mr.membership_id = m.id
                INNER JOIN roles r ON r.id = mr.role_id
                INNER JOIN role_permissions rp ON rp.role_id = r.id
                INNER JOIN permissions p ON p.id = rp.permission_id
                WHERE m.user_id = $1
                  AND m.organization_id = $2
                  AND p.action = $3
                  AND p.entity = $4
                  AND ($5::text[] IS NULL OR p.access = ANY($5))
            )
            "#,
        )
        .bind(user_id)
        .bind(organization_id)
        .bind(query.action.as_str())
        .bind(&query.entity)
        .bind(access)
        .fetch_one(&mut **tx)
        .await?;

        Ok(granted)
    }

    async fn role_grant_exists(
        &self,
        tx: &mut Self::Tx,
        user_id: i64,
        organization_id: i64,
        role_name: &str,
    ) -> TenancyResult<bool> {
        let granted = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM memberships m
                INNER JOIN membership_roles mr ON mr.membership_id = m.id
                INNER JOIN roles r ON r.id = mr.role_id
                WHERE m.user_id = $1
                  AND m.organization_id = $2
                  AND r.name = $3
            )
            "#,
        )
        .bind(user_id)
        .bind(organization_id)
        .bind(role_name)
        .fetch_one(&mut **tx)
        .await?;

        Ok(granted)
    }
}
