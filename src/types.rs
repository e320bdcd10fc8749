use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// An organization (tenant). Names are not unique by design.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-postgres", derive(sqlx::FromRow))]
pub struct Organization {
    pub id: i64,
    pub name: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

/// A user account. `active_organization_id` always references an
/// organization the user holds a membership in; the invariant is
/// enforced at the point of switching, not by the schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-postgres", derive(sqlx::FromRow))]
pub struct User {
    pub id: i64,
    pub name: Option<String>,
    pub email: String,
    #[serde(rename = "activeOrganizationId")]
    pub active_organization_id: i64,
    #[serde(rename = "globalRole")]
    #[cfg_attr(feature = "sqlx-postgres", sqlx(try_from = "String"))]
    pub global_role: GlobalRole,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

/// A user's (or invitee's) relationship to one organization, and the
/// anchor for role grants.
///
/// A row is either active (`user_id` set, invite fields null) or a
/// pending invitation (`user_id` null, `invited_email` set). Acceptance
/// moves a row from pending to active exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-postgres", derive(sqlx::FromRow))]
pub struct Membership {
    pub id: i64,
    #[serde(rename = "organizationId")]
    pub organization_id: i64,
    #[serde(rename = "userId")]
    pub user_id: Option<i64>,
    #[serde(rename = "invitedName")]
    pub invited_name: Option<String>,
    #[serde(rename = "invitedEmail")]
    pub invited_email: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Membership {
    /// Whether this row is a pending invitation awaiting acceptance.
    pub fn is_pending(&self) -> bool {
        self.user_id.is_none()
    }
}

/// A named bundle of permissions. Definitions are global; grants are
/// per-membership and therefore organization-scoped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-postgres", derive(sqlx::FromRow))]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub description: String,
}

/// One allowed operation: an `(action, entity, access)` triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-postgres", derive(sqlx::FromRow))]
pub struct Permission {
    pub id: i64,
    #[cfg_attr(feature = "sqlx-postgres", sqlx(try_from = "String"))]
    pub action: PermissionAction,
    pub entity: String,
    #[cfg_attr(feature = "sqlx-postgres", sqlx(try_from = "String"))]
    pub access: PermissionAccess,
    pub description: String,
}

/// A permission row joined with the role that holds it, as returned by
/// role-centric queries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RolePermission {
    #[serde(rename = "roleName")]
    pub role_name: String,
    #[serde(rename = "permissionId")]
    pub permission_id: i64,
    pub action: PermissionAction,
    pub entity: String,
    pub access: PermissionAccess,
    pub description: String,
}

/// A pending invitation enriched with its organization and role names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingInvitation {
    pub id: i64,
    pub organization: OrganizationRef,
    pub roles: Vec<RoleRef>,
    #[serde(rename = "invitedAt")]
    pub invited_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrganizationRef {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleRef {
    pub id: i64,
    pub name: String,
}

// ─── Enumerations ───────────────────────────────────────────────────────

/// A stored text value did not match any variant of the target enum.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ParseEnumError(String);

/// Platform-wide role of a user account, independent of any tenancy
/// scope. Account creation always mints `Customer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GlobalRole {
    Superadmin,
    Customer,
}

impl GlobalRole {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SUPERADMIN" => Some(Self::Superadmin),
            "CUSTOMER" => Some(Self::Customer),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Superadmin => "SUPERADMIN",
            Self::Customer => "CUSTOMER",
        }
    }
}

impl std::fmt::Display for GlobalRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for GlobalRole {
    type Error = ParseEnumError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s).ok_or_else(|| ParseEnumError(format!("unknown global role: {s}")))
    }
}

/// Action component of a permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionAction {
    Create,
    Read,
    Update,
    Delete,
}

impl PermissionAction {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "create" => Some(Self::Create),
            "read" => Some(Self::Read),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl std::fmt::Display for PermissionAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for PermissionAction {
    type Error = ParseEnumError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s).ok_or_else(|| ParseEnumError(format!("unknown permission action: {s}")))
    }
}

/// Access component of a permission: the holder's own rows, or any row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionAccess {
    Own,
    Any,
}

impl PermissionAccess {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "own" => Some(Self::Own),
            "any" => Some(Self::Any),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Own => "own",
            Self::Any => "any",
        }
    }
}

impl std::fmt::Display for PermissionAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for PermissionAccess {
    type Error = ParseEnumError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s).ok_or_else(|| ParseEnumError(format!("unknown permission access: {s}")))
    }
}

// ─── Input types ────────────────────────────────────────────────────────

/// Caller-facing profile data for a new user. The global role is not
/// part of the input on purpose: provisioning always assigns
/// [`GlobalRole::Customer`].
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewUser {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    pub name: Option<String>,
}

/// Input for [`crate::user::create_user_with_organization`].
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateUserWithOrganization {
    pub user: NewUser,
    #[serde(rename = "organizationName")]
    #[validate(length(min = 1, message = "must not be empty"))]
    pub organization_name: String,
}

/// Input for [`crate::roles::create_role`].
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewRole {
    #[validate(length(min = 1, message = "must not be empty"))]
    pub name: String,
    pub description: Option<String>,
}

/// Input for [`crate::permissions::create_permission`].
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewPermission {
    #[validate(length(min = 1, message = "must not be empty"))]
    pub entity: String,
    pub action: PermissionAction,
    pub access: PermissionAccess,
}

/// Input for [`crate::invite::invite_user_to_organization`].
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct InviteUser {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[serde(rename = "organizationId")]
    pub organization_id: i64,
    /// Role attached to the pending membership. Defaults to the
    /// configured invited role when absent.
    #[serde(rename = "roleName")]
    pub role_name: Option<String>,
    #[serde(rename = "invitedName")]
    pub invited_name: Option<String>,
}

/// Datastore-level insert shape for a user row. Built internally by
/// provisioning; not part of the public input surface.
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub name: Option<String>,
    pub email: String,
    pub active_organization_id: i64,
    pub global_role: GlobalRole,
}

/// Everything created by one provisioning call.
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionedAccount {
    pub user: User,
    pub organization: Organization,
    pub membership: Membership,
}
