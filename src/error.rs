use thiserror::Error;

/// The kind of entity a lookup failed for.
///
/// Carried alongside the failing key so callers can render their own
/// messages without parsing ours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Organization,
    User,
    Membership,
    Invitation,
    Role,
    Permission,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Organization => "organization",
            Self::User => "user",
            Self::Membership => "membership",
            Self::Invitation => "invitation",
            Self::Role => "role",
            Self::Permission => "permission",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tenancy core error types.
#[derive(Error, Debug)]
pub enum TenancyError {
    /// Malformed input, rejected before any datastore write.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A uniqueness constraint was violated. The enclosing transaction
    /// has been rolled back in full.
    #[error("{0}")]
    DuplicateKey(String),

    /// A referenced entity does not exist.
    #[error("{}", not_found_message(*.entity, .key))]
    NotFound { entity: EntityKind, key: String },

    /// An organization switch was requested for a user without a
    /// membership in the target organization.
    #[error("User is not a member of the specified organization")]
    NotAMember,

    /// A well-known role is missing from the roles table. This is a
    /// deployment/seeding defect, not a user error.
    #[error("{0} role not found. Please ensure the database is properly seeded.")]
    RoleNotSeeded(String),

    /// An active-organization-scoped check could not resolve the user's
    /// active organization.
    #[error("User {user_id} has no active organization")]
    NoActiveOrganization { user_id: i64 },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

fn not_found_message(entity: EntityKind, key: &str) -> String {
    match entity {
        EntityKind::Organization => "Organization not found".to_string(),
        EntityKind::User => "User not found".to_string(),
        EntityKind::Invitation => "Invitation not found or already accepted".to_string(),
        EntityKind::Membership => format!("Membership with id {key} not found"),
        EntityKind::Role => format!("Role \"{key}\" not found"),
        EntityKind::Permission => format!("Permission with id {key} not found"),
    }
}

impl TenancyError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn duplicate_key(message: impl Into<String>) -> Self {
        Self::DuplicateKey(message.into())
    }

    pub fn not_found(entity: EntityKind, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// True for the variants a permission/role check treats as "no".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type TenancyResult<T> = Result<T, TenancyError>;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Transaction error: {0}")]
    Transaction(String),
}

#[cfg(feature = "sqlx-postgres")]
impl From<sqlx::Error> for TenancyError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() {
                    TenancyError::DuplicateKey(db_err.to_string())
                } else if db_err.is_foreign_key_violation() {
                    TenancyError::Database(DatabaseError::Constraint(db_err.to_string()))
                } else {
                    TenancyError::Database(DatabaseError::Query(db_err.to_string()))
                }
            }
            sqlx::Error::PoolClosed => {
                TenancyError::Database(DatabaseError::Connection("Pool closed".to_string()))
            }
            sqlx::Error::PoolTimedOut => {
                TenancyError::Database(DatabaseError::Connection("Pool timed out".to_string()))
            }
            _ => TenancyError::Database(DatabaseError::Query(err.to_string())),
        }
    }
}

/// Convert `validator::ValidationErrors` into a [`TenancyError::Validation`]
/// naming each violated field.
pub fn validation_failed(errors: &validator::ValidationErrors) -> TenancyError {
    let mut parts: Vec<String> = errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let messages: Vec<String> = errs
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("invalid value for {field}"))
                })
                .collect();
            format!("{}: {}", field, messages.join(", "))
        })
        .collect();
    parts.sort();
    TenancyError::Validation(parts.join("; "))
}
