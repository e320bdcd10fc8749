/// Names of the well-known roles the core depends on.
///
/// Provisioning grants `owner_role` to the creator of a new
/// organization, and invitations default to `default_invited_role`.
/// These roles are expected to exist in the roles table (see
/// [`crate::seed::seed_default_roles`]); a missing one surfaces as
/// [`crate::TenancyError::RoleNotSeeded`].
#[derive(Debug, Clone)]
pub struct TenancyConfig {
    /// Role granted to the user a new organization is provisioned for.
    pub owner_role: String,
    /// Seeded administrative role.
    pub admin_role: String,
    /// Role attached to invitations when the caller names none.
    pub default_invited_role: String,
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            owner_role: "OWNER".to_string(),
            admin_role: "ADMIN".to_string(),
            default_invited_role: "MEMBER".to_string(),
        }
    }
}

impl TenancyConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owner_role(mut self, name: impl Into<String>) -> Self {
        self.owner_role = name.into();
        self
    }

    pub fn admin_role(mut self, name: impl Into<String>) -> Self {
        self.admin_role = name.into();
        self
    }

    pub fn default_invited_role(mut self, name: impl Into<String>) -> Self {
        self.default_invited_role = name.into();
        self
    }
}
