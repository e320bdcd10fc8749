//! The `"action:entity[:access[,access]]"` permission string format.
//!
//! This string is the sole serialization format the core exposes for
//! permission checks. [`PermissionQuery::parse`] turns it into a typed
//! query; malformed input is a [`TenancyError::Validation`], never a
//! silent mismatch.

use serde::Serialize;

use crate::error::{TenancyError, TenancyResult};
use crate::types::{PermissionAccess, PermissionAction};

/// A parsed permission check: `action` and `entity` are always present;
/// `access` is an optional OR-set. With no access component the check
/// matches a grant at any access level; with one, any listed level
/// suffices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionQuery {
    pub action: PermissionAction,
    pub entity: String,
    pub access: Option<Vec<PermissionAccess>>,
}

impl PermissionQuery {
    pub fn parse(permission: &str) -> TenancyResult<Self> {
        let segments: Vec<&str> = permission.split(':').collect();
        let (action, entity, access) = match segments.as_slice() {
            [action, entity] => (*action, *entity, None),
            [action, entity, access] => (*action, *entity, Some(*access)),
            _ => {
                return Err(TenancyError::validation(format!(
                    "permission string \"{permission}\" must have the form action:entity or action:entity:access"
                )));
            }
        };

        let action = PermissionAction::parse(action).ok_or_else(|| {
            TenancyError::validation(format!(
                "permission string \"{permission}\" has unknown action \"{action}\""
            ))
        })?;

        if entity.is_empty() {
            return Err(TenancyError::validation(format!(
                "permission string \"{permission}\" has an empty entity"
            )));
        }

        let access = match access {
            None => None,
            Some(list) => {
                let mut levels = Vec::new();
                for level in list.split(',') {
                    let level = PermissionAccess::parse(level).ok_or_else(|| {
                        TenancyError::validation(format!(
                            "permission string \"{permission}\" has unknown access \"{level}\""
                        ))
                    })?;
                    if !levels.contains(&level) {
                        levels.push(level);
                    }
                }
                Some(levels)
            }
        };

        Ok(Self {
            action,
            entity: entity.to_string(),
            access,
        })
    }
}

impl std::str::FromStr for PermissionQuery {
    type Err = TenancyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for PermissionQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.action, self.entity)?;
        if let Some(access) = &self.access {
            let levels: Vec<&str> = access.iter().map(|a| a.as_str()).collect();
            write!(f, ":{}", levels.join(","))?;
        }
        Ok(())
    }
}
