//! Role hierarchy and the caller identity handed in by the RBAC layer

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{LedgerError, LedgerResult};

/// Membership role inside an organization. Variants are declared from least
/// to most privileged so the derived ordering is the role hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "membre")]
    Member,
    #[serde(rename = "tresorier")]
    Treasurer,
    #[serde(rename = "admin")]
    Admin,
    #[serde(rename = "owner")]
    Owner,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "membre",
            Role::Treasurer => "tresorier",
            Role::Admin => "admin",
            Role::Owner => "owner",
        }
    }

    /// Whether this role grants at least the rights of `minimum`
    pub fn at_least(self, minimum: Role) -> bool {
        self >= minimum
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Role {
    type Error = LedgerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "membre" => Ok(Role::Member),
            "tresorier" => Ok(Role::Treasurer),
            "admin" => Ok(Role::Admin),
            "owner" => Ok(Role::Owner),
            other => Err(LedgerError::validation(
                "role",
                format!("unknown role '{other}'"),
            )),
        }
    }
}

/// Authenticated caller acting on one organization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: Uuid, organization_id: Uuid, role: Role) -> Self {
        Self {
            user_id,
            organization_id,
            role,
        }
    }

    /// Fail with [`LedgerError::Forbidden`] unless the actor holds `minimum`
    pub fn require(&self, minimum: Role) -> LedgerResult<()> {
        if self.role.at_least(minimum) {
            Ok(())
        } else {
            Err(LedgerError::Forbidden {
                required: minimum,
                actual: self.role,
            })
        }
    }
}
