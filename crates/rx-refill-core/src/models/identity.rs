//! Request-scoped caller identity.

use serde::{Deserialize, Serialize};

/// Role issued by the authentication service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Patient,
    Pharmacist,
    Admin,
}

impl Role {
    /// Parse a role name, ignoring case and an optional `ROLE_` prefix.
    pub fn parse(value: &str) -> Option<Self> {
        let upper = value.trim().to_uppercase();
        match upper.strip_prefix("ROLE_").unwrap_or(&upper) {
            "PATIENT" => Some(Role::Patient),
            "PHARMACIST" => Some(Role::Pharmacist),
            "ADMIN" => Some(Role::Admin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "PATIENT",
            Role::Pharmacist => "PHARMACIST",
            Role::Admin => "ADMIN",
        }
    }
}

/// The authenticated user performing an operation.
///
/// Passed explicitly into every state-changing call; nothing in the core
/// reads identity from ambient state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Actor {
    /// User ID from the authentication service
    pub user_id: String,
    /// Role granted to the user
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    pub fn patient(user_id: impl Into<String>) -> Self {
        Self::new(user_id, Role::Patient)
    }

    pub fn pharmacist(user_id: impl Into<String>) -> Self {
        Self::new(user_id, Role::Pharmacist)
    }

    pub fn admin(user_id: impl Into<String>) -> Self {
        Self::new(user_id, Role::Admin)
    }

    /// Pharmacists and admins may act on the dispensing side.
    pub fn is_staff(&self) -> bool {
        matches!(self.role, Role::Pharmacist | Role::Admin)
    }
}
