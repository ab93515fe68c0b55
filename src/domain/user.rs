use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    CenterAdmin,
    Teacher,
    Assistant,
    Parent,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::CenterAdmin => "center_admin",
            Role::Teacher => "teacher",
            Role::Assistant => "assistant",
            Role::Parent => "parent",
            Role::Student => "student",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Roles allowed to manage any group of their center.
    pub fn manages_groups(&self) -> bool {
        matches!(self, Role::Admin | Role::CenterAdmin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user that notifications can be addressed to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Recipient {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

/// The authenticated caller of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub role: Option<Role>,
}

impl Identity {
    pub fn new(user_id: Uuid, role: Option<Role>) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_some_and(|role| role.is_admin())
    }

    pub fn manages_groups(&self) -> bool {
        self.role.is_some_and(|role| role.manages_groups())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_display_matches_claim_value() {
        for role in [
            Role::Admin,
            Role::CenterAdmin,
            Role::Teacher,
            Role::Assistant,
            Role::Parent,
            Role::Student,
        ] {
            let claim: Role = serde_json::from_value(serde_json::json!(role.to_string())).unwrap();
            assert_eq!(claim, role);
        }
    }

    #[test]
    fn test_unknown_role_claim_is_rejected() {
        assert!(serde_json::from_value::<Role>(serde_json::json!("janitor")).is_err());
    }

    #[test]
    fn test_only_admins_and_center_admins_manage_groups() {
        assert!(Role::Admin.manages_groups());
        assert!(Role::CenterAdmin.manages_groups());
        assert!(!Role::Teacher.manages_groups());
        assert!(!Role::Parent.manages_groups());
    }
}
