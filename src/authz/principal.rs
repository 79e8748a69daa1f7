use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// The three mutually exclusive account roles. A role is fixed when the
/// account is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Role {
    #[serde(rename = "house_owner", alias = "owner")]
    #[sqlx(rename = "house_owner")]
    Owner,
    Contractor,
    Employee,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "house_owner",
            Role::Contractor => "contractor",
            Role::Employee => "employee",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "house_owner" | "owner" => Ok(Role::Owner),
            "contractor" => Ok(Role::Contractor),
            "employee" => Ok(Role::Employee),
            other => Err(format!("unknown role `{other}`")),
        }
    }
}

/// An authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }

    pub fn is(&self, role: Role) -> bool {
        self.role == role
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_role_accepts_both_spellings() {
        assert_eq!("owner".parse::<Role>().unwrap(), Role::Owner);
        assert_eq!("house_owner".parse::<Role>().unwrap(), Role::Owner);
        let parsed: Role = serde_json::from_str("\"owner\"").unwrap();
        assert_eq!(parsed, Role::Owner);
        assert_eq!(serde_json::to_string(&Role::Owner).unwrap(), "\"house_owner\"");
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!("admin".parse::<Role>().is_err());
        assert!(serde_json::from_str::<Role>("\"admin\"").is_err());
    }
}
