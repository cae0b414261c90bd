use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Access level carried in every issued token.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular citizen account, may only look up by licence number
    Public,
    Police,
    /// Department of Motor Traffic administrator
    Dmt,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Public => "public",
            Role::Police => "police",
            Role::Dmt => "dmt",
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

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "public" => Ok(Role::Public),
            "police" => Ok(Role::Police),
            "dmt" => Ok(Role::Dmt),
            _ => Err(format!("unknown role '{s}'")),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip_through_str() {
        for role in [Role::Public, Role::Police, Role::Dmt] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert_eq!(" DMT ".parse::<Role>().unwrap(), Role::Dmt);
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Police).unwrap(), "\"police\"");
        let role: Role = serde_json::from_str("\"dmt\"").unwrap();
        assert_eq!(role, Role::Dmt);
    }
}
