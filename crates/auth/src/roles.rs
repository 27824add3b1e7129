use core::str::FromStr;

use serde::{Deserialize, Serialize};

use bazaar_core::DomainError;

/// Marketplace role carried by every user record.
///
/// The set is closed: adding a role is a compile-time-visible change at every
/// exhaustive `match`. A user's role never changes once the record exists.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Supplier,
    Client,
    Reseller,
    Admin,
    Moderator,
    Analyst,
    Support,
}

impl Role {
    pub const ALL: [Role; 7] = [
        Role::Supplier,
        Role::Client,
        Role::Reseller,
        Role::Admin,
        Role::Moderator,
        Role::Analyst,
        Role::Support,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Supplier => "supplier",
            Role::Client => "client",
            Role::Reseller => "reseller",
            Role::Admin => "admin",
            Role::Moderator => "moderator",
            Role::Analyst => "analyst",
            Role::Support => "support",
        }
    }

    /// Whether a freshly created account of this role needs manual approval.
    pub fn requires_verification(&self) -> bool {
        matches!(self, Role::Supplier)
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Role::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(needle))
            .ok_or_else(|| DomainError::validation(format!("unknown role '{needle}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive_and_trimmed() {
        assert_eq!(" Supplier ".parse::<Role>().unwrap(), Role::Supplier);
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
    }

    #[test]
    fn parse_rejects_unknown_role() {
        let err = "owner".parse::<Role>().unwrap_err();
        assert!(err.to_string().contains("owner"));
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&Role::Reseller).unwrap();
        assert_eq!(json, "\"reseller\"");
        let back: Role = serde_json::from_str("\"moderator\"").unwrap();
        assert_eq!(back, Role::Moderator);
    }

    #[test]
    fn only_suppliers_start_unverified() {
        for role in Role::ALL {
            assert_eq!(role.requires_verification(), role == Role::Supplier);
        }
    }
}
