use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{route_for, PrincipalId, Role, LOGIN_ROUTE, PUBLIC_LANDING_ROUTE};

/// The authorization-relevant slice of a signed-in identity.
///
/// Enrichment data (profile, business records) never participates in access
/// decisions; only the user record's role and account flags do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub principal_id: PrincipalId,
    pub role: Role,
    pub is_verified: bool,
    pub is_active: bool,
    pub is_locked: bool,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccessDenied {
    #[error("not signed in")]
    Unauthenticated,

    #[error("account is inactive")]
    Inactive,

    #[error("account is locked")]
    Locked,

    #[error("role '{role}' may not access this page")]
    Forbidden { role: Role },
}

impl AccessDenied {
    /// Where the gate should send the visitor instead.
    pub fn redirect(&self) -> &'static str {
        match self {
            AccessDenied::Unauthenticated => LOGIN_ROUTE,
            AccessDenied::Inactive | AccessDenied::Locked => PUBLIC_LANDING_ROUTE,
            AccessDenied::Forbidden { role } => route_for(Some(*role)),
        }
    }
}

/// Gate a protected page.
///
/// - No IO
/// - No panics
/// - An empty `allowed` list admits any signed-in, usable account
pub fn authorize(principal: Option<&Principal>, allowed: &[Role]) -> Result<(), AccessDenied> {
    let Some(principal) = principal else {
        return Err(AccessDenied::Unauthenticated);
    };

    if principal.is_locked {
        return Err(AccessDenied::Locked);
    }
    if !principal.is_active {
        return Err(AccessDenied::Inactive);
    }

    if allowed.is_empty() || allowed.contains(&principal.role) {
        Ok(())
    } else {
        Err(AccessDenied::Forbidden {
            role: principal.role,
        })
    }
}
