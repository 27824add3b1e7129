//! Role → landing route resolution.
//!
//! The access gate and the post-login redirect both read from here so they
//! always agree on where a role belongs.

use crate::Role;

/// Public landing page (also the fallback for unknown roles).
pub const PUBLIC_LANDING_ROUTE: &str = "/";

/// Where unauthenticated visitors of protected pages are sent.
pub const LOGIN_ROUTE: &str = "/login";

pub const SUPPLIER_ROUTE: &str = "/supplier/dashboard";
pub const CLIENT_ROUTE: &str = "/client/dashboard";
pub const RESELLER_ROUTE: &str = "/reseller/dashboard";
pub const ADMIN_ROUTE: &str = "/admin";

/// Default landing route for a role; `"/"` when no role is known.
pub fn route_for(role: Option<Role>) -> &'static str {
    match role {
        Some(Role::Supplier) => SUPPLIER_ROUTE,
        Some(Role::Client) => CLIENT_ROUTE,
        Some(Role::Reseller) => RESELLER_ROUTE,
        Some(Role::Admin | Role::Moderator | Role::Analyst | Role::Support) => ADMIN_ROUTE,
        None => PUBLIC_LANDING_ROUTE,
    }
}

/// Same as [`route_for`] for a raw role name (e.g. read from an untyped source).
pub fn route_for_name(name: &str) -> &'static str {
    route_for(name.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn staff_roles_share_the_admin_route() {
        for role in [Role::Admin, Role::Moderator, Role::Analyst, Role::Support] {
            assert_eq!(route_for(Some(role)), ADMIN_ROUTE);
        }
    }

    #[test]
    fn every_role_has_a_non_empty_route() {
        for role in Role::ALL {
            let route = route_for(Some(role));
            assert!(route.starts_with('/'));
            assert_ne!(route, PUBLIC_LANDING_ROUTE);
        }
    }

    #[test]
    fn absent_role_falls_back_to_landing() {
        assert_eq!(route_for(None), "/");
        assert_eq!(route_for_name(""), "/");
        assert_eq!(route_for_name("superuser"), "/");
    }

    #[test]
    fn named_lookup_matches_typed_lookup() {
        assert_eq!(route_for_name("supplier"), SUPPLIER_ROUTE);
        assert_eq!(route_for_name("Support"), ADMIN_ROUTE);
    }

    proptest! {
        #[test]
        fn named_lookup_is_total(name in ".{0,24}") {
            let route = route_for_name(&name);
            prop_assert!(!route.is_empty());
            match name.parse::<Role>() {
                Ok(role) => prop_assert_eq!(route, route_for(Some(role))),
                Err(_) => prop_assert_eq!(route, PUBLIC_LANDING_ROUTE),
            }
        }
    }
}
