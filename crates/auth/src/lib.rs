//! `bazaar-auth`: pure authentication/authorization boundary.
//!
//! This crate is intentionally decoupled from transport and storage: it names
//! roles, resolves landing routes, gates access and validates sessions, but
//! never talks to an identity provider itself.

pub mod authorize;
pub mod error;
pub mod principal;
pub mod roles;
pub mod routes;
pub mod session;

pub use authorize::{authorize, AccessDenied, Principal};
pub use error::AuthError;
pub use principal::PrincipalId;
pub use roles::Role;
pub use routes::{route_for, route_for_name, LOGIN_ROUTE, PUBLIC_LANDING_ROUTE};
pub use session::{validate_session, Credential, Session, SessionValidationError};
