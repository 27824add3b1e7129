//! Error taxonomy of the identity layer.
//!
//! Fatal kinds propagate to callers; [`EnrichmentWarning`]s are logged and
//! collected but never fail the surrounding operation.

use thiserror::Error;

use bazaar_auth::{AuthError, PrincipalId, Role};
use bazaar_core::{DomainError, UserId};
use bazaar_infra::StoreError;

/// Why no identity could be composed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// The core user record is missing. Treated as "not signed in".
    #[error("no user record for principal {0}")]
    NotFound(UserId),

    /// The record store could not be read; `refresh_identity` is the
    /// recovery path.
    #[error("identity temporarily unavailable: {0}")]
    Transient(StoreError),
}

/// A non-fatal step that did not complete.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnrichmentWarning {
    #[error("profile unavailable: {0}")]
    Profile(StoreError),

    #[error("{role} record unavailable: {source}")]
    RoleRecord { role: Role, source: StoreError },

    #[error("automatic sign-in after registration failed: {0}")]
    AutoSignIn(AuthError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// Signup data was rejected before any provider call.
    #[error(transparent)]
    Invalid(#[from] DomainError),

    /// The email already has a credential; redirect to login.
    #[error("an account with this email already exists")]
    AlreadyRegistered,

    #[error(transparent)]
    Auth(AuthError),

    /// The credential exists but its user record could not be written.
    /// Reconciliation is an administrative task.
    #[error("credential {principal_id} has no user record: {source}")]
    OrphanedCredential {
        principal_id: PrincipalId,
        source: StoreError,
    },
}

impl RegistrationError {
    /// Map a provider failure from the credential step.
    pub fn from_auth(err: AuthError) -> Self {
        match err {
            AuthError::AlreadyRegistered => RegistrationError::AlreadyRegistered,
            other => RegistrationError::Auth(other),
        }
    }

    /// Inline text for the signup form.
    pub fn user_message(&self) -> &'static str {
        match self {
            RegistrationError::Invalid(_) => "Please check the highlighted fields and try again.",
            RegistrationError::AlreadyRegistered => {
                "An account with this email already exists. Please sign in instead."
            }
            RegistrationError::Auth(AuthError::Unavailable(_)) => {
                "The sign-up service is unavailable. Please try again shortly."
            }
            RegistrationError::Auth(_) | RegistrationError::OrphanedCredential { .. } => {
                "Registration failed. Please try again or contact support."
            }
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error("session manager already started")]
    AlreadyStarted,

    #[error("session manager not started")]
    NotStarted,

    #[error("session manager has shut down")]
    ShutDown,
}

impl SessionError {
    /// Inline text for the login form.
    pub fn user_message(&self) -> &'static str {
        match self {
            SessionError::Auth(AuthError::InvalidCredentials) => "Invalid email or password.",
            SessionError::Auth(AuthError::Unavailable(_)) => {
                "The sign-in service is unavailable. Please try again shortly."
            }
            SessionError::Registration(err) => err.user_message(),
            _ => "Sign-in failed. Please try again.",
        }
    }
}
