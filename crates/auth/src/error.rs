use thiserror::Error;

/// Failure reported by the identity provider.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The email already has a credential; callers should offer login instead
    /// of retrying signup.
    #[error("an account with this email already exists")]
    AlreadyRegistered,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Network or provider outage.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),

    #[error("identity provider error: {0}")]
    Provider(String),
}

impl AuthError {
    pub fn is_already_registered(&self) -> bool {
        matches!(self, AuthError::AlreadyRegistered)
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, AuthError::Unavailable(_))
    }
}
