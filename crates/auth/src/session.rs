use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::PrincipalId;

/// Login identity held by the identity provider.
///
/// The secret never leaves the provider; this core only sees the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub id: PrincipalId,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Provider-held, time-bounded proof of an authenticated credential.
///
/// Referenced by the session manager, never mutated by it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque bearer token.
    pub access_token: String,

    /// Principal the session was issued for.
    pub principal_id: PrincipalId,

    pub email: String,

    /// Issued-at timestamp.
    pub issued_at: DateTime<Utc>,

    /// Expiration timestamp.
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionValidationError {
    #[error("session has expired")]
    Expired,

    #[error("session not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid session time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

/// Deterministically validate a session's time window.
///
/// Note: this checks the window only. Token verification belongs to the
/// identity provider.
pub fn validate_session(session: &Session, now: DateTime<Utc>) -> Result<(), SessionValidationError> {
    if session.expires_at <= session.issued_at {
        return Err(SessionValidationError::InvalidTimeWindow);
    }
    if now < session.issued_at {
        return Err(SessionValidationError::NotYetValid);
    }
    if now >= session.expires_at {
        return Err(SessionValidationError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(issued_at: DateTime<Utc>, ttl: Duration) -> Session {
        Session {
            access_token: "token".to_string(),
            principal_id: PrincipalId::new(),
            email: "a@x.com".to_string(),
            issued_at,
            expires_at: issued_at + ttl,
        }
    }

    #[test]
    fn live_session_is_valid() {
        let now = Utc::now();
        let s = session(now - Duration::minutes(1), Duration::minutes(10));
        assert_eq!(validate_session(&s, now), Ok(()));
    }

    #[test]
    fn expired_session_is_rejected() {
        let now = Utc::now();
        let s = session(now - Duration::minutes(20), Duration::minutes(10));
        assert_eq!(validate_session(&s, now), Err(SessionValidationError::Expired));
    }

    #[test]
    fn future_session_is_rejected() {
        let now = Utc::now();
        let s = session(now + Duration::minutes(5), Duration::minutes(10));
        assert_eq!(validate_session(&s, now), Err(SessionValidationError::NotYetValid));
    }

    #[test]
    fn inverted_window_is_rejected() {
        let now = Utc::now();
        let s = session(now, Duration::zero());
        assert_eq!(
            validate_session(&s, now),
            Err(SessionValidationError::InvalidTimeWindow)
        );
    }
}
