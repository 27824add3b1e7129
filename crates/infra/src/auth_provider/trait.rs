use std::sync::Arc;

use thiserror::Error;
use tokio::sync::broadcast;

use bazaar_auth::{AuthError, Credential, Session};

/// Session transition pushed by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionChange {
    SignedIn(Session),
    SignedOut,
    TokenRefreshed(Session),
}

impl SessionChange {
    /// The live session after this transition, if any.
    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionChange::SignedIn(s) | SessionChange::TokenRefreshed(s) => Some(s),
            SessionChange::SignedOut => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SessionChange::SignedIn(_) => "signed_in",
            SessionChange::SignedOut => "signed_out",
            SessionChange::TokenRefreshed(_) => "token_refreshed",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The subscriber fell behind and `0` notifications were dropped.
    #[error("subscription lagged; {0} notifications dropped")]
    Lagged(u64),

    #[error("subscription closed")]
    Closed,
}

/// A subscription to provider session transitions.
///
/// Each subscription receives every transition published after it was
/// created (broadcast semantics). Dropping it unsubscribes.
#[derive(Debug)]
pub struct SessionSubscription {
    receiver: broadcast::Receiver<SessionChange>,
}

impl SessionSubscription {
    pub fn new(receiver: broadcast::Receiver<SessionChange>) -> Self {
        Self { receiver }
    }

    /// Wait for the next transition.
    pub async fn recv(&mut self) -> Result<SessionChange, SubscriptionError> {
        self.receiver.recv().await.map_err(|err| match err {
            broadcast::error::RecvError::Lagged(n) => SubscriptionError::Lagged(n),
            broadcast::error::RecvError::Closed => SubscriptionError::Closed,
        })
    }
}

/// External authentication provider (credentials + server-side session).
///
/// Implementations must publish a [`SessionChange`] to every live
/// subscription after each successful sign-in, sign-out and token refresh.
#[async_trait::async_trait]
pub trait AuthProvider: Send + Sync {
    /// The session currently held by the provider, if any.
    async fn get_current_session(&self) -> Result<Option<Session>, AuthError>;

    async fn sign_in(&self, email: &str, secret: &str) -> Result<Session, AuthError>;

    /// Create a credential. Must return [`AuthError::AlreadyRegistered`] for a
    /// known email rather than a generic provider error.
    async fn sign_up(&self, email: &str, secret: &str) -> Result<Credential, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    fn on_session_change(&self) -> SessionSubscription;
}

#[async_trait::async_trait]
impl<P> AuthProvider for Arc<P>
where
    P: AuthProvider + ?Sized,
{
    async fn get_current_session(&self) -> Result<Option<Session>, AuthError> {
        (**self).get_current_session().await
    }

    async fn sign_in(&self, email: &str, secret: &str) -> Result<Session, AuthError> {
        (**self).sign_in(email, secret).await
    }

    async fn sign_up(&self, email: &str, secret: &str) -> Result<Credential, AuthError> {
        (**self).sign_up(email, secret).await
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        (**self).sign_out().await
    }

    fn on_session_change(&self) -> SessionSubscription {
        (**self).on_session_change()
    }
}
