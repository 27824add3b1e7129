use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{Duration, Utc};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use bazaar_auth::{AuthError, Credential, PrincipalId, Session};

use super::r#trait::{AuthProvider, SessionChange, SessionSubscription};

const CHANGE_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
struct Account {
    credential: Credential,
    // Stored verbatim; this provider is for tests/dev only.
    secret: String,
}

/// In-memory identity provider holding a single client-side session.
///
/// Intended for tests/dev. Failure switches let tests simulate an unreachable
/// provider or a failing remote sign-out.
#[derive(Debug)]
pub struct InMemoryAuthProvider {
    accounts: RwLock<HashMap<String, Account>>,
    current: RwLock<Option<Session>>,
    changes: broadcast::Sender<SessionChange>,
    session_ttl: Duration,
    unavailable: AtomicBool,
    fail_sign_out: AtomicBool,
}

impl Default for InMemoryAuthProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAuthProvider {
    pub fn new() -> Self {
        Self::with_session_ttl(Duration::hours(1))
    }

    pub fn with_session_ttl(session_ttl: Duration) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            accounts: RwLock::new(HashMap::new()),
            current: RwLock::new(None),
            changes,
            session_ttl,
            unavailable: AtomicBool::new(false),
            fail_sign_out: AtomicBool::new(false),
        }
    }

    /// Make every call fail with [`AuthError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make `sign_out` fail remotely (the provider keeps its session).
    pub fn fail_sign_out(&self, fail: bool) {
        self.fail_sign_out.store(fail, Ordering::SeqCst);
    }

    /// Extend the current session and publish `TokenRefreshed`.
    pub fn refresh_session(&self) -> Result<Session, AuthError> {
        self.ensure_available()?;
        let mut current = self.current.write().map_err(|_| poisoned())?;
        let Some(existing) = current.as_ref() else {
            return Err(AuthError::InvalidCredentials);
        };
        let refreshed = self.issue(existing.principal_id, existing.email.clone());
        *current = Some(refreshed.clone());
        drop(current);

        self.publish(SessionChange::TokenRefreshed(refreshed.clone()));
        Ok(refreshed)
    }

    /// Push the current session's expiry into the past without notifying
    /// subscribers, as a stale client-side session would look.
    pub fn expire_current_session(&self) {
        if let Ok(mut current) = self.current.write() {
            if let Some(session) = current.as_mut() {
                session.issued_at = Utc::now() - self.session_ttl - Duration::seconds(2);
                session.expires_at = Utc::now() - Duration::seconds(1);
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.changes.receiver_count()
    }

    fn ensure_available(&self) -> Result<(), AuthError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AuthError::Unavailable("provider offline".to_string()));
        }
        Ok(())
    }

    fn issue(&self, principal_id: PrincipalId, email: String) -> Session {
        let now = Utc::now();
        Session {
            access_token: Uuid::now_v7().simple().to_string(),
            principal_id,
            email,
            issued_at: now,
            expires_at: now + self.session_ttl,
        }
    }

    fn publish(&self, change: SessionChange) {
        debug!(change = change.kind(), "publishing session change");
        // No subscribers is fine.
        let _ = self.changes.send(change);
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn poisoned() -> AuthError {
    AuthError::Provider("lock poisoned".to_string())
}

#[async_trait::async_trait]
impl AuthProvider for InMemoryAuthProvider {
    async fn get_current_session(&self) -> Result<Option<Session>, AuthError> {
        self.ensure_available()?;
        let current = self.current.read().map_err(|_| poisoned())?;
        Ok(current.clone())
    }

    async fn sign_in(&self, email: &str, secret: &str) -> Result<Session, AuthError> {
        self.ensure_available()?;
        let email = normalize_email(email);

        let principal_id = {
            let accounts = self.accounts.read().map_err(|_| poisoned())?;
            match accounts.get(&email) {
                Some(account) if account.secret == secret => account.credential.id,
                _ => return Err(AuthError::InvalidCredentials),
            }
        };

        let session = self.issue(principal_id, email);
        *self.current.write().map_err(|_| poisoned())? = Some(session.clone());

        self.publish(SessionChange::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, email: &str, secret: &str) -> Result<Credential, AuthError> {
        self.ensure_available()?;
        let email = normalize_email(email);
        if email.is_empty() || !email.contains('@') {
            return Err(AuthError::InvalidInput("invalid email format".to_string()));
        }
        if secret.is_empty() {
            return Err(AuthError::InvalidInput("password cannot be empty".to_string()));
        }

        let mut accounts = self.accounts.write().map_err(|_| poisoned())?;
        if accounts.contains_key(&email) {
            return Err(AuthError::AlreadyRegistered);
        }

        let credential = Credential {
            id: PrincipalId::new(),
            email: email.clone(),
            created_at: Utc::now(),
        };
        accounts.insert(
            email,
            Account {
                credential: credential.clone(),
                secret: secret.to_string(),
            },
        );
        Ok(credential)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.ensure_available()?;
        if self.fail_sign_out.load(Ordering::SeqCst) {
            return Err(AuthError::Provider("sign-out rejected".to_string()));
        }

        let had_session = self.current.write().map_err(|_| poisoned())?.take().is_some();
        if had_session {
            self.publish(SessionChange::SignedOut);
        }
        Ok(())
    }

    fn on_session_change(&self) -> SessionSubscription {
        SessionSubscription::new(self.changes.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_auth::validate_session;

    fn is_live(session: &Session) -> bool {
        validate_session(session, Utc::now()).is_ok()
    }

    #[tokio::test]
    async fn duplicate_signup_is_already_registered() {
        let provider = InMemoryAuthProvider::new();
        provider.sign_up("a@x.com", "s").await.unwrap();

        let err = provider.sign_up(" A@X.com ", "other").await.unwrap_err();
        assert!(err.is_already_registered());
    }

    #[tokio::test]
    async fn sign_in_publishes_signed_in() {
        let provider = InMemoryAuthProvider::new();
        let credential = provider.sign_up("a@x.com", "s").await.unwrap();
        let mut sub = provider.on_session_change();

        let session = provider.sign_in("a@x.com", "s").await.unwrap();
        assert_eq!(session.principal_id, credential.id);
        assert!(is_live(&session));

        let change = sub.recv().await.unwrap();
        assert_eq!(change, SessionChange::SignedIn(session.clone()));
        assert_eq!(provider.get_current_session().await.unwrap(), Some(session));
    }

    #[tokio::test]
    async fn wrong_secret_is_rejected() {
        let provider = InMemoryAuthProvider::new();
        provider.sign_up("a@x.com", "s").await.unwrap();
        let err = provider.sign_in("a@x.com", "nope").await.unwrap_err();
        assert_eq!(err, AuthError::InvalidCredentials);
        assert_eq!(provider.get_current_session().await.unwrap(), None);
    }

    #[tokio::test]
    async fn failing_sign_out_keeps_provider_session() {
        let provider = InMemoryAuthProvider::new();
        provider.sign_up("a@x.com", "s").await.unwrap();
        provider.sign_in("a@x.com", "s").await.unwrap();
        provider.fail_sign_out(true);

        assert!(provider.sign_out().await.is_err());
        assert!(provider.get_current_session().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn refresh_publishes_token_refreshed() {
        let provider = InMemoryAuthProvider::new();
        provider.sign_up("a@x.com", "s").await.unwrap();
        let first = provider.sign_in("a@x.com", "s").await.unwrap();
        let mut sub = provider.on_session_change();

        let refreshed = provider.refresh_session().unwrap();
        assert_eq!(refreshed.principal_id, first.principal_id);
        assert_ne!(refreshed.access_token, first.access_token);
        assert!(matches!(sub.recv().await.unwrap(), SessionChange::TokenRefreshed(_)));
    }

    #[tokio::test]
    async fn expired_session_is_not_live() {
        let provider = InMemoryAuthProvider::new();
        provider.sign_up("a@x.com", "s").await.unwrap();
        provider.sign_in("a@x.com", "s").await.unwrap();
        provider.expire_current_session();

        let session = provider.get_current_session().await.unwrap().unwrap();
        assert!(!is_live(&session));
    }

    #[tokio::test]
    async fn offline_provider_reports_unavailable() {
        let provider = InMemoryAuthProvider::new();
        provider.set_unavailable(true);
        let err = provider.get_current_session().await.unwrap_err();
        assert!(err.is_transient());
    }
}
