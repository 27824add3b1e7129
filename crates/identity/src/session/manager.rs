//! The session manager: one authoritative session/identity pair per process.
//!
//! ## Transitions
//!
//! Every change (start, provider notification, login, refresh, logout) opens
//! a transition with a fresh sequence number. Its resolution is published only
//! if no newer transition has started since, so a composition that finishes
//! late can never overwrite a newer state.
//!
//! ## Teardown
//!
//! The provider listener and every in-flight composition observe one
//! [`CancellationToken`]. Once cancelled, only `logout` publishes, and only
//! to clear the local pair.
//!
//! ## Local sign-out
//!
//! `logout` suppresses provider sessions until the provider confirms the
//! sign-out, either by returning from `sign_out` or with a `SignedOut`
//! notification. A successful `login` or a registration that signed in lifts
//! the suppression early; a failed one leaves it as it was.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use bazaar_auth::{
    authorize, validate_session, AccessDenied, AuthError, Role, Session, PUBLIC_LANDING_ROUTE,
};
use bazaar_core::UserId;
use bazaar_infra::{
    AuthProvider, IdentityConfig, RecordStore, SessionChange, SessionSubscription,
    SubscriptionError,
};

use super::state::{Resolution, SessionFault, SessionPhase, SessionSnapshot};
use crate::composer::IdentityComposer;
use crate::error::{IdentityError, SessionError};
use crate::records::ExtendedIdentity;
use crate::registration::{RegistrationOrchestrator, RegistrationReport, SignupData};

/// Result of a user-initiated logout. Local state is already cleared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoutOutcome {
    pub redirect_to: &'static str,
    /// Set when the provider-side sign-out failed.
    pub provider_error: Option<AuthError>,
}

/// Owns the current `(Session, ExtendedIdentity)` pair and keeps it in step
/// with the identity provider.
pub struct SessionManager<P, S> {
    inner: Arc<Inner<P, S>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

struct Inner<P, S> {
    provider: P,
    composer: IdentityComposer<S>,
    registrar: RegistrationOrchestrator<P, S>,
    state: watch::Sender<SessionSnapshot>,
    cancel: CancellationToken,
    started: AtomicBool,
    /// Set by `logout` until the provider confirms the sign-out.
    signed_out: AtomicBool,
}

impl<P, S> SessionManager<P, S>
where
    P: AuthProvider + Clone + 'static,
    S: RecordStore + Clone + 'static,
{
    pub fn new(provider: P, store: S, config: IdentityConfig) -> Self {
        let registrar = RegistrationOrchestrator::new(provider.clone(), store.clone(), config);
        Self::with_registrar(provider, store, registrar)
    }

    pub fn with_registrar(provider: P, store: S, registrar: RegistrationOrchestrator<P, S>) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());
        Self {
            inner: Arc::new(Inner {
                provider,
                composer: IdentityComposer::new(store),
                registrar,
                state,
                cancel: CancellationToken::new(),
                started: AtomicBool::new(false),
                signed_out: AtomicBool::new(false),
            }),
            listener: Mutex::new(None),
        }
    }

    /// Subscribe to provider notifications and resolve the initial session.
    ///
    /// Resolves once the initial transition has been published or
    /// superseded by a provider notification that arrived meanwhile.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<(), SessionError> {
        if self.inner.cancel.is_cancelled() {
            return Err(SessionError::ShutDown);
        }
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return Err(SessionError::AlreadyStarted);
        }

        // Subscribe before the initial fetch so no notification falls between.
        let changes = self.inner.provider.on_session_change();
        let seq = self.inner.begin("initial").ok_or(SessionError::ShutDown)?;
        let handle = tokio::spawn(listen(Arc::clone(&self.inner), changes));
        if let Ok(mut listener) = self.listener.lock() {
            *listener = Some(handle);
        }

        let resolution = self.inner.fetch_and_resolve().await;
        self.inner.apply(seq, resolution);
        Ok(())
    }

    /// Sign in through the provider.
    ///
    /// Composition happens on the resulting provider notification; await
    /// [`settled`](Self::settled) to observe it.
    #[instrument(skip(self, secret))]
    pub async fn login(&self, email: &str, secret: &str) -> Result<Session, SessionError> {
        self.ensure_running()?;
        let seq = self.inner.begin("login").ok_or(SessionError::ShutDown)?;
        // Lifted before the call: the provider notifies before `sign_in` returns.
        let was_signed_out = self.inner.signed_out.swap(false, Ordering::SeqCst);

        match self.inner.provider.sign_in(email, secret).await {
            Ok(session) => {
                info!(principal_id = %session.principal_id, "signed in");
                Ok(session)
            }
            Err(err) => {
                info!(error = %err, "sign-in rejected");
                self.inner.signed_out.store(was_signed_out, Ordering::SeqCst);
                self.inner.abandon(seq);
                Err(err.into())
            }
        }
    }

    /// Clear local state, then ask the provider to end its session.
    ///
    /// Local state is cleared even if the provider call fails or the manager
    /// has been shut down.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> LogoutOutcome {
        self.inner.signed_out.store(true, Ordering::SeqCst);
        self.inner.clear("logout");

        let provider_error = match self.inner.provider.sign_out().await {
            Ok(()) => {
                self.inner.signed_out.store(false, Ordering::SeqCst);
                None
            }
            Err(err) => {
                warn!(error = %err, "provider sign-out failed; local session already cleared");
                Some(err)
            }
        };

        LogoutOutcome {
            redirect_to: PUBLIC_LANDING_ROUTE,
            provider_error,
        }
    }

    /// Re-compose the identity of the current session.
    ///
    /// Without a session this is a no-op, unless the last attempt to read
    /// the session failed; then the provider is asked again. Safe to call
    /// repeatedly, including from an external approval hook.
    #[instrument(skip(self))]
    pub async fn refresh_identity(&self) -> Result<Option<Arc<ExtendedIdentity>>, SessionError> {
        self.ensure_running()?;
        let (session, provider_unavailable) = {
            let snapshot = self.inner.state.borrow();
            let unavailable = matches!(snapshot.fault, Some(SessionFault::ProviderUnavailable(_)));
            (snapshot.session.clone(), unavailable)
        };
        if session.is_none() && !provider_unavailable {
            return Ok(None);
        }

        let seq = self.inner.begin("refresh").ok_or(SessionError::ShutDown)?;
        let resolution = match session {
            Some(session) => self.inner.resolve(Some(session)).await,
            None => self.inner.fetch_and_resolve().await,
        };
        self.inner.apply(seq, resolution);
        Ok(self.current_identity())
    }

    pub async fn register(
        &self,
        data: SignupData,
        role: Role,
    ) -> Result<RegistrationReport, SessionError> {
        self.ensure_running()?;
        let was_signed_out = self.inner.signed_out.swap(false, Ordering::SeqCst);
        let result = self.inner.registrar.register(data, role).await;
        if !matches!(&result, Ok(report) if report.signed_in) {
            self.inner.signed_out.store(was_signed_out, Ordering::SeqCst);
        }
        Ok(result?)
    }

    pub fn current_identity(&self) -> Option<Arc<ExtendedIdentity>> {
        self.inner.state.borrow().identity.clone()
    }

    pub fn current_session(&self) -> Option<Session> {
        self.inner.state.borrow().session.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().is_loading()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.state.subscribe()
    }

    /// The first snapshot that is not loading (or the current one after
    /// shutdown).
    pub async fn settled(&self) -> SessionSnapshot {
        let mut receiver = self.inner.state.subscribe();
        tokio::select! {
            _ = self.inner.cancel.cancelled() => self.snapshot(),
            settled = receiver.wait_for(|snapshot| !snapshot.is_loading()) => match settled {
                Ok(snapshot) => snapshot.clone(),
                Err(_) => self.snapshot(),
            },
        }
    }

    pub fn route_for_current(&self) -> &'static str {
        self.inner.state.borrow().landing_route()
    }

    /// Gate a protected page on the current identity.
    pub fn authorize(&self, allowed: &[Role]) -> Result<(), AccessDenied> {
        let principal = self.inner.state.borrow().principal();
        authorize(principal.as_ref(), allowed)
    }

    /// Stop the listener and wait for it. State is frozen afterwards.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let handle = self.listener.lock().ok().and_then(|mut listener| listener.take());
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                warn!(error = %err, "session listener ended abnormally");
            }
        }
        info!("session manager shut down");
    }

    fn ensure_running(&self) -> Result<(), SessionError> {
        if self.inner.cancel.is_cancelled() {
            return Err(SessionError::ShutDown);
        }
        if !self.inner.started.load(Ordering::SeqCst) {
            return Err(SessionError::NotStarted);
        }
        Ok(())
    }
}

impl<P, S> Drop for SessionManager<P, S> {
    fn drop(&mut self) {
        self.inner.cancel.cancel();
    }
}

impl<P, S> core::fmt::Debug for SessionManager<P, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionManager")
            .field("state", &*self.inner.state.borrow())
            .field("cancelled", &self.inner.cancel.is_cancelled())
            .finish()
    }
}

impl<P, S> Inner<P, S>
where
    P: AuthProvider + Clone + 'static,
    S: RecordStore + Clone + 'static,
{
    /// Enter `Loading` under a new transition number.
    fn begin(&self, reason: &'static str) -> Option<u64> {
        let mut seq = None;
        self.state.send_if_modified(|snapshot| {
            if self.cancel.is_cancelled() {
                return false;
            }
            let next = snapshot.transition + 1;
            snapshot.begin(next);
            seq = Some(next);
            true
        });
        if let Some(seq) = seq {
            debug!(transition = seq, reason, "session transition started");
        }
        seq
    }

    /// Publish `resolution` if `seq` is still the latest transition.
    fn apply(&self, seq: u64, resolution: Resolution) -> bool {
        let kind = resolution.kind();
        let applied = self.state.send_if_modified(|snapshot| {
            if self.cancel.is_cancelled() || snapshot.transition != seq {
                return false;
            }
            *snapshot = SessionSnapshot::resolved(seq, resolution);
            true
        });
        if applied {
            debug!(transition = seq, resolution = kind, "session transition resolved");
        } else {
            debug!(transition = seq, resolution = kind, "superseded transition discarded");
        }
        applied
    }

    /// Begin and resolve to empty in one step. Applies after cancellation too.
    fn clear(&self, reason: &'static str) {
        self.state.send_modify(|snapshot| {
            let next = snapshot.transition + 1;
            *snapshot = SessionSnapshot::resolved(next, Resolution::Empty { fault: None });
        });
        debug!(reason, "session cleared");
    }

    /// Settle a transition that produced nothing new, keeping its pair.
    fn abandon(&self, seq: u64) {
        self.state.send_if_modified(|snapshot| {
            if self.cancel.is_cancelled() || snapshot.transition != seq || !snapshot.is_loading() {
                return false;
            }
            snapshot.phase = if snapshot.identity.is_some() {
                SessionPhase::ResolvedIdentified
            } else {
                SessionPhase::ResolvedEmpty
            };
            true
        });
    }

    async fn fetch_and_resolve(&self) -> Resolution {
        match self.provider.get_current_session().await {
            Ok(session) => self.resolve(session).await,
            Err(err) => {
                warn!(error = %err, "current session unavailable");
                Resolution::Empty {
                    fault: Some(SessionFault::ProviderUnavailable(err)),
                }
            }
        }
    }

    async fn resolve(&self, session: Option<Session>) -> Resolution {
        let Some(session) = session else {
            return Resolution::Empty { fault: None };
        };
        if self.signed_out.load(Ordering::SeqCst) {
            debug!(principal_id = %session.principal_id, "ignoring session after local logout");
            return Resolution::Empty { fault: None };
        }
        if let Err(err) = validate_session(&session, Utc::now()) {
            info!(principal_id = %session.principal_id, error = %err, "treating invalid session as absent");
            return Resolution::Empty {
                fault: Some(SessionFault::InvalidSession(err)),
            };
        }

        match self.composer.compose(UserId::from(session.principal_id)).await {
            Ok(identity) => Resolution::Identified { session, identity },
            Err(IdentityError::NotFound(_)) => Resolution::Empty { fault: None },
            Err(IdentityError::Transient(err)) => Resolution::Unidentified {
                session,
                fault: SessionFault::IdentityUnavailable(err),
            },
        }
    }

    /// Begin a transition now, resolve it in the background.
    fn spawn_transition(self: &Arc<Self>, reason: &'static str, session: Option<Session>) {
        let Some(seq) = self.begin(reason) else {
            return;
        };
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = inner.cancel.cancelled() => {}
                resolution = inner.resolve(session) => {
                    inner.apply(seq, resolution);
                }
            }
        });
    }

    fn spawn_resync(self: &Arc<Self>) {
        let Some(seq) = self.begin("resync") else {
            return;
        };
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = inner.cancel.cancelled() => {}
                resolution = inner.fetch_and_resolve() => {
                    inner.apply(seq, resolution);
                }
            }
        });
    }
}

async fn listen<P, S>(inner: Arc<Inner<P, S>>, mut changes: SessionSubscription)
where
    P: AuthProvider + Clone + 'static,
    S: RecordStore + Clone + 'static,
{
    loop {
        let change = tokio::select! {
            _ = inner.cancel.cancelled() => break,
            change = changes.recv() => change,
        };

        match change {
            Ok(change) => {
                debug!(change = change.kind(), "provider session change");
                if matches!(change, SessionChange::SignedOut) {
                    inner.signed_out.store(false, Ordering::SeqCst);
                }
                inner.spawn_transition(change.kind(), change.session().cloned());
            }
            Err(SubscriptionError::Lagged(skipped)) => {
                warn!(skipped, "session notifications lagged; resynchronizing");
                inner.spawn_resync();
            }
            Err(SubscriptionError::Closed) => {
                debug!("session notifications closed");
                break;
            }
        }
    }
    debug!("session listener stopped");
}
