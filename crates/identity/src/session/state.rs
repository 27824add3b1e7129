//! Immutable session snapshots.
//!
//! A snapshot is replaced as a whole on every transition; readers never see a
//! session from one transition paired with an identity from another.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use bazaar_auth::{route_for, AuthError, Principal, Session, SessionValidationError};
use bazaar_infra::StoreError;

use crate::records::ExtendedIdentity;

/// `Uninitialized → Loading → {ResolvedEmpty, ResolvedIdentified}`; every
/// provider transition re-enters `Loading`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Uninitialized,
    Loading,
    ResolvedEmpty,
    ResolvedIdentified,
}

/// Why the last transition resolved without an identity.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionFault {
    /// The session is live but its user record could not be read.
    /// `refresh_identity` recovers.
    #[error("identity unavailable: {0}")]
    IdentityUnavailable(StoreError),

    #[error("identity provider unavailable: {0}")]
    ProviderUnavailable(AuthError),

    #[error("session rejected: {0}")]
    InvalidSession(SessionValidationError),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionSnapshot {
    pub(crate) phase: SessionPhase,
    pub(crate) session: Option<Session>,
    pub(crate) identity: Option<Arc<ExtendedIdentity>>,
    pub(crate) fault: Option<SessionFault>,
    pub(crate) transition: u64,
}

impl SessionSnapshot {
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn identity(&self) -> Option<&Arc<ExtendedIdentity>> {
        self.identity.as_ref()
    }

    pub fn fault(&self) -> Option<&SessionFault> {
        self.fault.as_ref()
    }

    /// Sequence number of the transition this snapshot belongs to.
    pub fn transition(&self) -> u64 {
        self.transition
    }

    /// True until the current transition has resolved.
    pub fn is_loading(&self) -> bool {
        matches!(self.phase, SessionPhase::Uninitialized | SessionPhase::Loading)
    }

    pub fn principal(&self) -> Option<Principal> {
        self.identity.as_ref().map(|identity| identity.principal())
    }

    /// Landing route of the current identity, `"/"` when signed out.
    pub fn landing_route(&self) -> &'static str {
        route_for(self.identity.as_ref().map(|identity| identity.role()))
    }

    /// Same pair and fault, `Loading` under a new transition number.
    pub(crate) fn begin(&mut self, transition: u64) {
        self.phase = SessionPhase::Loading;
        self.transition = transition;
    }

    pub(crate) fn resolved(transition: u64, resolution: Resolution) -> Self {
        match resolution {
            Resolution::Empty { fault } => Self {
                phase: SessionPhase::ResolvedEmpty,
                session: None,
                identity: None,
                fault,
                transition,
            },
            Resolution::Unidentified { session, fault } => Self {
                phase: SessionPhase::ResolvedEmpty,
                session: Some(session),
                identity: None,
                fault: Some(fault),
                transition,
            },
            Resolution::Identified { session, identity } => Self {
                phase: SessionPhase::ResolvedIdentified,
                session: Some(session),
                identity: Some(Arc::new(identity)),
                fault: None,
                transition,
            },
        }
    }
}

/// Outcome of one transition, before it is published.
#[derive(Debug)]
pub(crate) enum Resolution {
    /// No session, or a session whose user record is gone.
    Empty { fault: Option<SessionFault> },
    /// Live session whose identity could not be composed right now.
    Unidentified {
        session: Session,
        fault: SessionFault,
    },
    Identified {
        session: Session,
        identity: ExtendedIdentity,
    },
}

impl Resolution {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Resolution::Empty { .. } => "empty",
            Resolution::Unidentified { .. } => "unidentified",
            Resolution::Identified { .. } => "identified",
        }
    }
}
