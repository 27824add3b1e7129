//! `bazaar-identity`: session & identity orchestration.
//!
//! Authenticates a principal through an [`AuthProvider`], composes a
//! role-qualified [`ExtendedIdentity`] from normalized records, orchestrates
//! multi-record registration, and exposes one authoritative "current
//! identity" to the rest of the application.
//!
//! [`AuthProvider`]: bazaar_infra::AuthProvider

pub mod composer;
pub mod error;
pub mod records;
pub mod registration;
pub mod session;
pub mod slug;


pub use composer::IdentityComposer;
pub use error::{EnrichmentWarning, IdentityError, RegistrationError, SessionError};
pub use records::{
    ExtendedIdentity, KycStatus, PerformanceTier, ResellerRecord, RoleRecord, SupplierRecord,
    UserProfile, UserRecord,
};
pub use registration::{RegistrationOrchestrator, RegistrationReport, SignupData};
pub use session::{LogoutOutcome, SessionFault, SessionManager, SessionPhase, SessionSnapshot};
