//! Identity provider boundary.
//!
//! The provider owns credentials and the server-side session; this module
//! only describes what the session manager consumes from it.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryAuthProvider;
pub use r#trait::{AuthProvider, SessionChange, SessionSubscription, SubscriptionError};
