//! Process-wide session state and its lifecycle.

pub mod manager;
pub mod state;

pub use manager::{LogoutOutcome, SessionManager};
pub use state::{SessionFault, SessionPhase, SessionSnapshot};
