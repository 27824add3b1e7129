//! Infrastructure layer: identity provider and record store boundaries,
//! their in-memory implementations, and configuration.

pub mod auth_provider;
pub mod config;
pub mod record_store;

pub use auth_provider::{
    AuthProvider, InMemoryAuthProvider, SessionChange, SessionSubscription, SubscriptionError,
};
pub use config::{ConfigError, IdentityConfig};
pub use record_store::{InMemoryRecordStore, Record, RecordStore, StoreError, Table};
