//! Record store boundary.
//!
//! Normalized tables (users, profiles, suppliers, resellers) are accessed as
//! JSON rows through [`RecordStore`]; [`typed`] layers serde-backed typed
//! access on top without making any storage assumptions.

pub mod in_memory;
pub mod r#trait;
pub mod typed;

pub use in_memory::InMemoryRecordStore;
pub use r#trait::{RecordStore, StoreError, Table};
pub use typed::{fetch, fetch_owned, insert, Record, OWNER_FIELD};
