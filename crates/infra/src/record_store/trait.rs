use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

/// Normalized tables the identity layer reads and writes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Users,
    Profiles,
    Suppliers,
    Resellers,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Users => "users",
            Table::Profiles => "user_profiles",
            Table::Suppliers => "suppliers",
            Table::Resellers => "resellers",
        }
    }

    /// Columns with a uniqueness constraint.
    pub fn unique_fields(&self) -> &'static [&'static str] {
        match self {
            Table::Users => &["id", "email"],
            Table::Profiles => &["id", "user_id"],
            Table::Suppliers => &["id", "user_id", "store_slug"],
            Table::Resellers => &["id", "user_id", "referral_code"],
        }
    }
}

impl core::fmt::Display for Table {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record store operation error.
///
/// These are **infrastructure errors** (availability, constraints, encoding)
/// as opposed to domain errors (validation, malformed identifiers).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The store could not be reached.
    #[error("record store unavailable: {0}")]
    Unavailable(String),

    /// A stored row could not be decoded into the expected record.
    #[error("decode failed: {0}")]
    Decode(String),

    /// The store refused the write (malformed row, permissions, ...).
    #[error("write rejected: {0}")]
    Rejected(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

/// Keyed reads/writes against normalized records.
///
/// Rows are JSON objects carrying at least an `"id"` field; foreign-key
/// lookups expect at most one match.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    async fn get_by_id(&self, table: Table, id: Uuid) -> Result<Option<JsonValue>, StoreError>;

    async fn get_by_foreign_key(
        &self,
        table: Table,
        fk_field: &str,
        id: Uuid,
    ) -> Result<Option<JsonValue>, StoreError>;

    async fn insert(&self, table: Table, row: JsonValue) -> Result<(), StoreError>;
}

#[async_trait::async_trait]
impl<S> RecordStore for Arc<S>
where
    S: RecordStore + ?Sized,
{
    async fn get_by_id(&self, table: Table, id: Uuid) -> Result<Option<JsonValue>, StoreError> {
        (**self).get_by_id(table, id).await
    }

    async fn get_by_foreign_key(
        &self,
        table: Table,
        fk_field: &str,
        id: Uuid,
    ) -> Result<Option<JsonValue>, StoreError> {
        (**self).get_by_foreign_key(table, fk_field, id).await
    }

    async fn insert(&self, table: Table, row: JsonValue) -> Result<(), StoreError> {
        (**self).insert(table, row).await
    }
}
