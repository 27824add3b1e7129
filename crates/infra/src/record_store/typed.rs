//! Typed access over JSON rows.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tracing::debug;
use uuid::Uuid;

use bazaar_core::{Entity, UserId};

use super::r#trait::{RecordStore, StoreError, Table};

/// Foreign-key column linking auxiliary records to their user.
pub const OWNER_FIELD: &str = "user_id";

/// A normalized record living in one [`Table`].
pub trait Record: Entity + Serialize + DeserializeOwned + Send + Sync {
    const TABLE: Table;
}

/// Load a record by its primary key.
pub async fn fetch<R, S>(store: &S, id: Uuid) -> Result<Option<R>, StoreError>
where
    R: Record,
    S: RecordStore + ?Sized,
{
    store
        .get_by_id(R::TABLE, id)
        .await?
        .map(decode::<R>)
        .transpose()
}

/// Load the single record of `R`'s table owned by `owner`.
pub async fn fetch_owned<R, S>(store: &S, owner: UserId) -> Result<Option<R>, StoreError>
where
    R: Record,
    S: RecordStore + ?Sized,
{
    store
        .get_by_foreign_key(R::TABLE, OWNER_FIELD, *owner.as_uuid())
        .await?
        .map(decode::<R>)
        .transpose()
}

pub async fn insert<R, S>(store: &S, record: &R) -> Result<(), StoreError>
where
    R: Record,
    S: RecordStore + ?Sized,
{
    let row = serde_json::to_value(record)
        .map_err(|e| StoreError::Rejected(format!("{} serialization failed: {e}", R::TABLE)))?;
    debug!(table = %R::TABLE, id = %record.id(), "inserting record");
    store.insert(R::TABLE, row).await
}

fn decode<R: Record>(row: JsonValue) -> Result<R, StoreError> {
    serde_json::from_value(row).map_err(|e| StoreError::Decode(format!("{}: {e}", R::TABLE)))
}
