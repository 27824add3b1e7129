use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use std::time::Duration;

use serde_json::Value as JsonValue;
use uuid::Uuid;

use super::r#trait::{RecordStore, StoreError, Table};

/// In-memory record store.
///
/// Intended for tests/dev. Enforces each table's unique columns and supports
/// per-table failure injection plus an artificial read latency.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    tables: RwLock<HashMap<Table, Vec<JsonValue>>>,
    failing_reads: RwLock<HashSet<Table>>,
    failing_writes: RwLock<HashSet<Table>>,
    read_delay: RwLock<Option<Duration>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make reads from `table` fail with [`StoreError::Unavailable`].
    pub fn fail_reads(&self, table: Table, fail: bool) {
        toggle(&self.failing_reads, table, fail);
    }

    /// Make inserts into `table` fail with [`StoreError::Unavailable`].
    pub fn fail_writes(&self, table: Table, fail: bool) {
        toggle(&self.failing_writes, table, fail);
    }

    /// Delay every read by `delay` (`None` disables).
    pub fn set_read_delay(&self, delay: Option<Duration>) {
        if let Ok(mut d) = self.read_delay.write() {
            *d = delay;
        }
    }

    /// Delete a row by primary key (administrative clean-up).
    pub fn remove(&self, table: Table, id: Uuid) -> bool {
        let Ok(mut tables) = self.tables.write() else {
            return false;
        };
        let Some(rows) = tables.get_mut(&table) else {
            return false;
        };
        let before = rows.len();
        rows.retain(|row| !matches_uuid(row, "id", id));
        rows.len() != before
    }

    pub fn len(&self, table: Table) -> usize {
        self.tables
            .read()
            .map(|t| t.get(&table).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    async fn before_read(&self, table: Table) -> Result<(), StoreError> {
        let delay = self.read_delay.read().ok().and_then(|d| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if is_set(&self.failing_reads, table) {
            return Err(StoreError::Unavailable(format!("reads from {table} disabled")));
        }
        Ok(())
    }

    fn find(&self, table: Table, field: &str, id: Uuid) -> Result<Option<JsonValue>, StoreError> {
        let tables = self
            .tables
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;

        Ok(tables
            .get(&table)
            .and_then(|rows| rows.iter().find(|row| matches_uuid(row, field, id)))
            .cloned())
    }
}

fn toggle(set: &RwLock<HashSet<Table>>, table: Table, on: bool) {
    if let Ok(mut s) = set.write() {
        if on {
            s.insert(table);
        } else {
            s.remove(&table);
        }
    }
}

fn is_set(set: &RwLock<HashSet<Table>>, table: Table) -> bool {
    set.read().map(|s| s.contains(&table)).unwrap_or(false)
}

fn matches_uuid(row: &JsonValue, field: &str, id: Uuid) -> bool {
    row.get(field)
        .and_then(JsonValue::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
        == Some(id)
}

#[async_trait::async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn get_by_id(&self, table: Table, id: Uuid) -> Result<Option<JsonValue>, StoreError> {
        self.before_read(table).await?;
        self.find(table, "id", id)
    }

    async fn get_by_foreign_key(
        &self,
        table: Table,
        fk_field: &str,
        id: Uuid,
    ) -> Result<Option<JsonValue>, StoreError> {
        self.before_read(table).await?;
        self.find(table, fk_field, id)
    }

    async fn insert(&self, table: Table, row: JsonValue) -> Result<(), StoreError> {
        if is_set(&self.failing_writes, table) {
            return Err(StoreError::Unavailable(format!("writes to {table} disabled")));
        }
        if !row.is_object() || row.get("id").is_none() {
            return Err(StoreError::Rejected(format!("{table} row must be an object with an id")));
        }

        let mut tables = self
            .tables
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
        let rows = tables.entry(table).or_default();

        for field in table.unique_fields() {
            let Some(value) = row.get(*field) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            if rows.iter().any(|existing| existing.get(*field) == Some(value)) {
                return Err(StoreError::Conflict(format!("{table}.{field} already exists")));
            }
        }

        rows.push(row);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn insert_then_lookup_by_id_and_foreign_key() {
        let store = InMemoryRecordStore::new();
        let id = Uuid::now_v7();
        let owner = Uuid::now_v7();
        store
            .insert(Table::Profiles, json!({ "id": id, "user_id": owner, "locale": "en" }))
            .await
            .unwrap();

        let by_id = store.get_by_id(Table::Profiles, id).await.unwrap().unwrap();
        assert_eq!(by_id["locale"], "en");

        let by_owner = store
            .get_by_foreign_key(Table::Profiles, "user_id", owner)
            .await
            .unwrap();
        assert_eq!(by_owner, Some(by_id));

        assert!(store.get_by_id(Table::Users, id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unique_columns_are_enforced() {
        let store = InMemoryRecordStore::new();
        store
            .insert(Table::Suppliers, json!({ "id": Uuid::now_v7(), "user_id": Uuid::now_v7(), "store_slug": "acme-0001" }))
            .await
            .unwrap();

        let err = store
            .insert(Table::Suppliers, json!({ "id": Uuid::now_v7(), "user_id": Uuid::now_v7(), "store_slug": "acme-0001" }))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(store.len(Table::Suppliers), 1);
    }

    #[tokio::test]
    async fn rows_without_id_are_rejected() {
        let store = InMemoryRecordStore::new();
        let err = store.insert(Table::Users, json!({ "email": "a@x.com" })).await.unwrap_err();
        assert!(matches!(err, StoreError::Rejected(_)));
    }

    #[tokio::test]
    async fn injected_failures_are_transient() {
        let store = InMemoryRecordStore::new();
        store.fail_writes(Table::Profiles, true);
        let err = store
            .insert(Table::Profiles, json!({ "id": Uuid::now_v7() }))
            .await
            .unwrap_err();
        assert!(err.is_transient());

        store.fail_reads(Table::Users, true);
        assert!(store.get_by_id(Table::Users, Uuid::now_v7()).await.is_err());
        store.fail_reads(Table::Users, false);
        assert!(store.get_by_id(Table::Users, Uuid::now_v7()).await.is_ok());
    }

    #[tokio::test]
    async fn remove_deletes_by_primary_key() {
        let store = InMemoryRecordStore::new();
        let id = Uuid::now_v7();
        store.insert(Table::Users, json!({ "id": id })).await.unwrap();
        assert!(store.remove(Table::Users, id));
        assert!(!store.remove(Table::Users, id));
        assert_eq!(store.len(Table::Users), 0);
    }
}
