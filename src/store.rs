use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use serde_json::Value;

use crate::db::PgStore;
use crate::error::StoreError;

pub const HISTORY_KEY: &str = "notification_history";
pub const COVERAGE_KEY: &str = "covered_diseases";

/// Durable key-value area shared by the ledger and the coverage list.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Value>, StoreError>> + Send;

    fn set(&self, key: &str, value: Value) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn remove(&self, key: &str) -> impl Future<Output = Result<(), StoreError>> + Send;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, Value>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.entries().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.entries().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries().remove(key);
        Ok(())
    }
}

/// Store selected at startup: Postgres when configured, otherwise an
/// in-memory area that lasts for the current run only.
#[derive(Debug)]
pub enum StoreBackend {
    Postgres(PgStore),
    Memory(MemoryStore),
}

impl KeyValueStore for StoreBackend {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        match self {
            Self::Postgres(store) => store.get(key).await,
            Self::Memory(store) => store.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        match self {
            Self::Postgres(store) => store.set(key, value).await,
            Self::Memory(store) => store.set(key, value).await,
        }
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        match self {
            Self::Postgres(store) => store.remove(key).await,
            Self::Memory(store) => store.remove(key).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn memory_store_round_trips_and_removes() {
        let store = MemoryStore::new();
        assert_eq!(store.get(HISTORY_KEY).await.unwrap(), None);

        store.set(HISTORY_KEY, json!([1, 2])).await.unwrap();
        assert_eq!(store.get(HISTORY_KEY).await.unwrap(), Some(json!([1, 2])));

        store.remove(HISTORY_KEY).await.unwrap();
        assert_eq!(store.get(HISTORY_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_backend_delegates() {
        let backend = StoreBackend::Memory(MemoryStore::new());
        backend.set(COVERAGE_KEY, json!({"a": 1})).await.unwrap();
        assert_eq!(backend.get(COVERAGE_KEY).await.unwrap(), Some(json!({"a": 1})));
    }
}
