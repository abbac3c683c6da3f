//! Pure in-memory [`KvStore`], used by tests and by ephemeral sessions that
//! do not need to survive a restart.

use std::collections::BTreeMap;

use async_trait::async_trait;
use handoff_core::BridgeResult;
use tokio::sync::RwLock;

use crate::kv::KvStore;

#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryKvStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> BridgeResult<Option<Vec<u8>>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> BridgeResult<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn put_if_absent(&self, key: &str, value: Vec<u8>) -> BridgeResult<bool> {
        let mut entries = self.entries.write().await;
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.to_string(), value);
        Ok(true)
    }

    async fn scan_prefix(&self, prefix: &str) -> BridgeResult<Vec<(String, Vec<u8>)>> {
        let entries = self.entries.read().await;
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = MemoryKvStore::new();
        store.put("a", b"1".to_vec()).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some(b"1".to_vec()));
    }

    #[tokio::test]
    async fn put_if_absent_refuses_overwrite() {
        let store = MemoryKvStore::new();
        assert!(store.put_if_absent("a", b"1".to_vec()).await.unwrap());
        assert!(!store.put_if_absent("a", b"2".to_vec()).await.unwrap());
        assert_eq!(store.get("a").await.unwrap(), Some(b"1".to_vec()));
    }

    #[tokio::test]
    async fn scan_prefix_is_ordered_and_bounded() {
        let store = MemoryKvStore::new();
        store.put("event:s1:0001", b"a".to_vec()).await.unwrap();
        store.put("event:s1:0002", b"b".to_vec()).await.unwrap();
        store.put("event:s2:0001", b"c".to_vec()).await.unwrap();

        let scanned = store.scan_prefix("event:s1:").await.unwrap();
        assert_eq!(scanned.len(), 2);
        assert_eq!(scanned[0].0, "event:s1:0001");
        assert_eq!(scanned[1].0, "event:s1:0002");
    }
}
