//! Embedded, durable [`KvStore`] backed by `surrealkv`.
//!
//! `surrealkv` gives us MVCC transactions over an LSM-tree log on disk;
//! every write here commits a single-key transaction so that a crash between
//! `AppendEvent` calls never leaves a half-written event visible on restart.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use handoff_core::{BridgeError, BridgeResult};
use surrealkv::{Options, Store};
use tokio::task;

use crate::kv::KvStore;

pub struct SurrealKvStore {
    store: Arc<Store>,
}

impl SurrealKvStore {
    /// Open (or create) a durable store rooted at `path`.
    pub fn open(path: impl AsRef<Path>) -> BridgeResult<Self> {
        let mut opts = Options::new();
        opts.dir = path.as_ref().to_path_buf();
        let store = Store::new(opts).map_err(|e| BridgeError::storage(e.to_string()))?;
        Ok(Self {
            store: Arc::new(store),
        })
    }
}

#[async_trait]
impl KvStore for SurrealKvStore {
    async fn get(&self, key: &str) -> BridgeResult<Option<Vec<u8>>> {
        let store = Arc::clone(&self.store);
        let key = key.as_bytes().to_vec();
        task::spawn_blocking(move || {
            let mut txn = store
                .begin()
                .map_err(|e| BridgeError::storage(e.to_string()))?;
            let value = txn
                .get(&key)
                .map_err(|e| BridgeError::storage(e.to_string()))?;
            Ok(value.map(|v| v.to_vec()))
        })
        .await
        .map_err(|e| BridgeError::internal(e.to_string()))?
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> BridgeResult<()> {
        let store = Arc::clone(&self.store);
        let key = key.as_bytes().to_vec();
        task::spawn_blocking(move || {
            let mut txn = store
                .begin()
                .map_err(|e| BridgeError::storage(e.to_string()))?;
            txn.set(&key, &value)
                .map_err(|e| BridgeError::storage(e.to_string()))?;
            txn.commit().map_err(|e| BridgeError::storage(e.to_string()))
        })
        .await
        .map_err(|e| BridgeError::internal(e.to_string()))?
    }

    async fn put_if_absent(&self, key: &str, value: Vec<u8>) -> BridgeResult<bool> {
        let store = Arc::clone(&self.store);
        let key_bytes = key.as_bytes().to_vec();
        task::spawn_blocking(move || {
            let mut txn = store
                .begin()
                .map_err(|e| BridgeError::storage(e.to_string()))?;
            if txn
                .get(&key_bytes)
                .map_err(|e| BridgeError::storage(e.to_string()))?
                .is_some()
            {
                return Ok(false);
            }
            txn.set(&key_bytes, &value)
                .map_err(|e| BridgeError::storage(e.to_string()))?;
            txn.commit().map_err(|e| BridgeError::storage(e.to_string()))?;
            Ok(true)
        })
        .await
        .map_err(|e| BridgeError::internal(e.to_string()))?
    }

    async fn scan_prefix(&self, prefix: &str) -> BridgeResult<Vec<(String, Vec<u8>)>> {
        let store = Arc::clone(&self.store);
        let prefix = prefix.to_string();
        task::spawn_blocking(move || {
            let txn = store
                .begin()
                .map_err(|e| BridgeError::storage(e.to_string()))?;
            let range = prefix.clone().into_bytes()..prefix_upper_bound(&prefix);
            let mut out = Vec::new();
            for entry in txn
                .scan(range, None)
                .map_err(|e| BridgeError::storage(e.to_string()))?
            {
                let (key, value) = entry.map_err(|e| BridgeError::storage(e.to_string()))?;
                out.push((
                    String::from_utf8_lossy(&key).into_owned(),
                    value.to_vec(),
                ));
            }
            Ok(out)
        })
        .await
        .map_err(|e| BridgeError::internal(e.to_string()))?
    }
}

/// Smallest byte string that sorts after every string starting with `prefix`.
fn prefix_upper_bound(prefix: &str) -> Vec<u8> {
    let mut bound = prefix.as_bytes().to_vec();
    for i in (0..bound.len()).rev() {
        if bound[i] != 0xff {
            bound[i] += 1;
            bound.truncate(i + 1);
            return bound;
        }
    }
    // All 0xff bytes (or empty prefix): no finite upper bound, scan to the end.
    vec![0xff; bound.len() + 1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_upper_bound_excludes_siblings() {
        let bound = prefix_upper_bound("event:s1:");
        assert!(bound.as_slice() > b"event:s1:9999".as_slice());
        assert!(bound.as_slice() < b"event:s2:".as_slice());
    }
}
