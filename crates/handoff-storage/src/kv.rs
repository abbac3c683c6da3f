//! The storage seam every event-store backend implements.

use async_trait::async_trait;
use handoff_core::BridgeResult;

/// A minimal ordered key-value contract.
///
/// `put_if_absent` is the one operation that must be atomic with respect to
/// concurrent callers: it is how the event store enforces "at most one
/// response event per turn" and "session ids are unique" without a
/// higher-level lock visible to every caller.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> BridgeResult<Option<Vec<u8>>>;

    async fn put(&self, key: &str, value: Vec<u8>) -> BridgeResult<()>;

    /// Insert `value` at `key` only if no value is present yet. Returns
    /// `true` if the insert happened, `false` if a value already existed.
    async fn put_if_absent(&self, key: &str, value: Vec<u8>) -> BridgeResult<bool>;

    /// All entries whose key starts with `prefix`, in ascending key order.
    async fn scan_prefix(&self, prefix: &str) -> BridgeResult<Vec<(String, Vec<u8>)>>;
}
