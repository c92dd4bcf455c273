//! Offline response cache.
//!
//! Stores the last successful body of cacheable read endpoints so they can
//! be replayed while offline. Entries live in key/value storage under a
//! hashed key with a companion write timestamp; storage failures (full
//! disk, unopenable database) degrade to a miss rather than an error, so a
//! broken cache can never take the client down with it.

use chrono::{Duration, Utc};
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::warn;

use crate::storage::KeyValueStorage;

/// Reserved storage prefix for cache entries.
pub const CACHE_PREFIX: &str = "offline_cache_";
/// Reserved storage prefix for entry write timestamps.
pub const CACHE_TIMESTAMP_PREFIX: &str = "offline_cache_ts_";

/// JSON value cache keyed by hashed logical keys (method + URL).
#[derive(Clone)]
pub struct OfflineCache {
  storage: Arc<dyn KeyValueStorage>,
}

impl OfflineCache {
  pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
    Self { storage }
  }

  /// Store `value` under `key`, overwriting any previous entry.
  pub fn set<T: Serialize>(&self, key: &str, value: &T) {
    let json = match serde_json::to_string(value) {
      Ok(json) => json,
      Err(e) => {
        warn!(key, error = %e, "Failed to serialize value for cache");
        return;
      }
    };

    let hashed = hash_key(key);
    let now = Utc::now().timestamp_millis().to_string();

    if let Err(e) = self
      .storage
      .set_item(&format!("{CACHE_PREFIX}{hashed}"), &json)
    {
      warn!(key, error = %e, "Failed to cache value");
      return;
    }
    if let Err(e) = self
      .storage
      .set_item(&format!("{CACHE_TIMESTAMP_PREFIX}{hashed}"), &now)
    {
      warn!(key, error = %e, "Failed to store cache timestamp");
    }
  }

  /// Get the cached value for `key`, or `None` on a miss or any storage
  /// failure.
  pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
    let hashed = hash_key(key);

    let json = match self.storage.get_item(&format!("{CACHE_PREFIX}{hashed}")) {
      Ok(Some(json)) => json,
      Ok(None) => return None,
      Err(e) => {
        warn!(key, error = %e, "Failed to read cached value");
        return None;
      }
    };

    match serde_json::from_str(&json) {
      Ok(value) => Some(value),
      Err(e) => {
        warn!(key, error = %e, "Failed to deserialize cached value");
        None
      }
    }
  }

  /// Whether an entry exists for `key`.
  pub fn has(&self, key: &str) -> bool {
    let hashed = hash_key(key);
    matches!(
      self.storage.get_item(&format!("{CACHE_PREFIX}{hashed}")),
      Ok(Some(_))
    )
  }

  /// Time since the entry for `key` was written.
  pub fn age(&self, key: &str) -> Option<Duration> {
    let hashed = hash_key(key);
    let stored = self
      .storage
      .get_item(&format!("{CACHE_TIMESTAMP_PREFIX}{hashed}"))
      .ok()
      .flatten()?;

    let written_ms: i64 = stored.parse().ok()?;
    Some(Duration::milliseconds(
      Utc::now().timestamp_millis() - written_ms,
    ))
  }

  /// Remove the entry and its timestamp for `key`.
  pub fn remove(&self, key: &str) {
    let hashed = hash_key(key);
    if let Err(e) = self.storage.remove_item(&format!("{CACHE_PREFIX}{hashed}")) {
      warn!(key, error = %e, "Failed to remove cached value");
    }
    if let Err(e) = self
      .storage
      .remove_item(&format!("{CACHE_TIMESTAMP_PREFIX}{hashed}"))
    {
      warn!(key, error = %e, "Failed to remove cache timestamp");
    }
  }

  /// Remove every cache entry, leaving unrelated storage keys untouched.
  pub fn clear(&self) {
    let keys = match self.storage.keys() {
      Ok(keys) => keys,
      Err(e) => {
        warn!(error = %e, "Failed to list storage keys for cache clear");
        return;
      }
    };

    for key in keys {
      if key.starts_with(CACHE_TIMESTAMP_PREFIX) || key.starts_with(CACHE_PREFIX) {
        if let Err(e) = self.storage.remove_item(&key) {
          warn!(key, error = %e, "Failed to remove cache key");
        }
      }
    }
  }
}

/// Hash a logical cache key to a stable, fixed-length storage token.
/// SHA-256 keeps distinct keys from colliding no matter how long or odd
/// the URLs get.
fn hash_key(key: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(key.as_bytes());
  hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::storage::MemoryStorage;
  use color_eyre::{eyre::eyre, Result};
  use serde_json::json;

  fn cache() -> OfflineCache {
    OfflineCache::new(Arc::new(MemoryStorage::new()))
  }

  #[test]
  fn test_roundtrip() {
    let cache = cache();
    let value = json!({"tenants": [], "count": 3, "nested": {"a": [1, 2]}});

    cache.set("GET:https://api.example.com/config", &value);
    let got: serde_json::Value = cache.get("GET:https://api.example.com/config").unwrap();
    assert_eq!(got, value);
  }

  #[test]
  fn test_miss_returns_none() {
    let cache = cache();
    assert_eq!(cache.get::<serde_json::Value>("GET:/nothing"), None);
    assert!(!cache.has("GET:/nothing"));
    assert!(cache.age("GET:/nothing").is_none());
  }

  #[test]
  fn test_overwrite_keeps_one_entry() {
    let storage = Arc::new(MemoryStorage::new());
    let cache = OfflineCache::new(storage.clone());

    cache.set("k", &json!(1));
    cache.set("k", &json!(2));

    assert_eq!(cache.get::<serde_json::Value>("k").unwrap(), json!(2));
    // One entry plus one timestamp
    assert_eq!(storage.keys().unwrap().len(), 2);
  }

  #[test]
  fn test_remove_deletes_entry_and_timestamp() {
    let storage = Arc::new(MemoryStorage::new());
    let cache = OfflineCache::new(storage.clone());

    cache.set("k", &json!("v"));
    cache.remove("k");

    assert!(!cache.has("k"));
    assert!(cache.age("k").is_none());
    assert!(storage.keys().unwrap().is_empty());
  }

  #[test]
  fn test_clear_leaves_unrelated_keys() {
    let storage = Arc::new(MemoryStorage::new());
    let cache = OfflineCache::new(storage.clone());

    storage.set_item("plant_requests", "[]").unwrap();
    cache.set("a", &json!(1));
    cache.set("b", &json!(2));

    cache.clear();

    let keys = storage.keys().unwrap();
    assert_eq!(keys, vec!["plant_requests"]);
  }

  #[test]
  fn test_age_is_fresh_after_set() {
    let cache = cache();
    cache.set("k", &json!("v"));

    let age = cache.age("k").unwrap();
    assert!(age >= Duration::zero());
    assert!(age < Duration::seconds(5));
  }

  /// Storage that fails every operation.
  struct BrokenStorage;

  impl KeyValueStorage for BrokenStorage {
    fn get_item(&self, _key: &str) -> Result<Option<String>> {
      Err(eyre!("storage unavailable"))
    }
    fn set_item(&self, _key: &str, _value: &str) -> Result<()> {
      Err(eyre!("quota exceeded"))
    }
    fn remove_item(&self, _key: &str) -> Result<()> {
      Err(eyre!("storage unavailable"))
    }
    fn keys(&self) -> Result<Vec<String>> {
      Err(eyre!("storage unavailable"))
    }
  }

  #[test]
  fn test_storage_failures_degrade_to_noop() {
    let cache = OfflineCache::new(Arc::new(BrokenStorage));

    cache.set("k", &json!("v"));
    assert_eq!(cache.get::<serde_json::Value>("k"), None);
    assert!(!cache.has("k"));
    cache.remove("k");
    cache.clear();
  }
}
