//! Offline fallback interceptor for read requests.
//!
//! Wraps the transport so every framework read resolves to some
//! well-formed body even with no connectivity: cached replay first, then
//! the compiled-in fallback for critical endpoints, then an empty-object
//! success for the remaining cacheable endpoints. Endpoints outside the
//! allow-lists pass straight through and keep their errors.

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

use crate::cache::OfflineCache;
use crate::connectivity::ConnectivityMonitor;
use crate::storage::KeyValueStorage;

use super::error::HttpError;
use super::fallback::default_fallback;
use super::transport::HttpTransport;

/// GET fetcher with the offline decision policy applied.
#[derive(Clone)]
pub struct OfflineFetcher<T: HttpTransport> {
  transport: T,
  cache: OfflineCache,
  monitor: Arc<ConnectivityMonitor>,
  storage: Arc<dyn KeyValueStorage>,
  cacheable_urls: Vec<String>,
  critical_urls: Vec<String>,
}

impl<T: HttpTransport> OfflineFetcher<T> {
  pub fn new(
    transport: T,
    cache: OfflineCache,
    monitor: Arc<ConnectivityMonitor>,
    storage: Arc<dyn KeyValueStorage>,
    cacheable_urls: Vec<String>,
    critical_urls: Vec<String>,
  ) -> Self {
    Self {
      transport,
      cache,
      monitor,
      storage,
      cacheable_urls,
      critical_urls,
    }
  }

  fn is_cacheable(&self, url: &str) -> bool {
    self.cacheable_urls.iter().any(|p| url.contains(p.as_str()))
  }

  fn is_critical(&self, url: &str) -> bool {
    self.critical_urls.iter().any(|p| url.contains(p.as_str()))
  }

  /// GET `url` with offline handling.
  pub async fn get(&self, url: &str) -> Result<Value, HttpError> {
    let cacheable = self.is_cacheable(url);
    let critical = self.is_critical(url);

    // Not allow-listed: no offline logic, errors propagate unchanged
    if !cacheable && !critical {
      return self.transport.get_json(url).await;
    }

    let cache_key = format!("GET:{url}");

    // Known offline: serve cache, then fallback, before touching the
    // network at all
    if self.monitor.is_offline() && cacheable {
      if let Some(cached) = self.cache.get::<Value>(&cache_key) {
        info!(url, "Offline, serving from cache");
        return Ok(cached);
      }

      if critical {
        if let Some(body) = default_fallback(url, &*self.storage) {
          info!(url, "Offline, serving static fallback");
          return Ok(body);
        }
      }
      // Neither cache nor fallback: attempt the network anyway
    }

    match self.transport.get_json(url).await {
      Ok(body) => {
        if cacheable {
          self.cache.set(&cache_key, &body);
        }
        Ok(body)
      }
      Err(e) if e.is_connectivity() || self.monitor.is_offline() => {
        debug!(url, error = %e, "Network failure, degrading");

        if let Some(cached) = self.cache.get::<Value>(&cache_key) {
          info!(url, "Serving from cache after network failure");
          return Ok(cached);
        }

        if critical {
          if let Some(body) = default_fallback(url, &*self.storage) {
            info!(url, "Serving static fallback after network failure");
            return Ok(body);
          }
        }

        // Non-essential endpoint: an empty body beats a startup failure
        if cacheable {
          info!(url, "Serving empty body after network failure");
          return Ok(json!({}));
        }

        Err(e)
      }
      Err(e) => Err(e),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::storage::MemoryStorage;
  use std::sync::atomic::{AtomicUsize, Ordering};

  const CONFIG_URL: &str = "https://api.example.com/api/abp/application-configuration";
  const FEATURES_URL: &str = "https://api.example.com/api/feature-management/features";
  const OTHER_URL: &str = "https://api.example.com/api/app/plant-request";

  /// Transport returning a fixed result and counting calls.
  #[derive(Clone)]
  struct FakeTransport {
    result: Arc<dyn Fn() -> Result<Value, HttpError> + Send + Sync>,
    calls: Arc<AtomicUsize>,
  }

  impl FakeTransport {
    fn ok(body: Value) -> Self {
      Self {
        result: Arc::new(move || Ok(body.clone())),
        calls: Arc::new(AtomicUsize::new(0)),
      }
    }

    fn err(error: HttpError) -> Self {
      Self {
        result: Arc::new(move || Err(error.clone())),
        calls: Arc::new(AtomicUsize::new(0)),
      }
    }

    fn call_count(&self) -> usize {
      self.calls.load(Ordering::SeqCst)
    }
  }

  impl HttpTransport for FakeTransport {
    async fn get_json(&self, _url: &str) -> Result<Value, HttpError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      (self.result)()
    }
  }

  fn fetcher(transport: FakeTransport, online: bool) -> (OfflineFetcher<FakeTransport>, OfflineCache) {
    let storage: Arc<dyn KeyValueStorage> = Arc::new(MemoryStorage::new());
    let cache = OfflineCache::new(storage.clone());
    let monitor = Arc::new(ConnectivityMonitor::new(online));
    let fetcher = OfflineFetcher::new(
      transport,
      cache.clone(),
      monitor,
      storage,
      vec![
        "/api/abp/application-configuration".into(),
        "/api/feature-management/".into(),
      ],
      vec!["/api/abp/application-configuration".into()],
    );
    (fetcher, cache)
  }

  #[tokio::test]
  async fn test_passthrough_for_unlisted_url() {
    let transport = FakeTransport::err(HttpError::Transport("down".into()));
    let (fetcher, _) = fetcher(transport.clone(), false);

    let result = fetcher.get(OTHER_URL).await;
    assert!(matches!(result, Err(HttpError::Transport(_))));
    assert_eq!(transport.call_count(), 1);
  }

  #[tokio::test]
  async fn test_offline_serves_cache_without_network() {
    let transport = FakeTransport::err(HttpError::Transport("down".into()));
    let (fetcher, cache) = fetcher(transport.clone(), false);
    cache.set(&format!("GET:{CONFIG_URL}"), &json!({"cached": true}));

    let body = fetcher.get(CONFIG_URL).await.unwrap();
    assert_eq!(body, json!({"cached": true}));
    assert_eq!(transport.call_count(), 0);
  }

  #[tokio::test]
  async fn test_offline_critical_without_cache_serves_fallback() {
    let transport = FakeTransport::err(HttpError::Transport("down".into()));
    let (fetcher, _) = fetcher(transport.clone(), false);

    let body = fetcher.get(CONFIG_URL).await.unwrap();
    assert_eq!(body["currentUser"]["isAuthenticated"], false);
    assert_eq!(transport.call_count(), 0);
  }

  #[tokio::test]
  async fn test_success_writes_cache() {
    let transport = FakeTransport::ok(json!({"fresh": 1}));
    let (fetcher, cache) = fetcher(transport, true);

    let body = fetcher.get(CONFIG_URL).await.unwrap();
    assert_eq!(body, json!({"fresh": 1}));
    assert_eq!(
      cache.get::<Value>(&format!("GET:{CONFIG_URL}")).unwrap(),
      json!({"fresh": 1})
    );
  }

  #[tokio::test]
  async fn test_network_failure_falls_back_to_cache() {
    let transport = FakeTransport::err(HttpError::Status {
      status: 504,
      message: "gateway timeout".into(),
    });
    let (fetcher, cache) = fetcher(transport, true);
    cache.set(&format!("GET:{FEATURES_URL}"), &json!({"flags": []}));

    let body = fetcher.get(FEATURES_URL).await.unwrap();
    assert_eq!(body, json!({"flags": []}));
  }

  #[tokio::test]
  async fn test_network_failure_cacheable_returns_empty_body() {
    let transport = FakeTransport::err(HttpError::Transport("down".into()));
    let (fetcher, _) = fetcher(transport, true);

    // Cacheable but not critical, no cache: empty success, not an error
    let body = fetcher.get(FEATURES_URL).await.unwrap();
    assert_eq!(body, json!({}));
  }

  #[tokio::test]
  async fn test_non_connectivity_error_propagates() {
    let transport = FakeTransport::err(HttpError::Status {
      status: 500,
      message: "boom".into(),
    });
    let (fetcher, _) = fetcher(transport, true);

    let result = fetcher.get(FEATURES_URL).await;
    assert_eq!(
      result.unwrap_err(),
      HttpError::Status {
        status: 500,
        message: "boom".into()
      }
    );
  }
}
