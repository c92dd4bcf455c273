//! Application wiring and command handlers.
//!
//! Everything shared (storage, cache, connectivity, record store,
//! synchronizer) is owned by one [`AppContext`] built in `main` and passed
//! around by reference; there are no singletons.

use color_eyre::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::api::{
  transport::probe, OfflineFetcher, RecordApi, RecordApiClient, ReqwestTransport,
};
use crate::cache::OfflineCache;
use crate::config::Config;
use crate::connectivity::ConnectivityMonitor;
use crate::records::{RecordFields, RecordStore};
use crate::silencer::{ErrorReporter, SilencingReporter, TracingReporter};
use crate::storage::{KeyValueStorage, MemoryStorage, SqliteStorage};
use crate::sync::{SyncResult, Synchronizer};

pub struct AppContext {
  config: Config,
  http: reqwest::Client,
  cache: OfflineCache,
  monitor: Arc<ConnectivityMonitor>,
  store: Arc<RecordStore>,
  fetcher: OfflineFetcher<ReqwestTransport>,
  api: RecordApiClient,
  sync: Synchronizer<ReqwestTransport, RecordApiClient>,
  reporter: SilencingReporter<TracingReporter>,
}

impl AppContext {
  /// Build the full object graph: storage (degrading to in-memory if the
  /// database won't open), connectivity from a startup probe, and the
  /// offline plumbing around the HTTP client.
  pub async fn new(config: Config) -> Result<Self> {
    let http = build_http_client()?;

    let storage: Arc<dyn KeyValueStorage> = match open_storage(&config) {
      Ok(storage) => storage,
      Err(e) => {
        warn!(error = %e, "Falling back to in-memory storage");
        Arc::new(MemoryStorage::new())
      }
    };

    let online = probe(&http, &config.api.url).await;
    let monitor = Arc::new(ConnectivityMonitor::new(online));
    info!(online, "Startup connectivity");

    let cache = OfflineCache::new(storage.clone());
    let store = Arc::new(RecordStore::new(storage.clone()));

    let fetcher = OfflineFetcher::new(
      ReqwestTransport::new(http.clone()),
      cache.clone(),
      monitor.clone(),
      storage.clone(),
      config.offline.cacheable_urls.clone(),
      config.offline.critical_urls.clone(),
    );

    let api = RecordApiClient::new(http.clone(), &config.api.url);

    let sync = Synchronizer::new(
      fetcher.clone(),
      api.clone(),
      store.clone(),
      monitor.clone(),
      storage,
      config.critical_sync_urls(),
    );

    let reporter = SilencingReporter::new(
      TracingReporter,
      monitor.clone(),
      config.offline.silent_urls.clone(),
    );

    Ok(Self {
      config,
      http,
      cache,
      monitor,
      store,
      fetcher,
      api,
      sync,
      reporter,
    })
  }

  /// Perform the framework startup reads through the interceptor so boot
  /// always resolves, then refresh caches if we came up online.
  pub async fn bootstrap(&self) {
    for url in self.config.startup_urls() {
      match self.fetcher.get(&url).await {
        Ok(_) => debug!(url, "Startup read resolved"),
        Err(e) => self.reporter.report(&e, &url),
      }
    }

    if self.monitor.is_online() {
      self.sync.sync_critical_data().await;
    }
  }

  /// Add a request locally and, when online, push it to the server right
  /// away.
  pub async fn submit(&self, week: &str, region: &str, company: &str) -> Result<()> {
    let fields = RecordFields::new(week, region, company)?;
    let record = self.store.add(fields);
    println!("Saved request {} locally.", record.local_id);

    if self.monitor.is_offline() {
      println!("Offline: the request will sync when connectivity returns.");
      return Ok(());
    }

    if let Some(result) = self.sync.full_sync().await {
      self.print_sync_report(&result);
      self.sync.dismiss();
    }

    Ok(())
  }

  /// Print all local records in creation order.
  pub fn list(&self) {
    let records = self.store.records();
    if records.is_empty() {
      println!("No requests yet.");
      return;
    }

    for record in records {
      let state = if record.synced {
        format!("synced as {}", record.server_id.as_deref().unwrap_or("?"))
      } else {
        "pending".to_string()
      };
      println!(
        "{}  {} / {} / {}  [{}]",
        record.created_at.format("%Y-%m-%d %H:%M"),
        record.week,
        record.region,
        record.company,
        state
      );
    }
  }

  /// Fetch and print the records the server knows about.
  pub async fn list_remote(&self) -> Result<()> {
    let records = self.api.list().await?;
    if records.is_empty() {
      println!("No requests on the server.");
      return Ok(());
    }

    for record in records {
      println!(
        "{}  {} / {} / {}  [{}]",
        record.creation_time, record.week, record.region, record.company, record.id
      );
    }
    Ok(())
  }

  /// Print connectivity, counters, and last sync time.
  pub fn status(&self) {
    let connectivity = if self.monitor.is_online() {
      "online"
    } else {
      "offline"
    };

    println!("Connectivity: {connectivity}");
    println!("Pending:      {}", self.store.pending_count());
    println!("Synced:       {}", self.store.synced_count());
    println!("Last sync:    {}", self.sync.time_since_last_sync());
  }

  /// Explicit user-triggered sync pass.
  pub async fn sync_now(&self) {
    match self.sync.full_sync().await {
      Some(result) => {
        self.print_sync_report(&result);
        self.sync.dismiss();
      }
      None => println!("A sync is already running."),
    }
  }

  /// Long-running mode: re-probe connectivity on an interval, feed the
  /// monitor, and run a full sync on each offline-to-online transition.
  pub async fn watch(&self, interval: Duration) {
    println!("Watching connectivity; syncing on reconnect. Ctrl-C to stop.");
    let mut rx = self.monitor.subscribe();

    loop {
      let online = probe(&self.http, &self.config.api.url).await;
      self.monitor.set_online(online);

      let reconnected = rx.has_changed().unwrap_or(false) && *rx.borrow_and_update();
      if reconnected {
        println!("Back online, syncing...");
        if let Some(result) = self.sync.full_sync().await {
          self.print_sync_report(&result);
          self.sync.dismiss();
        }
      }

      tokio::time::sleep(interval).await;
    }
  }

  /// Drop every cached response, leaving records and tokens in place.
  pub fn clear_cache(&self) {
    self.cache.clear();
    println!("Offline cache cleared.");
  }

  fn print_sync_report(&self, result: &SyncResult) {
    if result.success {
      println!(
        "Sync complete: {} request(s) synced, {} on server.",
        result.total_synced,
        self.store.synced_count()
      );
      return;
    }

    println!(
      "Sync finished with problems: {} synced, {} failed.",
      result.total_synced, result.total_failed
    );
    for error in &result.errors {
      println!("  - {error}");
    }
    if result.total_failed > 0 {
      println!("Pending requests are kept; run `plantreq sync` to retry.");
    }
  }
}

fn build_http_client() -> Result<reqwest::Client> {
  let mut headers = reqwest::header::HeaderMap::new();
  if let Some(token) = Config::get_api_token() {
    let value = format!("Bearer {token}");
    if let Ok(header) = reqwest::header::HeaderValue::from_str(&value) {
      headers.insert(reqwest::header::AUTHORIZATION, header);
    }
  }

  Ok(
    reqwest::Client::builder()
      .default_headers(headers)
      .build()?,
  )
}

fn open_storage(config: &Config) -> Result<Arc<dyn KeyValueStorage>> {
  let storage = match &config.storage.path {
    Some(path) => SqliteStorage::open_at(path)?,
    None => SqliteStorage::open()?,
  };
  Ok(Arc::new(storage))
}
