//! Synchronizer: critical-data refresh plus pending-record replay.
//!
//! A sync pass first re-fetches the configured critical read endpoints
//! (each success lands in the cache via the interceptor, each failure is
//! swallowed), then replays every pending local record to the server,
//! strictly one at a time. The busy flag makes overlapping triggers
//! no-ops; a record added mid-pass waits for the next pass because the
//! pending list is snapshotted once. Every entry into Syncing reaches
//! Complete; there is no cancellation.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::api::{CreateRecordDto, HttpError, HttpTransport, OfflineFetcher, RecordApi};
use crate::connectivity::ConnectivityMonitor;
use crate::records::{LocalRecord, RecordStore};
use crate::storage::KeyValueStorage;

/// Storage key for the persisted last-sync timestamp.
pub const LAST_SYNC_KEY: &str = "offline_last_sync";

/// Aggregate result of one sync pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncResult {
  /// True when every replayed record succeeded and connectivity was
  /// available for the whole pass.
  pub success: bool,
  pub total_synced: usize,
  pub total_failed: usize,
  pub errors: Vec<String>,
}

impl SyncResult {
  pub fn outcome(&self) -> SyncOutcome {
    if self.success {
      SyncOutcome::Success
    } else if self.total_synced > 0 {
      SyncOutcome::Partial
    } else {
      SyncOutcome::Failure
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
  Success,
  Partial,
  Failure,
}

/// Synchronizer state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState {
  Idle,
  Syncing,
  Complete(SyncOutcome),
}

/// Transient, in-memory sync status. Only `last_sync_time` survives a
/// restart (via storage).
#[derive(Debug, Clone)]
pub struct SyncStatus {
  pub state: SyncState,
  pub last_sync_time: Option<DateTime<Utc>>,
  pub error: Option<String>,
  /// The overlay-bearing sync keeps its result visible until the caller
  /// dismisses it.
  pub show_overlay: bool,
  pub last_result: Option<SyncResult>,
}

impl SyncStatus {
  pub fn is_syncing(&self) -> bool {
    self.state == SyncState::Syncing
  }
}

pub struct Synchronizer<T: HttpTransport, A: RecordApi> {
  fetcher: OfflineFetcher<T>,
  api: A,
  store: Arc<RecordStore>,
  monitor: Arc<ConnectivityMonitor>,
  storage: Arc<dyn KeyValueStorage>,
  critical_urls: Vec<String>,
  busy: AtomicBool,
  status: Mutex<SyncStatus>,
}

impl<T: HttpTransport, A: RecordApi> Synchronizer<T, A> {
  pub fn new(
    fetcher: OfflineFetcher<T>,
    api: A,
    store: Arc<RecordStore>,
    monitor: Arc<ConnectivityMonitor>,
    storage: Arc<dyn KeyValueStorage>,
    critical_urls: Vec<String>,
  ) -> Self {
    let last_sync_time = load_last_sync(&*storage);
    Self {
      fetcher,
      api,
      store,
      monitor,
      storage,
      critical_urls,
      busy: AtomicBool::new(false),
      status: Mutex::new(SyncStatus {
        state: SyncState::Idle,
        last_sync_time,
        error: None,
        show_overlay: false,
        last_result: None,
      }),
    }
  }

  pub fn status(&self) -> SyncStatus {
    self.status.lock().expect("sync status lock poisoned").clone()
  }

  fn update_status(&self, f: impl FnOnce(&mut SyncStatus)) {
    let mut status = self.status.lock().expect("sync status lock poisoned");
    f(&mut status);
  }

  /// Silent variant: refresh the critical endpoint caches and the
  /// last-sync timestamp, nothing else. Skipped while offline or while
  /// another pass is running.
  pub async fn sync_critical_data(&self) {
    if self
      .busy
      .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
      .is_err()
    {
      debug!("Sync already in progress, skipping");
      return;
    }

    if self.monitor.is_offline() {
      debug!("Offline, skipping critical-data sync");
      self.busy.store(false, Ordering::SeqCst);
      return;
    }

    self.update_status(|s| {
      s.state = SyncState::Syncing;
      s.error = None;
    });

    self.refresh_critical().await;

    self.update_status(|s| s.state = SyncState::Idle);
    self.busy.store(false, Ordering::SeqCst);
    info!("Critical data synced");
  }

  /// Overlay-bearing variant: refresh critical data, then replay every
  /// pending record. Returns `None` when a pass is already running. The
  /// completed status stays visible until [`Synchronizer::dismiss`].
  pub async fn full_sync(&self) -> Option<SyncResult> {
    if self
      .busy
      .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
      .is_err()
    {
      debug!("Sync already in progress, skipping");
      return None;
    }

    self.update_status(|s| {
      s.state = SyncState::Syncing;
      s.show_overlay = true;
      s.error = None;
    });

    let was_online = self.monitor.is_online();
    if was_online {
      self.refresh_critical().await;
    }

    // Snapshot once; records added mid-pass wait for the next pass
    let pending = self.store.pending();
    let mut total_synced = 0;
    let mut errors = Vec::new();

    for record in &pending {
      let dto = CreateRecordDto {
        week: record.week.clone(),
        region: record.region.clone(),
        company: record.company.clone(),
      };

      match self.api.create(&dto).await {
        Ok(created) => {
          self.store.mark_synced(record.local_id, &created.id);
          total_synced += 1;
        }
        Err(e) => {
          warn!(local_id = %record.local_id, error = %e, "Failed to sync record");
          errors.push(format_sync_error(record, &e));
        }
      }
    }

    let result = SyncResult {
      success: errors.is_empty() && was_online,
      total_synced,
      total_failed: errors.len(),
      errors,
    };

    info!(
      synced = result.total_synced,
      failed = result.total_failed,
      "Sync pass complete"
    );

    self.update_status(|s| {
      s.state = SyncState::Complete(result.outcome());
      s.last_result = Some(result.clone());
      if !was_online {
        s.error = Some("Cannot sync while offline".to_string());
      } else {
        s.error = result.errors.first().cloned();
      }
    });

    self.busy.store(false, Ordering::SeqCst);
    Some(result)
  }

  /// Dismiss the overlay after a completed pass.
  pub fn dismiss(&self) {
    self.update_status(|s| s.show_overlay = false);
  }

  /// Human-readable time since the last successful critical-data sync.
  pub fn time_since_last_sync(&self) -> String {
    format_time_since(self.status().last_sync_time, Utc::now())
  }

  async fn refresh_critical(&self) {
    for url in &self.critical_urls {
      // The interceptor caches each success; failures don't abort the rest
      match self.fetcher.get(url).await {
        Ok(_) => debug!(url, "Refreshed critical endpoint"),
        Err(e) => warn!(url, error = %e, "Failed to refresh critical endpoint"),
      }
    }

    let now = Utc::now();
    if let Err(e) = self.storage.set_item(LAST_SYNC_KEY, &now.to_rfc3339()) {
      warn!(error = %e, "Failed to persist last sync time");
    }
    self.update_status(|s| s.last_sync_time = Some(now));
  }
}

fn load_last_sync(storage: &dyn KeyValueStorage) -> Option<DateTime<Utc>> {
  let stored = storage.get_item(LAST_SYNC_KEY).ok().flatten()?;
  DateTime::parse_from_rfc3339(&stored)
    .ok()
    .map(|dt| dt.with_timezone(&Utc))
}

/// Per-record failure message shown in the sync report.
fn format_sync_error(record: &LocalRecord, error: &HttpError) -> String {
  let reason = match error.status() {
    0 => "No connectivity".to_string(),
    401 => "Session expired, sign in again".to_string(),
    403 => "Not allowed".to_string(),
    500 => "Server error".to_string(),
    status => format!("Request failed ({status})"),
  };

  format!(
    "{} / {} / {}: {}",
    record.week, record.region, record.company, reason
  )
}

fn format_time_since(last: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
  let Some(last) = last else {
    return "Never".to_string();
  };

  let elapsed = now - last;
  if elapsed.num_minutes() < 1 {
    "Just now".to_string()
  } else if elapsed.num_minutes() < 60 {
    format!("{} min ago", elapsed.num_minutes())
  } else if elapsed.num_hours() < 24 {
    format!("{}h ago", elapsed.num_hours())
  } else {
    format!("{}d ago", elapsed.num_days())
  }
}
