//! Locally created plant requests pending remote confirmation.
//!
//! Append-only: records are created on submission, flipped to synced by
//! the synchronizer once the server confirms them, and never deleted. The
//! full list is persisted as one JSON document on every mutation; if the
//! write fails the in-memory list stays authoritative for the rest of the
//! process (and is lost on restart).

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use uuid::Uuid;

use crate::storage::KeyValueStorage;

/// Storage key for the whole record list.
pub const STORE_KEY: &str = "plant_requests";

/// Maximum length for each user-supplied field.
const MAX_FIELD_LEN: usize = 64;

/// A locally created plant request.
///
/// `server_id` is present exactly when `synced` is true.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LocalRecord {
  pub local_id: Uuid,
  pub week: String,
  pub region: String,
  pub company: String,
  pub synced: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub server_id: Option<String>,
  pub created_at: DateTime<Utc>,
}

/// Validated user-supplied fields for a new request.
#[derive(Debug, Clone)]
pub struct RecordFields {
  pub week: String,
  pub region: String,
  pub company: String,
}

impl RecordFields {
  /// Validate and normalize the fields: required, trimmed, bounded length.
  pub fn new(week: &str, region: &str, company: &str) -> Result<Self> {
    let field = |name: &str, value: &str| -> Result<String> {
      let value = value.trim();
      if value.is_empty() {
        return Err(eyre!("{} is required", name));
      }
      if value.len() > MAX_FIELD_LEN {
        return Err(eyre!("{} must be at most {} characters", name, MAX_FIELD_LEN));
      }
      Ok(value.to_string())
    };

    Ok(Self {
      week: field("week", week)?,
      region: field("region", region)?,
      company: field("company", company)?,
    })
  }
}

/// Ordered, locally persisted list of plant requests.
pub struct RecordStore {
  storage: Arc<dyn KeyValueStorage>,
  records: Mutex<Vec<LocalRecord>>,
}

impl RecordStore {
  /// Create a store, loading any previously persisted records.
  pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
    let records = Self::load(&*storage);
    Self {
      storage,
      records: Mutex::new(records),
    }
  }

  fn load(storage: &dyn KeyValueStorage) -> Vec<LocalRecord> {
    let json = match storage.get_item(STORE_KEY) {
      Ok(Some(json)) => json,
      Ok(None) => return Vec::new(),
      Err(e) => {
        warn!(error = %e, "Failed to load records from storage");
        return Vec::new();
      }
    };

    match serde_json::from_str(&json) {
      Ok(records) => records,
      Err(e) => {
        warn!(error = %e, "Failed to parse persisted records");
        Vec::new()
      }
    }
  }

  /// Append a new pending record and persist the list.
  pub fn add(&self, fields: RecordFields) -> LocalRecord {
    let record = LocalRecord {
      local_id: Uuid::new_v4(),
      week: fields.week,
      region: fields.region,
      company: fields.company,
      synced: false,
      server_id: None,
      created_at: Utc::now(),
    };

    let mut records = self.records.lock().expect("record store lock poisoned");
    records.push(record.clone());
    self.persist(&records);

    info!(local_id = %record.local_id, "Added pending request");
    record
  }

  /// Mark the record with `local_id` as confirmed by the server. Unknown
  /// ids and repeated calls are no-ops.
  pub fn mark_synced(&self, local_id: Uuid, server_id: &str) {
    let mut records = self.records.lock().expect("record store lock poisoned");

    let mut changed = false;
    for record in records.iter_mut() {
      if record.local_id == local_id && !record.synced {
        record.synced = true;
        record.server_id = Some(server_id.to_string());
        changed = true;
      }
    }

    if changed {
      self.persist(&records);
      info!(%local_id, server_id, "Request marked synced");
    }
  }

  /// All records, in creation order.
  pub fn records(&self) -> Vec<LocalRecord> {
    self.records.lock().expect("record store lock poisoned").clone()
  }

  /// Records not yet confirmed by the server.
  pub fn pending(&self) -> Vec<LocalRecord> {
    self
      .records()
      .into_iter()
      .filter(|r| !r.synced)
      .collect()
  }

  pub fn pending_count(&self) -> usize {
    self.pending().len()
  }

  pub fn synced_count(&self) -> usize {
    self.records().iter().filter(|r| r.synced).count()
  }

  fn persist(&self, records: &[LocalRecord]) {
    let json = match serde_json::to_string(records) {
      Ok(json) => json,
      Err(e) => {
        warn!(error = %e, "Failed to serialize records");
        return;
      }
    };

    if let Err(e) = self.storage.set_item(STORE_KEY, &json) {
      warn!(error = %e, "Failed to persist records; in-memory state kept");
    }
  }
}
