//! Client for the backend's plant-request CRUD endpoint.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::HttpError;

/// Body for creating a plant request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreateRecordDto {
  pub week: String,
  pub region: String,
  pub company: String,
}

/// A plant request as the server returns it. `status` is the backend's
/// enum: 0 pending, 1 synced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RecordDto {
  pub id: String,
  pub week: String,
  pub region: String,
  pub company: String,
  pub status: i32,
  pub creation_time: String,
}

/// The two operations the synchronizer needs, as a trait so sync tests
/// can run against a scripted fake.
#[allow(async_fn_in_trait)]
pub trait RecordApi {
  /// Create a record; the response carries the server-assigned id.
  async fn create(&self, dto: &CreateRecordDto) -> Result<RecordDto, HttpError>;

  /// List all records.
  async fn list(&self) -> Result<Vec<RecordDto>, HttpError>;
}

/// `reqwest`-backed implementation. No retries, no timeout beyond the
/// client defaults; failures surface as typed errors.
#[derive(Clone)]
pub struct RecordApiClient {
  client: reqwest::Client,
  endpoint: String,
}

impl RecordApiClient {
  pub fn new(client: reqwest::Client, base_url: &str) -> Self {
    Self {
      client,
      endpoint: format!("{}/api/app/plant-request", base_url.trim_end_matches('/')),
    }
  }
}

impl RecordApi for RecordApiClient {
  async fn create(&self, dto: &CreateRecordDto) -> Result<RecordDto, HttpError> {
    debug!(week = %dto.week, region = %dto.region, "Creating record on server");

    let response = self
      .client
      .post(&self.endpoint)
      .json(dto)
      .send()
      .await
      .map_err(HttpError::from_reqwest)?;

    let status = response.status();
    if !status.is_success() {
      let message = response.text().await.unwrap_or_default();
      return Err(HttpError::Status {
        status: status.as_u16(),
        message,
      });
    }

    response.json().await.map_err(HttpError::from_reqwest)
  }

  async fn list(&self) -> Result<Vec<RecordDto>, HttpError> {
    let response = self
      .client
      .get(&self.endpoint)
      .send()
      .await
      .map_err(HttpError::from_reqwest)?;

    let status = response.status();
    if !status.is_success() {
      let message = response.text().await.unwrap_or_default();
      return Err(HttpError::Status {
        status: status.as_u16(),
        message,
      });
    }

    response.json().await.map_err(HttpError::from_reqwest)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_endpoint_normalizes_trailing_slash() {
    let client = RecordApiClient::new(reqwest::Client::new(), "https://api.example.com/");
    assert_eq!(
      client.endpoint,
      "https://api.example.com/api/app/plant-request"
    );
  }

  #[test]
  fn test_dto_wire_shape() {
    let dto = CreateRecordDto {
      week: "W1".into(),
      region: "R1".into(),
      company: "C1".into(),
    };
    let json = serde_json::to_value(&dto).unwrap();
    assert_eq!(
      json,
      serde_json::json!({"week": "W1", "region": "R1", "company": "C1"})
    );

    let record: RecordDto = serde_json::from_value(serde_json::json!({
      "id": "srv-1",
      "week": "W1",
      "region": "R1",
      "company": "C1",
      "status": 1,
      "creationTime": "2026-01-28T13:47:35Z",
    }))
    .unwrap();
    assert_eq!(record.creation_time, "2026-01-28T13:47:35Z");
  }
}
