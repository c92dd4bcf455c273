//! The transport seam: the interceptor and synchronizer talk to the
//! network through this trait so tests can substitute fakes.

use serde_json::Value;
use std::time::Duration;

use super::error::HttpError;

/// A JSON GET transport.
#[allow(async_fn_in_trait)]
pub trait HttpTransport: Clone {
  /// Perform a GET and parse the body as JSON.
  async fn get_json(&self, url: &str) -> Result<Value, HttpError>;
}

/// Transport backed by a shared `reqwest` client. No retries; platform
/// defaults for timeouts.
#[derive(Clone)]
pub struct ReqwestTransport {
  client: reqwest::Client,
}

impl ReqwestTransport {
  pub fn new(client: reqwest::Client) -> Self {
    Self { client }
  }
}

impl HttpTransport for ReqwestTransport {
  async fn get_json(&self, url: &str) -> Result<Value, HttpError> {
    let response = self
      .client
      .get(url)
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

    response
      .json()
      .await
      .map_err(HttpError::from_reqwest)
  }
}

/// Probe current connectivity with a single cheap request against the API
/// root. This is the CLI's stand-in for the platform online signal; it
/// runs at startup and on each watch-mode tick, never inside the monitor.
pub async fn probe(client: &reqwest::Client, base_url: &str) -> bool {
  let request = client
    .head(base_url)
    .timeout(Duration::from_secs(5))
    .send()
    .await;

  // Any response at all means the network path is up
  request.is_ok()
}
