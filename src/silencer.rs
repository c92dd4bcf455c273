//! Error reporting with offline silencing.
//!
//! Connectivity-class failures against configuration endpoints are
//! expected noise when the device is offline; surfacing them would make
//! every cold start look broken. The silencing reporter wraps any other
//! reporter and drops exactly those errors, forwarding everything else.

use std::sync::Arc;
use tracing::{debug, error};

use crate::api::HttpError;
use crate::connectivity::ConnectivityMonitor;

/// Sink for HTTP-classified errors.
pub trait ErrorReporter: Send + Sync {
  fn report(&self, error: &HttpError, url: &str);
}

/// Reporter that logs through `tracing`.
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
  fn report(&self, err: &HttpError, url: &str) {
    error!(url, status = err.status(), error = %err, "HTTP error");
  }
}

/// Decorator that silences connectivity-class errors while offline or for
/// allow-listed configuration endpoints.
pub struct SilencingReporter<R: ErrorReporter> {
  inner: R,
  monitor: Arc<ConnectivityMonitor>,
  silent_urls: Vec<String>,
}

impl<R: ErrorReporter> SilencingReporter<R> {
  pub fn new(inner: R, monitor: Arc<ConnectivityMonitor>, silent_urls: Vec<String>) -> Self {
    Self {
      inner,
      monitor,
      silent_urls,
    }
  }

  fn should_silence(&self, error: &HttpError, url: &str) -> bool {
    if !error.is_connectivity() {
      return false;
    }

    if self.monitor.is_offline() {
      return true;
    }

    self.silent_urls.iter().any(|p| url.contains(p.as_str()))
  }
}

impl<R: ErrorReporter> ErrorReporter for SilencingReporter<R> {
  fn report(&self, err: &HttpError, url: &str) {
    if self.should_silence(err, url) {
      debug!(url, "Silencing offline error");
      return;
    }

    self.inner.report(err, url);
  }
}
