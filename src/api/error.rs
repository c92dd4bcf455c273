//! Typed HTTP errors.
//!
//! The app-level code uses `color_eyre` throughout; this small enum exists
//! where callers need the status class itself: sync error formatting and
//! the error silencer.

use std::fmt;

/// An HTTP call failure, split into the two classes the offline logic
/// cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpError {
  /// The request never produced a response (DNS, connect, timeout). The
  /// browser-era equivalent of status 0.
  Transport(String),
  /// The server answered with a non-success status.
  Status { status: u16, message: String },
}

impl HttpError {
  /// Status code, with transport failures mapped to 0.
  pub fn status(&self) -> u16 {
    match self {
      Self::Transport(_) => 0,
      Self::Status { status, .. } => *status,
    }
  }

  /// Whether this failure is connectivity-class: transport-level, or a
  /// gateway-unreachable status.
  pub fn is_connectivity(&self) -> bool {
    matches!(self.status(), 0 | 502..=504)
  }

  pub fn from_reqwest(e: reqwest::Error) -> Self {
    match e.status() {
      Some(status) => Self::Status {
        status: status.as_u16(),
        message: e.to_string(),
      },
      None => Self::Transport(e.to_string()),
    }
  }
}

impl fmt::Display for HttpError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Transport(message) => write!(f, "transport error: {}", message),
      Self::Status { status, message } => write!(f, "HTTP {}: {}", status, message),
    }
  }
}

impl std::error::Error for HttpError {}
