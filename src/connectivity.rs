//! Process-wide connectivity state.
//!
//! One boolean, flipped only by explicit online/offline events fed in by
//! the app (startup probe, watch-mode probe transitions). Reads are pure;
//! genuine flips are published on a watch channel so the synchronizer can
//! react to reconnect. The flag can be stale if the signal source itself
//! is wrong (captive portals look online).

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tracing::info;

pub struct ConnectivityMonitor {
  online: AtomicBool,
  tx: watch::Sender<bool>,
}

impl ConnectivityMonitor {
  /// Create a monitor initialized from the current platform signal.
  pub fn new(initially_online: bool) -> Self {
    let (tx, _) = watch::channel(initially_online);
    Self {
      online: AtomicBool::new(initially_online),
      tx,
    }
  }

  pub fn is_online(&self) -> bool {
    self.online.load(Ordering::Relaxed)
  }

  pub fn is_offline(&self) -> bool {
    !self.is_online()
  }

  /// Handle an online/offline event. Repeated events with the same value
  /// are ignored; a genuine flip is published to subscribers.
  pub fn set_online(&self, online: bool) {
    let previous = self.online.swap(online, Ordering::Relaxed);
    if previous != online {
      info!(online, "Connectivity changed");
      let _ = self.tx.send(online);
    }
  }

  /// Subscribe to connectivity flips. The receiver yields the new state
  /// each time it changes.
  pub fn subscribe(&self) -> watch::Receiver<bool> {
    self.tx.subscribe()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_initial_state() {
    assert!(ConnectivityMonitor::new(true).is_online());
    assert!(ConnectivityMonitor::new(false).is_offline());
  }

  #[test]
  fn test_events_flip_flag() {
    let monitor = ConnectivityMonitor::new(true);

    monitor.set_online(false);
    assert!(monitor.is_offline());

    monitor.set_online(true);
    assert!(monitor.is_online());
  }

  #[tokio::test]
  async fn test_subscribers_see_flips() {
    let monitor = ConnectivityMonitor::new(false);
    let mut rx = monitor.subscribe();

    monitor.set_online(true);
    rx.changed().await.unwrap();
    assert!(*rx.borrow());
  }

  #[test]
  fn test_repeated_event_does_not_notify() {
    let monitor = ConnectivityMonitor::new(true);
    let rx = monitor.subscribe();

    monitor.set_online(true);
    assert!(!rx.has_changed().unwrap());
  }
}
