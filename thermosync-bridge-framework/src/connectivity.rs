//! Bus connectivity tracking.
//!
//! Zenoh reconnects on its own, so a bridge never sees an explicit
//! "connected" callback. Instead, the [`ConnectivityMonitor`] samples the
//! session's neighbour set (routers and peers) at a fixed period and reports
//! each transition through a `tokio::sync::watch` channel.
//!
//! Every move from isolated to connected bumps a generation counter, so a
//! receiver that misses intermediate states still notices that a new
//! connection happened.
//!
//! # Example
//!
//! ```ignore
//! let mut connectivity = ConnectivityMonitor::new(session.clone()).start().await;
//!
//! while connectivity.changed().await.is_ok() {
//!     if connectivity.borrow_and_update().is_connected() {
//!         // republish state
//!     }
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use zenoh::Session;

/// Default sampling period for the neighbour set.
pub const DEFAULT_CHECK_PERIOD: Duration = Duration::from_secs(1);

/// Connectivity state of a bridge session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    /// No router or peer is reachable.
    Isolated,
    /// At least one router or peer is reachable.
    Connected {
        /// Number of isolated → connected transitions observed so far.
        generation: u64,
    },
}

impl Connectivity {
    /// Whether the session currently reaches anyone.
    pub fn is_connected(&self) -> bool {
        matches!(self, Connectivity::Connected { .. })
    }
}

/// Turns neighbour-count samples into [`Connectivity`] transitions.
#[derive(Debug, Default)]
pub struct ConnectivityTracker {
    connected: bool,
    generation: u64,
}

impl ConnectivityTracker {
    /// Create a tracker that starts out isolated.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> Connectivity {
        if self.connected {
            Connectivity::Connected {
                generation: self.generation,
            }
        } else {
            Connectivity::Isolated
        }
    }

    /// Record a sample. Returns the new state if it differs from the previous one.
    pub fn observe(&mut self, neighbours: usize) -> Option<Connectivity> {
        let connected = neighbours > 0;
        if connected == self.connected {
            return None;
        }
        self.connected = connected;
        if connected {
            self.generation += 1;
        }
        Some(self.state())
    }
}

/// Periodically samples a session's neighbours and publishes transitions.
pub struct ConnectivityMonitor {
    session: Arc<Session>,
    period: Duration,
}

impl ConnectivityMonitor {
    /// Create a monitor with the default period.
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            period: DEFAULT_CHECK_PERIOD,
        }
    }

    /// Take a first sample, then keep sampling in a background task.
    ///
    /// The returned receiver starts with the first sample marked as seen, so
    /// only later transitions wake it up. The task stops once every receiver
    /// has been dropped.
    pub async fn start(self) -> watch::Receiver<Connectivity> {
        let mut tracker = ConnectivityTracker::new();
        tracker.observe(thermosync_common::session::neighbour_count(&self.session).await);

        let (tx, rx) = watch::channel(tracker.state());
        tracing::debug!(state = ?tracker.state(), "Connectivity monitor started");

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if tx.is_closed() {
                    break;
                }

                let neighbours = thermosync_common::session::neighbour_count(&self.session).await;
                if let Some(state) = tracker.observe(neighbours) {
                    match state {
                        Connectivity::Connected { generation } => {
                            tracing::info!(neighbours, generation, "Bus connection (re)established");
                        }
                        Connectivity::Isolated => {
                            tracing::warn!("Bus connection lost, no routers or peers reachable");
                        }
                    }
                    if tx.send(state).is_err() {
                        break;
                    }
                }
            }
        });

        rx
    }
}
