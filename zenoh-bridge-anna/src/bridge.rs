//! Bridge state and event loop.

use std::time::Duration;

use thermosync_bridge_framework::{Connectivity, InboundMessage};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

use crate::bus::Bus;
use crate::cache::SyncCache;
use crate::config::{AnnaConfig, ConfigError};
use crate::device::DeviceTransport;
use crate::extractor::Extractor;

/// Owns everything the poll cycle and the command path share.
///
/// All mutation goes through `&mut self`, and [`AnnaBridge::run`] handles one
/// event at a time, so cache updates from polls, commands and reconnects
/// never interleave.
pub struct AnnaBridge<D> {
    pub(crate) device: D,
    pub(crate) extractor: Extractor,
    pub(crate) cache: SyncCache,
    pub(crate) identifier: Option<String>,
    pub(crate) control_field: String,
    poll_interval: Duration,
}

impl<D: DeviceTransport> AnnaBridge<D> {
    /// Create a bridge from its parts.
    pub fn new(
        device: D,
        extractor: Extractor,
        cache: SyncCache,
        control_field: impl Into<String>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            device,
            extractor,
            cache,
            identifier: None,
            control_field: control_field.into(),
            poll_interval,
        }
    }

    /// Create a bridge from validated configuration.
    pub fn from_config(device: D, config: &AnnaConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(
            device,
            config.build_extractor()?,
            config.build_cache()?,
            config.control_field.clone(),
            config.poll_interval(),
        ))
    }

    /// Resolved appliance identifier, if any snapshot provided one yet.
    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    /// The change-detection cache.
    pub fn cache(&self) -> &SyncCache {
        &self.cache
    }

    /// Field commands write to.
    pub fn control_field(&self) -> &str {
        &self.control_field
    }

    /// Put the cache back to its sentinels so the next poll republishes.
    ///
    /// The resolved identifier is kept.
    pub fn reset(&mut self) {
        self.cache.reset();
        tracing::info!("Cache reset, next poll republishes every field");
    }

    /// Drive the bridge until the command channel closes.
    ///
    /// Starts from a reset cache and polls right away. Connectivity changes
    /// win over commands, which win over poll ticks; ticks that fall due
    /// while something else runs are skipped.
    pub async fn run<B: Bus>(
        mut self,
        bus: B,
        mut commands: mpsc::Receiver<InboundMessage>,
        mut connectivity: watch::Receiver<Connectivity>,
    ) {
        self.reset();

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut watching = true;

        tracing::info!(
            interval_secs = self.poll_interval.as_secs_f64(),
            control_field = %self.control_field,
            "Bridge loop started"
        );

        loop {
            tokio::select! {
                biased;

                changed = connectivity.changed(), if watching => {
                    if changed.is_err() {
                        tracing::debug!("Connectivity monitor gone");
                        watching = false;
                        continue;
                    }
                    let state = *connectivity.borrow_and_update();
                    if let Connectivity::Connected { generation } = state {
                        tracing::info!(generation, "Bus reconnected");
                        self.reset();
                    }
                }

                message = commands.recv() => {
                    let Some(message) = message else {
                        break;
                    };
                    if let Err(e) = self.handle_command(&bus, &message.payload).await {
                        tracing::warn!(key = %message.key, error = %e, "Command rejected");
                    }
                }

                _ = ticker.tick() => {
                    match self.poll_once(&bus).await {
                        Ok(report) => tracing::debug!(
                            published = report.published.len(),
                            unchanged = report.unchanged,
                            absent = report.absent,
                            "Poll complete"
                        ),
                        Err(e) => tracing::warn!(error = %e, "Poll failed"),
                    }
                }
            }
        }

        tracing::info!("Command channel closed, bridge loop stopped");
    }
}
