//! Bridge runner for lifecycle management.

use std::future::Future;
use std::sync::Arc;

use tokio::signal;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use thermosync_common::{KeyExprBuilder, connect, init_tracing};

use crate::BridgeArgs;
use crate::config::BridgeConfig;
use crate::connectivity::{Connectivity, ConnectivityMonitor};
use crate::error::{BridgeError, Result};
use crate::inbound::{InboundMessage, forward_text};
use crate::publisher::Publisher;
use crate::status::StatusPublisher;

/// Bridge runner that manages the lifecycle of a device bridge.
///
/// Handles:
/// - Zenoh connection
/// - Inbound subscriptions and connectivity monitoring
/// - Task spawning and management
/// - Graceful shutdown on Ctrl+C
/// - Status publishing (optional)
///
/// Logging is initialized separately through [`BridgeRunner::init_logging`]
/// so that work done before the bus connection exists is logged too.
///
/// # Example
///
/// ```ignore
/// use thermosync_bridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let args = BridgeArgs::parse_with_default("mybridge.json5");
///     let config = MyBridgeConfig::load(&args.config)?;
///     BridgeRunner::init_logging(&config, Some(&args))?;
///
///     let mut runner = BridgeRunner::new("mybridge", &config).await?;
///     let commands = runner.subscribe_text("mybridge/set/value", 16).await?;
///     let publisher = runner.publisher();
///     runner.spawn(my_worker(publisher, commands));
///
///     runner.run_with_metadata(None).await
/// }
/// ```
pub struct BridgeRunner {
    /// Bridge name for logging and status.
    name: String,
    /// Bridge version.
    version: String,
    /// Zenoh session.
    session: Arc<zenoh::Session>,
    /// Publisher for field values.
    publisher: Publisher,
    /// Status publisher (optional).
    status_publisher: Option<StatusPublisher>,
    /// Spawned tasks.
    tasks: Vec<JoinHandle<()>>,
}

impl BridgeRunner {
    /// Initialize tracing from the configuration, honoring a CLI level override.
    pub fn init_logging<C: BridgeConfig>(config: &C, args: Option<&BridgeArgs>) -> Result<()> {
        init_tracing(&config.effective_logging(args)).map_err(|e| BridgeError::config(e.to_string()))
    }

    /// Create a new bridge runner.
    ///
    /// This will:
    /// 1. Validate the key prefix
    /// 2. Connect to Zenoh
    /// 3. Create the publisher
    pub async fn new<C: BridgeConfig>(name: impl Into<String>, config: &C) -> Result<Self> {
        let name = name.into();
        let version = env!("CARGO_PKG_VERSION").to_string();

        let keys = KeyExprBuilder::new(config.key_prefix())?;

        tracing::info!(bridge = %name, version = %version, "Starting bridge");

        let session = Arc::new(
            connect(config.zenoh())
                .await
                .map_err(|e| BridgeError::ZenohConnection(e.to_string()))?,
        );

        let publisher = Publisher::new(session.clone(), keys);

        Ok(Self {
            name,
            version,
            session,
            publisher,
            status_publisher: None,
            tasks: Vec::new(),
        })
    }

    /// Enable status publishing.
    ///
    /// When enabled, the runner will publish status messages on startup and shutdown.
    pub fn with_status_publishing(mut self) -> Self {
        self.status_publisher = Some(StatusPublisher::new(
            self.publisher.clone(),
            &self.name,
            &self.version,
        ));
        self
    }

    /// Get a clone of the publisher.
    pub fn publisher(&self) -> Publisher {
        self.publisher.clone()
    }

    /// Subscribe to `key_expr` and receive its text payloads through a channel.
    ///
    /// The forwarding task is tracked and aborted on shutdown.
    pub async fn subscribe_text(
        &mut self,
        key_expr: impl Into<String>,
        capacity: usize,
    ) -> Result<mpsc::Receiver<InboundMessage>> {
        let (tx, rx) = mpsc::channel(capacity);
        let handle = forward_text(self.session.clone(), key_expr.into(), tx).await?;
        self.tasks.push(handle);
        Ok(rx)
    }

    /// Start watching bus connectivity.
    pub async fn watch_connectivity(&self) -> watch::Receiver<Connectivity> {
        ConnectivityMonitor::new(self.session.clone()).start().await
    }

    /// Spawn a worker task.
    ///
    /// The task will be tracked and aborted on shutdown.
    pub fn spawn<F>(&mut self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(future);
        self.tasks.push(handle);
    }

    /// Run the bridge until Ctrl+C is received, with custom status metadata.
    ///
    /// This will:
    /// 1. Publish "running" status (if enabled)
    /// 2. Wait for Ctrl+C signal
    /// 3. Abort all spawned tasks
    /// 4. Publish "offline" status (if enabled)
    /// 5. Close the Zenoh session
    pub async fn run_with_metadata(self, metadata: Option<serde_json::Value>) -> Result<()> {
        if let Some(ref status_pub) = self.status_publisher {
            if let Err(e) = status_pub.publish_running(metadata).await {
                tracing::warn!(error = %e, "Failed to publish running status");
            }
        }

        tracing::info!(
            bridge = %self.name,
            tasks = self.tasks.len(),
            "Bridge running. Press Ctrl+C to stop."
        );

        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            if let Some(ref status_pub) = self.status_publisher {
                let _ = status_pub.publish_error(e.to_string()).await;
            }
        }

        tracing::info!(bridge = %self.name, "Received shutdown signal");

        for task in &self.tasks {
            task.abort();
        }

        // Wait briefly for tasks to clean up
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        if let Some(ref status_pub) = self.status_publisher {
            if let Err(e) = status_pub.publish_offline().await {
                tracing::warn!(error = %e, "Failed to publish offline status");
            }
        }

        if let Err(e) = self.session.close().await {
            tracing::warn!(error = %e, "Error closing Zenoh session");
        }

        tracing::info!(bridge = %self.name, "Goodbye!");

        Ok(())
    }
}
