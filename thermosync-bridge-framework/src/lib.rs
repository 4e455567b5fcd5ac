//! thermosync bridge framework
//!
//! Common abstractions for building device bridges on top of Zenoh.
//!
//! # Overview
//!
//! This framework provides:
//! - [`BridgeConfig`] trait for configuration loading and validation
//! - [`BridgeRunner`] for managing bridge lifecycle (startup, shutdown, signal handling)
//! - [`Publisher`] for publishing field values to Zenoh
//! - [`InboundMessage`] and [`forward_text`] for receiving text commands
//! - [`ConnectivityMonitor`] for detecting bus (re)connections
//! - [`BridgeArgs`] for common CLI argument parsing
//! - [`BridgeStatus`] for standardized status reporting
//!
//! # Example
//!
//! ```ignore
//! use thermosync_bridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = BridgeArgs::parse_with_default("mybridge.json5");
//!     let config = MyBridgeConfig::load(&args.config)?;
//!     BridgeRunner::init_logging(&config, Some(&args))?;
//!
//!     let mut runner = BridgeRunner::new("mybridge", &config).await?;
//!
//!     // Spawn device workers
//!     runner.spawn(my_worker(runner.publisher()));
//!
//!     // Run until Ctrl+C
//!     runner.run_with_metadata(None).await
//! }
//! ```

mod args;
mod config;
pub mod connectivity;
mod error;
mod inbound;
mod publisher;
mod runner;
mod status;

pub use args::BridgeArgs;
pub use config::BridgeConfig;
pub use connectivity::{Connectivity, ConnectivityMonitor, ConnectivityTracker};
pub use error::{BridgeError, Result};
pub use inbound::{InboundMessage, forward_text};
pub use publisher::Publisher;
pub use runner::BridgeRunner;
pub use status::{BridgeStatus, StatusPublisher};

// Re-export commonly used types from thermosync-common
pub use thermosync_common::{KeyExprBuilder, LogFormat, LoggingConfig, ZenohConfig};
