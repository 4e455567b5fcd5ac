//! Zenoh bridge for the Plugwise Anna thermostat.

use anyhow::{Context, Result};
use thermosync_bridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner};
use zenoh_bridge_anna::{AnnaBridge, AnnaBridgeConfig, SmileClient};

#[tokio::main]
async fn main() -> Result<()> {
    let args = BridgeArgs::parse_with_default("anna.json5");

    let config = AnnaBridgeConfig::load(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    BridgeRunner::init_logging(&config, Some(&args))
        .map_err(|e| anyhow::anyhow!("Failed to init tracing: {}", e))?;

    tracing::info!(config = ?args.config, "Loaded configuration");

    let anna = config.anna.clone();
    let device = SmileClient::new(&anna.device).context("Failed to build HTTP client")?;
    let mut bridge = AnnaBridge::from_config(device, &anna)?;

    // Resolve the identifier before the bus exists; publishing starts in the loop.
    if let Err(e) = bridge.warm_up().await {
        tracing::warn!(error = %e, "Warm-up fetch failed, identifier will be resolved by the first poll");
    }

    let mut runner = BridgeRunner::new("anna", &config)
        .await?
        .with_status_publishing();

    let commands = runner
        .subscribe_text(anna.command_key(), anna.command_queue)
        .await?;
    let connectivity = runner.watch_connectivity().await;
    let publisher = runner.publisher();

    runner.spawn(bridge.run(publisher, commands, connectivity));

    let metadata = serde_json::json!({
        "device": format!("{}:{}", anna.device.host, anna.device.port),
        "fields": anna.fields.iter().map(|f| &f.name).collect::<Vec<_>>(),
        "command_key": anna.command_key(),
        "poll_interval_secs": anna.poll_interval_secs,
    });

    runner.run_with_metadata(Some(metadata)).await?;

    Ok(())
}
