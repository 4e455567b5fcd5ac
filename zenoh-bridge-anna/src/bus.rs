//! Outbound side of the bus as seen by the bridge core.

use async_trait::async_trait;
use thermosync_bridge_framework::{BridgeError, Publisher};

/// Publishes normalized field values.
#[async_trait]
pub trait Bus: Send + Sync {
    /// Publish `value` on the topic of `field`.
    async fn publish(&self, field: &str, value: &str) -> Result<(), BridgeError>;
}

#[async_trait]
impl Bus for Publisher {
    async fn publish(&self, field: &str, value: &str) -> Result<(), BridgeError> {
        self.publish_value(field, value).await
    }
}
