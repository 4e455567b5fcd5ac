//! Value publisher for Zenoh.

use std::sync::Arc;

use thermosync_common::KeyExprBuilder;

use crate::error::{BridgeError, Result};

/// Publisher for sending field values to Zenoh.
///
/// Wraps a Zenoh session and a key prefix. Field values travel as plain
/// UTF-8 payloads on `<prefix>/<field>`.
#[derive(Clone, Debug)]
pub struct Publisher {
    session: Arc<zenoh::Session>,
    keys: KeyExprBuilder,
}

impl Publisher {
    /// Create a new publisher.
    pub fn new(session: Arc<zenoh::Session>, keys: KeyExprBuilder) -> Self {
        Self { session, keys }
    }

    /// Get the key prefix.
    pub fn key_prefix(&self) -> &str {
        self.keys.prefix()
    }

    /// Get the key expression builder.
    pub fn keys(&self) -> &KeyExprBuilder {
        &self.keys
    }

    /// Get a reference to the Zenoh session.
    pub fn session(&self) -> &Arc<zenoh::Session> {
        &self.session
    }

    /// Publish a string value for a field.
    ///
    /// The key is constructed by appending `field` to the publisher's prefix.
    pub async fn publish_value(&self, field: &str, value: &str) -> Result<()> {
        let key = self.keys.field(field);
        self.publish_raw(&key, value.as_bytes().to_vec()).await
    }

    /// Publish raw bytes to a key (for status messages, etc.).
    pub async fn publish_raw(&self, key: &str, payload: Vec<u8>) -> Result<()> {
        self.session
            .put(key, payload)
            .await
            .map_err(|e| BridgeError::Publish {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        tracing::trace!(key = %key, "Published");

        Ok(())
    }

    /// Publish a JSON value to a key.
    pub async fn publish_json<T: serde::Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let payload = serde_json::to_vec(value)?;
        self.publish_raw(key, payload).await
    }
}
