//! Inbound text messages from Zenoh.
//!
//! Bridges that accept commands declare a subscriber and receive samples as
//! [`InboundMessage`]s through a bounded `tokio::sync::mpsc` channel, so the
//! bridge's own event loop decides when each message is handled.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use zenoh::sample::SampleKind;

use crate::error::{BridgeError, Result};

/// A text message received from the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Key expression the sample was published on.
    pub key: String,
    /// UTF-8 payload.
    pub payload: String,
}

/// Subscribe to `key_expr` and forward UTF-8 put samples into `tx`.
///
/// Delete samples and payloads that are not valid UTF-8 are dropped with a
/// log line. The forwarding task ends when the receiver side is closed or
/// the subscriber stops.
pub async fn forward_text(
    session: Arc<zenoh::Session>,
    key_expr: String,
    tx: mpsc::Sender<InboundMessage>,
) -> Result<JoinHandle<()>> {
    let subscriber = session
        .declare_subscriber(key_expr.clone())
        .await
        .map_err(|e| BridgeError::Subscribe {
            key: key_expr.clone(),
            message: e.to_string(),
        })?;

    tracing::info!(key_expr = %key_expr, "Subscribed for inbound messages");

    Ok(tokio::spawn(async move {
        loop {
            let sample = tokio::select! {
                _ = tx.closed() => break,
                sample = subscriber.recv_async() => sample,
            };

            let sample = match sample {
                Ok(sample) => sample,
                Err(e) => {
                    tracing::warn!(key_expr = %key_expr, error = %e, "Subscriber stopped");
                    break;
                }
            };

            if sample.kind() == SampleKind::Delete {
                tracing::trace!(key = %sample.key_expr(), "Ignoring delete sample");
                continue;
            }

            let payload = match sample.payload().try_to_string() {
                Ok(text) => text.into_owned(),
                Err(e) => {
                    tracing::warn!(
                        key = %sample.key_expr(),
                        error = %e,
                        "Dropping inbound message with non UTF-8 payload"
                    );
                    continue;
                }
            };

            let message = InboundMessage {
                key: sample.key_expr().as_str().to_string(),
                payload,
            };

            if tx.send(message).await.is_err() {
                break;
            }
        }

        tracing::debug!(key_expr = %key_expr, "Inbound forwarder stopped");
    }))
}
