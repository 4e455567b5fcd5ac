//! Command intake for the controllable field.

use thiserror::Error;

use crate::bridge::AnnaBridge;
use crate::bus::Bus;
use crate::cache::Evaluation;
use crate::device::DeviceTransport;
use crate::precision::PrecisionError;

/// Reasons a command is refused before anything is written.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Appliance identifier not resolved yet, command dropped")]
    IdentifierUnresolved,
    #[error("Empty command payload")]
    EmptyPayload,
    #[error(transparent)]
    Precision(#[from] PrecisionError),
}

/// What an accepted command did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    /// Whether the device accepted the write.
    pub written: bool,
    /// Value echoed on the bus, if the command changed the cached value.
    pub echoed: Option<String>,
}

impl<D: DeviceTransport> AnnaBridge<D> {
    /// Forward a new control value to the device and echo it on the bus.
    ///
    /// The device receives the payload exactly as it arrived; blank payloads
    /// and values the field's precision class cannot parse are refused first.
    /// The write outcome is only logged. The echo goes through the cache like
    /// a polled value, so the next poll reporting the same value stays quiet.
    pub async fn handle_command<B: Bus + ?Sized>(
        &mut self,
        bus: &B,
        payload: &str,
    ) -> Result<CommandOutcome, CommandError> {
        if payload.trim().is_empty() {
            return Err(CommandError::EmptyPayload);
        }

        let identifier = self
            .identifier
            .clone()
            .ok_or(CommandError::IdentifierUnresolved)?;

        self.cache.precision().round(&self.control_field, payload)?;

        tracing::info!(field = %self.control_field, value = payload, "Command received");

        let written = match self
            .device
            .write_control(&identifier, &self.control_field, payload)
            .await
        {
            Ok(()) => {
                tracing::debug!(identifier = %identifier, value = payload, "Device write accepted");
                true
            }
            Err(e) => {
                tracing::warn!(identifier = %identifier, value = payload, error = %e, "Device write failed");
                false
            }
        };

        let echoed = match self.cache.evaluate(&self.control_field, payload)? {
            Evaluation::Changed(normalized) => {
                match bus.publish(&self.control_field, &normalized).await {
                    Ok(()) => {
                        tracing::info!(field = %self.control_field, value = %normalized, "Published change");
                        Some(normalized)
                    }
                    Err(e) => {
                        tracing::warn!(field = %self.control_field, error = %e, "Publish failed");
                        None
                    }
                }
            }
            Evaluation::Unchanged(_) | Evaluation::Ignored => None,
        };

        Ok(CommandOutcome { written, echoed })
    }
}
