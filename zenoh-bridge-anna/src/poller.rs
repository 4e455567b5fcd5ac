//! Poll/publish cycle.

use thiserror::Error;

use crate::bridge::AnnaBridge;
use crate::bus::Bus;
use crate::cache::Evaluation;
use crate::device::{DeviceError, DeviceTransport};
use crate::document::{DocumentError, Element};
use crate::extractor::{ExtractError, Extraction};

/// Reasons a cycle is abandoned. The cache is untouched in every case.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("Fetch failed: {0}")]
    Device(#[from] DeviceError),
    #[error("Snapshot unreadable: {0}")]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Identifier(#[from] ExtractError),
}

/// What one cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    /// `(field, normalized value)` pairs published, in descriptor order.
    pub published: Vec<(String, String)>,
    pub unchanged: usize,
    pub ignored: usize,
    /// Fields missing from the snapshot.
    pub absent: usize,
    /// Values the field's precision class could not parse.
    pub rejected: usize,
    /// Changed values the bus refused.
    pub failed: usize,
}

impl<D: DeviceTransport> AnnaBridge<D> {
    /// First fetch at startup: resolve the identifier, publish nothing.
    pub async fn warm_up(&mut self) -> Result<(), PollError> {
        let extraction = self.fetch().await?;
        self.adopt_identifier(extraction.identifier);
        Ok(())
    }

    /// Fetch, extract, compare and publish every changed field.
    pub async fn poll_once<B: Bus + ?Sized>(&mut self, bus: &B) -> Result<PollReport, PollError> {
        let extraction = self.fetch().await?;
        let Extraction { identifier, values } = extraction;
        self.adopt_identifier(identifier);

        let mut report = PollReport::default();

        for (field, raw) in values {
            let Some(raw) = raw else {
                tracing::trace!(field = %field, "Field absent from snapshot");
                report.absent += 1;
                continue;
            };

            match self.cache.evaluate(&field, &raw) {
                Ok(Evaluation::Changed(value)) => match bus.publish(&field, &value).await {
                    Ok(()) => {
                        tracing::info!(field = %field, value = %value, "Published change");
                        report.published.push((field, value));
                    }
                    Err(e) => {
                        tracing::warn!(field = %field, error = %e, "Publish failed");
                        report.failed += 1;
                    }
                },
                Ok(Evaluation::Unchanged(_)) => report.unchanged += 1,
                Ok(Evaluation::Ignored) => report.ignored += 1,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping value");
                    report.rejected += 1;
                }
            }
        }

        Ok(report)
    }

    async fn fetch(&self) -> Result<Extraction, PollError> {
        let body = self.device.fetch_snapshot().await?;
        let snapshot = Element::parse_xml(&body)?;
        Ok(self.extractor.extract(&snapshot)?)
    }

    fn adopt_identifier(&mut self, identifier: String) {
        if self.identifier.as_deref() == Some(identifier.as_str()) {
            return;
        }
        match &self.identifier {
            Some(previous) => {
                tracing::warn!(previous = %previous, identifier = %identifier, "Appliance identifier changed")
            }
            None => tracing::info!(identifier = %identifier, "Appliance identifier resolved"),
        }
        self.identifier = Some(identifier);
    }
}
