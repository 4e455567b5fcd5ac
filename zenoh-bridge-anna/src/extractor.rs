//! Snapshot extraction.
//!
//! Applies the fixed descriptor list to a parsed snapshot. The appliance
//! identifier is resolved first; without it nothing else is extracted,
//! because no write path could be built for this cycle anyway.

use thiserror::Error;

use crate::document::Element;
use crate::selector::Selector;

/// Name under which the appliance identifier is tracked in the cache.
pub const IDENTIFIER_FIELD: &str = "appliance_identifier";

/// Static description of one monitored quantity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Field name, also the last key expression chunk on the bus.
    pub name: String,
    /// Appliance the value belongs to (informational).
    pub entity: String,
    /// Where the value lives in the snapshot.
    pub selector: Selector,
    /// Initial cache value; `None` means unobserved.
    pub sentinel: Option<String>,
}

/// Extraction failures that abandon a cycle.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("appliance identifier not found with selector '{0}'")]
    IdentifierMissing(String),
}

/// Field values read from one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Resolved appliance identifier.
    pub identifier: String,
    /// Raw value per field in descriptor order; `None` when absent.
    pub values: Vec<(String, Option<String>)>,
}

impl Extraction {
    /// Raw value of a field, `None` when absent or unknown.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(name, _)| name == field)
            .and_then(|(_, value)| value.as_deref())
    }

    /// Fields the snapshot did not provide.
    pub fn absent(&self) -> impl Iterator<Item = &str> {
        self.values
            .iter()
            .filter(|(_, value)| value.is_none())
            .map(|(name, _)| name.as_str())
    }
}

/// Interpreter for the descriptor list.
#[derive(Debug, Clone)]
pub struct Extractor {
    identifier: FieldDescriptor,
    fields: Vec<FieldDescriptor>,
}

impl Extractor {
    /// Create an extractor from the identifier descriptor and the field descriptors.
    pub fn new(identifier: FieldDescriptor, fields: Vec<FieldDescriptor>) -> Self {
        Self { identifier, fields }
    }

    /// Identifier descriptor.
    pub fn identifier(&self) -> &FieldDescriptor {
        &self.identifier
    }

    /// Field descriptors in extraction order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Read every descriptor from a snapshot.
    pub fn extract(&self, snapshot: &Element) -> Result<Extraction, ExtractError> {
        let identifier = self.identifier.selector.select(snapshot).ok_or_else(|| {
            ExtractError::IdentifierMissing(self.identifier.selector.to_string())
        })?;

        let values = self
            .fields
            .iter()
            .map(|field| (field.name.clone(), field.selector.select(snapshot)))
            .collect();

        Ok(Extraction { identifier, values })
    }
}
