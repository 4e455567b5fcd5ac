//! Change-detection cache.
//!
//! Holds the last published (post-rounding) value of every field and decides
//! whether a new raw reading is worth publishing. Both the poll cycle and the
//! command path go through [`SyncCache::evaluate`], which is what keeps the
//! device and the bus from echoing each other's values back and forth.
//!
//! A slot starts at the field's sentinel. Without a configured sentinel the
//! slot is unobserved, which compares unequal to every value.

use std::collections::{HashMap, HashSet};

use crate::precision::{PrecisionError, PrecisionTable};

/// Outcome of [`SyncCache::evaluate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    /// The field is in the ignore set; nothing was compared or stored.
    Ignored,
    /// The normalized value equals the cached one.
    Unchanged(String),
    /// The normalized value differs and is now cached.
    Changed(String),
}

impl Evaluation {
    /// Whether the value should be published.
    pub fn is_changed(&self) -> bool {
        matches!(self, Evaluation::Changed(_))
    }

    /// Normalized value, absent for ignored fields.
    pub fn value(&self) -> Option<&str> {
        match self {
            Evaluation::Ignored => None,
            Evaluation::Unchanged(value) | Evaluation::Changed(value) => Some(value),
        }
    }
}

/// Last-known value per field with rounding and ignore policy applied.
#[derive(Debug, Clone)]
pub struct SyncCache {
    precision: PrecisionTable,
    ignore: HashSet<String>,
    sentinels: HashMap<String, Option<String>>,
    entries: HashMap<String, Option<String>>,
}

impl SyncCache {
    /// Create a cache with every known field at its sentinel.
    pub fn new<I, S>(precision: PrecisionTable, ignore: I, sentinels: S) -> Self
    where
        I: IntoIterator<Item = String>,
        S: IntoIterator<Item = (String, Option<String>)>,
    {
        let sentinels: HashMap<_, _> = sentinels.into_iter().collect();
        Self {
            precision,
            ignore: ignore.into_iter().collect(),
            entries: sentinels.clone(),
            sentinels,
        }
    }

    /// Rounding rules used by this cache.
    pub fn precision(&self) -> &PrecisionTable {
        &self.precision
    }

    /// Whether change detection is disabled for a field.
    pub fn is_ignored(&self, field: &str) -> bool {
        self.ignore.contains(field)
    }

    /// Cached value of a field, `None` while unobserved.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.entries.get(field).and_then(|entry| entry.as_deref())
    }

    /// Compare a raw reading against the cache, storing it if it changed.
    ///
    /// Ignored fields never touch their slot. A value the field's precision
    /// class cannot parse is rejected without mutation.
    pub fn evaluate(&mut self, field: &str, raw: &str) -> Result<Evaluation, PrecisionError> {
        if self.is_ignored(field) {
            return Ok(Evaluation::Ignored);
        }

        let normalized = self.precision.round(field, raw)?;

        let slot = self.entries.entry(field.to_string()).or_default();
        if slot.as_deref() == Some(normalized.as_str()) {
            return Ok(Evaluation::Unchanged(normalized));
        }

        *slot = Some(normalized.clone());
        Ok(Evaluation::Changed(normalized))
    }

    /// Put every slot back to its sentinel.
    ///
    /// Fields first seen after construction become unobserved again.
    pub fn reset(&mut self) {
        for (field, entry) in self.entries.iter_mut() {
            *entry = self.sentinels.get(field).cloned().flatten();
        }
    }
}
