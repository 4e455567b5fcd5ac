//! Per-field rounding rules.
//!
//! Every field belongs to exactly one [`PrecisionClass`]. Membership comes
//! from three configured lists (integer, half, tenth); fields in none of them
//! are passed through untouched. The [`PrecisionTable`] is built once at
//! startup and rejects a field listed in more than one class.
//!
//! Rounding is half-away-from-zero (`f64::round`). Results are strings
//! because the cache and the bus are string-valued.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

/// Errors raised while building a table or rounding a value.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PrecisionError {
    /// A field appears in two precision lists.
    #[error("field '{field}' is listed as both {first} and {second} precision")]
    Overlap {
        field: String,
        first: PrecisionClass,
        second: PrecisionClass,
    },

    /// A rounded field received something that is not a finite number.
    #[error("value '{value}' for field '{field}' is not a number")]
    NotNumeric { field: String, value: String },
}

/// Rounding rule applied to a field before comparison and publication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrecisionClass {
    /// Nearest whole number, no decimal point.
    Integer,
    /// Nearest multiple of 0.5, shortest representation.
    Half,
    /// Nearest multiple of 0.1, always one decimal.
    Tenth,
    /// Raw value, unchanged.
    #[default]
    Exact,
}

impl PrecisionClass {
    /// Return the string name for this class.
    pub fn as_str(&self) -> &'static str {
        match self {
            PrecisionClass::Integer => "integer",
            PrecisionClass::Half => "half",
            PrecisionClass::Tenth => "tenth",
            PrecisionClass::Exact => "exact",
        }
    }

    /// Normalize a raw value according to this class.
    ///
    /// `field` is only used for error reporting.
    pub fn round(&self, field: &str, raw: &str) -> Result<String, PrecisionError> {
        let steps_per_unit = match self {
            PrecisionClass::Integer => 1.0,
            PrecisionClass::Half => 2.0,
            PrecisionClass::Tenth => 10.0,
            PrecisionClass::Exact => return Ok(raw.to_string()),
        };

        let value = parse_number(raw).ok_or_else(|| PrecisionError::NotNumeric {
            field: field.to_string(),
            value: raw.to_string(),
        })?;

        // -0.0 would otherwise render as "-0"
        let rounded = match (value * steps_per_unit).round() / steps_per_unit {
            r if r == 0.0 => 0.0,
            r => r,
        };

        Ok(match self {
            PrecisionClass::Tenth => format!("{:.1}", rounded),
            _ => rounded.to_string(),
        })
    }
}

impl fmt::Display for PrecisionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// Validated mapping from field name to [`PrecisionClass`].
#[derive(Debug, Clone, Default)]
pub struct PrecisionTable {
    classes: HashMap<String, PrecisionClass>,
}

impl PrecisionTable {
    /// Build a table from the three membership lists.
    pub fn new<S: AsRef<str>>(
        integer: &[S],
        half: &[S],
        tenth: &[S],
    ) -> Result<Self, PrecisionError> {
        let mut classes = HashMap::new();

        let lists = [
            (PrecisionClass::Integer, integer),
            (PrecisionClass::Half, half),
            (PrecisionClass::Tenth, tenth),
        ];

        for (class, fields) in lists {
            for field in fields {
                let field = field.as_ref();
                match classes.get(field) {
                    Some(&first) if first != class => {
                        return Err(PrecisionError::Overlap {
                            field: field.to_string(),
                            first,
                            second: class,
                        });
                    }
                    _ => {
                        classes.insert(field.to_string(), class);
                    }
                }
            }
        }

        Ok(Self { classes })
    }

    /// Class of a field; fields in no list are [`PrecisionClass::Exact`].
    pub fn classify(&self, field: &str) -> PrecisionClass {
        self.classes.get(field).copied().unwrap_or_default()
    }

    /// Normalize a raw value for a field.
    pub fn round(&self, field: &str, raw: &str) -> Result<String, PrecisionError> {
        self.classify(field).round(field, raw)
    }

    /// Fields with an explicit class.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }
}
