//! Configuration for the Anna bridge.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thermosync_bridge_framework::{BridgeConfig, BridgeError, LoggingConfig, ZenohConfig};
use thiserror::Error;

use crate::cache::SyncCache;
use crate::extractor::{Extractor, FieldDescriptor, IDENTIFIER_FIELD};
use crate::precision::{PrecisionError, PrecisionTable};
use crate::selector::{Selector, SelectorError};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid selector for '{field}': {source}")]
    Selector {
        field: String,
        #[source]
        source: SelectorError,
    },
    #[error(transparent)]
    Precision(#[from] PrecisionError),
    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<ConfigError> for BridgeError {
    fn from(err: ConfigError) -> Self {
        BridgeError::validation(err.to_string())
    }
}

/// Complete bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnaBridgeConfig {
    /// Zenoh connection settings.
    #[serde(default)]
    pub zenoh: ZenohConfig,

    /// Anna/Smile settings.
    pub anna: AnnaConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BridgeConfig for AnnaBridgeConfig {
    fn zenoh(&self) -> &ZenohConfig {
        &self.zenoh
    }

    fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    fn key_prefix(&self) -> &str {
        &self.anna.key_prefix
    }

    fn validate(&self) -> Result<(), BridgeError> {
        self.anna.validate()?;
        Ok(())
    }
}

/// Thermostat bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnaConfig {
    /// Smile gateway connection.
    pub device: DeviceConfig,

    /// Poll interval in seconds (default: 10).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Outbound key prefix; values go to `<key_prefix>/<field>`.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Inbound key prefix; commands arrive on `<command_prefix>/<control_field>`.
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,

    /// Field that commands write to.
    #[serde(default = "default_control_field")]
    pub control_field: String,

    /// Where the appliance identifier lives in the snapshot.
    #[serde(default)]
    pub identifier: IdentifierConfig,

    /// Monitored fields, in publication order.
    #[serde(default = "default_fields")]
    pub fields: Vec<FieldConfig>,

    /// Rounding classes.
    #[serde(default)]
    pub precision: PrecisionConfig,

    /// Fields excluded from change detection (never published).
    #[serde(default)]
    pub ignore: Vec<String>,

    /// Pending commands buffered while a poll is running (default: 16).
    #[serde(default = "default_command_queue")]
    pub command_queue: usize,
}

fn default_poll_interval() -> u64 {
    10
}

fn default_key_prefix() -> String {
    "thermosync/anna".to_string()
}

fn default_command_prefix() -> String {
    "thermosync/anna/set".to_string()
}

fn default_control_field() -> String {
    "setpoint".to_string()
}

fn default_command_queue() -> usize {
    16
}

/// Smile gateway connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Gateway address (IP or hostname).
    pub host: String,

    /// HTTP port (default: 80).
    #[serde(default = "default_device_port")]
    pub port: u16,

    /// Basic auth user (default: "smile").
    #[serde(default = "default_username")]
    pub username: String,

    /// Basic auth password (the gateway ID printed on the device).
    #[serde(skip_serializing)]
    pub password: String,

    /// Request timeout in milliseconds (default: 5000).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_device_port() -> u16 {
    80
}

fn default_username() -> String {
    "smile".to_string()
}

fn default_timeout_ms() -> u64 {
    5000
}

/// Location of the appliance identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifierConfig {
    /// Appliance name.
    pub entity: String,
    /// Selector yielding the identifier.
    pub selector: String,
}

impl Default for IdentifierConfig {
    fn default() -> Self {
        Self {
            entity: ANNA.to_string(),
            selector: format!("/appliances/appliance[name='{ANNA}']/@id"),
        }
    }
}

/// One monitored field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldConfig {
    /// Field name, used as the last key expression chunk.
    pub name: String,

    /// Appliance the field belongs to.
    #[serde(default)]
    pub entity: String,

    /// Selector yielding the raw value.
    pub selector: String,

    /// Initial cache value, restored on every reset.
    ///
    /// A reading equal to it is never published, not even after a reconnect.
    /// Omit it (the stock fields do) to publish the first observed value
    /// unconditionally.
    #[serde(default)]
    pub sentinel: Option<String>,
}

impl FieldConfig {
    fn new(name: &str, entity: &str, selector: String) -> Self {
        Self {
            name: name.to_string(),
            entity: entity.to_string(),
            selector,
            sentinel: None,
        }
    }
}

const ANNA: &str = "Anna";
const BOILER: &str = "Central heating boiler";

fn point_log(entity: &str, log_type: &str, position: &str) -> String {
    format!(
        "/appliances/appliance[name='{entity}']/logs/point_log[type='{log_type}']/period/measurement{position}/child::text()"
    )
}

/// Descriptors of a stock Anna thermostat paired with an OpenTherm boiler.
pub fn default_fields() -> Vec<FieldConfig> {
    vec![
        FieldConfig::new(
            "setpoint",
            ANNA,
            format!(
                "/appliances/appliance[name='{ANNA}']/actuator_functionalities/thermostat_functionality/setpoint"
            ),
        ),
        FieldConfig::new("temperature", ANNA, point_log(ANNA, "temperature", "[1]")),
        FieldConfig::new("illuminance", ANNA, point_log(ANNA, "illuminance", "[1]")),
        FieldConfig::new(
            "water_pressure",
            BOILER,
            point_log(BOILER, "central_heater_water_pressure", "[1]"),
        ),
        FieldConfig::new(
            "boiler_temperature",
            BOILER,
            point_log(BOILER, "boiler_temperature", "[1]"),
        ),
        FieldConfig::new("heating_state", BOILER, point_log(BOILER, "central_heating_state", "")),
        FieldConfig::new(
            "domestic_temperature",
            BOILER,
            point_log(BOILER, "domestic_hot_water_temperature", ""),
        ),
    ]
}

/// Field membership of the rounding classes.
///
/// Omitting the whole section selects the stock rounding; omitting a single
/// list leaves that class empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrecisionConfig {
    /// Rounded to whole numbers.
    #[serde(default)]
    pub integer: Vec<String>,
    /// Rounded to 0.5.
    #[serde(default)]
    pub half: Vec<String>,
    /// Rounded to 0.1.
    #[serde(default)]
    pub tenth: Vec<String>,
}

impl Default for PrecisionConfig {
    fn default() -> Self {
        let names = |list: &[&str]| list.iter().map(|n| n.to_string()).collect();
        Self {
            integer: names(&["illuminance"]),
            half: names(&["setpoint"]),
            tenth: names(&[
                "temperature",
                "water_pressure",
                "boiler_temperature",
                "domestic_temperature",
            ]),
        }
    }
}

impl PrecisionConfig {
    fn all(&self) -> impl Iterator<Item = &String> {
        self.integer.iter().chain(&self.half).chain(&self.tenth)
    }
}

impl AnnaConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device.host.is_empty() {
            return Err(ConfigError::Validation(
                "device.host cannot be empty".to_string(),
            ));
        }

        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "poll_interval_secs must be greater than 0".to_string(),
            ));
        }

        if self.command_queue == 0 {
            return Err(ConfigError::Validation(
                "command_queue must be greater than 0".to_string(),
            ));
        }

        for (name, prefix) in [
            ("key_prefix", &self.key_prefix),
            ("command_prefix", &self.command_prefix),
        ] {
            thermosync_common::validate_prefix(prefix)
                .map_err(|e| ConfigError::Validation(format!("{}: {}", name, e)))?;
        }

        if self.fields.is_empty() {
            return Err(ConfigError::Validation(
                "At least one field must be configured".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for field in &self.fields {
            if field.name.is_empty() {
                return Err(ConfigError::Validation(
                    "Field name cannot be empty".to_string(),
                ));
            }
            if field.name.contains(['/', '*', '$', '?', '#']) {
                return Err(ConfigError::Validation(format!(
                    "Field '{}': name must be a single key expression chunk",
                    field.name
                )));
            }
            if field.name == IDENTIFIER_FIELD {
                return Err(ConfigError::Validation(format!(
                    "Field name '{}' is reserved for the appliance identifier",
                    IDENTIFIER_FIELD
                )));
            }
            if !names.insert(field.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "Duplicate field '{}'",
                    field.name
                )));
            }
        }

        for name in self.precision.all().chain(&self.ignore) {
            if !names.contains(name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "Unknown field '{}' in precision or ignore list",
                    name
                )));
            }
        }

        if !names.contains(self.control_field.as_str()) {
            return Err(ConfigError::Validation(format!(
                "control_field '{}' is not a configured field",
                self.control_field
            )));
        }

        // Published values must not loop back in as commands.
        let command_key = self.command_key();
        for field in &self.fields {
            let published = format!("{}/{}", self.key_prefix, field.name);
            if command_key == published || command_key.starts_with(&format!("{}/", published)) {
                return Err(ConfigError::Validation(format!(
                    "Command key '{}' overlaps published key '{}'",
                    command_key, published
                )));
            }
        }

        self.build_precision()?;
        self.build_extractor()?;

        Ok(())
    }

    /// Poll period.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Key expression commands are received on.
    pub fn command_key(&self) -> String {
        format!("{}/{}", self.command_prefix, self.control_field)
    }

    /// Build the rounding table.
    pub fn build_precision(&self) -> Result<PrecisionTable, ConfigError> {
        Ok(PrecisionTable::new(
            &self.precision.integer[..],
            &self.precision.half[..],
            &self.precision.tenth[..],
        )?)
    }

    /// Parse every selector into an extractor.
    pub fn build_extractor(&self) -> Result<Extractor, ConfigError> {
        let identifier = FieldDescriptor {
            name: IDENTIFIER_FIELD.to_string(),
            entity: self.identifier.entity.clone(),
            selector: parse_selector(IDENTIFIER_FIELD, &self.identifier.selector)?,
            sentinel: None,
        };

        let fields = self
            .fields
            .iter()
            .map(|field| {
                Ok(FieldDescriptor {
                    name: field.name.clone(),
                    entity: field.entity.clone(),
                    selector: parse_selector(&field.name, &field.selector)?,
                    sentinel: field.sentinel.clone(),
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Extractor::new(identifier, fields))
    }

    /// Build a cache with every field at its sentinel.
    pub fn build_cache(&self) -> Result<SyncCache, ConfigError> {
        let sentinels = self
            .fields
            .iter()
            .map(|field| (field.name.clone(), field.sentinel.clone()));

        Ok(SyncCache::new(
            self.build_precision()?,
            self.ignore.iter().cloned(),
            sentinels,
        ))
    }
}

fn parse_selector(field: &str, selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector).map_err(|source| ConfigError::Selector {
        field: field.to_string(),
        source,
    })
}
