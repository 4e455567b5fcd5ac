//! Test doubles for the device and the bus.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use thermosync_bridge_framework::BridgeError;
use zenoh_bridge_anna::config::AnnaBridgeConfig;
use zenoh_bridge_anna::{AnnaBridge, AnnaConfig, Bus, DeviceError, DeviceTransport};

pub const ANNA_ID: &str = "0a1b2c3d4e5f";

/// Device whose snapshot and write outcome are set by the test.
#[derive(Clone, Default)]
pub struct MockDevice {
    snapshot: Arc<Mutex<Option<String>>>,
    writes: Arc<Mutex<Vec<(String, String, String)>>>,
    fail_writes: Arc<Mutex<bool>>,
}

impl MockDevice {
    pub fn serving(snapshot: impl Into<String>) -> Self {
        let device = Self::default();
        device.set_snapshot(snapshot);
        device
    }

    pub fn set_snapshot(&self, snapshot: impl Into<String>) {
        *self.snapshot.lock().unwrap() = Some(snapshot.into());
    }

    pub fn go_offline(&self) {
        *self.snapshot.lock().unwrap() = None;
    }

    pub fn fail_writes(&self) {
        *self.fail_writes.lock().unwrap() = true;
    }

    pub fn writes(&self) -> Vec<(String, String, String)> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeviceTransport for MockDevice {
    async fn fetch_snapshot(&self) -> Result<String, DeviceError> {
        self.snapshot
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| DeviceError::Status {
                status: 503,
                url: "mock://core/appliances".to_string(),
            })
    }

    async fn write_control(
        &self,
        identifier: &str,
        field: &str,
        value: &str,
    ) -> Result<(), DeviceError> {
        self.writes.lock().unwrap().push((
            identifier.to_string(),
            field.to_string(),
            value.to_string(),
        ));
        if *self.fail_writes.lock().unwrap() {
            return Err(DeviceError::Status {
                status: 500,
                url: "mock://thermostat".to_string(),
            });
        }
        Ok(())
    }
}

/// Bus that records every publication.
#[derive(Clone, Default)]
pub struct RecordingBus {
    published: Arc<Mutex<Vec<(String, String)>>>,
}

impl RecordingBus {
    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().unwrap().clone()
    }

    pub fn values_of(&self, field: &str) -> Vec<String> {
        self.published()
            .into_iter()
            .filter(|(name, _)| name == field)
            .map(|(_, value)| value)
            .collect()
    }

    pub fn clear(&self) {
        self.published.lock().unwrap().clear();
    }
}

#[async_trait]
impl Bus for RecordingBus {
    async fn publish(&self, field: &str, value: &str) -> Result<(), BridgeError> {
        self.published
            .lock()
            .unwrap()
            .push((field.to_string(), value.to_string()));
        Ok(())
    }
}

/// Readings rendered into a Smile-style appliance document.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub identifier: Option<String>,
    pub setpoint: Option<String>,
    pub temperature: Option<String>,
    pub illuminance: Option<String>,
    pub water_pressure: Option<String>,
    pub boiler_temperature: Option<String>,
    pub heating_state: Option<String>,
    pub domestic_temperature: Option<String>,
}

impl Default for Snapshot {
    fn default() -> Self {
        let some = |v: &str| Some(v.to_string());
        Self {
            identifier: some(ANNA_ID),
            setpoint: some("20.5"),
            temperature: some("21.03"),
            illuminance: some("12.3"),
            water_pressure: some("1.7"),
            boiler_temperature: some("48.26"),
            heating_state: some("off"),
            domestic_temperature: some("42.11"),
        }
    }
}

impl Snapshot {
    pub fn with_temperature(mut self, value: Option<&str>) -> Self {
        self.temperature = value.map(str::to_string);
        self
    }

    pub fn with_setpoint(mut self, value: &str) -> Self {
        self.setpoint = Some(value.to_string());
        self
    }

    pub fn with_water_pressure(mut self, value: &str) -> Self {
        self.water_pressure = Some(value.to_string());
        self
    }

    pub fn without_identifier(mut self) -> Self {
        self.identifier = None;
        self
    }

    pub fn xml(&self) -> String {
        let id = |id: &Option<String>| {
            id.as_ref()
                .map(|id| format!(" id=\"{}\"", id))
                .unwrap_or_default()
        };

        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<appliances>");

        xml.push_str(&format!("<appliance{}><name>Anna</name>", id(&self.identifier)));
        if let Some(setpoint) = &self.setpoint {
            xml.push_str(&format!(
                "<actuator_functionalities><thermostat_functionality>\
                 <type>thermostat</type><setpoint>{}</setpoint>\
                 </thermostat_functionality></actuator_functionalities>",
                setpoint
            ));
        }
        xml.push_str("<logs>");
        push_log(&mut xml, "temperature", &self.temperature);
        push_log(&mut xml, "illuminance", &self.illuminance);
        xml.push_str("</logs></appliance>");

        xml.push_str("<appliance id=\"b0i1e2r3\"><name>Central heating boiler</name><logs>");
        push_log(&mut xml, "central_heater_water_pressure", &self.water_pressure);
        push_log(&mut xml, "boiler_temperature", &self.boiler_temperature);
        push_log(&mut xml, "central_heating_state", &self.heating_state);
        push_log(&mut xml, "domestic_hot_water_temperature", &self.domestic_temperature);
        xml.push_str("</logs></appliance></appliances>");

        xml
    }
}

fn push_log(xml: &mut String, log_type: &str, value: &Option<String>) {
    let Some(value) = value else {
        return;
    };
    xml.push_str(&format!(
        "<point_log><type>{}</type><period start_date=\"2024-01-01T00:00:00+01:00\">\
         <measurement log_date=\"2024-01-01T10:00:00+01:00\">{}</measurement>\
         </period></point_log>",
        log_type, value
    ));
}

/// Stock configuration with `extra` spliced into the `anna` section.
pub fn anna_config(extra: &str) -> AnnaConfig {
    let config: AnnaBridgeConfig = json5::from_str(&format!(
        r#"{{ anna: {{ device: {{ host: "127.0.0.1", password: "secret" }}, {} }} }}"#,
        extra
    ))
    .unwrap();
    config.anna.validate().unwrap();
    config.anna
}

pub fn bridge(device: &MockDevice) -> AnnaBridge<MockDevice> {
    AnnaBridge::from_config(device.clone(), &anna_config("")).unwrap()
}

pub fn fast_bridge(device: &MockDevice, interval: Duration) -> AnnaBridge<MockDevice> {
    let config = anna_config("");
    AnnaBridge::new(
        device.clone(),
        config.build_extractor().unwrap(),
        config.build_cache().unwrap(),
        config.control_field,
        interval,
    )
}

/// Wait until `condition` holds, or panic after a few seconds.
pub async fn wait_for(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met in time"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
